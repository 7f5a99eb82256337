// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Filesystem kind names as they appear in partition descriptors
pub mod fs_kind {
    pub const UNFORMATTED: &str = "unformatted";
    pub const BTRFS: &str = "btrfs";
    pub const ZFS: &str = "zfs";
    pub const LINUX_SWAP: &str = "linuxswap";
    pub const FAT16: &str = "fat16";
    pub const FAT32: &str = "fat32";
    pub const VFAT: &str = "vfat";
    pub const EXFAT: &str = "exfat";
    pub const NTFS: &str = "ntfs";
    pub const EXT2: &str = "ext2";
    pub const LUKS: &str = "luks";
    pub const LUKS2: &str = "luks2";
    /// Pseudo kind used to look up options for the Btrfs swap subvolume
    pub const BTRFS_SWAP: &str = "btrfs_swap";
    /// Pseudo kind used to look up options for the EFI system partition
    pub const EFI: &str = "efi";
}

/// One partition (or extra mount) to be mounted into the target tree.
///
/// Physical partitions come from the partitioning step; extra mounts
/// (`/proc`, `/sys`, bind mounts) come from the job configuration and use
/// the same shape, with `options` and `efi` typically only set there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionDescriptor {
    #[serde(default)]
    pub device: String,

    /// Filesystem kind, e.g. `ext4`, `btrfs`, `linuxswap`
    #[serde(default)]
    pub fs: String,

    /// Underlying format name; `luks`/`luks2` for encrypted swap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_name: Option<String>,

    /// Relative to the install root; empty means "do not mount"
    #[serde(default)]
    pub mount_point: String,

    /// Explicit options; when present they override every rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luks_mapper_name: Option<String>,

    #[serde(default)]
    pub claimed: bool,

    /// Extra mount that only makes sense on EFI firmware
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub efi: bool,
}

impl PartitionDescriptor {
    /// Lowercased filesystem kind
    pub fn fs_kind(&self) -> String {
        self.fs.to_lowercase()
    }

    pub fn has_mount_point(&self) -> bool {
        !self.mount_point.is_empty()
    }

    /// Device to hand to the mount executor: the mapper device for
    /// encrypted volumes, the raw partition otherwise.
    pub fn mount_device(&self) -> String {
        match &self.luks_mapper_name {
            Some(name) => format!("/dev/mapper/{name}"),
            None => self.device.clone(),
        }
    }

    pub fn is_claimed_swap(&self) -> bool {
        self.fs_kind() == fs_kind::LINUX_SWAP && self.claimed
    }
}

/// Choices made on the partitioning page that affect mounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionChoices {
    /// `"file"` when swap lives in a file instead of a partition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<String>,
}

impl PartitionChoices {
    pub fn swap_is_file(&self) -> bool {
        self.swap.as_deref() == Some("file")
    }
}
