// SPDX-License-Identifier: GPL-3.0-only

//! Shared run state the mount step reads from and publishes to

use std::fs;
use std::path::{Path, PathBuf};

use installer_types::{
    FirmwareType, MountOptionsEntry, PartitionChoices, PartitionDescriptor, SubvolumeSpec,
    ZfsDatasetInfo, ZfsEncryptionInfo, ZfsPoolInfo,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{MountError, Result};

/// Read/write access to the installer's run state.
///
/// Readers return the empty value when a key is absent.
pub trait RunContext {
    fn partitions(&self) -> Result<Vec<PartitionDescriptor>>;
    fn firmware_type(&self) -> Result<FirmwareType>;
    fn efi_system_partition(&self) -> Result<Option<String>>;
    fn zfs_pool_info(&self) -> Result<Vec<ZfsPoolInfo>>;
    fn zfs_datasets(&self) -> Result<Vec<ZfsDatasetInfo>>;
    fn zfs_encryption(&self) -> Result<Vec<ZfsEncryptionInfo>>;
    fn partition_choices(&self) -> Result<PartitionChoices>;

    fn set_root_mount_point(&mut self, path: &Path) -> Result<()>;
    fn set_mount_options_list(&mut self, entries: &[MountOptionsEntry]) -> Result<()>;
    fn set_extra_mounts(&mut self, mounts: &[PartitionDescriptor]) -> Result<()>;
    fn set_btrfs_subvolumes(&mut self, subvolumes: &[SubvolumeSpec]) -> Result<()>;
    fn set_btrfs_root_subvolume(&mut self, name: &str) -> Result<()>;
    fn set_btrfs_swap_subvolume(&mut self, name: &str) -> Result<()>;

    /// Current raw value of a published key, for restoring it later
    fn published_value(&self, key: &str) -> Result<Option<Value>>;
    /// Put back a value read with `published_value`; `None` removes the key
    fn restore_value(&mut self, key: &str, value: Option<Value>) -> Result<()>;
}

/// Everything a successful run hands over, staged until the whole tree
/// is mounted so a failed run publishes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publication {
    pub root_mount_point: PathBuf,
    pub mount_options: Vec<MountOptionsEntry>,
    pub extra_mounts: Vec<PartitionDescriptor>,
    pub btrfs_subvolumes: Option<Vec<SubvolumeSpec>>,
    pub btrfs_root_subvolume: Option<String>,
    pub btrfs_swap_subvolume: Option<String>,
}

impl Publication {
    pub fn new(root_mount_point: impl Into<PathBuf>) -> Self {
        Self {
            root_mount_point: root_mount_point.into(),
            ..Default::default()
        }
    }

    pub fn record_options(&mut self, mount_point: &str, option_string: &str) {
        self.mount_options
            .push(MountOptionsEntry::new(mount_point, option_string));
    }

    /// Write every published key, or none of them.
    ///
    /// The previous values are read first; if any write fails they are
    /// restored and the write error is returned.
    pub fn publish(&self, context: &mut dyn RunContext) -> Result<()> {
        let previous = PUBLISHED_KEYS
            .iter()
            .map(|key| Ok((*key, context.published_value(key)?)))
            .collect::<Result<Vec<_>>>()?;

        let Err(e) = self.write(context) else {
            return Ok(());
        };

        warn!("Publishing run state failed ({}), restoring previous values", e);
        for (key, value) in previous.into_iter().rev() {
            if let Err(restore_error) = context.restore_value(key, value) {
                warn!("Could not restore '{}': {}", key, restore_error);
            }
        }
        Err(e)
    }

    fn write(&self, context: &mut dyn RunContext) -> Result<()> {
        if let Some(subvolumes) = &self.btrfs_subvolumes {
            context.set_btrfs_subvolumes(subvolumes)?;
        }
        if let Some(name) = &self.btrfs_root_subvolume {
            context.set_btrfs_root_subvolume(name)?;
        }
        if let Some(name) = &self.btrfs_swap_subvolume {
            context.set_btrfs_swap_subvolume(name)?;
        }
        context.set_root_mount_point(&self.root_mount_point)?;
        context.set_mount_options_list(&self.mount_options)?;
        context.set_extra_mounts(&self.extra_mounts)
    }
}

const PUBLISHED_KEYS: &[&str] = &[
    keys::BTRFS_SUBVOLUMES,
    keys::BTRFS_ROOT_SUBVOLUME,
    keys::BTRFS_SWAP_SUBVOL,
    keys::ROOT_MOUNT_POINT,
    keys::MOUNT_OPTIONS_LIST,
    keys::EXTRA_MOUNTS,
];

/// Key names used in the installer's global storage
pub mod keys {
    pub const PARTITIONS: &str = "partitions";
    pub const FIRMWARE_TYPE: &str = "firmwareType";
    pub const EFI_SYSTEM_PARTITION: &str = "efiSystemPartition";
    pub const ZFS_POOL_INFO: &str = "zfsPoolInfo";
    pub const ZFS_DATASETS: &str = "zfsDatasets";
    pub const ZFS_INFO: &str = "zfsInfo";
    pub const PARTITION_CHOICES: &str = "partitionChoices";
    pub const ROOT_MOUNT_POINT: &str = "rootMountPoint";
    pub const MOUNT_OPTIONS_LIST: &str = "mountOptionsList";
    pub const EXTRA_MOUNTS: &str = "extraMounts";
    pub const BTRFS_SUBVOLUMES: &str = "btrfsSubvolumes";
    pub const BTRFS_ROOT_SUBVOLUME: &str = "btrfsRootSubvolume";
    pub const BTRFS_SWAP_SUBVOL: &str = "btrfsSwapSubvol";
}

/// JSON-object backed run state, persisted as a single file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStorage {
    values: Map<String, Value>,
}

impl GlobalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let values = serde_json::from_str(raw)
            .map_err(|e| MountError::Config(format!("invalid run state: {e}")))?;
        Ok(Self { values })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| MountError::io(format!("cannot read {}", path.display()), e))?;
        Self::from_json_str(&raw)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.values)
            .map_err(|e| MountError::Precondition(format!("cannot serialise run state: {e}")))?;
        fs::write(path, content)
            .map_err(|e| MountError::io(format!("cannot write {}", path.display()), e))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed read; `null` counts as absent
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| MountError::Config(format!("malformed '{key}' in run state: {e}"))),
        }
    }

    pub fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| MountError::Precondition(format!("cannot store '{key}': {e}")))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

impl RunContext for GlobalStorage {
    fn partitions(&self) -> Result<Vec<PartitionDescriptor>> {
        Ok(self.get(keys::PARTITIONS)?.unwrap_or_default())
    }

    fn firmware_type(&self) -> Result<FirmwareType> {
        Ok(self.get(keys::FIRMWARE_TYPE)?.unwrap_or_default())
    }

    fn efi_system_partition(&self) -> Result<Option<String>> {
        self.get(keys::EFI_SYSTEM_PARTITION)
    }

    fn zfs_pool_info(&self) -> Result<Vec<ZfsPoolInfo>> {
        Ok(self.get(keys::ZFS_POOL_INFO)?.unwrap_or_default())
    }

    fn zfs_datasets(&self) -> Result<Vec<ZfsDatasetInfo>> {
        Ok(self.get(keys::ZFS_DATASETS)?.unwrap_or_default())
    }

    fn zfs_encryption(&self) -> Result<Vec<ZfsEncryptionInfo>> {
        Ok(self.get(keys::ZFS_INFO)?.unwrap_or_default())
    }

    fn partition_choices(&self) -> Result<PartitionChoices> {
        Ok(self.get(keys::PARTITION_CHOICES)?.unwrap_or_default())
    }

    fn set_root_mount_point(&mut self, path: &Path) -> Result<()> {
        self.insert(keys::ROOT_MOUNT_POINT, &path.to_string_lossy())
    }

    fn set_mount_options_list(&mut self, entries: &[MountOptionsEntry]) -> Result<()> {
        self.insert(keys::MOUNT_OPTIONS_LIST, entries)
    }

    fn set_extra_mounts(&mut self, mounts: &[PartitionDescriptor]) -> Result<()> {
        self.insert(keys::EXTRA_MOUNTS, mounts)
    }

    fn set_btrfs_subvolumes(&mut self, subvolumes: &[SubvolumeSpec]) -> Result<()> {
        self.insert(keys::BTRFS_SUBVOLUMES, subvolumes)
    }

    fn set_btrfs_root_subvolume(&mut self, name: &str) -> Result<()> {
        self.insert(keys::BTRFS_ROOT_SUBVOLUME, name)
    }

    fn set_btrfs_swap_subvolume(&mut self, name: &str) -> Result<()> {
        self.insert(keys::BTRFS_SWAP_SUBVOL, name)
    }

    fn published_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn restore_value(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        match value {
            Some(value) => self.values.insert(key.to_string(), value),
            None => self.values.remove(key),
        };
        Ok(())
    }
}
