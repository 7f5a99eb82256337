// SPDX-License-Identifier: GPL-3.0-only

use installer_types::{MountOptionRule, PartitionDescriptor};

/// A partition with a device, filesystem and mount point
pub fn partition(device: &str, fs: &str, mount_point: &str) -> PartitionDescriptor {
    PartitionDescriptor {
        device: device.to_string(),
        fs: fs.to_string(),
        mount_point: mount_point.to_string(),
        ..Default::default()
    }
}

/// A pseudo-filesystem or bind mount as listed in `extraMounts`
pub fn extra_mount(device: &str, fs: &str, mount_point: &str) -> PartitionDescriptor {
    partition(device, fs, mount_point)
}

pub fn bind_mount(source: &str, mount_point: &str) -> PartitionDescriptor {
    PartitionDescriptor {
        options: Some(vec!["bind".to_string()]),
        ..partition(source, "", mount_point)
    }
}

/// A claimed swap partition; `fs_name` is `linuxswap`, `luks` or `luks2`
pub fn swap_partition(device: &str, fs_name: &str, mapper: Option<&str>) -> PartitionDescriptor {
    PartitionDescriptor {
        fs_name: Some(fs_name.to_string()),
        luks_mapper_name: mapper.map(str::to_string),
        claimed: true,
        ..partition(device, "linuxswap", "")
    }
}

/// A typical distribution rule table
pub fn rule_table() -> Vec<MountOptionRule> {
    vec![
        MountOptionRule::new("default", &["defaults", "noatime"]),
        MountOptionRule {
            filesystem: "btrfs".to_string(),
            options: vec!["defaults".to_string(), "noatime".to_string()],
            ssd_options: vec!["discard=async".to_string()],
            nvme_options: vec!["discard=async".to_string()],
            hdd_options: vec![],
        },
        MountOptionRule::new("btrfs_swap", &["defaults", "noatime"]),
        MountOptionRule::new("efi", &["defaults", "umask=0077"]),
    ]
}
