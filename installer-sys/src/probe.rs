// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// Answers questions about the disk backing a partition.
pub trait DeviceProbe {
    /// Whether the whole disk `disk_name` (e.g. `sda`, `nvme0n1`) spins
    fn is_rotational(&self, disk_name: &str) -> Result<bool>;
}

/// Reads `queue/rotational` from sysfs
#[derive(Debug, Clone)]
pub struct SysfsProbe {
    block_root: PathBuf,
}

impl SysfsProbe {
    pub fn new<P: Into<PathBuf>>(block_root: P) -> Self {
        Self {
            block_root: block_root.into(),
        }
    }
}

impl Default for SysfsProbe {
    fn default() -> Self {
        Self::new("/sys/block")
    }
}

impl DeviceProbe for SysfsProbe {
    fn is_rotational(&self, disk_name: &str) -> Result<bool> {
        let path = self.block_root.join(disk_name).join("queue/rotational");
        let value = fs::read_to_string(&path)?;
        Ok(value.trim() != "0")
    }
}

/// Whole-disk name for a partition device path.
///
/// `/dev/sda2` → `sda`, `/dev/nvme0n1p3` → `nvme0n1`,
/// `/dev/mmcblk0p1` → `mmcblk0`.
pub fn disk_name_for_device(device: &str) -> String {
    let name = base_name(device);

    if name.starts_with("mmcblk") || name.starts_with("nvme") {
        let without_digits = name.trim_end_matches(|c: char| c.is_ascii_digit());
        if without_digits.len() < name.len()
            && let Some(disk) = without_digits.strip_suffix('p')
        {
            return disk.to_string();
        }
        return name.to_string();
    }

    name.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
}

pub fn is_nvme_device(device: &str) -> bool {
    base_name(device).starts_with("nvme")
}

fn base_name(device: &str) -> &str {
    Path::new(device)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_partition_suffixes() {
        assert_eq!(disk_name_for_device("/dev/sda2"), "sda");
        assert_eq!(disk_name_for_device("/dev/vdb10"), "vdb");
        assert_eq!(disk_name_for_device("/dev/nvme0n1p3"), "nvme0n1");
        assert_eq!(disk_name_for_device("/dev/mmcblk0p1"), "mmcblk0");
        // Whole disks keep their number.
        assert_eq!(disk_name_for_device("/dev/nvme0n1"), "nvme0n1");
    }

    #[test]
    fn recognises_nvme() {
        assert!(is_nvme_device("/dev/nvme1n1p2"));
        assert!(!is_nvme_device("/dev/sdb1"));
    }

    #[test]
    fn reads_rotational_flag_from_sysfs() {
        let dir = tempfile::tempdir().unwrap();
        for (disk, flag) in [("sda", "1\n"), ("nvme0n1", "0\n")] {
            let queue = dir.path().join(disk).join("queue");
            fs::create_dir_all(&queue).unwrap();
            fs::write(queue.join("rotational"), flag).unwrap();
        }

        let probe = SysfsProbe::new(dir.path());
        assert!(probe.is_rotational("sda").unwrap());
        assert!(!probe.is_rotational("nvme0n1").unwrap());
        assert!(probe.is_rotational("sdz").is_err());
    }
}
