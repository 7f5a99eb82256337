// SPDX-License-Identifier: GPL-3.0-only

//! Job configuration of the mount step

use std::fs;
use std::path::Path;

use installer_types::{DEFAULT_SWAP_SUBVOLUME, MountOptionRule, PartitionDescriptor, SubvolumeSpec};
use serde::{Deserialize, Serialize};

use crate::error::{MountError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Option rule table; `None` means every mount uses `defaults`
    #[serde(default)]
    pub mount_options: Option<Vec<MountOptionRule>>,

    #[serde(default)]
    pub extra_mounts: Vec<PartitionDescriptor>,

    /// Older configurations list EFI-only extra mounts separately
    #[serde(default)]
    pub extra_mounts_efi: Vec<PartitionDescriptor>,

    #[serde(default)]
    pub btrfs_subvolumes: Option<Vec<SubvolumeSpec>>,

    #[serde(default)]
    pub btrfs_swap_subvol: Option<String>,
}

impl JobConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| MountError::Config(format!("invalid job configuration: {e}")))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| MountError::Config(format!("invalid job configuration: {e}")))
    }

    /// Load a `.json` or `.toml` configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| MountError::io(format!("cannot read {}", path.display()), e))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_toml_str(&raw),
        }
    }

    pub fn rules(&self) -> Option<&[MountOptionRule]> {
        self.mount_options.as_deref()
    }

    pub fn swap_subvolume(&self) -> &str {
        self.btrfs_swap_subvol
            .as_deref()
            .unwrap_or(DEFAULT_SWAP_SUBVOLUME)
    }

    /// All extra mounts, with the legacy EFI list folded in and flagged
    pub fn all_extra_mounts(&self) -> Vec<PartitionDescriptor> {
        let mut mounts = self.extra_mounts.clone();
        mounts.extend(self.extra_mounts_efi.iter().cloned().map(|mut mount| {
            mount.efi = true;
            mount
        }));
        mounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
btrfsSwapSubvol = "/@swapfile"

[[extraMounts]]
device = "proc"
fs = "proc"
mountPoint = "/proc"

[[extraMounts]]
device = "efivarfs"
fs = "efivarfs"
mountPoint = "/sys/firmware/efi/efivars"
efi = true

[[mountOptions]]
filesystem = "default"
options = ["defaults"]

[[mountOptions]]
filesystem = "btrfs"
options = ["defaults", "noatime", "compress=zstd:1"]
ssdOptions = ["discard=async"]

[[btrfsSubvolumes]]
mountPoint = "/"
subvolume = "/@"

[[btrfsSubvolumes]]
mountPoint = "/var/log"
subvolume = "/@log"
"#;

    #[test]
    fn parses_toml_job_configuration() {
        let config = JobConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.extra_mounts.len(), 2);
        assert!(config.extra_mounts[1].efi);
        assert_eq!(config.rules().map(<[_]>::len), Some(2));
        assert_eq!(config.btrfs_subvolumes.as_ref().map(Vec::len), Some(2));
        assert_eq!(config.swap_subvolume(), "/@swapfile");
    }

    #[test]
    fn empty_configuration_uses_defaults() {
        let config = JobConfig::from_toml_str("").unwrap();
        assert!(config.rules().is_none());
        assert!(config.btrfs_subvolumes.is_none());
        assert_eq!(config.swap_subvolume(), "/@swap");
    }

    #[test]
    fn legacy_efi_mounts_are_flagged() {
        let config = JobConfig::from_json_str(
            r#"{"extraMounts":[{"device":"sys","fs":"sysfs","mountPoint":"/sys"}],
                "extraMountsEfi":[{"device":"efivarfs","fs":"efivarfs","mountPoint":"/sys/firmware/efi/efivars"}]}"#,
        )
        .unwrap();

        let mounts = config.all_extra_mounts();
        assert_eq!(mounts.len(), 2);
        assert!(!mounts[0].efi);
        assert!(mounts[1].efi);
    }

    #[test]
    fn malformed_configuration_is_a_config_error() {
        let error = JobConfig::from_toml_str("mountOptions = 3").unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::ConfigError);
    }
}
