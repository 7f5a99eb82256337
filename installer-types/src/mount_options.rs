// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Option string used whenever no rule yields anything
pub const DEFAULT_OPTIONS: &str = "defaults";

/// One row of the mount option rule table.
///
/// `filesystem` is either a filesystem kind, the pseudo kinds `efi` and
/// `btrfs_swap`, or the fallback sentinel `default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountOptionRule {
    pub filesystem: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub ssd_options: Vec<String>,
    #[serde(default)]
    pub nvme_options: Vec<String>,
    #[serde(default)]
    pub hdd_options: Vec<String>,
}

impl MountOptionRule {
    pub const FALLBACK: &'static str = "default";

    pub fn new(filesystem: impl Into<String>, options: &[&str]) -> Self {
        Self {
            filesystem: filesystem.into(),
            options: options.iter().map(|option| option.to_string()).collect(),
            ..Default::default()
        }
    }
}

/// Resolved options for one mounted mount point, consumed by the fstab writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOptionsEntry {
    pub mountpoint: String,
    pub option_string: String,
}

impl MountOptionsEntry {
    pub fn new(mountpoint: impl Into<String>, option_string: impl Into<String>) -> Self {
        Self {
            mountpoint: mountpoint.into(),
            option_string: option_string.into(),
        }
    }
}
