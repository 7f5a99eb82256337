// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Pool backing one ZFS mount point, as created by the partitioning step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZfsPoolInfo {
    pub mountpoint: String,
    pub pool_name: String,
    pub ds_name: String,
}

/// A dataset of a pool, mounted explicitly when the pool backs `/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZfsDatasetInfo {
    pub zpool: String,
    pub ds_name: String,
    pub mountpoint: String,
    pub can_mount: CanMount,
}

impl ZfsDatasetInfo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.zpool, self.ds_name)
    }
}

/// The `canmount` property: either a plain flag or one of `on`/`off`/`noauto`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanMount {
    Flag(bool),
    Mode(String),
}

impl CanMount {
    /// Datasets the installer has to mount by hand
    pub fn needs_explicit_mount(&self) -> bool {
        match self {
            CanMount::Flag(flag) => *flag,
            CanMount::Mode(mode) => matches!(mode.as_str(), "noauto" | "on"),
        }
    }
}

/// Encryption settings for one ZFS mount point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZfsEncryptionInfo {
    pub mountpoint: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub passphrase: Option<String>,
}
