// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Swap subvolume name used when the job configuration names none
pub const DEFAULT_SWAP_SUBVOLUME: &str = "/@swap";

/// A Btrfs subvolume and where it is mounted inside the install root.
///
/// An empty `subvolume` stands for the whole filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubvolumeSpec {
    pub mount_point: String,
    #[serde(default)]
    pub subvolume: String,
}

impl SubvolumeSpec {
    pub fn new(mount_point: impl Into<String>, subvolume: impl Into<String>) -> Self {
        Self {
            mount_point: mount_point.into(),
            subvolume: subvolume.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.mount_point == "/"
    }
}

/// Layout used when the job configuration has no (or an empty) subvolume list
pub fn default_subvolume_layout() -> Vec<SubvolumeSpec> {
    vec![
        SubvolumeSpec::new("/", "/@"),
        SubvolumeSpec::new("/home", "/@home"),
    ]
}
