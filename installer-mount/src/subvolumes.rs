// SPDX-License-Identifier: GPL-3.0-only

//! Btrfs subvolume layout planning

use std::collections::BTreeSet;

use installer_types::{PartitionDescriptor, SubvolumeSpec, default_subvolume_layout};
use tracing::{debug, warn};

/// Mount point of the swap subvolume inside the install root
pub const SWAP_MOUNT_POINT: &str = "/swap";

/// Subvolumes to create and mount under a Btrfs root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubvolumePlan {
    pub subvolumes: Vec<SubvolumeSpec>,
    /// Set when a swap subvolume was added for a swap file
    pub swap_subvolume: Option<String>,
}

/// Whether `path` equals `base` or lies below it on a segment boundary
pub fn is_within(path: &str, base: &str) -> bool {
    if path == base {
        return true;
    }
    let prefix = base.trim_end_matches('/');
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Work out the subvolume layout for a Btrfs root.
///
/// Starts from the configured layout (or `/` + `/home` when none is
/// configured), drops entries that a dedicated partition covers, drops
/// repeated mount points and appends a swap subvolume when swap is a file.
pub fn plan_subvolumes(
    configured: Option<&[SubvolumeSpec]>,
    partitions: &[PartitionDescriptor],
    swap_is_file: bool,
    swap_subvolume: &str,
) -> SubvolumePlan {
    let layout = match configured {
        None => {
            warn!("No configuration for btrfsSubvolumes");
            default_subvolume_layout()
        }
        Some([]) => default_subvolume_layout(),
        Some(layout) => layout.to_vec(),
    };

    let dedicated: Vec<&str> = partitions
        .iter()
        .map(|partition| partition.mount_point.as_str())
        .filter(|mount_point| !mount_point.is_empty() && *mount_point != "/")
        .collect();

    let mut seen = BTreeSet::new();
    let mut subvolumes = Vec::with_capacity(layout.len() + 1);
    for subvolume in layout {
        let covered = dedicated
            .iter()
            .any(|mount_point| is_within(&subvolume.mount_point, mount_point));
        if covered && !subvolume.is_root() {
            debug!(
                "Skipping subvolume {} at {}: dedicated partition",
                subvolume.subvolume, subvolume.mount_point
            );
            continue;
        }
        if !seen.insert(subvolume.mount_point.clone()) {
            debug!("Skipping duplicate subvolume mount point {}", subvolume.mount_point);
            continue;
        }
        subvolumes.push(subvolume);
    }

    let mut swap = None;
    if swap_is_file {
        if seen.contains(SWAP_MOUNT_POINT) {
            debug!("Swap subvolume mount point already configured");
        } else {
            subvolumes.push(SubvolumeSpec::new(SWAP_MOUNT_POINT, swap_subvolume));
        }
        swap = Some(swap_subvolume.to_string());
    }

    SubvolumePlan {
        subvolumes,
        swap_subvolume: swap,
    }
}
