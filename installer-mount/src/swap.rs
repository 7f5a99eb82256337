// SPDX-License-Identifier: GPL-3.0-only

//! Best-effort activation of the swap partitions claimed by the install

use installer_sys::Host;
use installer_types::{PartitionDescriptor, fs_kind};
use tracing::{info, warn};

/// Devices to hand to `swapon`: the raw partition for plain swap, the
/// mapper device for LUKS swap.
pub fn swap_devices(partitions: &[PartitionDescriptor]) -> Vec<String> {
    let claimed: Vec<&PartitionDescriptor> = partitions
        .iter()
        .filter(|partition| partition.is_claimed_swap())
        .collect();

    let plain = claimed
        .iter()
        .filter(|partition| partition.fs_name.as_deref() == Some(fs_kind::LINUX_SWAP))
        .map(|partition| partition.device.clone());

    let encrypted = claimed
        .iter()
        .filter(|partition| {
            matches!(
                partition.fs_name.as_deref(),
                Some(fs_kind::LUKS | fs_kind::LUKS2)
            )
        })
        .filter_map(|partition| match &partition.luks_mapper_name {
            Some(name) => Some(format!("/dev/mapper/{name}")),
            None => {
                warn!("Encrypted swap {} has no mapper name", partition.device);
                None
            }
        });

    plain.chain(encrypted).collect()
}

/// Run `swapon` for every device. Failures are logged and ignored.
pub fn enable_swap(host: &dyn Host, devices: &[String]) {
    for device in devices {
        info!("Enabling swap on {}", device);
        if let Err(e) = host.run("swapon", &[device.as_str()], None) {
            warn!("Failed to enable swap on {}: {}", device, e);
        }
    }
}
