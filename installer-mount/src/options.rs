// SPDX-License-Identifier: GPL-3.0-only

//! Mount option resolution from the rule table

use installer_sys::{DeviceProbe, disk_name_for_device, is_nvme_device};
use installer_types::{DEFAULT_OPTIONS, MountOptionRule, PartitionDescriptor, fs_kind};
use tracing::debug;

/// Storage class of the disk behind a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Nvme,
    Ssd,
    Hdd,
}

/// Classify the disk backing `device`.
///
/// An unreadable rotational flag counts as a spinning disk.
pub fn device_class<P: DeviceProbe + ?Sized>(device: &str, probe: &P) -> DeviceClass {
    let disk = disk_name_for_device(device);
    match probe.is_rotational(&disk) {
        Ok(false) if is_nvme_device(device) => DeviceClass::Nvme,
        Ok(false) => DeviceClass::Ssd,
        Ok(true) => DeviceClass::Hdd,
        Err(e) => {
            debug!("Cannot query rotational flag of {}: {}; assuming HDD", disk, e);
            DeviceClass::Hdd
        }
    }
}

/// Comma-joined option string for mounting `partition` as `filesystem`.
///
/// Explicit per-partition options win over everything. Without a rule
/// table the result is `defaults`. The EFI system partition is looked up
/// as `efi`; unknown kinds fall back to the `default` rule.
pub fn resolve_mount_options<P: DeviceProbe + ?Sized>(
    filesystem: &str,
    rules: Option<&[MountOptionRule]>,
    partition: &PartitionDescriptor,
    efi_location: Option<&str>,
    probe: &P,
) -> String {
    if let Some(options) = &partition.options {
        return options.join(",");
    }

    let Some(rules) = rules else {
        return DEFAULT_OPTIONS.to_string();
    };

    let effective = match efi_location {
        Some(location) if location == partition.mount_point => fs_kind::EFI,
        _ => filesystem,
    };

    let rule = rules
        .iter()
        .find(|rule| rule.filesystem == effective)
        .or_else(|| {
            rules
                .iter()
                .find(|rule| rule.filesystem == MountOptionRule::FALLBACK)
        });

    let Some(rule) = rule else {
        return DEFAULT_OPTIONS.to_string();
    };

    let mut items = rule.options.clone();
    match device_class(&partition.device, probe) {
        DeviceClass::Nvme => items.extend(rule.nvme_options.iter().cloned()),
        DeviceClass::Ssd => items.extend(rule.ssd_options.iter().cloned()),
        DeviceClass::Hdd => items.extend(rule.hdd_options.iter().cloned()),
    }

    let resolved = if items.is_empty() {
        DEFAULT_OPTIONS.to_string()
    } else {
        items.join(",")
    };
    debug!(
        "Options for {} ({} via rule '{}'): {}",
        partition.mount_point, effective, rule.filesystem, resolved
    );
    resolved
}
