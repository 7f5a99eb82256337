// SPDX-License-Identifier: GPL-3.0-only

//! Mount the whole install tree, or roll back everything on failure

use std::path::PathBuf;

use installer_sys::Host;
use installer_types::{FirmwareType, PartitionDescriptor};
use tracing::{error, info, warn};

use crate::config::JobConfig;
use crate::context::{Publication, RunContext};
use crate::error::{MountError, Result};
use crate::ledger::ActiveMounts;
use crate::partition::{MountEnv, mount_partition};
use crate::zfs::ZfsMetadata;

/// Inputs of one orchestration run
#[derive(Debug, Clone, Default)]
pub struct MountRequest {
    pub root_mount_point: PathBuf,
    /// Parent directory for Btrfs scratch mounts; the system temp dir when `None`
    pub scratch_parent: Option<PathBuf>,
    pub partitions: Vec<PartitionDescriptor>,
    /// Extra and bind mounts, already filtered for the firmware
    pub extra_mounts: Vec<PartitionDescriptor>,
    pub firmware: FirmwareType,
    pub efi_location: Option<String>,
    pub zfs: ZfsMetadata,
    pub swap_is_file: bool,
}

impl MountRequest {
    /// Gather a request from run state and job configuration.
    ///
    /// On BIOS firmware extra mounts flagged `efi` are dropped and no EFI
    /// location is used.
    pub fn from_context(
        context: &dyn RunContext,
        config: &JobConfig,
        root_mount_point: impl Into<PathBuf>,
    ) -> Result<Self> {
        let firmware = context.firmware_type()?;

        let mut extra_mounts = config.all_extra_mounts();
        if extra_mounts.is_empty() {
            warn!("No extra mounts defined, is the job configuration complete?");
        }

        let efi_location = if firmware.is_efi() {
            context.efi_system_partition()?
        } else {
            extra_mounts.retain(|mount| !mount.efi);
            None
        };

        Ok(Self {
            root_mount_point: root_mount_point.into(),
            scratch_parent: None,
            partitions: context.partitions()?,
            extra_mounts,
            firmware,
            efi_location,
            zfs: ZfsMetadata {
                pools: context.zfs_pool_info()?,
                datasets: context.zfs_datasets()?,
                encryption: context.zfs_encryption()?,
            },
            swap_is_file: context.partition_choices()?.swap_is_file(),
        })
    }
}

/// Result of a fully successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountReport {
    pub publication: Publication,
    /// Everything mounted by the run, oldest first
    pub active_mounts: ActiveMounts,
}

/// Check that a mount point sorts before everything below it: absolute,
/// no trailing slash (except `/` itself), no empty, `.` or `..` segments.
pub fn validate_mount_point(mount_point: &str) -> Result<()> {
    let invalid = |reason: &str| -> Result<()> {
        Err(MountError::Config(format!(
            "Invalid mount point '{mount_point}': {reason}"
        )))
    };

    if mount_point == "/" {
        return Ok(());
    }
    if !mount_point.starts_with('/') {
        return invalid("not an absolute path");
    }
    if mount_point.ends_with('/') {
        return invalid("trailing slash");
    }
    let segments: Vec<&str> = mount_point[1..].split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return invalid("empty path segment");
    }
    if segments
        .iter()
        .any(|segment| *segment == "." || *segment == "..")
    {
        return invalid("relative path segment");
    }

    Ok(())
}

/// Entries that have a mount point, in ascending mount point order.
///
/// Plain string order puts every directory before its descendants as long
/// as mount points pass [`validate_mount_point`]. Entries with equal mount
/// points keep their input order.
pub fn mount_order(entries: &[PartitionDescriptor]) -> Vec<&PartitionDescriptor> {
    let mut ordered: Vec<&PartitionDescriptor> = entries
        .iter()
        .filter(|entry| entry.has_mount_point())
        .collect();
    ordered.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
    ordered
}

/// Drives the per-partition protocol over physical partitions, then extra
/// mounts, and owns the active-mount ledger.
pub struct Orchestrator<'a> {
    host: &'a dyn Host,
    config: &'a JobConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(host: &'a dyn Host, config: &'a JobConfig) -> Self {
        Self { host, config }
    }

    /// Mount everything in `request`.
    ///
    /// On failure every mount made so far is undone newest-first and the
    /// error is returned; nothing is staged for publication.
    pub fn mount_all(&self, request: &MountRequest) -> Result<MountReport> {
        let physical = mount_order(&request.partitions);
        let extra = mount_order(&request.extra_mounts);
        for entry in physical.iter().chain(extra.iter()) {
            validate_mount_point(&entry.mount_point)?;
        }

        let env = MountEnv {
            host: self.host,
            config: self.config,
            root_mount_point: &request.root_mount_point,
            scratch_parent: request.scratch_parent.as_deref(),
            efi_location: request.efi_location.as_deref(),
            efi_capable: request.firmware.is_efi(),
            partitions: &request.partitions,
            zfs: &request.zfs,
            swap_is_file: request.swap_is_file,
        };

        let mut ledger = ActiveMounts::new();
        let mut staged = Publication::new(&request.root_mount_point);

        info!(
            "Mounting {} partitions and {} extra mounts under {}",
            physical.len(),
            extra.len(),
            request.root_mount_point.display()
        );

        let outcome = physical
            .into_iter()
            .chain(extra)
            .try_for_each(|entry| mount_partition(&env, entry, &mut ledger, &mut staged));

        if let Err(e) = outcome {
            error!("{}", e);
            let unmounted = ledger.unwind(self.host);
            info!("Rolled back {} mounts", unmounted.len());
            return Err(e);
        }

        staged.extra_mounts = request.extra_mounts.clone();
        Ok(MountReport {
            publication: staged,
            active_mounts: ledger,
        })
    }
}
