// SPDX-License-Identifier: GPL-3.0-only

//! Entry point of the mount job

use std::fs;
use std::path::PathBuf;

use installer_sys::Host;
use tracing::{info, warn};

use crate::config::JobConfig;
use crate::context::RunContext;
use crate::error::{MountError, Result};
use crate::orchestrator::{MountReport, MountRequest, Orchestrator};
use crate::swap::{enable_swap, swap_devices};

const ROOT_PREFIX: &str = "installer-root-";

/// Knobs of a run that do not come from run state
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Install root to use instead of a fresh temporary directory
    pub root_mount_point: Option<PathBuf>,
    /// Parent directory for Btrfs scratch mounts
    pub scratch_parent: Option<PathBuf>,
}

/// Create a private, persistent directory to mount the install tree on
pub fn create_root_mount_point() -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(ROOT_PREFIX)
        .tempdir()
        .map_err(|e| MountError::io("cannot create install root", e))?;
    Ok(dir.keep())
}

/// Run the mount job against `context`.
///
/// Claimed swap partitions are enabled first, then the whole tree is
/// mounted. Run state is only written when every mount succeeded.
pub fn run(
    context: &mut dyn RunContext,
    config: &JobConfig,
    host: &dyn Host,
    options: &RunOptions,
) -> Result<MountReport> {
    let partitions = context.partitions()?;
    if partitions.is_empty() {
        warn!("partitions is empty");
        return Err(MountError::Config(
            "No partitions are defined for mount to use.".to_string(),
        ));
    }

    enable_swap(host, &swap_devices(&partitions));

    let root = match &options.root_mount_point {
        Some(root) => root.clone(),
        None => create_root_mount_point()?,
    };
    // mountinfo and the unmount ledger both speak canonical paths
    let root = fs::create_dir_all(&root)
        .and_then(|()| fs::canonicalize(&root))
        .map_err(|e| MountError::io(format!("cannot resolve install root {}", root.display()), e))?;

    let mut request = MountRequest::from_context(&*context, config, root)?;
    request.scratch_parent = options.scratch_parent.clone();

    let mut report = Orchestrator::new(host, config).mount_all(&request)?;
    if let Err(e) = report.publication.publish(context) {
        warn!("Run state was not published, unmounting the install tree");
        report.active_mounts.unwind(host);
        return Err(e);
    }

    info!(
        "Mounted {} targets under {}",
        report.active_mounts.len(),
        request.root_mount_point.display()
    );
    Ok(report)
}
