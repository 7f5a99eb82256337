// SPDX-License-Identifier: GPL-3.0-only

//! Btrfs root: create subvolumes on a scratch mount, then mount them

use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use installer_sys::Host;
use installer_types::{DEFAULT_OPTIONS, PartitionDescriptor, SubvolumeSpec, fs_kind};
use tracing::{debug, info, warn};

use crate::context::Publication;
use crate::error::{MountError, Result};
use crate::ledger::{ActiveMounts, unmount};
use crate::options::resolve_mount_options;
use crate::partition::{MountEnv, join_under};
use crate::subvolumes::plan_subvolumes;

const SCRATCH_PREFIX: &str = "installer-btrfs-";

/// `subvol=<name>,<options>`
pub fn subvolume_options(subvolume: &str, options: &str) -> String {
    format!("subvol={subvolume},{options}")
}

/// Mount a Btrfs filesystem destined for `/`.
///
/// Plans the layout, creates missing subvolumes on a scratch mount of the
/// raw filesystem, mounts the root subvolume over the install root and
/// every other subvolume below it.
pub fn mount_btrfs_root(
    env: &MountEnv<'_>,
    partition: &PartitionDescriptor,
    device: &str,
    base_options: &str,
    ledger: &mut ActiveMounts,
    staged: &mut Publication,
) -> Result<()> {
    let plan = plan_subvolumes(
        env.config.btrfs_subvolumes.as_deref(),
        env.partitions,
        env.swap_is_file,
        env.config.swap_subvolume(),
    );
    staged.btrfs_subvolumes = Some(plan.subvolumes.clone());
    if plan.swap_subvolume.is_some() {
        staged.btrfs_swap_subvolume = plan.swap_subvolume.clone();
    }

    create_subvolumes(env, device, &plan.subvolumes, ledger)?;

    let root = plan
        .subvolumes
        .iter()
        .find(|subvolume| subvolume.is_root())
        .ok_or_else(|| MountError::Precondition("Btrfs root subvolume (/) not found".to_string()))?;
    if root.subvolume.is_empty() {
        return Err(MountError::Precondition(
            "Btrfs root subvolume not defined".to_string(),
        ));
    }

    let root_options = subvolume_options(&root.subvolume, base_options);
    info!(
        "Mounting subvolume {} of {} on {}",
        root.subvolume,
        device,
        env.root_mount_point.display()
    );
    if env
        .host
        .mount(device, env.root_mount_point, fs_kind::BTRFS, &root_options)
        != 0
    {
        return Err(MountError::MountFailed {
            device: format!("root subvolume {} of {}", root.subvolume, device),
            target: env.root_mount_point.display().to_string(),
        });
    }
    ledger.push(env.root_mount_point);
    staged.record_options(&root.mount_point, base_options);
    staged.btrfs_root_subvolume = Some(root.subvolume.clone());

    let swap_name = env.config.swap_subvolume();
    let swap_options = plan
        .subvolumes
        .iter()
        .any(|subvolume| subvolume.subvolume == swap_name)
        .then(|| {
            resolve_mount_options(
                fs_kind::BTRFS_SWAP,
                env.config.rules(),
                partition,
                env.efi_location,
                env.host,
            )
        });

    for subvolume in plan.subvolumes.iter().filter(|subvolume| !subvolume.is_root()) {
        if subvolume.subvolume.is_empty() {
            return Err(MountError::Precondition(format!(
                "Btrfs subvolume for {} not defined",
                subvolume.mount_point
            )));
        }

        let options = match &swap_options {
            Some(options) if subvolume.subvolume == swap_name => options.as_str(),
            _ => base_options,
        };
        let target = env.target_path(&subvolume.mount_point);
        fs::create_dir_all(&target)
            .map_err(|e| MountError::io(format!("cannot create {}", target.display()), e))?;

        info!(
            "Mounting subvolume {} on {}",
            subvolume.subvolume,
            target.display()
        );
        let status = env.host.mount(
            device,
            &target,
            fs_kind::BTRFS,
            &subvolume_options(&subvolume.subvolume, options),
        );
        if status != 0 {
            return Err(MountError::MountFailed {
                device: format!("subvolume {} of {}", subvolume.subvolume, device),
                target: target.display().to_string(),
            });
        }

        ledger.push(target);
        staged.record_options(&subvolume.mount_point, options);
    }

    Ok(())
}

/// Create the missing subvolumes through a scratch mount of the raw
/// filesystem. The scratch mount is released whatever happens once it
/// is up.
fn create_subvolumes(
    env: &MountEnv<'_>,
    device: &str,
    subvolumes: &[SubvolumeSpec],
    ledger: &mut ActiveMounts,
) -> Result<()> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX);
    let scratch = match env.scratch_parent {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    }
    .map_err(|e| MountError::io("cannot create Btrfs scratch directory", e))?
    // Removal is handled below, after the unmount is confirmed.
    .keep();

    if env
        .host
        .mount(device, &scratch, fs_kind::BTRFS, DEFAULT_OPTIONS)
        != 0
    {
        remove_scratch(&scratch);
        return Err(MountError::MountFailed {
            device: format!("{device} for subvolume creation"),
            target: scratch.display().to_string(),
        });
    }
    ledger.push(&scratch);

    let mut created = Vec::new();
    let creation = create_missing(env.host, &scratch, subvolumes, &mut created);
    let cleanup = release_scratch(env.host, &scratch, ledger);

    if creation.is_err() && !created.is_empty() {
        warn!(
            "Subvolume creation failed part-way; left on {}: {}",
            device,
            created.join(", ")
        );
    }

    match (creation, cleanup) {
        (Err(e), Err(cleanup_error)) => {
            warn!("Releasing scratch mount failed too: {}", cleanup_error);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), cleanup) => cleanup,
    }
}

fn create_missing(
    host: &dyn Host,
    scratch: &Path,
    subvolumes: &[SubvolumeSpec],
    created: &mut Vec<String>,
) -> Result<()> {
    for subvolume in subvolumes.iter().filter(|s| !s.subvolume.is_empty()) {
        let path = join_under(scratch, &subvolume.subvolume);
        if path.exists() {
            debug!("Subvolume {} already exists", subvolume.subvolume);
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MountError::io(format!("cannot create {}", parent.display()), e))?;
        }

        info!("Creating subvolume {}", subvolume.subvolume);
        let path_arg = path.to_string_lossy().into_owned();
        host.run("btrfs", &["subvolume", "create", path_arg.as_str()], None)
            .map_err(|e| {
                MountError::command(format!("Failed to create subvolume {}", subvolume.subvolume), e)
            })?;
        created.push(subvolume.subvolume.clone());

        if subvolume.mount_point == "/root" {
            fs::set_permissions(&path, Permissions::from_mode(0o750)).map_err(|e| {
                MountError::io(format!("cannot restrict {}", path.display()), e)
            })?;
        }
    }

    Ok(())
}

/// Unmount the scratch directory and drop it from the ledger. On failure
/// the entry stays so rollback can detach it.
fn release_scratch(host: &dyn Host, scratch: &Path, ledger: &mut ActiveMounts) -> Result<()> {
    if host.is_mounted(scratch) {
        unmount(host, scratch, false).map_err(|e| {
            MountError::command(format!("Cannot unmount {}", scratch.display()), e)
        })?;
    }
    ledger.remove(scratch);
    remove_scratch(scratch);
    Ok(())
}

/// Only an empty directory is removed; anything left inside means the
/// filesystem is still attached somewhere.
fn remove_scratch(scratch: &Path) {
    if let Err(e) = fs::remove_dir(scratch) {
        debug!("Could not remove {}: {}", scratch.display(), e);
    }
}
