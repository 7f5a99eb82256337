// SPDX-License-Identifier: GPL-3.0-only

//! CLI wrapper around the installer-mount library

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use installer_mount::{
    GlobalStorage, JobConfig, MountError, MountRequest, RunContext, RunOptions, mount_order,
    plan_subvolumes, validate_mount_point,
};
use installer_sys::HostSystem;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Mount an install target from installer run state
#[derive(Parser)]
#[command(name = "installer-mount-cli")]
#[command(about = "Mount or plan the mount tree of an install target", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount everything and write the published keys back to the state file
    Run {
        /// Job configuration (.toml or .json)
        #[arg(long)]
        config: PathBuf,
        /// Run state as a JSON object
        #[arg(long)]
        state: PathBuf,
        /// Install root to use instead of a fresh temporary directory
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Print the mount order and Btrfs layout as JSON without mounting
    Plan {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        state: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else {
        "installer_mount=info,warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Run {
            config,
            state,
            root,
        } => {
            // SAFETY: geteuid has no preconditions and cannot fail
            if unsafe { libc::geteuid() } != 0 {
                anyhow::bail!("mounting requires root privileges");
            }

            let job = JobConfig::load(&config)?;
            let mut storage = GlobalStorage::load(&state)?;
            let host = HostSystem::new();
            let options = RunOptions {
                root_mount_point: root,
                scratch_parent: None,
            };

            match installer_mount::run(&mut storage, &job, &host, &options) {
                Ok(_) => {
                    storage
                        .save(&state)
                        .with_context(|| format!("writing {}", state.display()))?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    report(&e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Plan { config, state } => {
            let job = JobConfig::load(&config)?;
            let storage = GlobalStorage::load(&state)?;
            match plan(&job, &storage) {
                Ok(plan) => {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    report(&e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn plan(job: &JobConfig, storage: &GlobalStorage) -> installer_mount::Result<serde_json::Value> {
    let request = MountRequest::from_context(storage, job, "/")?;

    let physical = mount_order(&request.partitions);
    let extra = mount_order(&request.extra_mounts);
    for entry in physical.iter().chain(extra.iter()) {
        validate_mount_point(&entry.mount_point)?;
    }

    let btrfs_root = physical
        .iter()
        .any(|entry| entry.mount_point == "/" && entry.fs_kind() == installer_mount::fs_kind::BTRFS);
    let layout = btrfs_root.then(|| {
        plan_subvolumes(
            job.btrfs_subvolumes.as_deref(),
            &request.partitions,
            request.swap_is_file,
            job.swap_subvolume(),
        )
    });

    Ok(json!({
        "firmwareType": request.firmware,
        "efiSystemPartition": request.efi_location,
        "partitions": physical,
        "extraMounts": extra,
        "btrfsSubvolumes": layout.as_ref().map(|plan| &plan.subvolumes),
        "btrfsSwapSubvol": layout.as_ref().and_then(|plan| plan.swap_subvolume.as_deref()),
        "swapDevices": installer_mount::swap::swap_devices(&storage.partitions()?),
    }))
}

fn report(error: &MountError) {
    eprintln!("{}: {}", error.title(), error);
}
