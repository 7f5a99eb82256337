// SPDX-License-Identifier: GPL-3.0-only

//! Mount orchestration for installing onto a target root
//!
//! Mounts a full install tree from the partition list in run state: option
//! resolution per device class, Btrfs root subvolume creation and mounting,
//! ZFS pool import, then extra and bind mounts. Every mount made by the run
//! is tracked; any failure unmounts all of it newest-first and leaves run
//! state untouched.

pub mod btrfs;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod options;
pub mod orchestrator;
pub mod partition;
pub mod run;
pub mod subvolumes;
pub mod swap;
pub mod zfs;

// Re-export commonly used types
pub use config::JobConfig;
pub use context::{GlobalStorage, Publication, RunContext};
pub use error::{ErrorKind, MountError, Result};
pub use ledger::ActiveMounts;
pub use options::{DeviceClass, resolve_mount_options};
pub use orchestrator::{MountReport, MountRequest, Orchestrator, mount_order, validate_mount_point};
pub use run::{RunOptions, run};
pub use subvolumes::{SubvolumePlan, plan_subvolumes};
pub use zfs::ZfsMetadata;

// Re-export shared models
pub use installer_types::{
    CanMount, DEFAULT_OPTIONS, DEFAULT_SWAP_SUBVOLUME, FirmwareType, MountOptionRule,
    MountOptionsEntry, PartitionChoices, PartitionDescriptor, SubvolumeSpec, ZfsDatasetInfo,
    ZfsEncryptionInfo, ZfsPoolInfo, fs_kind,
};
