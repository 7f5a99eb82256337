// SPDX-License-Identifier: GPL-3.0-only

//! Data models for mounting an install target
//!
//! These types describe what the partitioning step hands over (partitions,
//! ZFS pools) and what the mount job publishes for later steps (the
//! per-mount-point option ledger, the Btrfs layout). All of them use the
//! camelCase key names of the installer's shared run state so they can be
//! read from and written back to it unchanged.

pub mod btrfs;
pub mod firmware;
pub mod mount_options;
pub mod partition;
pub mod zfs;

pub use btrfs::{DEFAULT_SWAP_SUBVOLUME, SubvolumeSpec, default_subvolume_layout};
pub use firmware::FirmwareType;
pub use mount_options::{DEFAULT_OPTIONS, MountOptionRule, MountOptionsEntry};
pub use partition::{PartitionChoices, PartitionDescriptor, fs_kind};
pub use zfs::{CanMount, ZfsDatasetInfo, ZfsEncryptionInfo, ZfsPoolInfo};
