// SPDX-License-Identifier: GPL-3.0-only

//! Low-level host operations for the installer mount job
//!
//! The mount job never touches the host directly. It goes through the
//! three collaborator traits defined here:
//! - [`MountExecutor`] mounts a device and reports a status code
//! - [`CommandRunner`] runs pool, subvolume and unmount commands
//! - [`DeviceProbe`] answers whether a disk is rotational
//!
//! [`HostSystem`] implements all of them against the running system.

pub mod command;
pub mod error;
pub mod host;
pub mod mounts;
pub mod probe;

pub use command::{CommandRunner, render};
pub use error::{Result, SysError};
pub use host::{Host, HostSystem};
pub use mounts::{MountExecutor, parse_mount_points};
pub use probe::{DeviceProbe, SysfsProbe, disk_name_for_device, is_nvme_device};
