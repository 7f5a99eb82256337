// SPDX-License-Identifier: GPL-3.0-only

//! In-memory host for exercising the mount job without root
//!
//! [`FakeHost`] records every mount and command in order, tracks what is
//! currently mounted and lets tests inject failures. [`fixtures`] builds
//! the partition lists and rule tables the scenarios share.

pub mod fake;
pub mod fixtures;

pub use fake::{FakeHost, HostEvent, MountCall};
