// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::{Result, SysError};

/// Performs whole-device mounts.
pub trait MountExecutor {
    /// Mount `device` on `target`. Returns the mount status: 0 on success,
    /// anything else on failure.
    fn mount(&self, device: &str, target: &Path, fs_kind: &str, options: &str) -> i32;

    /// Whether something is currently mounted exactly at `target`
    fn is_mounted(&self, target: &Path) -> bool;
}

/// Collect the mount points listed in a `/proc/self/mountinfo` dump.
pub fn parse_mount_points(input: &str) -> Result<BTreeSet<PathBuf>> {
    let mut mount_points = BTreeSet::new();

    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let mount_point = line
            .split_whitespace()
            .nth(4)
            .ok_or_else(|| SysError::OperationFailed(format!("invalid mountinfo line: {line}")))?;

        mount_points.insert(unescape_mount_field(mount_point));
    }

    Ok(mount_points)
}

/// Undo the octal escaping (`\040` for space) the kernel applies to
/// paths. Works on bytes so non-UTF-8 and multi-byte names survive.
fn unescape_mount_field(value: &str) -> PathBuf {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let octal = bytes[index + 1..index + 4]
                .iter()
                .fold(0u16, |acc, b| acc * 8 + u16::from(b - b'0'));
            if let Ok(byte) = u8::try_from(octal) {
                output.push(byte);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index]);
        index += 1;
    }

    PathBuf::from(OsStr::from_bytes(&output))
}
