// SPDX-License-Identifier: GPL-3.0-only

//! The running system as a mount job collaborator

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};
use which::which;

use crate::command::{CommandRunner, render};
use crate::mounts::{MountExecutor, parse_mount_points};
use crate::probe::{DeviceProbe, SysfsProbe};
use crate::{Result, SysError};

/// Everything the mount job needs from its host
pub trait Host: MountExecutor + CommandRunner + DeviceProbe {}

impl<T: MountExecutor + CommandRunner + DeviceProbe> Host for T {}

/// Host implementation backed by `mount(8)`, `std::process` and sysfs
#[derive(Debug, Clone, Default)]
pub struct HostSystem {
    probe: SysfsProbe,
}

impl HostSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe(probe: SysfsProbe) -> Self {
        Self { probe }
    }
}

impl MountExecutor for HostSystem {
    fn mount(&self, device: &str, target: &Path, fs_kind: &str, options: &str) -> i32 {
        let mut command = Command::new("mount");
        if !fs_kind.is_empty() {
            command.arg("-t").arg(fs_kind);
        }
        if !options.is_empty() {
            command.arg("-o").arg(options);
        }
        command.arg(device).arg(target);
        debug!("Running {:?}", command);

        match command.status() {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                warn!("Failed to execute mount for {}: {}", device, e);
                -1
            }
        }
    }

    fn is_mounted(&self, target: &Path) -> bool {
        let mount_info = match fs::read_to_string("/proc/self/mountinfo") {
            Ok(content) => content,
            Err(e) => {
                warn!("Cannot read mountinfo: {}", e);
                return false;
            }
        };

        // mountinfo lists canonical absolute paths
        let target = fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());
        match parse_mount_points(&mount_info) {
            Ok(mount_points) => mount_points.contains(&target),
            Err(e) => {
                warn!("Cannot parse mountinfo: {}", e);
                false
            }
        }
    }
}

impl CommandRunner for HostSystem {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<String> {
        let rendered = render(program, args);
        let binary = which(program).map_err(|_| SysError::CommandNotFound(program.to_string()))?;
        debug!("Running {}", rendered);

        let mut child = Command::new(binary)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(SysError::CommandFailed {
                command: rendered,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl DeviceProbe for HostSystem {
    fn is_rotational(&self, disk_name: &str) -> Result<bool> {
        self.probe.is_rotational(disk_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_canonical_paths_match_their_mount() {
        let host = HostSystem::new();
        let direct = host.is_mounted(Path::new("/proc"));

        assert_eq!(host.is_mounted(Path::new("/proc/sys/..")), direct);
        assert_eq!(host.is_mounted(Path::new("/proc/self/..")), direct);
    }
}
