// SPDX-License-Identifier: GPL-3.0-only

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use installer_sys::{CommandRunner, DeviceProbe, MountExecutor, Result, SysError, render};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCall {
    pub device: String,
    pub target: PathBuf,
    pub fs_kind: String,
    pub options: String,
    pub status: i32,
}

/// One interaction with the host, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Mount(MountCall),
    Command(String),
}

#[derive(Debug, Default)]
struct FakeState {
    mounted: BTreeSet<PathBuf>,
    events: Vec<HostEvent>,
    stdin: Vec<(String, String)>,
    mount_count: usize,
    fail_nth_mount: Option<usize>,
    failing_targets: BTreeSet<PathBuf>,
    failing_commands: BTreeSet<String>,
    failing_prefixes: Vec<String>,
    rotational: HashMap<String, bool>,
}

/// Host double implementing every collaborator trait.
///
/// Successful mounts mark their target as mounted; successful `umount`
/// commands clear it; `btrfs subvolume create` creates the directory so
/// later existence checks and permission changes see it.
#[derive(Debug, Default)]
pub struct FakeHost {
    state: RefCell<FakeState>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rotational(&self, disk: &str, rotational: bool) {
        self.state
            .borrow_mut()
            .rotational
            .insert(disk.to_string(), rotational);
    }

    pub fn mark_mounted(&self, path: impl Into<PathBuf>) {
        self.state.borrow_mut().mounted.insert(path.into());
    }

    /// Make the `n`-th mount call (1-based) return a non-zero status
    pub fn fail_nth_mount(&self, n: usize) {
        self.state.borrow_mut().fail_nth_mount = Some(n);
    }

    pub fn fail_mount_on(&self, target: impl Into<PathBuf>) {
        self.state.borrow_mut().failing_targets.insert(target.into());
    }

    /// Fail the command whose rendered command line equals `command`
    pub fn fail_command(&self, command: &str) {
        self.state
            .borrow_mut()
            .failing_commands
            .insert(command.to_string());
    }

    pub fn fail_commands_starting_with(&self, prefix: &str) {
        self.state
            .borrow_mut()
            .failing_prefixes
            .push(prefix.to_string());
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.state.borrow().events.clone()
    }

    pub fn mounts(&self) -> Vec<MountCall> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Mount(call) => Some(call.clone()),
                HostEvent::Command(_) => None,
            })
            .collect()
    }

    /// Mount calls that returned success
    pub fn successful_mounts(&self) -> Vec<MountCall> {
        self.mounts()
            .into_iter()
            .filter(|call| call.status == 0)
            .collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Command(command) => Some(command.clone()),
                HostEvent::Mount(_) => None,
            })
            .collect()
    }

    /// Targets of `umount` commands, in call order
    pub fn unmount_targets(&self) -> Vec<PathBuf> {
        self.commands()
            .iter()
            .filter(|command| command.starts_with("umount "))
            .filter_map(|command| command.split_whitespace().last().map(PathBuf::from))
            .collect()
    }

    /// Standard input handed to `program`, in call order
    pub fn stdin_for(&self, program: &str) -> Vec<String> {
        self.state
            .borrow()
            .stdin
            .iter()
            .filter(|(command, _)| command.starts_with(program))
            .map(|(_, input)| input.clone())
            .collect()
    }

    pub fn is_mounted_path(&self, path: impl AsRef<Path>) -> bool {
        self.state.borrow().mounted.contains(path.as_ref())
    }

    pub fn mounted(&self) -> Vec<PathBuf> {
        self.state.borrow().mounted.iter().cloned().collect()
    }

    fn command_fails(state: &FakeState, rendered: &str) -> bool {
        state.failing_commands.contains(rendered)
            || state
                .failing_prefixes
                .iter()
                .any(|prefix| rendered.starts_with(prefix.as_str()))
    }
}

impl MountExecutor for FakeHost {
    fn mount(&self, device: &str, target: &Path, fs_kind: &str, options: &str) -> i32 {
        let mut state = self.state.borrow_mut();
        state.mount_count += 1;

        let fails = state.fail_nth_mount == Some(state.mount_count)
            || state.failing_targets.contains(target);
        let status = if fails { 32 } else { 0 };
        if status == 0 {
            state.mounted.insert(target.to_path_buf());
        }

        state.events.push(HostEvent::Mount(MountCall {
            device: device.to_string(),
            target: target.to_path_buf(),
            fs_kind: fs_kind.to_string(),
            options: options.to_string(),
            status,
        }));
        status
    }

    fn is_mounted(&self, target: &Path) -> bool {
        self.state.borrow().mounted.contains(target)
    }
}

impl CommandRunner for FakeHost {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<String> {
        let rendered = render(program, args);
        let mut state = self.state.borrow_mut();
        state.events.push(HostEvent::Command(rendered.clone()));
        if let Some(input) = stdin {
            state.stdin.push((rendered.clone(), input.to_string()));
        }

        if Self::command_fails(&state, &rendered) {
            return Err(SysError::CommandFailed {
                command: rendered,
                status: 1,
                stderr: "injected failure".to_string(),
            });
        }

        match (program, args) {
            ("umount", [.., target]) => {
                state.mounted.remove(Path::new(target));
            }
            ("btrfs", ["subvolume", "create", path]) => {
                fs::create_dir_all(path)?;
            }
            _ => {}
        }

        Ok(String::new())
    }
}

impl DeviceProbe for FakeHost {
    fn is_rotational(&self, disk_name: &str) -> Result<bool> {
        self.state
            .borrow()
            .rotational
            .get(disk_name)
            .copied()
            .ok_or_else(|| SysError::OperationFailed(format!("no sysfs entry for {disk_name}")))
    }
}
