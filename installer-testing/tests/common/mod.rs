#![allow(dead_code)]

use std::path::{Path, PathBuf};

use installer_mount::{GlobalStorage, JobConfig, MountReport, Result, RunOptions};
use installer_testing::FakeHost;
use serde_json::Value;
use tempfile::TempDir;

/// Throw-away install root and scratch parent plus a fake host
pub struct Sandbox {
    pub root: TempDir,
    /// `root` as the run resolves it
    root_path: PathBuf,
    pub scratch: TempDir,
    pub host: FakeHost,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create install root");
        let root_path = std::fs::canonicalize(root.path()).expect("resolve install root");
        Self {
            root,
            root_path,
            scratch: tempfile::tempdir().expect("create scratch parent"),
            host: FakeHost::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    pub fn target(&self, mount_point: &str) -> PathBuf {
        let relative = mount_point.trim_start_matches('/');
        if relative.is_empty() {
            self.root_path.clone()
        } else {
            self.root_path.join(relative)
        }
    }

    pub fn run(&self, storage: &mut GlobalStorage, config: &JobConfig) -> Result<MountReport> {
        let options = RunOptions {
            root_mount_point: Some(self.root.path().to_path_buf()),
            scratch_parent: Some(self.scratch.path().to_path_buf()),
        };
        installer_mount::run(storage, config, &self.host, &options)
    }

    /// Targets of successful mounts, in call order
    pub fn mounted_targets(&self) -> Vec<PathBuf> {
        self.host
            .successful_mounts()
            .into_iter()
            .map(|call| call.target)
            .collect()
    }
}

pub fn storage(state: Value) -> GlobalStorage {
    GlobalStorage::from_json_str(&state.to_string()).expect("valid run state")
}

pub fn published_options(storage: &GlobalStorage) -> Vec<(String, String)> {
    storage
        .raw("mountOptionsList")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .map(|entry| {
                    (
                        entry["mountpoint"].as_str().unwrap_or_default().to_string(),
                        entry["option_string"].as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}
