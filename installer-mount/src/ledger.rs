// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use installer_sys::Host;
use tracing::{debug, info, warn};

/// Paths mounted by the current run, oldest first.
///
/// Protocols push a path right after its mount succeeds; only the
/// orchestrator unwinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveMounts {
    paths: Vec<PathBuf>,
}

impl ActiveMounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Forget the most recent entry for `path`
    pub fn remove(&mut self, path: &Path) -> bool {
        match self.paths.iter().rposition(|entry| entry == path) {
            Some(index) => {
                self.paths.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|entry| entry == path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Unmount everything newest-first and empty the ledger.
    ///
    /// Targets that are no longer mounted are skipped. A failing unmount
    /// is retried as a lazy unmount; if that fails too the target is
    /// logged and left behind. Returns the targets an unmount was issued for.
    pub fn unwind(&mut self, host: &dyn Host) -> Vec<PathBuf> {
        let mut unmounted = Vec::new();

        while let Some(path) = self.paths.pop() {
            if !host.is_mounted(&path) {
                debug!("{} is already unmounted", path.display());
                continue;
            }

            info!("Rolling back mount at {}", path.display());
            if let Err(e) = unmount(host, &path, false) {
                warn!("Unmount of {} failed ({}), detaching lazily", path.display(), e);
                if let Err(e) = unmount(host, &path, true) {
                    warn!("Could not detach {}: {}", path.display(), e);
                }
            }
            unmounted.push(path);
        }

        unmounted
    }
}

/// `umount -v [-l] <path>`
pub(crate) fn unmount(host: &dyn Host, path: &Path, lazy: bool) -> installer_sys::Result<()> {
    let target = path.to_string_lossy().into_owned();
    let mut args = vec!["-v"];
    if lazy {
        args.push("-l");
    }
    args.push(target.as_str());
    host.run("umount", &args, None).map(|_| ())
}
