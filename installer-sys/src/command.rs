// SPDX-License-Identifier: GPL-3.0-only

use crate::Result;

/// Runs external management commands (`zpool`, `zfs`, `btrfs`, `umount`,
/// `swapon`, `chcon`) to completion.
///
/// A non-zero exit must surface as [`crate::SysError::CommandFailed`].
pub trait CommandRunner {
    /// Run `program` with `args`, feeding `stdin` when given, and return
    /// its standard output.
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<String>;
}

/// Render a command line for logs and error messages
pub fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
