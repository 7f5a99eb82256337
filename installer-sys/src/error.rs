// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for host-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed: {command} (status {status}); stderr: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, SysError>;
