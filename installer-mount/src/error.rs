// SPDX-License-Identifier: GPL-3.0-only

use installer_sys::SysError;
use thiserror::Error;

/// Failure classes of a mount run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigError,
    UnsupportedFilesystem,
    MountExecutorFailure,
    ProtocolPrecondition,
    CommandFailure,
    Io,
}

/// Error types for mount orchestration
#[derive(Error, Debug)]
pub enum MountError {
    #[error("{0}")]
    Config(String),

    #[error("Unsupported partition with {fs} on {mount_point}")]
    UnsupportedFilesystem { fs: String, mount_point: String },

    #[error("Cannot mount {device} on {target}")]
    MountFailed { device: String, target: String },

    #[error("Internal error: {0}")]
    Precondition(String),

    #[error("{context}: {source}")]
    Command {
        context: String,
        #[source]
        source: SysError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl MountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MountError::Config(_) => ErrorKind::ConfigError,
            MountError::UnsupportedFilesystem { .. } => ErrorKind::UnsupportedFilesystem,
            MountError::MountFailed { .. } => ErrorKind::MountExecutorFailure,
            MountError::Precondition(_) => ErrorKind::ProtocolPrecondition,
            MountError::Command { .. } => ErrorKind::CommandFailure,
            MountError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Short user-facing title; the `Display` output is the detail
    pub fn title(&self) -> &'static str {
        match self.kind() {
            ErrorKind::ConfigError => "Configuration Error",
            _ => "Mount Failure",
        }
    }

    pub(crate) fn command(context: impl Into<String>, source: SysError) -> Self {
        MountError::Command {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        MountError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for mount orchestration
pub type Result<T> = std::result::Result<T, MountError>;
