//! Error kinds for extraction and installation.
//!
//! Anything that goes wrong before certificate files are written is an
//! [`ExtractError`] and ends the run. Installer problems are
//! [`InstallError`]s and only end that installer.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures starting or waiting on an external program.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{program} was not found")]
    NotFound { program: String },

    #[error("permission denied running {program}")]
    PermissionDenied { program: String },

    #[error("{program} did not finish within {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Problems in the converter's PEM text or in a certificate description.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("certificate starting on line {line} has no END CERTIFICATE marker")]
    UnterminatedBlock { line: usize },

    #[error("BEGIN CERTIFICATE on line {line} appears inside another certificate")]
    NestedBegin { line: usize },

    #[error("certificate description has no Subject line")]
    MissingSubject,

    #[error("certificate subject '{subject}' has no common name")]
    MissingCommonName { subject: String },

    #[error("certificate subject '{subject}' has an empty common name")]
    EmptyCommonName { subject: String },
}

/// Fatal extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("cannot read {}: {source}", path.display())]
    InputNotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} isn't a DER or PEM formatted PKCS7", path.display())]
    InputFormat { path: PathBuf },

    #[error("openssl failed to convert {}: {message}", path.display())]
    Conversion { path: PathBuf, message: String },

    #[error("openssl could not describe a certificate: {message}")]
    Describe { message: String },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("cannot prepare destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Installer errors. Reported to the user, never fatal to the run.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("{program} is not installed (not found at {})", path.display())]
    NotFound { program: String, path: PathBuf },

    #[error("permission denied running {program} ({})", path.display())]
    PermissionDenied { program: String, path: PathBuf },

    #[error("permission denied writing to {}: must run as root", path.display())]
    NotRoot { path: PathBuf },

    #[error("trust anchors directory {} does not exist; unsupported OS: {pretty_name}", anchors.display())]
    UnsupportedPlatform { anchors: PathBuf, pretty_name: String },

    #[error("{program} did not finish within {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    /// Map a runner failure for an installer program onto an installer error.
    pub(crate) fn from_command(err: CommandError, path: PathBuf) -> Self {
        match err {
            CommandError::NotFound { program } => InstallError::NotFound { program, path },
            CommandError::PermissionDenied { program } => {
                InstallError::PermissionDenied { program, path }
            }
            CommandError::Timeout { program, timeout } => {
                InstallError::Timeout { program, timeout }
            }
            CommandError::Io { source, .. } => InstallError::Io { path, source },
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
