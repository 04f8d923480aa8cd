//! Error types for Django deployments.
//!
//! Every variant carries the exact URL, filename or command involved so the
//! message can be shown to the operator verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or converging a deployment.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The database connection string is not a valid URI
    #[error("invalid database URL {url:?}: {reason}")]
    InvalidUrl {
        /// The URL as it was given
        url: String,
        /// Parser diagnostic
        reason: String,
    },

    /// No file with the required name exists under the search root
    #[error("could not find {filename} under {}", .root.display())]
    FileNotFound {
        /// The filename that was searched for
        filename: String,
        /// Directory the search started from
        root: PathBuf,
    },

    /// A management command exited unsuccessfully
    #[error("management command failed: {0}")]
    SubprocessFailure(#[from] declarative::CommandError),

    /// A management command could not be started at all
    #[error("could not run `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    /// A value could not be published into shared deployment state
    #[error(transparent)]
    State(#[from] declarative::StateError),

    /// The local settings template references an unknown variable
    #[error("local settings template {}: unknown variable {name:?}", .template.display())]
    Template {
        template: PathBuf,
        name: String,
    },

    /// A value could not be rendered as a Python literal
    #[error("could not render local settings: {0}")]
    Render(#[from] serde_json::Error),

    /// A path could not be turned into a dotted module name
    #[error("{} is not a Python module under {}", .path.display(), .root.display())]
    NotAModule { path: PathBuf, root: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = DeployError> = std::result::Result<T, E>;
