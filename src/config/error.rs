use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures while locating or reading the configuration artifact.
///
/// All of these are fatal at startup. The library only reports them, terminating
/// the process is left to the entry point.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "No configuration file found for environment '{env}' (searched: {})",
        join_paths(.searched)
    )]
    FileNotFound { env: String, searched: Vec<PathBuf> },

    #[error("Failed to read configuration file {}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

impl ConfigError {
    pub(crate) fn parse(path: &Path, message: impl ToString) -> Self {
        ConfigError::Parse {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
