//! Error types for every layer of the checker

use std::path::PathBuf;

use thiserror::Error;

use crate::version::VersionParseError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error while indexing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid index document {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Index encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No WordPress version declaration found in {0:?}")]
    FrameworkVersionNotFound(PathBuf),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IO error while scanning {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write usage report: {0}")]
    Report(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to extract archive {path:?}: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Failed to rewrite {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level failures of a checker run
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Invalid source directory '{}'", .0.display())]
    InvalidSourceDir(PathBuf),

    #[error("--update-files-only requires --wp or --php")]
    MissingVersionOverride,

    #[error(transparent)]
    InvalidVersion(#[from] VersionParseError),

    #[error("No version index available: {0}")]
    IndexUnavailable(String),

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CheckError {
    /// User input errors are reported before any side effect happens
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            CheckError::InvalidSourceDir(_)
                | CheckError::MissingVersionOverride
                | CheckError::InvalidVersion(_)
        )
    }
}
