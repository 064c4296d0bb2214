//! WordPress release discovery and retrieval
//! - api.rs: wordpress.org version-check and download client
//! - archive.rs: release archive extraction
//! - sync.rs: freshness decision and working-tree lifecycle

pub mod api;
pub mod archive;
pub mod sync;

#[cfg(test)]
use mockall::automock;

use std::path::Path;

use crate::error::ReleaseError;
use crate::version::Version;

pub use api::WordPressOrg;
pub use archive::extract_archive;
pub use sync::{ReleaseSync, SyncDecision};

/// Source of WordPress releases
#[cfg_attr(test, automock)]
pub trait ReleaseSource {
    /// Latest release offered on the configured channel
    fn latest_version(&self) -> Result<Version, ReleaseError>;

    /// Download the release archive of `version` to `dest`
    fn download(&self, version: &Version, dest: &Path) -> Result<(), ReleaseError>;
}
