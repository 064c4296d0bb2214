//! Index freshness against the latest WordPress release

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::ReleaseError;
use crate::index::builder::VERSION_FILE;
use crate::release::ReleaseSource;
use crate::release::archive::extract_archive;
use crate::version::Version;

/// Working tree a release is extracted to, inside the data directory
pub const TREE_DIR: &str = "wordpress";

const STAGING_DIR: &str = "wordpress-temp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    UpToDate { local: Version },
    Outdated {
        local: Option<Version>,
        latest: Version,
    },
}

pub struct ReleaseSync<'a> {
    source: &'a dyn ReleaseSource,
    data_dir: PathBuf,
    keep_zip: bool,
    keep_data: bool,
}

impl<'a> ReleaseSync<'a> {
    pub fn new(source: &'a dyn ReleaseSource, data_dir: &Path) -> Self {
        Self {
            source,
            data_dir: data_dir.to_path_buf(),
            keep_zip: false,
            keep_data: false,
        }
    }

    /// Keep downloaded archives and reuse them on the next fetch
    pub fn keep_zip(mut self, keep: bool) -> Self {
        self.keep_zip = keep;
        self
    }

    /// Keep the extracted tree after the index was built
    pub fn keep_data(mut self, keep: bool) -> Self {
        self.keep_data = keep;
        self
    }

    pub fn tree_dir(&self) -> PathBuf {
        self.data_dir.join(TREE_DIR)
    }

    pub fn archive_path(&self, version: &Version) -> PathBuf {
        self.data_dir.join(format!("wordpress-{}.zip", version))
    }

    /// Compare the index's release with the latest one offered
    pub fn check(&self, local: Option<&Version>) -> Result<SyncDecision, ReleaseError> {
        match local {
            Some(version) => info!("Local WordPress version: {}", version),
            None => info!("No WordPress version data found"),
        }

        let latest = self.source.latest_version()?;

        Ok(match local {
            Some(local) if *local >= latest => {
                info!("WordPress data is up-to-date");
                SyncDecision::UpToDate {
                    local: local.clone(),
                }
            }
            _ => SyncDecision::Outdated {
                local: local.cloned(),
                latest,
            },
        })
    }

    /// Download (or reuse) and extract `version`, replacing any previous
    /// working tree. Returns the tree root.
    pub fn fetch(&self, version: &Version) -> Result<PathBuf, ReleaseError> {
        let archive = self.archive_path(version);
        if self.keep_zip && archive.is_file() {
            info!("Reusing local archive {:?}", archive);
        } else {
            self.source.download(version, &archive)?;
        }

        let staging = self.data_dir.join(STAGING_DIR);
        remove_tree(&staging)?;
        extract_archive(&archive, &staging)?;

        let tree = self.tree_dir();
        remove_tree(&tree)?;
        fs::rename(&staging, &tree).map_err(|source| ReleaseError::Io {
            path: tree.clone(),
            source,
        })?;

        if !self.keep_zip
            && let Err(e) = fs::remove_file(&archive)
        {
            warn!("Failed to remove archive {:?}: {}", archive, e);
        }

        info!("WordPress {} stored at {:?}", version, tree);
        Ok(tree)
    }

    /// A previously extracted tree left behind with `keep_data`
    pub fn retained_tree(&self) -> Option<PathBuf> {
        let tree = self.tree_dir();
        tree.join(VERSION_FILE).is_file().then_some(tree)
    }

    /// Delete the working tree unless it is to be kept
    pub fn discard(&self, tree: &Path) {
        if self.keep_data {
            info!("Keeping WordPress source at {:?}", tree);
            return;
        }
        if let Err(e) = remove_tree(tree) {
            warn!("Failed to remove {:?}: {}", tree, e);
        }
    }
}

fn remove_tree(path: &Path) -> Result<(), ReleaseError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ReleaseError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::MockReleaseSource;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn version(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn write_release_archive(dest: &Path, wp_version: &str) {
        let mut zip = zip::ZipWriter::new(File::create(dest).unwrap());
        zip.start_file("wordpress/wp-includes/version.php", SimpleFileOptions::default())
            .unwrap();
        write!(zip, "<?php\n$wp_version = '{}';\n", wp_version).unwrap();
        zip.finish().unwrap();
    }

    #[rstest]
    #[case(Some("6.7.1"), "6.7.1", true)]
    #[case(Some("6.8"), "6.7.1", true)]
    #[case(Some("6.7.1"), "6.8-RC1", false)]
    #[case(Some("6.8-beta2"), "6.8-RC1", false)]
    #[case(None, "6.7.1", false)]
    fn check_compares_local_with_latest(
        #[case] local: Option<&str>,
        #[case] latest: &str,
        #[case] up_to_date: bool,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let latest = version(latest);
        let mut source = MockReleaseSource::new();
        let offered = latest.clone();
        source
            .expect_latest_version()
            .times(1)
            .returning(move || Ok(offered.clone()));

        let sync = ReleaseSync::new(&source, temp_dir.path());
        let local = local.map(version);
        let decision = sync.check(local.as_ref()).unwrap();

        if up_to_date {
            assert!(matches!(decision, SyncDecision::UpToDate { .. }));
        } else {
            assert_eq!(decision, SyncDecision::Outdated { local, latest });
        }
    }

    #[test]
    fn check_propagates_network_failures() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = MockReleaseSource::new();
        source
            .expect_latest_version()
            .returning(|| Err(ReleaseError::InvalidResponse("offline".to_string())));

        let result = ReleaseSync::new(&source, temp_dir.path()).check(None);

        assert!(result.is_err());
    }

    #[test]
    fn fetch_extracts_tree_and_removes_archive() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = MockReleaseSource::new();
        source
            .expect_download()
            .times(1)
            .returning(|v, dest| {
                write_release_archive(dest, &v.to_string());
                Ok(())
            });

        let sync = ReleaseSync::new(&source, temp_dir.path());
        let tree = sync.fetch(&version("6.7.1")).unwrap();

        assert_eq!(tree, temp_dir.path().join(TREE_DIR));
        assert!(tree.join(VERSION_FILE).is_file());
        assert!(!sync.archive_path(&version("6.7.1")).exists());
        assert!(!temp_dir.path().join(STAGING_DIR).exists());

        sync.discard(&tree);
        assert!(!tree.exists());
    }

    #[test]
    fn fetch_reuses_kept_archive() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = MockReleaseSource::new();
        source.expect_download().times(0);

        let sync = ReleaseSync::new(&source, temp_dir.path())
            .keep_zip(true)
            .keep_data(true);
        write_release_archive(&sync.archive_path(&version("6.7.1")), "6.7.1");

        let tree = sync.fetch(&version("6.7.1")).unwrap();
        sync.discard(&tree);

        assert!(sync.archive_path(&version("6.7.1")).is_file());
        assert_eq!(sync.retained_tree(), Some(tree));
    }

    #[test]
    fn fetch_aborts_on_download_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = MockReleaseSource::new();
        source
            .expect_download()
            .returning(|_, _| Err(ReleaseError::InvalidResponse("404".to_string())));

        let sync = ReleaseSync::new(&source, temp_dir.path());

        assert!(sync.fetch(&version("6.7.1")).is_err());
        assert_eq!(sync.retained_tree(), None);
    }
}
