//! One checker run: index freshness, usage scans and file updates
//!
//! [`Checker`] owns the settings and collaborators of a run and is created
//! once per invocation. All user input is validated before anything is
//! downloaded, built or written.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cache::ContentCache;
use crate::config::{Settings, cache_path, index_path};
use crate::error::{CheckError, IndexError};
use crate::files::IgnoreSet;
use crate::index::SinceIndex;
use crate::index::builder::SinceIndexBuilder;
use crate::index::probe::CapabilityProbe;
use crate::parser::SourceParser;
use crate::release::{ReleaseSource, ReleaseSync, SyncDecision};
use crate::rewrite::{FileRewriter, Requirements};
use crate::scan::{UsageReport, UsageScanner};
use crate::version::Version;

/// What a run should do, usually taken from the command line
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Keep an existing index even when a newer release is available
    pub skip_update: bool,
    /// Do not query the version API when an index exists
    pub skip_update_check: bool,
    /// Write the usage report into each scanned directory
    pub save_usage_data: bool,
    /// Write the resolved versions into the plugin's metadata files
    pub update_files: bool,
    /// Only write the given versions; no index, no scan
    pub update_files_only: bool,
    pub wordpress: Option<String>,
    pub php: Option<String>,
    pub show_progress: bool,
}

/// Result for one source directory
#[derive(Debug)]
pub struct CheckOutcome {
    pub dir: PathBuf,
    /// Absent for `update_files_only` runs
    pub report: Option<UsageReport>,
    pub report_path: Option<PathBuf>,
    pub updated_files: Vec<PathBuf>,
}

impl CheckOutcome {
    pub fn min_version(&self) -> Option<&Version> {
        self.report.as_ref().map(UsageReport::min_version)
    }
}

pub struct Checker<'a> {
    settings: Settings,
    data_dir: PathBuf,
    parser: &'a dyn SourceParser,
    probe: &'a dyn CapabilityProbe,
    source: &'a dyn ReleaseSource,
    rewriter: FileRewriter,
}

impl<'a> Checker<'a> {
    /// `base_name` names the plugin's main file for [`FileRewriter`]
    pub fn new(
        settings: Settings,
        data_dir: &Path,
        parser: &'a dyn SourceParser,
        probe: &'a dyn CapabilityProbe,
        source: &'a dyn ReleaseSource,
        base_name: &str,
    ) -> Self {
        Self {
            settings,
            data_dir: data_dir.to_path_buf(),
            parser,
            probe,
            source,
            rewriter: FileRewriter::new(base_name),
        }
    }

    pub fn run(&self, dirs: &[PathBuf], options: &CheckOptions) -> Result<Vec<CheckOutcome>, CheckError> {
        let dirs = resolve_dirs(dirs)?;
        let overrides = Requirements {
            wordpress: parse_override(options.wordpress.as_deref())?,
            php: parse_override(options.php.as_deref())?,
        };

        if options.update_files_only {
            if overrides.is_empty() {
                return Err(CheckError::MissingVersionOverride);
            }
            let mut outcomes = Vec::with_capacity(dirs.len());
            for dir in dirs {
                let updated_files = self.rewriter.apply(&dir, &overrides)?;
                outcomes.push(CheckOutcome {
                    dir,
                    report: None,
                    report_path: None,
                    updated_files,
                });
            }
            return Ok(outcomes);
        }

        let floor: Version = self.settings.floor_version.parse()?;
        let index = self.ensure_index(options)?;

        let scanner = UsageScanner::new(&index, self.parser, floor)
            .with_ignore(IgnoreSet::new(self.settings.ignore_dirs.iter().cloned()))
            .match_unknown_receivers(self.settings.match_unknown_receivers)
            .with_progress(options.show_progress);

        let mut outcomes = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let mut cache = ContentCache::in_memory().bypass(self.settings.debug.no_cache);
            let report = scanner.scan(&dir, &mut cache)?;
            info!("Minimum WordPress version for {:?}: {}", dir, report.min_version());

            let report_path = if options.save_usage_data {
                Some(report.save(&dir)?)
            } else {
                None
            };

            let updated_files = if options.update_files {
                let requirements = Requirements {
                    wordpress: overrides
                        .wordpress
                        .clone()
                        .or_else(|| Some(report.min_version().clone())),
                    php: overrides.php.clone(),
                };
                self.rewriter.apply(&dir, &requirements)?
            } else {
                Vec::new()
            };

            outcomes.push(CheckOutcome {
                dir,
                report: Some(report),
                report_path,
                updated_files,
            });
        }

        Ok(outcomes)
    }

    /// Load the persisted index, refreshing it from the latest release when
    /// it is missing or outdated
    pub fn ensure_index(&self, options: &CheckOptions) -> Result<SinceIndex, CheckError> {
        let existing = self.load_index();

        if options.skip_update_check
            && let Some(index) = existing
        {
            info!("Skipping update check");
            return Ok(index);
        }

        let sync = ReleaseSync::new(self.source, &self.data_dir)
            .keep_zip(self.settings.debug.keep_zip)
            .keep_data(self.settings.debug.keep_data);

        let local = existing.as_ref().and_then(SinceIndex::framework_version);
        let decision = match sync.check(local) {
            Ok(decision) => decision,
            Err(e) => {
                if let Some(index) = existing {
                    warn!("Update check failed, using existing index: {}", e);
                    return Ok(index);
                }
                if let Some(tree) = sync.retained_tree() {
                    warn!("Update check failed, indexing retained tree {:?}: {}", tree, e);
                    return self.rebuild(&sync, &tree, options);
                }
                return Err(CheckError::IndexUnavailable(e.to_string()));
            }
        };

        let (latest, existing) = match (decision, existing) {
            (SyncDecision::UpToDate { .. }, Some(index)) => return Ok(index),
            (SyncDecision::Outdated { latest, .. }, Some(index)) if options.skip_update => {
                info!("WordPress {} is available; keeping existing index", latest);
                return Ok(index);
            }
            (SyncDecision::UpToDate { local }, None) => (local, None),
            (SyncDecision::Outdated { latest, .. }, existing) => (latest, existing),
        };

        match sync.fetch(&latest) {
            Ok(tree) => self.rebuild(&sync, &tree, options),
            Err(e) => match existing {
                Some(index) => {
                    warn!("Failed to fetch WordPress {}, using existing index: {}", latest, e);
                    Ok(index)
                }
                None => Err(e.into()),
            },
        }
    }

    fn load_index(&self) -> Option<SinceIndex> {
        match SinceIndex::load(&index_path(&self.data_dir)) {
            Ok(index) => index,
            Err(e) => {
                warn!("Ignoring unusable index: {}", e);
                None
            }
        }
    }

    fn rebuild(
        &self,
        sync: &ReleaseSync<'_>,
        tree: &Path,
        options: &CheckOptions,
    ) -> Result<SinceIndex, CheckError> {
        let mut cache = ContentCache::load(&cache_path(&self.data_dir))
            .map_err(IndexError::from)?
            .bypass(self.settings.debug.no_cache);

        let index = SinceIndexBuilder::new(self.parser, self.probe)
            .with_progress(options.show_progress)
            .build(tree, &mut cache)?;

        index.save(&index_path(&self.data_dir))?;
        cache.save().map_err(IndexError::from)?;
        sync.discard(tree);

        Ok(index)
    }
}

/// Canonical directory paths; an empty list means the current directory
fn resolve_dirs(dirs: &[PathBuf]) -> Result<Vec<PathBuf>, CheckError> {
    let current = [PathBuf::from(".")];
    let dirs = if dirs.is_empty() { &current[..] } else { dirs };

    dirs.iter()
        .map(|dir| match dir.canonicalize() {
            Ok(path) if path.is_dir() => Ok(path),
            _ => Err(CheckError::InvalidSourceDir(dir.clone())),
        })
        .collect()
}

fn parse_override(value: Option<&str>) -> Result<Option<Version>, CheckError> {
    value.map(str::parse::<Version>).transpose().map_err(CheckError::from)
}
