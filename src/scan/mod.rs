//! Usage scanning of plugin source trees
//!
//! [`UsageScanner`] walks a target tree, collects references with
//! [`extractor::ReferenceCollector`], matches them against a frozen
//! [`SinceIndex`] and folds every matched `since` into a [`UsageReport`].

pub mod extractor;
pub mod report;

pub use extractor::{Reference, UsageRef};
pub use report::{Location, UsageHit, UsageReport};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::cache::ContentCache;
use crate::error::ScanError;
use crate::files::{IgnoreSet, php_files};
use crate::index::{SinceIndex, Symbol, VersionAnnotation};
use crate::parser::{ParentMap, ParseError, SourceParser, walk};
use crate::progress::Progress;
use crate::version::Version;

use extractor::ReferenceCollector;

/// Report bucket for methods called on a receiver of unknown class
pub const OBJECT_RECEIVER: &str = "$object";

/// Directory names skipped while scanning a plugin
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[".git", ".svn", "svn", "node_modules", "dist", "bin"];

/// Baseline the resolved minimum version starts from
pub const DEFAULT_FLOOR_VERSION: &str = "1.0";

pub struct UsageScanner<'a> {
    index: &'a SinceIndex,
    parser: &'a dyn SourceParser,
    ignore: IgnoreSet,
    floor: Version,
    match_unknown_receivers: bool,
    show_progress: bool,
    method_owners: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> UsageScanner<'a> {
    pub fn new(index: &'a SinceIndex, parser: &'a dyn SourceParser, floor: Version) -> Self {
        Self {
            index,
            parser,
            ignore: IgnoreSet::new(DEFAULT_IGNORE_DIRS.iter().copied()),
            floor,
            match_unknown_receivers: true,
            show_progress: false,
            method_owners: index.method_owners(),
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreSet) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn match_unknown_receivers(mut self, enabled: bool) -> Self {
        self.match_unknown_receivers = enabled;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Scan every PHP file under `root`. Locations in the report are relative
    /// to `root`.
    pub fn scan(
        &self,
        root: &Path,
        cache: &mut ContentCache<Vec<UsageRef>>,
    ) -> Result<UsageReport, ScanError> {
        info!("Scanning {:?} for WordPress API usage", root);

        let files = php_files(root, &self.ignore).map_err(|e| ScanError::Io {
            path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            source: e.into(),
        })?;

        let progress = if self.show_progress {
            Progress::new(files.len())
        } else {
            Progress::hidden(files.len())
        };

        let mut report = UsageReport::new(self.floor.clone());

        for (n, file) in files.iter().enumerate() {
            let content = fs::read(file).map_err(|source| ScanError::Io {
                path: file.clone(),
                source,
            })?;

            let refs = match cache.get_or_extract(file, &content, || {
                self.extract(&String::from_utf8_lossy(&content))
            }) {
                Ok(refs) => refs,
                Err(e) => {
                    warn!("Skipping {:?}: {}", file, e);
                    continue;
                }
            };

            let relative = relative_display(root, file);
            self.fold(&mut report, &relative, &refs);
            progress.update(n + 1, &report.min_version().to_string());
        }
        progress.finish();

        info!(
            "Matched {} symbols in {} files; minimum version {}",
            report.len(),
            files.len(),
            report.min_version()
        );

        Ok(report)
    }

    /// References of one file, in source order
    pub fn extract(&self, source: &str) -> Result<Vec<UsageRef>, ParseError> {
        let tree = self.parser.parse(source)?;
        let parents = ParentMap::build(&tree);
        let mut collector = ReferenceCollector::new(source, &parents);
        walk(&tree, &mut collector);
        Ok(collector.into_refs())
    }

    /// Match one file's references and record the hits
    pub fn fold(&self, report: &mut UsageReport, file: &str, refs: &[UsageRef]) {
        for usage in refs {
            for (symbol, annotation) in self.resolve(&usage.reference) {
                debug!("{}:{} uses {:?}", file, usage.line, symbol);
                report.record(symbol, annotation, Location::new(file, usage.line));
            }
        }
    }

    /// Indexed symbols a reference matches, keyed as they appear in the report
    pub fn resolve(&self, reference: &Reference) -> Vec<(Symbol, VersionAnnotation)> {
        let lookup = |symbol: Symbol| {
            self.index
                .annotation(&symbol)
                .map(|annotation| (symbol, annotation))
        };

        match reference {
            Reference::Function { name } => lookup(Symbol::Function(name.clone())).into_iter().collect(),
            Reference::Class { name } => lookup(Symbol::Class(name.clone())).into_iter().collect(),
            Reference::Constant { name } => lookup(Symbol::Constant(name.clone())).into_iter().collect(),
            Reference::Hook { kind, name } => lookup(Symbol::Hook {
                kind: *kind,
                name: name.clone(),
            })
            .into_iter()
            .collect(),
            Reference::Method {
                class: Some(class),
                method,
            } => [
                Symbol::Class(class.clone()),
                Symbol::Method {
                    class: class.clone(),
                    method: method.clone(),
                },
            ]
            .into_iter()
            .filter_map(lookup)
            .collect(),
            Reference::Method {
                class: None,
                method,
            } => self.resolve_unknown_receiver(method).into_iter().collect(),
        }
    }

    fn resolve_unknown_receiver(&self, method: &str) -> Option<(Symbol, VersionAnnotation)> {
        if !self.match_unknown_receivers {
            return None;
        }

        let [owner] = self.method_owners.get(method)?.as_slice() else {
            return None;
        };
        let annotation = self.index.annotation(&Symbol::Method {
            class: owner.to_string(),
            method: method.to_string(),
        })?;

        Some((
            Symbol::Method {
                class: OBJECT_RECEIVER.to_string(),
                method: method.to_string(),
            },
            annotation,
        ))
    }
}

/// Path of `file` relative to `root` with `/` separators
fn relative_display(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
