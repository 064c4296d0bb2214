//! Usage report and its persisted document

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::error::ScanError;
use crate::index::{HookKind, Symbol, VersionAnnotation};
use crate::version::{Version, join};

/// File name of the report written into the scanned tree
pub const REPORT_FILE: &str = "wpvc_usage_data.json";

/// A usage site, `file` relative to the scanned root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageHit {
    pub annotation: VersionAnnotation,
    /// Sorted by file, then line
    pub locations: Vec<Location>,
}

/// Matched symbols with their usage sites, and the join of their versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    min_version: Version,
    hits: BTreeMap<Symbol, UsageHit>,
}

impl UsageReport {
    pub fn new(floor: Version) -> Self {
        Self {
            min_version: floor,
            hits: BTreeMap::new(),
        }
    }

    /// Add a usage site and fold the symbol's `since` into the minimum
    /// version. `deprecated` is kept for the report only.
    pub fn record(&mut self, symbol: Symbol, annotation: VersionAnnotation, location: Location) {
        self.min_version = join(&self.min_version, &annotation.since);

        let hit = self.hits.entry(symbol).or_insert_with(|| UsageHit {
            annotation,
            locations: Vec::new(),
        });
        if let Err(pos) = hit.locations.binary_search(&location) {
            hit.locations.insert(pos, location);
        }
    }

    pub fn min_version(&self) -> &Version {
        &self.min_version
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&UsageHit> {
        self.hits.get(symbol)
    }

    pub fn hits(&self) -> impl Iterator<Item = (&Symbol, &UsageHit)> {
        self.hits.iter()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Report document: the index layout restricted to matched symbols, each
    /// with a `_where` list, plus `@wp_min`
    pub fn to_document(&self) -> Value {
        let mut constant = Map::new();
        let mut function = Map::new();
        let mut class: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();
        let mut do_action = Map::new();
        let mut apply_filters = Map::new();

        for (symbol, hit) in &self.hits {
            let entry = hit_entry(hit);
            match symbol {
                Symbol::Constant(name) => {
                    constant.insert(name.clone(), entry);
                }
                Symbol::Function(name) => {
                    function.insert(name.clone(), entry);
                }
                Symbol::Class(name) => {
                    let slot = class.entry(name.as_str()).or_default();
                    if let Value::Object(fields) = entry {
                        slot.extend(fields);
                    }
                }
                Symbol::Method { class: owner, method } => {
                    let slot = class.entry(owner.as_str()).or_default();
                    if let Value::Object(methods) = slot
                        .entry("method")
                        .or_insert_with(|| Value::Object(Map::new()))
                    {
                        methods.insert(method.clone(), entry);
                    }
                }
                Symbol::Hook { kind, name } => {
                    let table = match kind {
                        HookKind::DoAction => &mut do_action,
                        HookKind::ApplyFilters => &mut apply_filters,
                    };
                    table.insert(name.clone(), entry);
                }
            }
        }

        let class: Map<String, Value> = class
            .into_iter()
            .map(|(name, fields)| (name.to_string(), Value::Object(fields)))
            .collect();

        json!({
            "@wp_min": self.min_version.to_string(),
            "constant": constant,
            "function": function,
            "class": class,
            "hook": {
                "do_action": do_action,
                "apply_filters": apply_filters,
            },
        })
    }

    /// Write the report document into `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ScanError> {
        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_vec_pretty(&self.to_document())?;
        fs::write(&path, json).map_err(|source| ScanError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Saved usage report to {:?}", path);
        Ok(path)
    }
}

impl Serialize for UsageReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

fn hit_entry(hit: &UsageHit) -> Value {
    let mut entry = Map::new();
    entry.insert("since".to_string(), json!(hit.annotation.since));
    if let Some(deprecated) = &hit.annotation.deprecated {
        entry.insert("deprecated".to_string(), json!(deprecated));
    }
    entry.insert(
        "_where".to_string(),
        hit.locations.iter().map(|l| l.to_string()).collect(),
    );
    Value::Object(entry)
}
