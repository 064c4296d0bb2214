//! Version-annotated symbol index of WordPress core
//!
//! The index maps every annotated API element to the release that introduced
//! it. It is produced by [`builder::SinceIndexBuilder`], persisted as JSON and
//! read by the usage scanner, which never mutates it.
//!
//! # Modules
//!
//! - [`builder`]: walks a WordPress source tree and extracts annotations
//! - [`probe`]: answers capability checks for compatibility shim guards

pub mod builder;
pub mod probe;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::IndexError;
use crate::version::Version;

/// Hook call family. Emission calls (`do_action`, `apply_filters`) declare a
/// hook; registration calls (`add_action`, `add_filter`) consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    DoAction,
    ApplyFilters,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::DoAction => "do_action",
            HookKind::ApplyFilters => "apply_filters",
        }
    }

    /// Family of a hook emission call
    pub fn emitted_by(function: &str) -> Option<Self> {
        match function {
            "do_action" | "do_action_ref_array" | "do_action_deprecated" => {
                Some(HookKind::DoAction)
            }
            "apply_filters" | "apply_filters_ref_array" | "apply_filters_deprecated" => {
                Some(HookKind::ApplyFilters)
            }
            _ => None,
        }
    }

    /// Emission family matched by a hook registration call
    pub fn registered_by(function: &str) -> Option<Self> {
        match function {
            "add_action" => Some(HookKind::DoAction),
            "add_filter" => Some(HookKind::ApplyFilters),
            _ => None,
        }
    }
}

/// One indexed API element
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    /// Global constant, or class constant written as `Class::NAME`
    Constant(String),
    Function(String),
    Class(String),
    Method { class: String, method: String },
    Hook { kind: HookKind, name: String },
}

/// Version in which a symbol was introduced, and deprecated if ever
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionAnnotation {
    pub since: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Version>,
}

impl VersionAnnotation {
    pub fn new(since: Version) -> Self {
        Self {
            since,
            deprecated: None,
        }
    }
}

/// A class and its annotated methods. The class itself may be unannotated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Version>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub method: BTreeMap<String, VersionAnnotation>,
}

impl ClassEntry {
    pub fn annotation(&self) -> Option<VersionAnnotation> {
        self.since.clone().map(|since| VersionAnnotation {
            since,
            deprecated: self.deprecated.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookTable {
    #[serde(default)]
    pub do_action: BTreeMap<String, VersionAnnotation>,
    #[serde(default)]
    pub apply_filters: BTreeMap<String, VersionAnnotation>,
}

impl HookTable {
    pub fn get(&self, kind: HookKind) -> &BTreeMap<String, VersionAnnotation> {
        match kind {
            HookKind::DoAction => &self.do_action,
            HookKind::ApplyFilters => &self.apply_filters,
        }
    }

    fn get_mut(&mut self, kind: HookKind) -> &mut BTreeMap<String, VersionAnnotation> {
        match kind {
            HookKind::DoAction => &mut self.do_action,
            HookKind::ApplyFilters => &mut self.apply_filters,
        }
    }
}

/// Symbols extracted from one or more files, keyed by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    #[serde(default)]
    pub constant: BTreeMap<String, VersionAnnotation>,
    #[serde(default)]
    pub function: BTreeMap<String, VersionAnnotation>,
    #[serde(default)]
    pub class: BTreeMap<String, ClassEntry>,
    #[serde(default)]
    pub hook: HookTable,
}

impl SymbolTable {
    /// Write an annotation, replacing any earlier one for the same symbol
    pub fn insert(&mut self, symbol: Symbol, annotation: VersionAnnotation) {
        match symbol {
            Symbol::Constant(name) => {
                self.constant.insert(name, annotation);
            }
            Symbol::Function(name) => {
                self.function.insert(name, annotation);
            }
            Symbol::Class(name) => {
                let entry = self.class.entry(name).or_default();
                entry.since = Some(annotation.since);
                entry.deprecated = annotation.deprecated;
            }
            Symbol::Method { class, method } => {
                self.class
                    .entry(class)
                    .or_default()
                    .method
                    .insert(method, annotation);
            }
            Symbol::Hook { kind, name } => {
                self.hook.get_mut(kind).insert(name, annotation);
            }
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<VersionAnnotation> {
        match symbol {
            Symbol::Constant(name) => self.constant.get(name).cloned(),
            Symbol::Function(name) => self.function.get(name).cloned(),
            Symbol::Class(name) => self.class.get(name).and_then(ClassEntry::annotation),
            Symbol::Method { class, method } => self
                .class
                .get(class)
                .and_then(|entry| entry.method.get(method))
                .cloned(),
            Symbol::Hook { kind, name } => self.hook.get(*kind).get(name).cloned(),
        }
    }

    /// Fold another table in; its entries win on conflict. A class
    /// redefinition replaces the class annotation but keeps methods that
    /// the newer table does not mention.
    pub fn merge(&mut self, other: SymbolTable) {
        self.constant.extend(other.constant);
        self.function.extend(other.function);
        for (name, entry) in other.class {
            let current = self.class.entry(name).or_default();
            if entry.since.is_some() {
                current.since = entry.since;
                current.deprecated = entry.deprecated;
            }
            current.method.extend(entry.method);
        }
        self.hook.do_action.extend(other.hook.do_action);
        self.hook.apply_filters.extend(other.hook.apply_filters);
    }

    /// Number of annotated symbols
    pub fn len(&self) -> usize {
        self.constant.len()
            + self.function.len()
            + self
                .class
                .values()
                .map(|c| usize::from(c.since.is_some()) + c.method.len())
                .sum::<usize>()
            + self.hook.do_action.len()
            + self.hook.apply_filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The frozen index tagged with the WordPress release it was built from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinceIndex {
    #[serde(
        rename = "@wp_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    framework_version: Option<Version>,
    #[serde(flatten)]
    symbols: SymbolTable,
}

impl SinceIndex {
    pub fn new(framework_version: Version, symbols: SymbolTable) -> Self {
        Self {
            framework_version: Some(framework_version),
            symbols,
        }
    }

    pub fn framework_version(&self) -> Option<&Version> {
        self.framework_version.as_ref()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn annotation(&self, symbol: &Symbol) -> Option<VersionAnnotation> {
        self.symbols.get(symbol)
    }

    /// Method name to the classes declaring it, for receivers of unknown type
    pub fn method_owners(&self) -> HashMap<&str, Vec<&str>> {
        let mut owners: HashMap<&str, Vec<&str>> = HashMap::new();
        for (class, entry) in &self.symbols.class {
            for method in entry.method.keys() {
                owners.entry(method.as_str()).or_default().push(class.as_str());
            }
        }
        owners
    }

    /// Load a persisted index; `None` when no index has been written yet
    pub fn load(path: &Path) -> Result<Option<Self>, IndexError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(IndexError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let index: SinceIndex =
            serde_json::from_slice(&bytes).map_err(|source| IndexError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "Loaded version index for WordPress {} ({} symbols)",
            index
                .framework_version
                .as_ref()
                .map_or_else(|| "unknown".to_string(), Version::to_string),
            index.symbols.len()
        );
        Ok(Some(index))
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| IndexError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Stored version index at {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn annotation(since: &str) -> VersionAnnotation {
        VersionAnnotation::new(since.parse().unwrap())
    }

    #[test]
    fn insert_overwrites_previous_annotation() {
        let mut table = SymbolTable::default();
        table.insert(Symbol::Function("foo".into()), annotation("2.0"));
        table.insert(Symbol::Function("foo".into()), annotation("3.0"));

        assert_eq!(
            table.get(&Symbol::Function("foo".into())),
            Some(annotation("3.0"))
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn methods_nest_under_their_class() {
        let mut table = SymbolTable::default();
        table.insert(
            Symbol::Method {
                class: "WP_Query".into(),
                method: "get_posts".into(),
            },
            annotation("1.5.0"),
        );

        assert_eq!(table.get(&Symbol::Class("WP_Query".into())), None);
        assert_eq!(table.class["WP_Query"].method["get_posts"], annotation("1.5.0"));
    }

    #[test]
    fn merge_keeps_methods_not_redefined() {
        let mut base = SymbolTable::default();
        base.insert(Symbol::Class("A".into()), annotation("2.0"));
        base.insert(
            Symbol::Method {
                class: "A".into(),
                method: "old".into(),
            },
            annotation("2.0"),
        );

        let mut newer = SymbolTable::default();
        newer.insert(
            Symbol::Method {
                class: "A".into(),
                method: "new".into(),
            },
            annotation("3.0"),
        );

        base.merge(newer);

        let class = &base.class["A"];
        assert_eq!(class.since, Some("2.0".parse().unwrap()));
        assert_eq!(class.method.len(), 2);
    }

    #[test]
    fn index_document_uses_kind_keys_and_version_tag() {
        let mut table = SymbolTable::default();
        table.insert(Symbol::Function("foo".into()), annotation("5.0"));
        table.insert(
            Symbol::Hook {
                kind: HookKind::DoAction,
                name: "bar".into(),
            },
            VersionAnnotation {
                since: "4.9".parse().unwrap(),
                deprecated: Some("6.0".parse().unwrap()),
            },
        );
        let index = SinceIndex::new("6.7".parse().unwrap(), table);

        let value = serde_json::to_value(&index).unwrap();

        assert_eq!(
            value,
            json!({
                "@wp_version": "6.7",
                "constant": {},
                "function": { "foo": { "since": "5.0" } },
                "class": {},
                "hook": {
                    "do_action": { "bar": { "since": "4.9", "deprecated": "6.0" } },
                    "apply_filters": {}
                }
            })
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("since_data.json");
        let mut table = SymbolTable::default();
        table.insert(Symbol::Constant("WP_Foo::BAR".into()), annotation("6.1"));
        let index = SinceIndex::new("6.7.1".parse().unwrap(), table);

        index.save(&path).unwrap();
        let loaded = SinceIndex::load(&path).unwrap().unwrap();

        assert_eq!(loaded, index);
    }

    #[test]
    fn load_returns_none_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = SinceIndex::load(&temp_dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn method_owners_lists_every_declaring_class() {
        let mut table = SymbolTable::default();
        for class in ["A", "B"] {
            table.insert(
                Symbol::Method {
                    class: class.into(),
                    method: "render".into(),
                },
                annotation("4.0"),
            );
        }
        let index = SinceIndex::new("6.0".parse().unwrap(), table);

        let owners = index.method_owners();
        assert_eq!(owners["render"], vec!["A", "B"]);
    }
}
