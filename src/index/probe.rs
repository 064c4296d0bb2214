//! Capability checks for compatibility shim guards
//!
//! WordPress wraps polyfills in `if ( ! function_exists( 'x' ) )`. Such a
//! declaration only documents a fallback when the PHP runtime already ships
//! `x`, so the builder asks a probe before indexing it.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::process::Command;

use serde::Deserialize;
use tracing::{info, warn};

/// Guard condition kinds understood in `if ( ! <check>( 'name' ) )`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Function,
    Class,
    Constant,
}

impl Capability {
    /// Capability tested by a guard function such as `function_exists`
    pub fn checked_by(function: &str) -> Option<Self> {
        match function {
            "function_exists" => Some(Capability::Function),
            "class_exists" | "interface_exists" => Some(Capability::Class),
            "defined" => Some(Capability::Constant),
            _ => None,
        }
    }
}

pub trait CapabilityProbe {
    fn exists(&self, capability: Capability, name: &str) -> bool;
}

/// Fixed capability sets; function and class names are case-insensitive
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    functions: HashSet<String>,
    classes: HashSet<String>,
    constants: HashSet<String>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.functions
            .extend(names.into_iter().map(|n| n.as_ref().to_ascii_lowercase()));
        self
    }

    pub fn with_classes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.classes
            .extend(names.into_iter().map(|n| n.as_ref().to_ascii_lowercase()));
        self
    }

    pub fn with_constants<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.constants
            .extend(names.into_iter().map(|n| n.as_ref().to_string()));
        self
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.classes.len() + self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CapabilityProbe for StaticProbe {
    fn exists(&self, capability: Capability, name: &str) -> bool {
        let name = name.trim_start_matches('\\');
        match capability {
            Capability::Function => self.functions.contains(&name.to_ascii_lowercase()),
            Capability::Class => self.classes.contains(&name.to_ascii_lowercase()),
            Capability::Constant => self.constants.contains(name),
        }
    }
}

const PHP_INVENTORY_SCRIPT: &str = r#"echo json_encode([
    "functions" => get_defined_functions()["internal"],
    "classes" => array_merge(get_declared_classes(), get_declared_interfaces()),
    "constants" => array_keys(get_defined_constants()),
]);"#;

#[derive(Debug, Deserialize)]
struct PhpInventory {
    #[serde(default)]
    functions: Vec<String>,
    #[serde(default)]
    classes: Vec<String>,
    #[serde(default)]
    constants: Vec<String>,
}

/// Probe backed by the built-ins of a local PHP interpreter. The interpreter
/// is only started on the first capability check.
pub struct PhpRuntimeProbe {
    php_binary: String,
    inventory: OnceCell<StaticProbe>,
}

impl PhpRuntimeProbe {
    pub fn new(php_binary: impl Into<String>) -> Self {
        Self {
            php_binary: php_binary.into(),
            inventory: OnceCell::new(),
        }
    }

    /// Whether the interpreter has been queried yet
    pub fn is_loaded(&self) -> bool {
        self.inventory.get().is_some()
    }

    /// Query `php_binary` once for its built-in functions, classes and
    /// constants. Without a usable interpreter no guard is confirmed and
    /// every guarded declaration is indexed.
    pub fn detect(php_binary: &str) -> StaticProbe {
        let output = match Command::new(php_binary)
            .args(["-r", PHP_INVENTORY_SCRIPT])
            .output()
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!(
                    "{} exited with {}; shim guards will not be excluded",
                    php_binary, output.status
                );
                return StaticProbe::new();
            }
            Err(e) => {
                warn!(
                    "Failed to run {}: {}; shim guards will not be excluded",
                    php_binary, e
                );
                return StaticProbe::new();
            }
        };

        match serde_json::from_slice::<PhpInventory>(&output.stdout) {
            Ok(inventory) => {
                let probe = StaticProbe::new()
                    .with_functions(inventory.functions)
                    .with_classes(inventory.classes)
                    .with_constants(inventory.constants);
                info!("Loaded {} PHP runtime capabilities", probe.len());
                probe
            }
            Err(e) => {
                warn!("Unexpected output from {}: {}", php_binary, e);
                StaticProbe::new()
            }
        }
    }
}

impl CapabilityProbe for PhpRuntimeProbe {
    fn exists(&self, capability: Capability, name: &str) -> bool {
        self.inventory
            .get_or_init(|| Self::detect(&self.php_binary))
            .exists(capability, name)
    }
}
