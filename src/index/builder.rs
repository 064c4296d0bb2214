//! Builds a [`SinceIndex`] from a WordPress source tree

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};
use tree_sitter::Node;

use crate::cache::ContentCache;
use crate::error::IndexError;
use crate::files::{IgnoreSet, php_files};
use crate::index::probe::{Capability, CapabilityProbe};
use crate::index::{HookKind, SinceIndex, Symbol, SymbolTable, VersionAnnotation};
use crate::parser::syntax::{
    self, declared_name, enclosing_class, first_string_argument, is_member_constant,
    last_named_child, nearest_doc_comment, static_name, text,
};
use crate::parser::{ParentMap, ParseError, SourceParser, SyntaxKind, Visitor, walk};
use crate::progress::Progress;
use crate::version::Version;

/// File inside a release that declares `$wp_version`
pub const VERSION_FILE: &str = "wp-includes/version.php";

static SINCE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@since\s+(\d+(?:\.\d+)*)").unwrap());
static DEPRECATED_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@deprecated\s+(\d+(?:\.\d+)*)").unwrap());
static WP_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\$wp_version\s*=\s*['"]([^'"]+)['"]"#).unwrap());

/// Opens a shared doc block applying to every declaration until [`GROUP_CLOSE`]
const GROUP_OPEN: &str = "/**#@+";
const GROUP_CLOSE: &str = "/**#@-";

/// Parse the first `@since` and `@deprecated` tokens of a doc comment.
/// Returns `None` unless an `@since` version is present.
pub fn parse_annotation(doc: &str) -> Option<VersionAnnotation> {
    let since = SINCE_TAG
        .captures(doc)
        .and_then(|c| c[1].parse::<Version>().ok())?;
    let deprecated = DEPRECATED_TAG
        .captures(doc)
        .and_then(|c| c[1].parse::<Version>().ok());

    Some(VersionAnnotation { since, deprecated })
}

/// Read `$wp_version` from a release's version declaration file
pub fn read_framework_version(root: &Path) -> Result<Version, IndexError> {
    let path = root.join(VERSION_FILE);
    let content = fs::read_to_string(&path).map_err(|source| IndexError::Io {
        path: path.clone(),
        source,
    })?;

    WP_VERSION
        .captures(&content)
        .and_then(|c| c[1].parse().ok())
        .ok_or(IndexError::FrameworkVersionNotFound(path))
}

pub struct SinceIndexBuilder<'a> {
    parser: &'a dyn SourceParser,
    probe: &'a dyn CapabilityProbe,
    show_progress: bool,
}

impl<'a> SinceIndexBuilder<'a> {
    pub fn new(parser: &'a dyn SourceParser, probe: &'a dyn CapabilityProbe) -> Self {
        Self {
            parser,
            probe,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Index every PHP file under `root`. Files that fail to parse are
    /// logged and skipped; unreadable files abort the build.
    pub fn build(
        &self,
        root: &Path,
        cache: &mut ContentCache<SymbolTable>,
    ) -> Result<SinceIndex, IndexError> {
        info!("Scanning {:?} for version info", root);

        let files = php_files(root, &IgnoreSet::default()).map_err(|e| IndexError::Io {
            path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            source: e.into(),
        })?;

        let progress = if self.show_progress {
            Progress::new(files.len())
        } else {
            Progress::hidden(files.len())
        };

        let mut symbols = SymbolTable::default();
        let mut skipped: Vec<PathBuf> = Vec::new();

        for (n, file) in files.iter().enumerate() {
            let content = fs::read(file).map_err(|source| IndexError::Io {
                path: file.clone(),
                source,
            })?;

            match cache.get_or_extract(file, &content, || {
                self.extract(&String::from_utf8_lossy(&content))
            }) {
                Ok(table) => symbols.merge(table),
                Err(e) => {
                    warn!("Skipping {:?}: {}", file, e);
                    skipped.push(file.clone());
                }
            }

            progress.update(n + 1, "");
        }
        progress.finish();

        let pruned = cache.prune_untouched();
        if pruned > 0 {
            debug!("Dropped {} cache entries for files no longer present", pruned);
        }

        let framework_version = read_framework_version(root)?;

        info!(
            "Indexed {} symbols from {} files for WordPress {} ({} skipped)",
            symbols.len(),
            files.len(),
            framework_version,
            skipped.len()
        );

        Ok(SinceIndex::new(framework_version, symbols))
    }

    /// Extract the annotated declarations of one file
    pub fn extract(&self, source: &str) -> Result<SymbolTable, ParseError> {
        let tree = self.parser.parse(source)?;
        let parents = ParentMap::build(&tree);

        let mut extractor = SinceExtractor {
            source,
            parents: &parents,
            probe: self.probe,
            grouped_doc: None,
            shim_guards: Vec::new(),
            symbols: SymbolTable::default(),
        };
        walk(&tree, &mut extractor);

        debug!("Extracted {} symbols", extractor.symbols.len());
        Ok(extractor.symbols)
    }
}

struct SinceExtractor<'a, 't> {
    source: &'a str,
    parents: &'a ParentMap<'t>,
    probe: &'a dyn CapabilityProbe,
    grouped_doc: Option<&'a str>,
    /// Ids of the confirmed shim `if` statements currently entered
    shim_guards: Vec<usize>,
    symbols: SymbolTable,
}

impl<'t> Visitor<'t> for SinceExtractor<'_, 't> {
    fn enter(&mut self, node: Node<'t>, kind: SyntaxKind) {
        match kind {
            SyntaxKind::Comment => self.track_group(&node),
            SyntaxKind::IfStatement if self.is_confirmed_shim(&node) => {
                debug!("Skipping shim guard at line {}", syntax::line_of(&node));
                self.shim_guards.push(node.id());
            }
            _ => {}
        }

        if !self.shim_guards.is_empty() {
            return;
        }

        match kind {
            SyntaxKind::FunctionDefinition => self.process_function(&node),
            SyntaxKind::ClassDeclaration => self.process_class(&node),
            SyntaxKind::MethodDeclaration => self.process_method(&node),
            SyntaxKind::ConstElement => self.process_constant(&node),
            SyntaxKind::FunctionCall => self.process_call(&node),
            _ => {}
        }
    }

    fn leave(&mut self, node: Node<'t>, kind: SyntaxKind) {
        if kind == SyntaxKind::IfStatement && self.shim_guards.last() == Some(&node.id()) {
            self.shim_guards.pop();
        }
    }
}

impl<'a, 't> SinceExtractor<'a, 't> {
    fn track_group(&mut self, comment: &Node<'t>) {
        let text = text(comment, self.source);
        if text.starts_with(GROUP_OPEN) {
            self.grouped_doc = Some(text);
        } else if text.starts_with(GROUP_CLOSE) {
            self.grouped_doc = None;
        }
    }

    /// `if ( ! function_exists( 'x' ) )` where `x` already exists in the probe
    fn is_confirmed_shim(&self, node: &Node<'t>) -> bool {
        self.shim_capability(node)
            .is_some_and(|(capability, name)| self.probe.exists(capability, &name))
    }

    fn shim_capability(&self, node: &Node<'t>) -> Option<(Capability, String)> {
        let condition = node.child_by_field_name("condition")?;
        let negation = if condition.kind() == "parenthesized_expression" {
            condition.named_child(0)?
        } else {
            condition
        };
        if negation.kind() != "unary_op_expression"
            || !text(&negation, self.source).starts_with('!')
        {
            return None;
        }

        let call = last_named_child(&negation)?;
        if SyntaxKind::of(&call) != SyntaxKind::FunctionCall {
            return None;
        }
        let callee = static_name(&call.child_by_field_name("function")?, self.source)?;
        let capability = Capability::checked_by(callee)?;
        let name = first_string_argument(&call, self.source)?;

        Some((capability, name))
    }

    /// Grouped block first when it carries an annotation, else the node's own
    fn annotation_for(&self, node: &Node<'t>) -> Option<VersionAnnotation> {
        self.grouped_doc
            .and_then(parse_annotation)
            .or_else(|| nearest_doc_comment(node, self.parents, self.source).and_then(parse_annotation))
    }

    fn record(&mut self, symbol: Symbol, node: &Node<'t>) {
        if let Some(annotation) = self.annotation_for(node) {
            self.symbols.insert(symbol, annotation);
        }
    }

    fn process_function(&mut self, node: &Node<'t>) {
        if let Some(name) = declared_name(node, self.source) {
            self.record(Symbol::Function(name.to_string()), node);
        }
    }

    fn process_class(&mut self, node: &Node<'t>) {
        if let Some(name) = declared_name(node, self.source) {
            self.record(Symbol::Class(name.to_string()), node);
        }
    }

    fn process_method(&mut self, node: &Node<'t>) {
        let Some(class) = enclosing_class(node, self.parents, self.source) else {
            return;
        };
        if let Some(method) = declared_name(node, self.source) {
            let symbol = Symbol::Method {
                class: class.to_string(),
                method: method.to_string(),
            };
            self.record(symbol, node);
        }
    }

    fn process_constant(&mut self, node: &Node<'t>) {
        let Some(name) = node.named_child(0).map(|n| text(&n, self.source)) else {
            return;
        };
        let qualified = match enclosing_class(node, self.parents, self.source) {
            Some(class) => format!("{}::{}", class, name),
            // anonymous class members cannot be fetched by name
            None if is_member_constant(node, self.parents) => return,
            None => name.to_string(),
        };
        self.record(Symbol::Constant(qualified), node);
    }

    fn process_call(&mut self, node: &Node<'t>) {
        let Some(callee) = node
            .child_by_field_name("function")
            .and_then(|f| static_name(&f, self.source))
        else {
            return;
        };

        if callee == "define" {
            if syntax::call_arguments(node).len() >= 2
                && let Some(name) = first_string_argument(node, self.source)
            {
                self.record(Symbol::Constant(name), node);
            }
            return;
        }

        if let Some(kind) = HookKind::emitted_by(callee)
            && let Some(name) = first_string_argument(node, self.source)
        {
            self.record(Symbol::Hook { kind, name }, node);
        }
    }
}
