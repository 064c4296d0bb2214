//! tree-sitter backed PHP parser

use tracing::{debug, warn};
use tree_sitter::Tree;

use crate::parser::traits::{ParseError, SourceParser};

/// Parser for PHP source files (`<?php` tags, inline HTML allowed)
pub struct PhpParser;

impl PhpParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PhpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for PhpParser {
    fn parse(&self, content: &str) -> Result<Tree, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_php::LANGUAGE_PHP;
        parser.set_language(&language.into()).map_err(|e| {
            warn!("Failed to set PHP language for tree-sitter: {}", e);
            ParseError::TreeSitter(e.to_string())
        })?;

        let tree = parser.parse(content, None).ok_or_else(|| {
            warn!("Failed to parse PHP content");
            ParseError::ParseFailed("Failed to parse PHP".to_string())
        })?;

        // Error recovery keeps the well-formed parts of the file usable.
        if tree.root_node().has_error() {
            debug!("PHP content contains syntax errors; continuing with recovered tree");
        }

        Ok(tree)
    }
}
