//! Parser trait definition

use tree_sitter::Tree;

/// Trait for turning PHP source text into a syntax tree
pub trait SourceParser {
    /// Parse the content into a tree whose byte ranges index into `content`
    fn parse(&self, content: &str) -> Result<Tree, ParseError>;
}

/// Error type for parsing operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The parser produced no tree at all
    #[error("Failed to parse file: {0}")]
    ParseFailed(String),

    /// Tree-sitter related error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),
}
