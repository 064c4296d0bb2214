//! Parser layer
//! - traits.rs: SourceParser trait and ParseError
//! - php.rs: tree-sitter PHP parser
//! - syntax.rs: node classification, parent map, traversal and literal helpers

pub mod php;
pub mod syntax;
pub mod traits;

pub use php::PhpParser;
pub use syntax::{ParentMap, SyntaxKind, Visitor, walk};
pub use traits::{ParseError, SourceParser};
