//! Version handling
//!
//! # Modules
//!
//! - [`lattice`]: WordPress version parsing, total order and join (max)

pub mod lattice;

pub use lattice::{Version, VersionParseError, compare, join};
