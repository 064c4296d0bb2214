//! Minimum WordPress version checker for plugins
//!
//! The checker indexes the `@since` annotations of a WordPress release and
//! matches a plugin's PHP source against that index. The minimum version a
//! plugin requires is the join of the versions of every API it uses.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ ReleaseSync │────▶│ SinceIndex  │◀────│ UsageScanner│
//! │ (download)  │     │ (builder)   │     │  (report)   │
//! └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │FileRewriter │
//!                                         └─────────────┘
//! ```

pub mod cache;
pub mod checker;
pub mod config;
pub mod error;
pub mod files;
pub mod index;
pub mod logging;
pub mod parser;
pub mod progress;
pub mod release;
pub mod rewrite;
pub mod scan;
pub mod version;
