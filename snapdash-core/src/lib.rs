//! Snapdash Core Library
//!
//! Snapshot correlation and incremental diff-retrieval engine for
//! snapper-managed subvolumes.

pub mod config;
pub mod daemon;
pub mod diff;
pub mod exec;
pub mod rollback;
pub mod snapper;
pub mod snapshot;
pub mod sync;
pub mod ui;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::SnapError;
pub type Result<T> = std::result::Result<T, SnapError>;
