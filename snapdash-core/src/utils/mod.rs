//! Utility modules for the snapshot engine.

pub mod errors;
pub mod logger;

pub use errors::{Result, SnapError};
