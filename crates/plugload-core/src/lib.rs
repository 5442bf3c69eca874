//! # plugload-core
//!
//! Error types and report records shared by every host-side plugload crate.
//! Plugin modules never depend on this crate; they only see
//! `plugload-contract`.

pub mod error;
pub mod types;

pub use error::{PlugloadError, Result};
pub use types::*;
