//! # pagesmith-core
//!
//! Core types, traits, and abstractions for the pagesmith worker system.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the store client, job handlers, and worker binary depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod paths;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{truncate_message, Error, Result, StoreError, StoreResult};
pub use models::*;
pub use paths::{content_areas_from_env, is_in_content_area, normalize_rel_path, PathError};
pub use traits::*;
