//! # pagesmith-store
//!
//! Job store clients for pagesmith workers.
//!
//! [`HttpJobStore`] is the production client: a thin typed wrapper over the
//! remote store's HTTP API that maps every transport failure into the
//! `StoreError` taxonomy. [`MemoryJobStore`] implements the same trait
//! in-process for integration tests and offline development.

pub mod http;
pub mod memory;

pub use http::HttpJobStore;
pub use memory::MemoryJobStore;
