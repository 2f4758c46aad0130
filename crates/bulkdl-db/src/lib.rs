//! `SQLite` persistence for bulkdl.
//!
//! Provides the production [`KeyValueStore`](bulkdl_core::KeyValueStore)
//! adapter and the database bootstrap used by entry points.

#![deny(unsafe_code)]

pub mod repositories;
pub mod setup;

pub use repositories::SqliteKeyValueStore;

// Re-export setup functions for convenient access
pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
