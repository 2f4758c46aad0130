//! Core domain types and port definitions for bulkdl.
//!
//! This crate contains pure data types and trait definitions for the batch
//! download system. No I/O, networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `items` - The item collection model (`BatchItem`, ids, statuses)
//! - `config` - Scheduler and tracker configuration (`BatchConfig`)
//! - `errors` - Error types for batch operations
//! - `events` - Batch events emitted to UI collaborators
//! - `ports` - Trait abstractions for storage, resolver, backend and UI signals

pub mod config;
pub mod errors;
pub mod events;
pub mod items;
pub mod ports;

// Re-export commonly used types for convenience
pub use config::BatchConfig;
pub use errors::{BackendError, BatchError, BatchResult, RepositoryError, ResolveError};
pub use events::BatchEvent;
pub use items::{
    BackendId, BatchItem, FileRef, ItemId, MultipleItem, MultipleStatus, PendingItem,
    PendingStatus, SelectedItem, SingleItem, SingleStatus,
};
pub use ports::{
    BackendChange, BackendSnapshot, BackendState, BatchEventEmitterPort, BatchManagerPort,
    BusySignalPort, DownloadBackendPort, FileDescriptor, KeyValueStore, MemoryKeyValueStore,
    NoopBatchEmitter, NoopBusySignal, ResolverPort,
};
