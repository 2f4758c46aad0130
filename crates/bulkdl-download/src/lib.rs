//! Batch download orchestrator for bulkdl.
//!
//! This crate owns the scheduling side of the system: the persisted item
//! collection, the tick-driven scheduler that reconciles it against the
//! download backend, the progress tracker and the operator actions.
//!
//! # Modules
//!
//! - `batch` - Pure collection transitions and group aggregation
//! - `store` - Typed, serialised access to the persisted documents
//! - `progress` - Query throttling for the tracker
//! - `manager` - `BatchManager`, the `BatchManagerPort` implementation
//! - `http` - Reference resolver and backend over HTTP

// Re-export core types for convenience
pub use bulkdl_core::{
    BackendChange, BackendError, BackendId, BackendSnapshot, BackendState, BatchConfig,
    BatchError, BatchEvent, BatchEventEmitterPort, BatchItem, BatchManagerPort, BatchResult,
    BusySignalPort, DownloadBackendPort, FileDescriptor, ItemId, KeyValueStore, ResolveError,
    ResolverPort, SelectedItem,
};

pub mod batch;
mod http;
mod manager;
pub(crate) mod progress;
pub mod store;

pub use batch::{Batch, Observation, ObservationOutcome, ResolutionOutcome, recompute_parents};
pub use http::{HttpBackend, HttpResolver};
pub use manager::{BatchManager, BatchManagerDeps, TickReport, build_batch_manager};
pub use store::ItemStore;
