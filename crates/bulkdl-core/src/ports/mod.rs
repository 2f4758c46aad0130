//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces that the batch orchestrator expects from
//! infrastructure. They contain no implementation details and use only domain
//! types.
//!
//! # Design Rules
//!
//! - No `sqlx` or `reqwest` types in any signature
//! - Control calls return results; callers decide whether to ignore them
//! - UI signals are synchronous and must never block

pub mod backend;
pub mod batch_manager;
pub mod kv_store;
pub mod resolver;
pub mod signals;

pub use backend::{BackendChange, BackendSnapshot, BackendState, DownloadBackendPort};
pub use batch_manager::BatchManagerPort;
pub use kv_store::{KeyValueStore, MemoryKeyValueStore};
pub use resolver::{FileDescriptor, ResolverPort};
pub use signals::{BatchEventEmitterPort, BusySignalPort, NoopBatchEmitter, NoopBusySignal};
