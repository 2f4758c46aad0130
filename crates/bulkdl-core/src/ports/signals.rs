//! Outbound UI signals: the busy indicator and the batch event stream.
//!
//! Both are best-effort. Implementations handle delivery themselves and must
//! not block the caller.

use crate::events::BatchEvent;

/// Port for the "batch busy" indicator (badge, tray icon, spinner).
pub trait BusySignalPort: Send + Sync {
    fn set_busy(&self, busy: bool);
}

/// Port for emitting batch events.
pub trait BatchEventEmitterPort: Send + Sync {
    /// Emit a batch event. This method should not block.
    fn emit(&self, event: BatchEvent);
}

/// A busy signal that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBusySignal;

impl BusySignalPort for NoopBusySignal {
    fn set_busy(&self, _busy: bool) {}
}

/// A no-op batch event emitter for tests and CLI contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBatchEmitter;

impl NoopBatchEmitter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BatchEventEmitterPort for NoopBatchEmitter {
    fn emit(&self, _event: BatchEvent) {
        // Intentionally do nothing
    }
}
