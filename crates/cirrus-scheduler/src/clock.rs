//! Monotonic time source.

use tokio::time::Instant;

/// Source of the current monotonic time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by the tokio timer, so paused test runtimes control it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
