//! Progress reporting and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Receives progress lines and answers whether the run should stop
///
/// Cancellation is polled between URLs and inside long script loops, never in
/// the middle of a request.
pub trait RunObserver: Send + Sync {
    fn is_cancelled(&self) -> bool;

    fn progress(&self, line: &str);
}

/// Shared stop signal
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Observer that reports progress through `tracing`
#[derive(Debug, Clone, Default)]
pub struct LogObserver {
    cancel: CancelFlag,
}

impl LogObserver {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

impl RunObserver for LogObserver {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn progress(&self, line: &str) {
        info!("{}", line);
    }
}
