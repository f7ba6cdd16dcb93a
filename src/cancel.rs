// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cooperative cancellation shared between the caller and worker tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Advisory stop flag. Workers poll it between files, never mid-file.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    stopped: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Never blocks.
    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can drive another search
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}
