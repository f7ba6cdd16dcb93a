// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress notifications for front ends.

/// Receives `(completed, total, current_file_name)` after each file.
///
/// `completed` never decreases within one search, and each file is reported at
/// most once per phase.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize, file_name: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize, file_name: &str) {
        self(completed, total, file_name)
    }
}

/// Sink that drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize, _file_name: &str) {}
}

/// Monotonic counter owned by the orchestrator thread
pub(crate) struct ProgressCounter<'a> {
    sink: &'a dyn ProgressSink,
    completed: usize,
    total: usize,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, total: usize) -> Self {
        Self {
            sink,
            completed: 0,
            total,
        }
    }

    pub(crate) fn advance(&mut self, file_name: &str) {
        self.completed = (self.completed + 1).min(self.total);
        self.sink.on_progress(self.completed, self.total, file_name);
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed
    }
}
