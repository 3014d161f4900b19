/*
 * progress.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Progress reporting for synchronization runs.
 */

//! Progress sinks.
//!
//! A [`ProgressSink`] is passed explicitly to everything that reports
//! progress, so several runs can report at once without sharing state.
//! Messages are fire-and-forget.

/// Receiver of progress messages.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, message: &str);
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _message: &str) {}
}

/// Forwards messages as `tracing` info events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, message: &str) {
        tracing::info!(target: "docxcite::progress", "{}", message);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn emit(&self, message: &str) {
        self(message)
    }
}
