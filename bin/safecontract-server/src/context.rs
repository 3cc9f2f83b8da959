//! Per-request lifetime of one reply stream.

use std::time::Instant;

use safecontract_core::{CancelHandle, CancelSignal, cancel_channel};
use tracing::{debug, info};

/// Owns the cancellation scope of one `POST /api/chat`.
///
/// It lives inside the response body stream. When the body is dropped before
/// the reply finished (client disconnect or server shutdown) the scope is
/// cancelled, which stops retrieval and generation.
#[derive(Debug)]
pub struct RequestContext {
    cancel: CancelHandle,
    started: Instant,
    frames: usize,
    finished: bool,
}

impl RequestContext {
    pub fn new() -> (Self, CancelSignal) {
        let (cancel, signal) = cancel_channel();
        let context = Self {
            cancel,
            started: Instant::now(),
            frames: 0,
            finished: false,
        };
        (context, signal)
    }

    /// One frame was handed to the body.
    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// The reply ended, cleanly or with a fault.
    pub fn finish(&mut self) {
        self.finished = true;
        info!(
            frames = self.frames,
            elapsed_ms = self.started.elapsed().as_millis(),
            "reply stream closed"
        );
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if !self.finished {
            debug!(frames = self.frames, "reply abandoned; cancelling generation");
            self.cancel.cancel();
        }
    }
}
