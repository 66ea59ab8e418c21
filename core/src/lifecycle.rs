//! In-flight request tracking.
//!
//! A [`RequestTracker`] holds the busy flag and the last error message of one
//! client. Callers read it at any time (for example to disable an input while
//! a reply streams in); client operations mutate it through an
//! [`OperationGuard`] so that busy always returns to false, including when a
//! future or stream is dropped half way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::ClientError;

/// Snapshot of a tracker's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestState {
    pub busy: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    busy: AtomicBool,
    last_error: Mutex<Option<String>>,
}

/// Busy flag and last error of a single client.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    inner: Arc<TrackerInner>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an operation as started and clears the previous error.
    pub fn begin(&self) {
        self.inner.busy.store(true, Ordering::SeqCst);
        *self.last_error_slot() = None;
        tracing::debug!("request started");
    }

    /// Records a failure. Does not touch the busy flag.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("request failed: {}", message);
        *self.last_error_slot() = Some(message);
    }

    /// Marks the running operation as finished. Idempotent.
    pub fn end(&self) {
        if self.inner.busy.swap(false, Ordering::SeqCst) {
            tracing::debug!("request finished");
        }
    }

    /// Starts an operation unless one is already running.
    ///
    /// On success the state is the same as after [`RequestTracker::begin`]
    /// and the returned guard owns the busy flag. A second caller gets
    /// [`ClientError::Busy`] and the running operation's state is left alone.
    pub fn try_begin(&self) -> Result<OperationGuard, ClientError> {
        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("rejecting request: client is busy");
            return Err(ClientError::Busy);
        }
        *self.last_error_slot() = None;
        tracing::debug!("request started");

        Ok(OperationGuard {
            tracker: self.clone(),
            finished: false,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error_slot().clone()
    }

    pub fn state(&self) -> RequestState {
        RequestState {
            busy: self.is_busy(),
            last_error: self.last_error(),
        }
    }

    // The slot only ever holds a plain Option<String>, so a poisoned lock
    // still has usable contents.
    fn last_error_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Ownership of one running operation on a [`RequestTracker`].
///
/// Dropping the guard ends the operation.
#[must_use = "dropping the guard ends the operation immediately"]
#[derive(Debug)]
pub struct OperationGuard {
    tracker: RequestTracker,
    finished: bool,
}

impl OperationGuard {
    /// Records `err` as the operation's failure, ends the operation and
    /// hands the error back for propagation.
    pub fn fail(mut self, err: ClientError) -> ClientError {
        self.tracker.fail(err.to_string());
        self.finish_in_place();
        err
    }

    /// Ends the operation successfully.
    pub fn finish(mut self) {
        self.finish_in_place();
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    fn finish_in_place(&mut self) {
        if !self.finished {
            self.finished = true;
            self.tracker.end();
        }
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("operation abandoned before completion");
            self.finish_in_place();
        }
    }
}
