/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Single-shot completion signal with replay semantics.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::ClientError;

/// A single-shot, multi-waiter future with idempotent resolution.
///
/// The signal holds at most one terminal outcome. The first
/// [`try_set_result`](Self::try_set_result) or
/// [`try_set_error`](Self::try_set_error) call wins; every later call is a
/// no-op that returns `false` and never alters the stored outcome.
/// [`wait`](Self::wait) hands a clone of the outcome to any number of
/// callers, including callers that arrive after resolution. The signal is
/// a memoized terminal state, not a queue.
///
/// No timeout is built in; callers impose their own.
#[derive(Debug)]
pub struct CompletionSignal<T> {
    inner: Arc<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    outcome: Mutex<Option<Result<T, ClientError>>>,
    notify: Notify,
}

impl<T: Clone> CompletionSignal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                outcome: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Resolve with a value. Returns `true` iff this call performed the
    /// (only) resolution.
    pub fn try_set_result(&self, value: T) -> bool {
        self.try_set(Ok(value))
    }

    /// Resolve with an error. Returns `true` iff this call performed the
    /// (only) resolution.
    pub fn try_set_error(&self, error: ClientError) -> bool {
        self.try_set(Err(error))
    }

    fn try_set(&self, outcome: Result<T, ClientError>) -> bool {
        let mut slot = self.inner.outcome.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        drop(slot);
        self.inner.notify.notify_waiters();
        true
    }

    /// Wait for the resolved value, or replay it if already resolved.
    pub async fn wait(&self) -> Result<T, ClientError> {
        loop {
            // Register interest before checking, so a resolution between
            // the check and the await still wakes us.
            let notified = self.inner.notify.notified();
            if let Some(outcome) = self.inner.outcome.lock().unwrap().clone() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Whether the signal has already been resolved.
    pub fn is_resolved(&self) -> bool {
        self.inner.outcome.lock().unwrap().is_some()
    }
}

impl<T: Clone> Default for CompletionSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CompletionSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
