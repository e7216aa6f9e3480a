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

//! Ordered, one-at-a-time async task runner.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::Future;

use crate::error::ClientError;
use crate::sync::CompletionSignal;

/// An ordered, at-most-one-in-flight asynchronous task runner.
///
/// Every peer owns one queue; operations submitted against the peer run
/// strictly in submission order and never interleave, even though each
/// operation suspends while waiting on network or engine events. A failing
/// item reports its error only to its own handle; the next queued item
/// still runs.
///
/// The driver task is spawned on demand and exits once the backlog drains;
/// there is no persistent background worker.
#[derive(Debug, Clone)]
pub struct SerialQueue {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
}

struct State {
    backlog: VecDeque<BoxFuture<'static, ()>>,
    running: bool,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("backlog_len", &self.backlog.len())
            .field("running", &self.running)
            .finish()
    }
}

impl SerialQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    backlog: VecDeque::new(),
                    running: false,
                }),
            }),
        }
    }

    /// Append `op` to the backlog and return a handle that resolves with
    /// `op`'s own outcome.
    ///
    /// The operation runs whether or not the handle is awaited; dropping
    /// the handle only drops the observation.
    pub fn submit<T, F>(&self, op: F) -> impl Future<Output = Result<T, ClientError>>
    where
        T: Clone + Send + 'static,
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let handle = CompletionSignal::new();
        let done = handle.clone();
        let item: BoxFuture<'static, ()> = Box::pin(async move {
            match op.await {
                Ok(value) => {
                    done.try_set_result(value);
                }
                Err(error) => {
                    done.try_set_error(error);
                }
            }
        });

        let start_driver = {
            let mut state = self.inner.state.lock().unwrap();
            state.backlog.push_back(item);
            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        };
        if start_driver {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                drain(inner).await;
            });
        }

        async move { handle.wait().await }
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Run backlog items to completion in order until the queue empties.
///
/// The pop and the running-flag reset share one lock acquisition, so a
/// concurrent submit either sees `running == true` or finds an empty
/// backlog after this driver has exited.
async fn drain(inner: Arc<Inner>) {
    loop {
        let next = {
            let mut state = inner.state.lock().unwrap();
            match state.backlog.pop_front() {
                Some(item) => item,
                None => {
                    state.running = false;
                    return;
                }
            }
        };
        next.await;
    }
}
