//! A bounded, keyed pool of futures.
//!
//! At most `width` jobs are polled at once. Outcomes are handed back in
//! completion order. A panicking job becomes [`JobFailure::Panicked`] for its
//! own key only, and an optional deadline drops every unfinished job and
//! reports it as [`JobFailure::Cancelled`].

use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use futures::{stream, FutureExt, StreamExt};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{trace, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("cancelled at the run deadline")]
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundedPool {
    width: usize,
}

impl BoundedPool {
    pub const DEFAULT_WIDTH: usize = 5;

    /// A width of zero is treated as one.
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run every job and return `(key, outcome)` in completion order.
    ///
    /// `on_complete` sees each outcome as soon as it is recorded.
    pub async fn run<K, T, Fut, F>(
        &self,
        jobs: Vec<(K, Fut)>,
        deadline: Option<Instant>,
        mut on_complete: F,
    ) -> Vec<(K, Result<T, JobFailure>)>
    where
        Fut: Future<Output = T>,
        F: FnMut(&K, &Result<T, JobFailure>),
    {
        let total = jobs.len();
        let mut keys: Vec<Option<K>> = Vec::with_capacity(total);
        let mut futures = Vec::with_capacity(total);
        for (index, (key, fut)) in jobs.into_iter().enumerate() {
            keys.push(Some(key));
            futures.push(async move {
                let outcome = AssertUnwindSafe(fut)
                    .catch_unwind()
                    .await
                    .map_err(|payload| JobFailure::Panicked(panic_message(payload.as_ref())));
                (index, outcome)
            });
        }

        let mut completed = Vec::with_capacity(total);
        {
            let mut in_flight = stream::iter(futures).buffer_unordered(self.width);
            let drain = async {
                while let Some((index, outcome)) = in_flight.next().await {
                    if let Some(key) = keys[index].take() {
                        on_complete(&key, &outcome);
                        completed.push((key, outcome));
                    }
                }
            };

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, drain).await.is_err() {
                        warn!(
                            "Deadline reached with {} of {total} jobs unfinished",
                            keys.iter().filter(|k| k.is_some()).count()
                        );
                    }
                }
                None => drain.await,
            }
        }

        for key in keys.into_iter().flatten() {
            let outcome = Err(JobFailure::Cancelled);
            on_complete(&key, &outcome);
            completed.push((key, outcome));
        }
        trace!("Pool drained {total} jobs at width {}", self.width);
        completed
    }
}

impl Default for BoundedPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WIDTH)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
