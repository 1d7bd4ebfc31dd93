//! Bounded fan-out over a list of independent work items.
//!
//! Each item runs through the worker with at most `concurrency` items in
//! flight. A failing or panicking item is recorded against its row and the
//! rest of the batch carries on.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use tracing::{info, warn};

/// Items in flight at once when the caller does not say otherwise.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchItemStatus {
    Success,
    Error,
}

/// Outcome of one item, tagged with its position in the input.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult<R> {
    pub row_index: usize,
    pub status: BatchItemStatus,
    pub result: Option<R>,
    pub error: Option<String>,
}

impl<R> BatchItemResult<R> {
    fn success(row_index: usize, result: R) -> Self {
        Self {
            row_index,
            status: BatchItemStatus::Success,
            result: Some(result),
            error: None,
        }
    }

    fn failure(row_index: usize, error: String) -> Self {
        Self {
            row_index,
            status: BatchItemStatus::Error,
            result: None,
            error: Some(error),
        }
    }
}

/// Result of a whole batch run. `results` is in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress<R> {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult<R>>,
}

/// Run `worker` over every item with at most `concurrency` futures pending.
///
/// The worker receives the item's row index alongside the item. Results are
/// reordered by row index before returning, so completion order never leaks
/// out. A `concurrency` of 0 is treated as 1.
pub async fn run_bounded<T, R, E, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    worker: F,
) -> BatchProgress<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Display,
{
    let total = items.len();
    let concurrency = concurrency.max(1);
    info!("Batch start: {} items, concurrency {}", total, concurrency);

    let worker = &worker;
    let mut results: Vec<BatchItemResult<R>> = stream::iter(items.into_iter().enumerate())
        .map(|(row_index, item)| async move {
            let outcome = AssertUnwindSafe(async move { worker(row_index, item).await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(result)) => BatchItemResult::success(row_index, result),
                Ok(Err(e)) => {
                    warn!("Batch item {} failed: {}", row_index, e);
                    BatchItemResult::failure(row_index, e.to_string())
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!("Batch item {} panicked: {}", row_index, message);
                    BatchItemResult::failure(row_index, format!("Worker panicked: {}", message))
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    results.sort_by_key(|r| r.row_index);

    let succeeded = results
        .iter()
        .filter(|r| r.status == BatchItemStatus::Success)
        .count();
    let failed = results.len() - succeeded;
    info!(
        "Batch done: {} succeeded, {} failed out of {}",
        succeeded, failed, total
    );

    BatchProgress {
        total,
        completed: results.len(),
        succeeded,
        failed,
        results,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
