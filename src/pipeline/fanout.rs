//! Ordered scatter-gather.
//!
//! Runs one future per input with at most `limit` in flight and joins the
//! outputs back into input order, regardless of completion order. A future
//! that fails only affects its own slot: callers map failures into the
//! output type before handing the future over.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Apply `task` to every item concurrently; outputs align with `items`.
///
/// A `limit` of zero is treated as one.
pub async fn scatter_gather<I, T, F, Fut>(items: I, limit: usize, task: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(task)
        .buffered(limit.max(1))
        .collect()
        .await
}
