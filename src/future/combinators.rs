//! `all` / `race` / `allSettled` / `concurrent(limit)` / `batch(size)`.
//! The first three operate over already-started futures (either flavor,
//! via [`AnyFuture`]); the latter two operate over ordered thunks that
//! produce a future when invoked.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, FuturesUnordered, StreamExt};

use super::atomic::AtomicFuture;
use super::cancellable::CancellableFuture;
use crate::error::FsError;

/// A future that may be either of the engine's two future flavors, so the
/// combinators can take a mixed list. Cancelling an `AnyFuture::Atomic` is
/// a no-op, since atomic operations can't be cancelled.
pub enum AnyFuture<T: Clone + Send + Sync + 'static> {
    Atomic(AtomicFuture<T>),
    Cancellable(CancellableFuture<T>),
}

impl<T: Clone + Send + Sync + 'static> AnyFuture<T> {
    /// Cancels the underlying future if it is cancellable; a no-op
    /// otherwise.
    pub fn cancel(&self) {
        if let AnyFuture::Cancellable(f) = self {
            f.cancel();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for AnyFuture<T> {
    fn clone(&self) -> Self {
        match self {
            AnyFuture::Atomic(f) => AnyFuture::Atomic(f.clone()),
            AnyFuture::Cancellable(f) => AnyFuture::Cancellable(f.clone()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> From<AtomicFuture<T>> for AnyFuture<T> {
    fn from(f: AtomicFuture<T>) -> Self {
        AnyFuture::Atomic(f)
    }
}

impl<T: Clone + Send + Sync + 'static> From<CancellableFuture<T>> for AnyFuture<T> {
    fn from(f: CancellableFuture<T>) -> Self {
        AnyFuture::Cancellable(f)
    }
}

impl<T: Clone + Send + Sync + 'static> Future for AnyFuture<T> {
    type Output = Result<T, FsError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this {
            AnyFuture::Atomic(f) => Pin::new(f).poll(cx),
            AnyFuture::Cancellable(f) => Pin::new(f).poll(cx).map(|r| r.into_result()),
        }
    }
}

/// The outcome record `allSettled` produces for each input future.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Fulfilled(T),
    Rejected(FsError),
}

impl<T> Outcome<T> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }
}

/// Fulfills with the positionally-indexed results once every future has
/// fulfilled; rejects with the first rejection observed, cancelling the
/// remaining (cancellable) futures at that point.
pub async fn all<T: Clone + Send + Sync + 'static>(futures: Vec<AnyFuture<T>>) -> Result<Vec<T>, FsError> {
    let siblings = futures.clone();
    let len = futures.len();
    let mut remaining: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, fut)| async move { (index, fut.await) })
        .collect();

    let mut results: Vec<Option<T>> = (0..len).map(|_| None).collect();
    while let Some((index, outcome)) = remaining.next().await {
        match outcome {
            Ok(value) => results[index] = Some(value),
            Err(err) => {
                for sibling in &siblings {
                    sibling.cancel();
                }
                return Err(err);
            }
        }
    }
    Ok(results.into_iter().map(|v| v.expect("all positions filled")).collect())
}

/// Settles with whichever input future settles first.
///
/// # Panics
/// Panics if `futures` is empty, mirroring `Promise.race([])` never
/// settling being an unusable degenerate case for an `.await`-based API.
pub async fn race<T: Clone + Send + Sync + 'static>(futures: Vec<AnyFuture<T>>) -> Result<T, FsError> {
    assert!(!futures.is_empty(), "race requires at least one future");
    let mut unordered: FuturesUnordered<_> = futures.into_iter().collect();
    unordered.next().await.expect("at least one future was provided")
}

/// Fulfills with an outcome record per input future, in positional order;
/// never rejects.
pub async fn all_settled<T: Clone + Send + Sync + 'static>(futures: Vec<AnyFuture<T>>) -> Vec<Outcome<T>> {
    let len = futures.len();
    let mut remaining: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, fut)| async move { (index, fut.await) })
        .collect();

    let mut results: Vec<Option<Outcome<T>>> = (0..len).map(|_| None).collect();
    while let Some((index, outcome)) = remaining.next().await {
        results[index] = Some(match outcome {
            Ok(value) => Outcome::Fulfilled(value),
            Err(err) => Outcome::Rejected(err),
        });
    }
    results.into_iter().map(|v| v.expect("all positions filled")).collect()
}

/// Runs `tasks` with at most `limit` in flight at any moment; results are
/// returned in task order, not completion order. Rejection of any task
/// immediately rejects the combinator; tasks not yet started are simply
/// never invoked (in-flight ones may continue running, detached).
pub async fn concurrent<T, Task, Fut>(tasks: Vec<Task>, limit: usize) -> Result<Vec<T>, FsError>
where
    T: Send + 'static,
    Task: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, FsError>> + Send + 'static,
{
    let limit = limit.max(1);
    let mut stream = stream::iter(tasks.into_iter().map(|task| task())).buffered(limit);

    let mut results = Vec::new();
    while let Some(outcome) = stream.next().await {
        results.push(outcome?);
    }
    Ok(results)
}

/// Partitions `tasks` into consecutive groups of `size`; each group runs
/// fully in parallel before the next group starts. Results are aggregated
/// in task order.
pub async fn batch<T, Task, Fut>(tasks: Vec<Task>, size: usize) -> Result<Vec<T>, FsError>
where
    T: Send + 'static,
    Task: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, FsError>> + Send + 'static,
{
    let size = size.max(1);
    let mut results = Vec::with_capacity(tasks.len());
    let mut tasks = tasks.into_iter();
    loop {
        let chunk: Vec<Task> = (&mut tasks).take(size).collect();
        if chunk.is_empty() {
            break;
        }
        let chunk_futures: Vec<Fut> = chunk.into_iter().map(|task| task()).collect();
        for outcome in futures::future::join_all(chunk_futures).await {
            results.push(outcome?);
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::atomic::ThenOutcome;

    fn atomic_ok(v: u32) -> AnyFuture<u32> {
        AnyFuture::Atomic(AtomicFuture::resolved(v))
    }

    fn atomic_err(op: &'static str) -> AnyFuture<u32> {
        AnyFuture::Atomic(AtomicFuture::rejected(FsError::NotFound { op, path: "/x".into() }))
    }

    #[tokio::test]
    async fn all_preserves_order() {
        let result = all(vec![atomic_ok(1), atomic_ok(2), atomic_ok(3)]).await.unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn all_rejects_with_first_error() {
        let result = all(vec![atomic_ok(1), atomic_err("read"), atomic_ok(3)]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn all_cancels_cancellable_siblings_on_rejection() {
        let cancellable: CancellableFuture<u32> = CancellableFuture::pending();
        let sibling = cancellable.clone();
        let result = all(vec![atomic_err("read"), AnyFuture::Cancellable(cancellable)]).await;
        assert!(result.is_err());
        assert!(sibling.is_cancelled());
    }

    #[tokio::test]
    async fn race_settles_with_first() {
        let result = race(vec![atomic_ok(1), atomic_ok(2)]).await.unwrap();
        assert!(result == 1 || result == 2);
    }

    #[tokio::test]
    async fn all_settled_preserves_order_and_never_rejects() {
        let outcomes = all_settled(vec![atomic_ok(1), atomic_err("read"), atomic_ok(3)]).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_fulfilled());
        assert!(!outcomes[1].is_fulfilled());
        assert!(outcomes[2].is_fulfilled());
    }

    #[tokio::test]
    async fn concurrent_respects_task_order() {
        let tasks: Vec<_> = (0..10u32)
            .map(|i| move || async move { Ok::<_, FsError>(i) })
            .collect();
        let result = concurrent(tasks, 3).await.unwrap();
        assert_eq!(result, (0..10u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn batch_runs_in_groups_preserving_order() {
        let tasks: Vec<_> = (0..7u32)
            .map(|i| move || async move { Ok::<_, FsError>(i) })
            .collect();
        let result = batch(tasks, 3).await.unwrap();
        assert_eq!(result, (0..7u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn then_still_usable_alongside_combinators() {
        let fut = AtomicFuture::pending();
        let chained = fut.then(|v: u32| ThenOutcome::Value(v * 2), ThenOutcome::Error);
        fut.resolve(21);
        assert_eq!(chained.await.unwrap(), 42);
    }
}
