//! The atomic future: a single-assignment, FIFO-ordered continuation chain.
//!
//! A shared, clonable handle over a `Pending -> {Fulfilled, Rejected}`
//! state machine, with a `then` that either adopts a returned future
//! (flatMap) or fulfills with a plain value, and panics inside handlers
//! are caught and turned into rejections (the nearest Rust has to "if a
//! handler throws").

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::error::FsError;

type Continuation<T> = Box<dyn FnOnce(Result<T, FsError>) + Send>;

enum State<T> {
    Pending {
        wakers: Vec<Waker>,
        continuations: Vec<Continuation<T>>,
    },
    Fulfilled(T),
    Rejected(FsError),
}

impl<T> State<T> {
    fn new_pending() -> Self {
        State::Pending {
            wakers: Vec::new(),
            continuations: Vec::new(),
        }
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
}

/// A single-assignment future: starts `Pending`, settles exactly once into
/// `Fulfilled(value)` or `Rejected(error)`, and never changes state again.
///
/// Cloning an `AtomicFuture` gives another handle onto the same underlying
/// computation (it is reference-counted), which is what lets multiple
/// `then` chains observe the same settlement.
pub struct AtomicFuture<T: Clone + Send + Sync + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for AtomicFuture<T> {
    fn clone(&self) -> Self {
        AtomicFuture { inner: Arc::clone(&self.inner) }
    }
}

/// What a `then` handler produces: a plain value, an error, or another
/// future to adopt (flatMap).
pub enum ThenOutcome<U: Clone + Send + Sync + 'static> {
    Value(U),
    Error(FsError),
    Chain(AtomicFuture<U>),
}

impl<T: Clone + Send + Sync + 'static> AtomicFuture<T> {
    /// Creates a new future in the `Pending` state. The returned handle can
    /// both be `.await`ed and used to `resolve`/`reject` it — there is no
    /// separate resolver type, matching a promise-as-its-own-resolver
    /// shape.
    pub fn pending() -> Self {
        AtomicFuture {
            inner: Arc::new(Inner { state: Mutex::new(State::new_pending()) }),
        }
    }

    /// A future that is already `Fulfilled`.
    pub fn resolved(value: T) -> Self {
        AtomicFuture {
            inner: Arc::new(Inner { state: Mutex::new(State::Fulfilled(value)) }),
        }
    }

    /// A future that is already `Rejected`.
    pub fn rejected(error: FsError) -> Self {
        AtomicFuture {
            inner: Arc::new(Inner { state: Mutex::new(State::Rejected(error)) }),
        }
    }

    /// Transition `Pending -> Fulfilled(value)`. A no-op if already
    /// terminal: a resolve/reject from a terminal state is silently
    /// ignored rather than treated as an error.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Transition `Pending -> Rejected(error)`. A no-op if already terminal.
    pub fn reject(&self, error: FsError) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Result<T, FsError>) {
        let (wakers, continuations) = {
            let mut guard = self.inner.state.lock();
            if !matches!(&*guard, State::Pending { .. }) {
                return;
            }
            let prior = std::mem::replace(&mut *guard, State::new_pending());
            let (wakers, continuations) = match prior {
                State::Pending { wakers, continuations } => (wakers, continuations),
                _ => unreachable!(),
            };
            *guard = match &outcome {
                Ok(v) => State::Fulfilled(v.clone()),
                Err(e) => State::Rejected(e.clone()),
            };
            (wakers, continuations)
        };
        for waker in wakers {
            waker.wake();
        }
        // Continuations fire in FIFO registration order, each receiving an
        // independent clone of the settlement.
        for continuation in continuations {
            continuation(outcome.clone());
        }
    }

    /// Registers a continuation that fires exactly once, in registration
    /// order relative to siblings registered on the same future, with the
    /// settlement result. If the future is already settled the
    /// continuation fires immediately (synchronously, from the caller's
    /// point of view).
    pub(crate) fn on_settle(&self, continuation: Continuation<T>) {
        let immediate = {
            let mut guard = self.inner.state.lock();
            match &mut *guard {
                State::Pending { continuations, .. } => {
                    continuations.push(continuation);
                    None
                }
                State::Fulfilled(v) => Some(Ok(v.clone())),
                State::Rejected(e) => Some(Err(e.clone())),
            }
        };
        if let Some(outcome) = immediate {
            continuation(outcome);
        }
    }

    /// `then`: returns a new future that settles based on whichever handler
    /// runs. If a handler returns [`ThenOutcome::Chain`] the new future
    /// adopts that future's eventual settlement (flatMap); otherwise it
    /// settles directly with the returned value or error. A panicking
    /// handler rejects the new future instead of unwinding past it.
    pub fn then<U, Fo, Fr>(&self, on_fulfilled: Fo, on_rejected: Fr) -> AtomicFuture<U>
    where
        U: Clone + Send + Sync + 'static,
        Fo: FnOnce(T) -> ThenOutcome<U> + Send + 'static,
        Fr: FnOnce(FsError) -> ThenOutcome<U> + Send + 'static,
    {
        let next = AtomicFuture::<U>::pending();
        let settle_next = next.clone();
        self.on_settle(Box::new(move |outcome| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| match outcome {
                Ok(v) => on_fulfilled(v),
                Err(e) => on_rejected(e),
            }));
            match result {
                Ok(ThenOutcome::Value(v)) => settle_next.resolve(v),
                Ok(ThenOutcome::Error(e)) => settle_next.reject(e),
                Ok(ThenOutcome::Chain(fut)) => {
                    let forward = settle_next.clone();
                    fut.on_settle(Box::new(move |outcome| match outcome {
                        Ok(v) => forward.resolve(v),
                        Err(e) => forward.reject(e),
                    }));
                }
                Err(panic) => {
                    let msg = panic_message(&panic);
                    settle_next.reject(FsError::Other {
                        op: "then",
                        path: Default::default(),
                        source: std::io::Error::new(std::io::ErrorKind::Other, msg),
                    });
                }
            }
        }));
        next
    }

    /// `catch`: expressed in terms of `then` — only the rejection handler
    /// is meaningful, fulfillment passes through.
    pub fn catch<Fr>(&self, on_rejected: Fr) -> AtomicFuture<T>
    where
        Fr: FnOnce(FsError) -> ThenOutcome<T> + Send + 'static,
    {
        self.then(ThenOutcome::Value, on_rejected)
    }

    /// `finally`: runs `on_settled` on both paths without altering the
    /// propagated value, unless `on_settled` itself panics or the future
    /// was rejected (in which case the original rejection propagates
    /// after the side effect runs).
    pub fn finally<F>(&self, on_settled: F) -> AtomicFuture<T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let on_settled = Arc::new(on_settled);
        let on_fulfilled_hook = Arc::clone(&on_settled);
        let on_rejected_hook = on_settled;
        self.then(
            move |v| {
                on_fulfilled_hook();
                ThenOutcome::Value(v)
            },
            move |e| {
                on_rejected_hook();
                ThenOutcome::Error(e)
            },
        )
    }

    /// True once the future has left `Pending`.
    pub fn is_settled(&self) -> bool {
        !matches!(&*self.inner.state.lock(), State::Pending { .. })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in future continuation".to_string()
    }
}

impl<T: Clone + Send + Sync + 'static> Future for AtomicFuture<T> {
    type Output = Result<T, FsError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut guard = self.inner.state.lock();
        match &mut *guard {
            State::Pending { wakers, .. } => {
                wakers.push(cx.waker().clone());
                Poll::Pending
            }
            State::Fulfilled(v) => Poll::Ready(Ok(v.clone())),
            State::Rejected(e) => Poll::Ready(Err(e.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_with_value() {
        let fut = AtomicFuture::pending();
        fut.resolve(42u32);
        assert_eq!(fut.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn second_settlement_is_ignored() {
        let fut = AtomicFuture::pending();
        fut.resolve(1u32);
        fut.resolve(2u32);
        fut.reject(FsError::Cancelled);
        assert_eq!(fut.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn then_chains_a_value() {
        let fut = AtomicFuture::pending();
        let chained = fut.then(|v: u32| ThenOutcome::Value(v + 1), ThenOutcome::Error);
        fut.resolve(41);
        assert_eq!(chained.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn then_adopts_a_chained_future() {
        let fut = AtomicFuture::pending();
        let inner = AtomicFuture::pending();
        let chained = fut.then(
            {
                let inner = inner.clone();
                move |_: u32| ThenOutcome::Chain(inner)
            },
            ThenOutcome::Error,
        );
        fut.resolve(1);
        inner.resolve("done".to_string());
        assert_eq!(chained.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn continuations_fire_in_registration_order() {
        let fut = AtomicFuture::pending();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5u32 {
            let order = Arc::clone(&order);
            fut.then(
                move |v| {
                    order.lock().push(i);
                    ThenOutcome::Value(v)
                },
                ThenOutcome::Error,
            );
        }
        fut.resolve(0u32);
        tokio::task::yield_now().await;
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn catch_recovers_from_rejection() {
        let fut: AtomicFuture<u32> = AtomicFuture::pending();
        let recovered = fut.catch(|_| ThenOutcome::Value(7));
        fut.reject(FsError::Cancelled);
        assert_eq!(recovered.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn finally_runs_on_both_paths() {
        let ok_count = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let fut: AtomicFuture<u32> = AtomicFuture::pending();
        let c = Arc::clone(&ok_count);
        let observed = fut.finally(move || {
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        fut.resolve(5);
        assert_eq!(observed.await.unwrap(), 5);
        assert_eq!(ok_count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
