//! The two-tier future abstraction: [`AtomicFuture`] is a plain
//! single-assignment future with FIFO continuation chaining;
//! [`CancellableFuture`] wraps one and adds a terminal `Cancelled` state
//! plus a cancel-handler slot. The distinction is kept visible at the
//! type level because it communicates operational semantics: callers can
//! tell from the type alone whether `cancel()` is meaningful.

pub mod atomic;
pub mod cancellable;
pub mod combinators;

pub use atomic::{AtomicFuture, ThenOutcome};
pub use cancellable::{CancellableFuture, CancellableResult};
pub use combinators::{all, all_settled, batch, concurrent, race, AnyFuture, Outcome};
