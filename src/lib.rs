//! An asynchronous filesystem operations engine: a two-tier future
//! abstraction (atomic vs. cancellable), a cooperative single-threaded
//! event loop, a streaming engine for chunked and line-oriented I/O, and
//! a polling path watcher.
//!
//! The public surface applications reach for is [`facade`] — thin free
//! functions backed by a process-wide [`handler::FsHandler`]. Code that
//! wants an explicit, per-test handler instead of the global singleton
//! can build one with [`handler::FsHandler::new`].
//!
//! # Example
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use portal_fs::{facade, options::WriteOptions};
//!
//! facade::write("notes.txt", bytes::Bytes::from_static(b"hi"), WriteOptions::default()).await?;
//! let data = facade::read("notes.txt", Default::default()).await?;
//! assert_eq!(data, bytes::Bytes::from_static(b"hi"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event_loop;
pub mod facade;
pub mod fs_primitives;
pub mod future;
pub mod handler;
pub mod lazy_sequence;
pub mod options;
pub mod stream;
pub mod watcher;

pub use error::FsError;
pub use future::{AnyFuture, AtomicFuture, CancellableFuture, CancellableResult, Outcome, ThenOutcome};
pub use handler::FsHandler;
