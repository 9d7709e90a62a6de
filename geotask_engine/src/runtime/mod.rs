//! The observer substrate shared across a job's graph builder, resolver,
//! executor and tile-task runtime (§4.6, §4.7):
//! - Global processing parameters (concurrency hints, cancellation flag)
//! - Unified event bus (logs, progress, status, warnings, errors)
//! - Progress bar factory (create multiple independent progress bars)
//!
//! # Example
//!
//! ```no_run
//! use geotask_engine::JobRuntime;
//!
//! let runtime = JobRuntime::builder()
//!     .silent_progress(true)
//!     .build();
//!
//! runtime.events().subscribe(|event| {
//!     println!("{:?}", event);
//! });
//!
//! let progress = runtime.create_progress("Processing", 1000);
//! progress.inc(100);
//! progress.finish();
//! ```

mod builder;
mod events;
mod inner;
mod outer;

pub use builder::RuntimeBuilder;
pub use events::{Event, EventBus, ListenerId, LogAdapter, LogLevel};
pub use inner::RuntimeInner;
pub use outer::JobRuntime;
