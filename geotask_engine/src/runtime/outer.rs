use super::{EventBus, RuntimeBuilder, RuntimeInner};
use crate::ProgressHandle;
use geotask_core::{ConcurrencyLimits, Status};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// The observer substrate shared by every component of a running job (§4.6,
/// §4.7): an event bus for logs/progress/status, a progress-bar factory, the
/// worker-count hints executors size their pools from, and the one piece of
/// mutable shared state every component needs to see promptly — whether the
/// job has been cancelled.
///
/// Once created, cheap to clone (Arc-based) and safe to share across async
/// tasks, threads and executor backends.
#[derive(Clone)]
pub struct JobRuntime {
	pub(crate) inner: Arc<RuntimeInner>,
}

impl JobRuntime {
	/// Create a new runtime with default settings.
	///
	/// Equivalent to `JobRuntime::builder().build()`.
	#[must_use]
	pub fn new() -> Self {
		Self::builder().build()
	}

	#[must_use]
	pub fn new_silent() -> Self {
		Self::builder().silent_progress(true).build()
	}

	/// Create a builder for customizing runtime configuration.
	///
	/// # Examples
	///
	/// ```no_run
	/// use geotask_engine::JobRuntime;
	///
	/// let runtime = JobRuntime::builder().silent_progress(true).build();
	/// ```
	#[must_use]
	pub fn builder() -> RuntimeBuilder {
		RuntimeBuilder::default()
	}

	#[must_use]
	pub fn concurrency(&self) -> &ConcurrencyLimits {
		&self.inner.concurrency
	}

	/// Get the event bus.
	///
	/// Use the event bus to subscribe to runtime events or emit custom events.
	#[must_use]
	pub fn events(&self) -> &EventBus {
		&self.inner.event_bus
	}

	/// Create a progress bar for tracking a batch or a whole job.
	///
	/// # Examples
	///
	/// ```no_run
	/// # use geotask_engine::JobRuntime;
	/// let runtime = JobRuntime::new();
	/// let progress = runtime.create_progress("Processing", 1000);
	///
	/// for _ in 0..1000 {
	///     progress.inc(1);
	/// }
	///
	/// progress.finish();
	/// ```
	#[must_use]
	pub fn create_progress(&self, message: &str, total: u64) -> ProgressHandle {
		self.inner.progress_factory.lock().unwrap().create(message, total)
	}

	/// Request cancellation (§4.6). Idempotent; executors poll
	/// `is_cancelled()` between tasks and unwind with `CancelledError`.
	pub fn cancel(&self) {
		self.inner.cancelled.store(true, Ordering::SeqCst);
		self.events().warn("cancellation requested".to_string());
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.inner.cancelled.load(Ordering::SeqCst)
	}

	/// Record a job lifecycle transition (§4.6) on the event bus.
	pub fn set_status(&self, status: Status) {
		self.events().status(status);
	}
}

impl Default for JobRuntime {
	fn default() -> Self {
		Self::new()
	}
}
