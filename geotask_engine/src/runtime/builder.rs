//! Builder pattern for constructing `JobRuntime` instances.

use super::{EventBus, JobRuntime, RuntimeInner};
use crate::ProgressFactory;
use geotask_core::ConcurrencyLimits;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

/// Builder for a customized `JobRuntime` (§4.6, §4.7 "observer" substrate).
///
/// # Examples
///
/// ```no_run
/// use geotask_engine::JobRuntime;
///
/// let runtime = JobRuntime::builder().silent_progress(true).build();
/// ```
pub struct RuntimeBuilder {
	concurrency: Option<ConcurrencyLimits>,
	silent: bool,
}

impl RuntimeBuilder {
	pub fn new() -> Self {
		Self {
			concurrency: None,
			silent: false,
		}
	}

	/// Override the worker-count hints an executor backend derives its pool
	/// sizes from (§4.4). Defaults to `ConcurrencyLimits::default()`.
	pub fn concurrency(mut self, limits: ConcurrencyLimits) -> Self {
		self.concurrency = Some(limits);
		self
	}

	/// Suppress the stderr progress bar; progress events are still emitted
	/// on the event bus.
	pub fn silent_progress(mut self, silent: bool) -> Self {
		self.silent = silent;
		self
	}

	pub fn build(self) -> JobRuntime {
		let event_bus = EventBus::new();
		let progress_factory = Mutex::new(ProgressFactory::new(event_bus.clone(), self.silent));
		let concurrency = self.concurrency.unwrap_or_default();

		JobRuntime {
			inner: Arc::new(RuntimeInner {
				concurrency,
				event_bus,
				progress_factory,
				cancelled: AtomicBool::new(false),
			}),
		}
	}
}

impl Default for RuntimeBuilder {
	fn default() -> Self {
		Self::new()
	}
}
