use super::EventBus;
use crate::ProgressFactory;
use geotask_core::ConcurrencyLimits;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

pub struct RuntimeInner {
	pub concurrency: ConcurrencyLimits,
	pub event_bus: EventBus,
	pub progress_factory: Mutex<ProgressFactory>,
	pub cancelled: AtomicBool,
}
