//! Thread-pool backend (§4.4): runs up to `concurrency` tasks at once on the
//! tokio blocking pool. Grounded on the `JoinSet`/`buffer_unordered` fan-out
//! pattern used to resample raster overviews concurrently.

use super::Executor;
use crate::JobRuntime;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use geotask_core::{Task, TaskResult};

pub struct ThreadsExecutor {
	concurrency: usize,
}

impl ThreadsExecutor {
	pub fn new(concurrency: usize) -> Self {
		Self {
			concurrency: concurrency.max(1),
		}
	}
}

#[async_trait]
impl Executor for ThreadsExecutor {
	async fn run(&self, tasks: Vec<Task>, runtime: &JobRuntime) -> Vec<TaskResult> {
		let runtime = runtime.clone();
		stream::iter(tasks)
			.map(|task| {
				let runtime = runtime.clone();
				async move {
					if runtime.is_cancelled() {
						return TaskResult::cancelled(task.id.clone(), None);
					}
					match tokio::task::spawn_blocking(move || super::execute_profiled(task)).await {
						Ok(result) => result,
						Err(join_err) => TaskResult::failure("unknown", None, join_err),
					}
				}
			})
			.buffer_unordered(self.concurrency)
			.collect()
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use geotask_core::{TaskKind, TaskOutput};
	use std::sync::Arc;

	fn task(id: &str) -> Task {
		let func = Arc::new(|_id: &str, _a: &_, _k: &_, _d: &_| Ok(TaskOutput::Value(serde_json::json!(1))));
		Task::new(id, TaskKind::Preprocessing, func, None, None).unwrap()
	}

	#[tokio::test]
	async fn runs_all_tasks_within_concurrency_cap() {
		let executor = ThreadsExecutor::new(2);
		let runtime = JobRuntime::new_silent();
		let tasks: Vec<Task> = (0..8).map(|i| task(&format!("t{i}"))).collect();
		let results = executor.run(tasks, &runtime).await;
		assert_eq!(results.len(), 8);
		assert!(results.iter().all(|r| r.processed));
	}
}
