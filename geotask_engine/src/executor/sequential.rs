//! The simplest backend (§4.4): run every task on the calling thread, one
//! at a time. Useful as a baseline and for debugging — no thread pool, no
//! scheduling surprises.

use super::Executor;
use crate::JobRuntime;
use async_trait::async_trait;
use geotask_core::{Task, TaskResult};

pub struct SequentialExecutor;

#[async_trait]
impl Executor for SequentialExecutor {
	async fn run(&self, tasks: Vec<Task>, runtime: &JobRuntime) -> Vec<TaskResult> {
		let mut results = Vec::with_capacity(tasks.len());
		for task in tasks {
			if runtime.is_cancelled() {
				results.push(TaskResult::cancelled(task.id.clone(), None));
				continue;
			}
			results.push(super::execute_profiled(task));
		}
		results
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
	async fn runs_every_task() {
		let executor = SequentialExecutor;
		let runtime = JobRuntime::new_silent();
		let results = executor.run(vec![task("a"), task("b")], &runtime).await;
		assert_eq!(results.len(), 2);
		assert!(results.iter().all(|r| r.processed));
	}

	#[tokio::test]
	async fn skips_remaining_tasks_once_cancelled() {
		let executor = SequentialExecutor;
		let runtime = JobRuntime::new_silent();
		runtime.cancel();
		let results = executor.run(vec![task("a")], &runtime).await;
		assert!(results[0].cancelled);
	}
}
