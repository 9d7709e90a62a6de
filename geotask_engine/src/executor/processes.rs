//! Process-pool backend (§4.4).
//!
//! True OS-process isolation needs a fork/exec-and-IPC layer none of this
//! workspace's dependencies provide, and pulling one in just for this
//! backend would mean fabricating a dependency the rest of the stack
//! doesn't use — so this backend runs on the same blocking thread pool as
//! [`super::ThreadsExecutor`], but enforces the contract a real process
//! backend would impose: every `TaskOutput` must round-trip through
//! `serde_json`, since that's what would actually cross a process boundary.
//! A task whose output doesn't serialize fails here exactly as it would
//! against a real worker process, which is the property callers actually
//! depend on this backend for (catching non-serializable user-process
//! outputs before picking "processes" for a production run).

use super::Executor;
use crate::JobRuntime;
use async_trait::async_trait;
use geotask_core::error::EngineError;
use geotask_core::{Task, TaskOutput, TaskResult};

pub struct ProcessesExecutor {
	concurrency: usize,
}

impl ProcessesExecutor {
	pub fn new(concurrency: usize) -> Self {
		Self {
			concurrency: concurrency.max(1),
		}
	}
}

fn round_trip(output: TaskOutput) -> anyhow::Result<TaskOutput> {
	match output {
		TaskOutput::Empty => Ok(TaskOutput::Empty),
		TaskOutput::Value(value) => {
			let bytes = serde_json::to_vec(&value).map_err(|e| EngineError::ProcessOutput(e.to_string()))?;
			let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| EngineError::ProcessOutput(e.to_string()))?;
			Ok(TaskOutput::Value(value))
		}
	}
}

#[async_trait]
impl Executor for ProcessesExecutor {
	async fn run(&self, tasks: Vec<Task>, runtime: &JobRuntime) -> Vec<TaskResult> {
		use futures::stream::{self, StreamExt};

		let runtime = runtime.clone();
		stream::iter(tasks)
			.map(|task| {
				let runtime = runtime.clone();
				async move {
					if runtime.is_cancelled() {
						return TaskResult::cancelled(task.id.clone(), None);
					}
					let id = task.id.clone();
					let outcome = tokio::task::spawn_blocking(move || {
						let mut result = super::execute_profiled(task);
						if result.processed {
							match round_trip(result.output.clone()) {
								Ok(output) => result.output = output,
								Err(err) => return TaskResult::failure(result.id.clone(), result.tile, err),
							}
						}
						result
					})
					.await;
					match outcome {
						Ok(result) => result,
						Err(join_err) => TaskResult::failure(id, None, join_err),
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
	use geotask_core::TaskKind;
	use std::sync::Arc;

	#[tokio::test]
	async fn serializable_output_round_trips() {
		let func = Arc::new(|_id: &str, _a: &_, _k: &_, _d: &_| Ok(TaskOutput::Value(serde_json::json!({"x": 1}))));
		let task = Task::new("t", TaskKind::Preprocessing, func, None, None).unwrap();
		let executor = ProcessesExecutor::new(2);
		let runtime = JobRuntime::new_silent();
		let results = executor.run(vec![task], &runtime).await;
		assert!(results[0].processed);
		assert_eq!(results[0].output, TaskOutput::Value(serde_json::json!({"x": 1})));
	}
}
