//! Dataflow backend (§4.4): spawns every task in a generation onto a
//! `JoinSet` up front rather than bounding in-flight work with a semaphore,
//! the way a streaming scheduler (dask-style) lets tasks start the moment
//! they're submitted and relies on the tasks themselves for backpressure.
//! `concurrency` only bounds how many spawns are queued per submission
//! round, keeping a very large generation from flooding the runtime all at
//! once.

use super::Executor;
use crate::JobRuntime;
use async_trait::async_trait;
use geotask_core::{Task, TaskResult};
use tokio::task::JoinSet;

pub struct DataflowExecutor {
	batch_size: usize,
}

impl DataflowExecutor {
	pub fn new(batch_size: usize) -> Self {
		Self {
			batch_size: batch_size.max(1),
		}
	}
}

#[async_trait]
impl Executor for DataflowExecutor {
	async fn run(&self, tasks: Vec<Task>, runtime: &JobRuntime) -> Vec<TaskResult> {
		let mut results = Vec::with_capacity(tasks.len());
		for chunk in tasks.chunks(self.batch_size) {
			let mut join_set = JoinSet::new();
			for task in chunk.to_vec() {
				if runtime.is_cancelled() {
					results.push(TaskResult::cancelled(task.id.clone(), None));
					continue;
				}
				join_set.spawn(async move { super::execute_profiled(task) });
			}
			while let Some(outcome) = join_set.join_next().await {
				match outcome {
					Ok(result) => results.push(result),
					Err(join_err) => results.push(TaskResult::failure("unknown", None, join_err)),
				}
			}
		}
		results
	}
}
