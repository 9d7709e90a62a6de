//! Executor backends (§4.4): four ways to run the tasks of one generation,
//! all behind the same trait so the job runner doesn't care which is active.

mod dataflow;
mod processes;
mod sequential;
mod threads;

pub use dataflow::DataflowExecutor;
pub use processes::ProcessesExecutor;
pub use sequential::SequentialExecutor;
pub use threads::ThreadsExecutor;

use crate::JobRuntime;
use async_trait::async_trait;
use geotask_core::{ProfilingSample, Task, TaskResult};
use std::time::Instant;

/// Runs the tasks of one generation and reports each result as it completes
/// (§4.4, §4.6). Implementations decide how much parallelism to use and
/// whether to keep going after a task fails; `runtime.is_cancelled()` is
/// always honoured between tasks.
#[async_trait]
pub trait Executor: Send + Sync {
	async fn run(&self, tasks: Vec<Task>, runtime: &JobRuntime) -> Vec<TaskResult>;
}

/// Wrap `task.execute()` with the profiler every backend wraps its user
/// function with (§4.4): wall-clock time is always available; peak memory
/// and network byte/request counts would need a sampling allocator or an I/O
/// instrumentation layer this workspace doesn't carry, so those fields stay
/// `None` rather than being fabricated.
pub(crate) fn execute_profiled(task: Task) -> TaskResult {
	let start = Instant::now();
	let mut result = task.execute();
	result.profiling = Some(ProfilingSample {
		wall_time: start.elapsed(),
		..Default::default()
	});
	result
}

/// Picks a backend by name, the way a job config would select one from its
/// `concurrency.method` setting (§6). `chunksize` only affects the dataflow
/// backend, where it bounds how many spawns are queued per submission round
/// (§4.4); the other backends size their own pool from `runtime.concurrency()`.
pub fn backend_by_name(name: &str, runtime: &JobRuntime, chunksize: Option<usize>) -> anyhow::Result<Box<dyn Executor>> {
	match name {
		"sequential" => Ok(Box::new(SequentialExecutor)),
		"threads" => Ok(Box::new(ThreadsExecutor::new(runtime.concurrency().cpu_bound))),
		"processes" => Ok(Box::new(ProcessesExecutor::new(runtime.concurrency().cpu_bound))),
		"dataflow" => Ok(Box::new(DataflowExecutor::new(chunksize.unwrap_or(runtime.concurrency().mixed)))),
		other => anyhow::bail!(geotask_core::error::EngineError::Config(format!("unknown executor backend '{other}'"))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use geotask_core::TaskKind;
	use std::sync::Arc;

	#[test]
	fn rejects_unknown_backend_name() {
		let runtime = JobRuntime::new_silent();
		let err = backend_by_name("quantum", &runtime, None).unwrap_err();
		assert!(err.to_string().contains("unknown executor backend"));
	}

	#[test]
	fn execute_profiled_attaches_wall_time() {
		let func = Arc::new(|_id: &str, _a: &_, _k: &_, _d: &_| Ok(geotask_core::TaskOutput::Value(serde_json::json!(1))));
		let task = Task::new("t", TaskKind::Preprocessing, func, None, None).unwrap();
		let result = execute_profiled(task);
		assert!(result.processed);
		assert!(result.profiling.is_some());
	}
}
