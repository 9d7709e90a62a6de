//! geotask_engine: builds and runs the task graph described by a `JobConfig`.
//!
//! This crate owns everything that's internal to the engine: the graph
//! builder (§4.1), the dependency resolver (§4.3), the executor backends
//! (§4.4), the tile-task runtime (§4.5), the observer substrate a job runs
//! under (§4.6/§4.7, `runtime`/`progress`), and the job lifecycle itself
//! (`job`). The value types travelling across the boundary to a job config
//! live in `geotask_core` instead, so a caller can depend on just the data
//! model without pulling in the scheduler.

mod executor;
mod graph;
mod job;
mod progress;
mod resolver;
mod runtime;
mod tile_task;

#[cfg(any(test, feature = "test"))]
pub mod test_support;

pub use executor::{backend_by_name, DataflowExecutor, Executor, ProcessesExecutor, SequentialExecutor, ThreadsExecutor};
pub use graph::{build_graph, Generation, Graph, TileGeneration};
pub use job::{run_job, JobEvent, JobOptions, Observer, RetryPolicy};
pub use progress::{ProgressFactory, ProgressHandle, ProgressId, ProgressState};
pub use resolver::{interpolation_dependencies, interpolation_for_zoom, resolve_preprocessing_dependencies};
pub use runtime::{Event, EventBus, JobRuntime, ListenerId, LogAdapter, LogLevel, RuntimeBuilder, RuntimeInner};
pub use tile_task::{execute_tile, TileBatchRole};
