//! Shared data model for the task-graph processing engine: tasks, batches,
//! tile addressing, the job configuration contract, and the error/concurrency
//! primitives the engine and its executors build on.

pub mod batch;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod task;
pub mod tile;

pub use batch::{TaskBatch, TileTaskBatch};
pub use concurrency::ConcurrencyLimits;
pub use config::{BaselevelSpec, JobConfig, ProcessingMode, ZoomLevels};
pub use error::{EngineError, Result};
pub use task::{InterpolateFrom, Progress, ProfilingSample, Status, Task, TaskKind, TaskOutput, TaskResult};
pub use tile::{Bounds, ResamplingMethod, TileAddress, TilePyramid, XyzPyramid};
