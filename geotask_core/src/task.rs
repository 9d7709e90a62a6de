//! The task value objects (§3 "Data model").

use crate::error::CancelledError;
use crate::tile::{Bounds, TileAddress};
use geo::{BoundingRect, Geometry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One of the two kinds of task the graph builder produces (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
	Preprocessing,
	Tile,
}

/// A task's output, opaque to the engine except for the distinguished
/// "no-data" outcome (§3, §9 "Dynamic typing → tagged variants").
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
	/// "No output to write" — not an error (§7).
	Empty,
	/// An opaque payload. Tile-task outputs and preprocessing-task outputs
	/// both travel this way; only the process backend (§4.4) needs them to
	/// be serializable, which is why `serde_json::Value` rather than `Box<dyn Any>`.
	Value(serde_json::Value),
}

impl TaskOutput {
	pub fn is_empty(&self) -> bool {
		matches!(self, TaskOutput::Empty)
	}
}

/// A profiler sample riding along on a `TaskResult` (§4.4 "wrapping each user
/// function with optional profilers").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilingSample {
	pub wall_time: std::time::Duration,
	pub peak_memory_bytes: Option<u64>,
	pub requests: Option<u64>,
	pub bytes_transferred: Option<u64>,
}

/// The result of running one task (§3).
#[derive(Debug, Clone)]
pub struct TaskResult {
	pub id: String,
	pub output: TaskOutput,
	pub processed: bool,
	pub tile: Option<TileAddress>,
	pub profiling: Option<ProfilingSample>,
	/// Present when the task failed; carried alongside (not instead of) a
	/// placeholder `output` so observers can still see which tile it was.
	pub error: Option<String>,
	/// True when `error` specifically came from the cancellation sentinel
	/// (§7) rather than an ordinary task failure — the job runner needs this
	/// distinguished after the error has already been flattened to a string,
	/// since `cancel_on` has to keep matching past that point.
	pub cancelled: bool,
}

impl TaskResult {
	pub fn success(id: impl Into<String>, output: TaskOutput, tile: Option<TileAddress>) -> Self {
		Self {
			id: id.into(),
			output,
			processed: true,
			tile,
			profiling: None,
			error: None,
			cancelled: false,
		}
	}

	pub fn failure(id: impl Into<String>, tile: Option<TileAddress>, error: impl fmt::Display) -> Self {
		Self {
			id: id.into(),
			output: TaskOutput::Empty,
			processed: false,
			tile,
			profiling: None,
			error: Some(error.to_string()),
			cancelled: false,
		}
	}

	/// A task (or the executor polling for cancellation) hit the
	/// cancellation sentinel (§7). Not processed; `cancelled` is set so the
	/// job runner can tell it apart from an ordinary failure.
	pub fn cancelled(id: impl Into<String>, tile: Option<TileAddress>) -> Self {
		Self {
			id: id.into(),
			output: TaskOutput::Empty,
			processed: false,
			tile,
			profiling: None,
			error: Some(CancelledError.to_string()),
			cancelled: true,
		}
	}

	pub fn is_failure(&self) -> bool {
		self.error.is_some()
	}
}

/// Which direction a non-baselevel tile is interpolated from (§4.5, §9).
/// Named after the resampling method slot it uses (`baselevels.lower` /
/// `baselevels.higher`) rather than the zoom-order direction — see
/// DESIGN.md for why this naming was chosen over the ambiguous prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolateFrom {
	/// `tile.zoom < min(baselevels.zooms)`: mosaic the four children.
	Lower,
	/// `tile.zoom > max(baselevels.zooms)`: resample from the parent.
	Higher,
}

/// Job lifecycle states (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	Parsing,
	Initializing,
	Running,
	Retrying,
	PostProcessing,
	Done,
	Cancelled,
	Failed,
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Status::Parsing => "parsing",
			Status::Initializing => "initializing",
			Status::Running => "running",
			Status::Retrying => "retrying",
			Status::PostProcessing => "post_processing",
			Status::Done => "done",
			Status::Cancelled => "cancelled",
			Status::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// Monotonically non-decreasing (per attempt) progress counter (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
	pub current: u64,
	pub total: u64,
}

impl Progress {
	pub fn new(total: u64) -> Self {
		Self { current: 0, total }
	}

	pub fn inc(&mut self, delta: u64) {
		self.current = (self.current + delta).min(self.total);
	}

	pub fn is_complete(&self) -> bool {
		self.current >= self.total
	}
}

/// The callable a task invokes to produce its `TaskOutput` (§3 "func").
/// Takes the task's own id, args/kwargs and already-resolved dependencies so
/// it can run standalone, which is what the process-pool backend needs when
/// it reconstructs a task on the worker side.
pub type TaskFn = Arc<
	dyn Fn(&str, &[serde_json::Value], &HashMap<String, serde_json::Value>, &HashMap<String, TaskResult>) -> anyhow::Result<TaskOutput>
		+ Send
		+ Sync,
>;

/// A generic unit of work (§3). Tile tasks wrap additional state around one
/// of these (see `geotask_engine::tile_runtime::TileTask`) rather than
/// subclassing it, since Rust has no implementation inheritance.
#[derive(Clone)]
pub struct Task {
	pub id: String,
	pub kind: TaskKind,
	pub func: TaskFn,
	pub args: Vec<serde_json::Value>,
	pub kwargs: HashMap<String, serde_json::Value>,
	pub geometry: Option<Geometry<f64>>,
	pub bounds: Option<Bounds>,
	pub dependencies: HashMap<String, TaskResult>,
	pub result_key_name: String,
}

impl fmt::Debug for Task {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Task")
			.field("id", &self.id)
			.field("kind", &self.kind)
			.field("bounds", &self.bounds)
			.finish_non_exhaustive()
	}
}

impl Task {
	/// Construct a task from either a geometry or bounds (never both — see
	/// the invariant in §3).
	pub fn new(
		id: impl Into<String>,
		kind: TaskKind,
		func: TaskFn,
		geometry: Option<Geometry<f64>>,
		bounds: Option<Bounds>,
	) -> anyhow::Result<Self> {
		anyhow::ensure!(
			geometry.is_none() || bounds.is_none(),
			"only provide one of either 'geometry' or 'bounds'"
		);
		let (geometry, bounds) = match (geometry, bounds) {
			(Some(geom), None) => {
				let rect = geom.bounding_rect();
				let bounds = rect.map(|r| Bounds::new(r.min().x, r.min().y, r.max().x, r.max().y));
				(Some(geom), bounds)
			}
			(None, Some(b)) => (None, Some(b)),
			(None, None) => (None, None),
			(Some(_), Some(_)) => unreachable!("checked above"),
		};
		let id = id.into();
		let result_key_name = format!("{id}_result");
		Ok(Self {
			id,
			kind,
			func,
			args: Vec::new(),
			kwargs: HashMap::new(),
			geometry,
			bounds,
			dependencies: HashMap::new(),
			result_key_name,
		})
	}

	pub fn has_geometry(&self) -> bool {
		self.geometry.is_some() || self.bounds.is_some()
	}

	/// Merge newly-resolved dependencies into this task (§3 "mutated only by
	/// `add_dependencies`").
	pub fn add_dependencies(&mut self, dependencies: HashMap<String, TaskResult>) {
		self.dependencies.extend(dependencies);
	}

	/// Run the task's callable, producing a `TaskResult`. A no-data sentinel
	/// (§7) counts as success with an empty output, not a failure.
	pub fn execute(&self) -> TaskResult {
		match (self.func)(&self.id, &self.args, &self.kwargs, &self.dependencies) {
			Ok(output) => TaskResult::success(self.id.clone(), output, None),
			Err(err) if crate::error::is_cancelled(&err) => TaskResult::cancelled(self.id.clone(), None),
			Err(err) if crate::error::is_nodata(&err) => TaskResult::success(self.id.clone(), TaskOutput::Empty, None),
			Err(err) => TaskResult::failure(self.id.clone(), None, err),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn const_fn(value: i64) -> TaskFn {
		Arc::new(move |_id, _args, _kwargs, _deps| Ok(TaskOutput::Value(serde_json::json!(value))))
	}

	#[test]
	fn rejects_geometry_and_bounds_together() {
		let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0);
		let geom = Geometry::Point(geo::Point::new(0.5, 0.5));
		let err = Task::new("t", TaskKind::Preprocessing, const_fn(1), Some(geom), Some(bounds)).unwrap_err();
		assert!(err.to_string().contains("only provide one"));
	}

	#[test]
	fn derives_bounds_from_geometry() {
		let geom = Geometry::Point(geo::Point::new(1.0, 2.0));
		let task = Task::new("t", TaskKind::Preprocessing, const_fn(1), Some(geom), None).unwrap();
		assert_eq!(task.bounds, Some(Bounds::new(1.0, 2.0, 1.0, 2.0)));
	}

	#[test]
	fn result_key_name_defaults_from_id() {
		let task = Task::new("src1:fetch", TaskKind::Preprocessing, const_fn(1), None, None).unwrap();
		assert_eq!(task.result_key_name, "src1:fetch_result");
	}

	#[test]
	fn execute_wraps_func_output() {
		let task = Task::new("t", TaskKind::Preprocessing, const_fn(42), None, None).unwrap();
		let result = task.execute();
		assert!(result.processed);
		assert_eq!(result.output, TaskOutput::Value(serde_json::json!(42)));
	}

	#[test]
	fn execute_captures_errors() {
		let func: TaskFn = Arc::new(|_id, _a, _k, _d| anyhow::bail!("boom"));
		let task = Task::new("t", TaskKind::Preprocessing, func, None, None).unwrap();
		let result = task.execute();
		assert!(result.is_failure());
		assert_eq!(result.error.as_deref(), Some("boom"));
		assert!(!result.cancelled);
	}

	#[test]
	fn execute_distinguishes_cancellation_from_failure() {
		let func: TaskFn = Arc::new(|_id, _a, _k, _d| Err(anyhow::Error::new(CancelledError)));
		let task = Task::new("t", TaskKind::Preprocessing, func, None, None).unwrap();
		let result = task.execute();
		assert!(result.cancelled);
		assert!(!result.processed);
	}

	#[test]
	fn progress_clamps_at_total() {
		let mut p = Progress::new(3);
		p.inc(5);
		assert_eq!(p.current, 3);
		assert!(p.is_complete());
	}
}
