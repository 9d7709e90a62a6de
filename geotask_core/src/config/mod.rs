//! The job-configuration contract (§6 "Configuration (consumed)").
//!
//! Config file parsing, raster/vector I/O codecs, CRS reprojection, and the
//! tile-pyramid math itself are external collaborators (§1) — this module
//! only defines the trait the engine calls into and the small value types
//! (`ProcessingMode`, `ZoomLevels`, `BaselevelSpec`) that travel across that
//! boundary.

use crate::task::TaskOutput;
use crate::tile::{ResamplingMethod, TileAddress, TilePyramid};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// How the job is allowed to touch the output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
	ReadOnly,
	Continue,
	Overwrite,
	Memory,
}

/// The zoom levels a job is configured to touch, kept sorted for §4.1's
/// ascending/descending emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoomLevels(BTreeSet<u8>);

impl ZoomLevels {
	pub fn new(zooms: impl IntoIterator<Item = u8>) -> Self {
		Self(zooms.into_iter().collect())
	}

	pub fn contains(&self, zoom: u8) -> bool {
		self.0.contains(&zoom)
	}

	pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
		self.0.iter().copied()
	}

	pub fn min(&self) -> Option<u8> {
		self.0.iter().next().copied()
	}

	pub fn max(&self) -> Option<u8> {
		self.0.iter().next_back().copied()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl FromIterator<u8> for ZoomLevels {
	fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
		Self::new(iter)
	}
}

/// Baselevels: the zooms where the user process runs, plus the resampling
/// methods used to generate the other zooms (§4.5).
///
/// Implementation note: naming "ascending order" with "interpolate from
/// lower" and "descending order" with "interpolate from higher" is
/// ambiguous in isolation; this type and the tile runtime pair them the way
/// the worked end-to-end example does — see DESIGN.md for the reasoning.
#[derive(Debug, Clone)]
pub struct BaselevelSpec {
	pub zooms: BTreeSet<u8>,
	/// Resampling used when `tile.zoom > max(zooms)`: read the parent tile
	/// and resample down into this one.
	pub higher: ResamplingMethod,
	/// Resampling used when `tile.zoom < min(zooms)`: mosaic the four
	/// children and resample into this one.
	pub lower: ResamplingMethod,
}

impl BaselevelSpec {
	pub fn min(&self) -> u8 {
		*self.zooms.iter().next().expect("baselevels.zooms must not be empty")
	}

	pub fn max(&self) -> u8 {
		*self.zooms.iter().next_back().expect("baselevels.zooms must not be empty")
	}

	pub fn contains(&self, zoom: u8) -> bool {
		self.zooms.contains(&zoom)
	}
}

/// One input binding resolved for a tile: an opaque value plus any
/// preprocessing-task results attached to it (§4.3, §4.5 step 3).
#[derive(Debug, Clone, Default)]
pub struct InputBinding {
	pub input_key: String,
	pub value: serde_json::Value,
	/// Raw `"<input_key>:<task_key>"` keys this binding still needs resolved
	/// against the completed preprocessing-task results (§4.3). Populated by
	/// the job config, drained by the dependency resolver.
	pub dependency_keys: Vec<String>,
	pub preprocessing_results: HashMap<String, TaskOutput>,
}

impl InputBinding {
	pub fn new(input_key: impl Into<String>, value: serde_json::Value) -> Self {
		Self {
			input_key: input_key.into(),
			value,
			dependency_keys: Vec::new(),
			preprocessing_results: HashMap::new(),
		}
	}

	pub fn with_dependency_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
		self.dependency_keys = keys.into_iter().collect();
		self
	}

	pub fn set_preprocessing_task_result(&mut self, task_key: &str, result: TaskOutput) {
		self.preprocessing_results.insert(task_key.to_string(), result);
	}
}

/// The context handed to the user process callable (§6 "User-process contract").
#[derive(Debug, Clone)]
pub struct ProcessContext {
	pub tile: TileAddress,
	pub params: HashMap<String, serde_json::Value>,
	pub input: HashMap<String, InputBinding>,
	pub output_params: HashMap<String, serde_json::Value>,
}

/// The user-supplied process body. Returns a value, or fails with the
/// no-data sentinel (`geotask_core::error::NoDataError`) to signal "nothing
/// to write".
pub type ProcessFn = Arc<dyn Fn(&ProcessContext) -> anyhow::Result<TaskOutput> + Send + Sync>;

/// External collaborator: the already-written output sink (§6).
pub trait OutputReader: Send + Sync {
	fn read(&self, tile: TileAddress) -> anyhow::Result<TaskOutput>;
	fn pyramid(&self) -> &dyn TilePyramid;
	fn nodata(&self) -> Option<f64>;
}

/// The validated job configuration the engine is handed (§6).
pub trait JobConfig: Send + Sync {
	fn process_pyramid(&self) -> &dyn TilePyramid;
	fn output_pyramid(&self) -> &dyn TilePyramid;
	fn zoom_levels(&self) -> &ZoomLevels;
	fn baselevels(&self) -> Option<&BaselevelSpec>;
	fn mode(&self) -> ProcessingMode;

	fn preprocessing_tasks_count(&self) -> usize;
	/// `(input_key, task_key, bounds, callable)` triples; the resulting
	/// task's id is `<input_key>:<task_key>` per §3.
	fn preprocessing_tasks(&self) -> Vec<PreprocessingTaskSpec>;

	fn count_tiles(&self) -> usize;
	fn tiles_for_zoom(&self, zoom: u8) -> Vec<TileAddress>;

	fn get_inputs_for_tile(&self, tile: TileAddress) -> HashMap<String, InputBinding>;
	fn get_process_func_params(&self, zoom: u8) -> HashMap<String, serde_json::Value>;

	fn output_reader(&self) -> &dyn OutputReader;
	fn output_params(&self) -> HashMap<String, serde_json::Value>;

	fn process(&self) -> ProcessFn;

	/// Resample `parent` (already-processed output of `tile.parent()`) down
	/// into `tile` (§4.5 step 4, "interpolate from higher"). The actual
	/// raster/vector math is an external collaborator (§1); the engine only
	/// decides *when* to call this.
	fn resample_from_parent(&self, tile: TileAddress, parent: TaskOutput, method: ResamplingMethod) -> anyhow::Result<TaskOutput>;

	/// Mosaic and resample `children` (already-processed outputs of up to
	/// four of `tile`'s children) into `tile` (§4.5 step 5, "interpolate from
	/// lower"). Children missing from the pyramid edge are simply absent.
	fn resample_from_children(
		&self,
		tile: TileAddress,
		children: Vec<(TileAddress, TaskOutput)>,
		method: ResamplingMethod,
	) -> anyhow::Result<TaskOutput>;
}

/// One preprocessing task as described by the job config (§4.1).
#[derive(Clone)]
pub struct PreprocessingTaskSpec {
	pub input_key: String,
	pub task_key: String,
	pub bounds: Option<crate::tile::Bounds>,
	pub func: Arc<dyn Fn() -> anyhow::Result<TaskOutput> + Send + Sync>,
}

impl std::fmt::Debug for PreprocessingTaskSpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PreprocessingTaskSpec")
			.field("input_key", &self.input_key)
			.field("task_key", &self.task_key)
			.field("bounds", &self.bounds)
			.finish_non_exhaustive()
	}
}
