//! A minimal in-memory `JobConfig` used only by this crate's own tests.
//! Exercises the engine end to end without a real raster/vector I/O stack.

use geotask_core::config::{InputBinding, JobConfig, OutputReader, PreprocessingTaskSpec, ProcessFn, ProcessingMode};
use geotask_core::error::NoDataError;
use geotask_core::{BaselevelSpec, ResamplingMethod, TaskOutput, TileAddress, TilePyramid, XyzPyramid, ZoomLevels};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Stands in for a real tile sink: tiles it was seeded with (via
/// `MockJobConfig::with_output`) read back successfully; anything else fails
/// with the no-data sentinel, the way a real reader fails for a tile that was
/// never written (§4.5 steps 4/5 exercise this fallback path).
struct MockOutputReader {
	pyramid: XyzPyramid,
	written: Mutex<HashMap<TileAddress, TaskOutput>>,
}

impl OutputReader for MockOutputReader {
	fn read(&self, tile: TileAddress) -> anyhow::Result<TaskOutput> {
		self.written.lock().unwrap().get(&tile).cloned().ok_or_else(|| NoDataError.into())
	}

	fn pyramid(&self) -> &dyn TilePyramid {
		&self.pyramid
	}

	fn nodata(&self) -> Option<f64> {
		None
	}
}

pub struct MockJobConfig {
	pub pyramid: XyzPyramid,
	pub zoom_levels: ZoomLevels,
	pub baselevels: Option<BaselevelSpec>,
	pub preprocessing: Vec<PreprocessingTaskSpec>,
	output_reader: MockOutputReader,
}

impl MockJobConfig {
	pub fn new() -> Self {
		Self {
			pyramid: XyzPyramid::new(),
			zoom_levels: ZoomLevels::new(3..=6),
			baselevels: Some(BaselevelSpec {
				zooms: BTreeSet::from([4]),
				higher: ResamplingMethod::Bilinear,
				lower: ResamplingMethod::Average,
			}),
			preprocessing: Vec::new(),
			output_reader: MockOutputReader {
				pyramid: XyzPyramid::new(),
				written: Mutex::new(HashMap::new()),
			},
		}
	}

	pub fn without_baselevels(mut self) -> Self {
		self.baselevels = None;
		self
	}

	/// Switch the process/output pyramid to a metatiled one (§4.5 step 5's
	/// "output pyramid has a pixel buffer" branch).
	pub fn with_pixel_buffer(mut self) -> Self {
		self.pyramid = XyzPyramid::with_pixel_buffer();
		self.output_reader.pyramid = XyzPyramid::with_pixel_buffer();
		self
	}

	pub fn with_zoom_levels(mut self, zooms: impl IntoIterator<Item = u8>) -> Self {
		self.zoom_levels = ZoomLevels::new(zooms);
		self
	}

	pub fn with_preprocessing(mut self, tasks: Vec<PreprocessingTaskSpec>) -> Self {
		self.preprocessing = tasks;
		self
	}

	/// Seed the mock output sink as if `tile` had already been written.
	pub fn with_output(self, tile: TileAddress, output: TaskOutput) -> Self {
		self.output_reader.written.lock().unwrap().insert(tile, output);
		self
	}
}

impl Default for MockJobConfig {
	fn default() -> Self {
		Self::new()
	}
}

impl JobConfig for MockJobConfig {
	fn process_pyramid(&self) -> &dyn TilePyramid {
		&self.pyramid
	}

	fn output_pyramid(&self) -> &dyn TilePyramid {
		&self.pyramid
	}

	fn zoom_levels(&self) -> &ZoomLevels {
		&self.zoom_levels
	}

	fn baselevels(&self) -> Option<&BaselevelSpec> {
		self.baselevels.as_ref()
	}

	fn mode(&self) -> ProcessingMode {
		ProcessingMode::Overwrite
	}

	fn preprocessing_tasks_count(&self) -> usize {
		self.preprocessing.len()
	}

	fn preprocessing_tasks(&self) -> Vec<PreprocessingTaskSpec> {
		self.preprocessing.clone()
	}

	fn count_tiles(&self) -> usize {
		self.zoom_levels.iter().map(|z| self.tiles_for_zoom(z).len()).sum()
	}

	fn tiles_for_zoom(&self, zoom: u8) -> Vec<TileAddress> {
		let full = self.pyramid.tile_bounds(TileAddress::new(0, 0, 0));
		self.pyramid.tiles_from_bounds(full, zoom)
	}

	fn get_inputs_for_tile(&self, _tile: TileAddress) -> HashMap<String, InputBinding> {
		HashMap::new()
	}

	fn get_process_func_params(&self, _zoom: u8) -> HashMap<String, serde_json::Value> {
		HashMap::new()
	}

	fn output_reader(&self) -> &dyn OutputReader {
		&self.output_reader
	}

	fn output_params(&self) -> HashMap<String, serde_json::Value> {
		HashMap::new()
	}

	fn process(&self) -> ProcessFn {
		Arc::new(|ctx| Ok(TaskOutput::Value(serde_json::json!({ "zoom": ctx.tile.zoom }))))
	}

	fn resample_from_parent(&self, _tile: TileAddress, _parent: TaskOutput, method: ResamplingMethod) -> anyhow::Result<TaskOutput> {
		Ok(TaskOutput::Value(serde_json::json!({
			"resampled_from_parent": true,
			"method": format!("{method:?}"),
		})))
	}

	fn resample_from_children(
		&self,
		_tile: TileAddress,
		children: Vec<(TileAddress, TaskOutput)>,
		_method: ResamplingMethod,
	) -> anyhow::Result<TaskOutput> {
		Ok(TaskOutput::Value(serde_json::json!({ "mosaicked_children": children.len() })))
	}
}
