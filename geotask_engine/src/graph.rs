//! Graph builder (§4.1): turns a job config into the ordered sequence of
//! batches the executor runs one generation at a time.
//!
//! Ordering (§4.1, see DESIGN.md for the §9 naming resolution):
//! 1. the preprocessing batch, if the job has any preprocessing tasks;
//! 2. the baselevel zooms, any order (they don't depend on each other);
//! 3. zooms above the highest baselevel, ascending — each depends on the
//!    zoom directly below it, already finished;
//! 4. zooms below the lowest baselevel, descending — each depends on the
//!    zoom directly above it, already finished.
//!
//! When the job has no baselevels, every configured zoom is independent and
//! is emitted as its own `Baselevel`-role batch; order between zooms doesn't
//! matter in that case, so ascending is used for determinism.

use crate::tile_task::{self, TileBatchRole};
use geotask_core::config::JobConfig;
use geotask_core::error::EngineError;
use geotask_core::{InterpolateFrom, Task, TaskKind, TileAddress, TileTaskBatch};
use geotask_derive::context;
use std::sync::Arc;

/// One tile batch plus the role its tasks play in the interpolation chain.
pub struct TileGeneration {
	pub zoom: u8,
	pub role: TileBatchRole,
	pub batch: TileTaskBatch,
}

/// A preprocessing generation, or one zoom's worth of tile tasks.
pub enum Generation {
	Preprocessing(geotask_core::TaskBatch),
	Tile(TileGeneration),
}

/// The ordered batch sequence the executor walks (§4.1).
pub struct Graph {
	pub generations: Vec<Generation>,
}

fn build_preprocessing_generation(config: &dyn JobConfig) -> anyhow::Result<Option<Generation>> {
	let specs = config.preprocessing_tasks();
	if specs.is_empty() {
		return Ok(None);
	}
	let mut tasks = Vec::with_capacity(specs.len());
	for spec in specs {
		let id = format!("{}:{}", spec.input_key, spec.task_key);
		let func_spec = spec.func.clone();
		let func = Arc::new(move |_id: &str, _args: &_, _kwargs: &_, _deps: &_| func_spec());
		let task = Task::new(id, TaskKind::Preprocessing, func, None, spec.bounds)?;
		tasks.push(task);
	}
	Ok(Some(Generation::Preprocessing(geotask_core::TaskBatch::new(tasks))))
}

/// Build the full ordered graph for `config` (§4.1). Each tile task closes
/// over a clone of `config` (an `Arc`, so this is cheap) rather than a
/// borrow, so the graph and the tasks it produces are `'static` and can be
/// handed to any executor backend, including one that moves them across a
/// `tokio::spawn` boundary (§4.4).
#[context("failed to build task graph")]
pub fn build_graph(config: Arc<dyn JobConfig>) -> anyhow::Result<Graph> {
	let mut generations = Vec::new();

	if let Some(preprocessing) = build_preprocessing_generation(config.as_ref())? {
		generations.push(preprocessing);
	}

	let zoom_levels = config.zoom_levels().clone();
	match config.baselevels().cloned() {
		None => {
			for zoom in zoom_levels.iter() {
				generations.push(build_zoom_generation(&config, zoom, TileBatchRole::Baselevel)?);
			}
		}
		Some(baselevels) => {
			for zoom in zoom_levels.iter().filter(|z| baselevels.contains(*z)) {
				generations.push(build_zoom_generation(&config, zoom, TileBatchRole::Baselevel)?);
			}
			for zoom in zoom_levels.iter().filter(|z| *z > baselevels.max()) {
				generations.push(build_zoom_generation(&config, zoom, TileBatchRole::Interpolated(InterpolateFrom::Higher))?);
			}
			let mut below: Vec<u8> = zoom_levels.iter().filter(|z| *z < baselevels.min()).collect();
			below.sort_unstable_by(|a, b| b.cmp(a));
			for zoom in below {
				generations.push(build_zoom_generation(&config, zoom, TileBatchRole::Interpolated(InterpolateFrom::Lower))?);
			}
		}
	}

	Ok(Graph { generations })
}

fn build_zoom_generation(config: &Arc<dyn JobConfig>, zoom: u8, role: TileBatchRole) -> anyhow::Result<Generation> {
	let tiles = config.tiles_for_zoom(zoom);
	anyhow::ensure!(
		tiles.iter().all(|t| t.zoom == zoom),
		EngineError::Config(format!("job config returned tiles outside zoom {zoom}"))
	);
	let mut entries = Vec::with_capacity(tiles.len());
	for tile in tiles {
		let task = build_tile_task(config, tile, role);
		entries.push((tile, task));
	}
	Ok(Generation::Tile(TileGeneration {
		zoom,
		role,
		batch: TileTaskBatch::new(zoom, entries),
	}))
}

fn build_tile_task(config: &Arc<dyn JobConfig>, tile: TileAddress, role: TileBatchRole) -> Task {
	let config = config.clone();
	let func: geotask_core::task::TaskFn = Arc::new(move |_id, _args, _kwargs, deps| tile_task::execute_tile(config.as_ref(), tile, role, deps));
	let id = tile.task_id();
	let bounds = config.process_pyramid().tile_bounds(tile);
	let mut task = Task::new(id, TaskKind::Tile, func, None, Some(bounds)).expect("bounds-only construction never fails");
	task.kwargs.insert("tile".to_string(), serde_json::json!({ "zoom": tile.zoom, "row": tile.row, "column": tile.column }));
	task
}
