//! Dependency resolver (§4.3): fills in the results a task needs from
//! already-completed batches before it can run.
//!
//! Two unrelated things ride on the same "dependency" vocabulary and this
//! module keeps them apart:
//! - preprocessing-task results an input binding references by key
//!   (`"<input_key>:<task_key>"`, looked up from the single persistent
//!   preprocessing batch), and
//! - the sibling tile-task results a non-baselevel tile needs to interpolate
//!   from (looked up from the rolling adjacent-zoom batch).
//!
//! Tell the two apart by whether the task key starts with `"tile_task"`, so
//! a binding that accidentally references a tile task fails loudly instead
//! of silently resolving to nothing.

use geotask_core::config::InputBinding;
use geotask_core::error::EngineError;
use geotask_core::{BaselevelSpec, InterpolateFrom, TaskResult, TileAddress};
use geotask_derive::context;
use std::collections::HashMap;

/// Split a dependency key into `(input_key, task_key)` on the first `:`.
fn split_dependency_key(key: &str) -> anyhow::Result<(&str, &str)> {
	key.split_once(':')
		.ok_or_else(|| EngineError::DependencyKey(format!("malformed dependency key '{key}'")).into())
}

fn is_preprocessing_task_key(task_key: &str) -> bool {
	!task_key.starts_with("tile_task")
}

/// Resolve every pending `dependency_keys` entry on `bindings` against the
/// completed preprocessing-task results, keyed by full task id
/// (`<input_key>:<task_key>`, per §3). Errors with `EngineError::DependencyKey`
/// if a referenced task never ran.
#[context("failed to resolve preprocessing-task dependencies")]
pub fn resolve_preprocessing_dependencies(
	bindings: &mut HashMap<String, InputBinding>,
	completed: &HashMap<String, TaskResult>,
) -> anyhow::Result<()> {
	for binding in bindings.values_mut() {
		for key in std::mem::take(&mut binding.dependency_keys) {
			let (_input_key, task_key) = split_dependency_key(&key)?;
			if !is_preprocessing_task_key(task_key) {
				continue;
			}
			let result = completed
				.get(&key)
				.ok_or_else(|| EngineError::DependencyKey(format!("no completed task for key '{key}'")))?;
			binding.set_preprocessing_task_result(task_key, result.output.clone());
		}
	}
	Ok(())
}

/// Decide which direction (if any) `zoom` must interpolate from, given the
/// job's baselevels (§4.5 steps 4/5, §9 resolution note — see DESIGN.md for
/// how the "ascending"/"descending" naming ambiguity was resolved).
pub fn interpolation_for_zoom(zoom: u8, baselevels: &BaselevelSpec) -> Option<InterpolateFrom> {
	if baselevels.contains(zoom) {
		None
	} else if zoom > baselevels.max() {
		Some(InterpolateFrom::Higher)
	} else if zoom < baselevels.min() {
		Some(InterpolateFrom::Lower)
	} else {
		// Inside [min, max] but not itself a baselevel (baselevels are
		// normally contiguous with the zoom range, so this is an edge case):
		// treat it like the nearer side.
		let from_min = zoom - baselevels.min();
		let from_max = baselevels.max() - zoom;
		Some(if from_min <= from_max { InterpolateFrom::Higher } else { InterpolateFrom::Lower })
	}
}

/// Resolve the sibling results `tile` needs to interpolate (§4.5 steps 4/5):
/// the single parent result for `Higher`, the (up to four) child results for
/// `Lower`. Missing siblings are simply omitted — a tile at the pyramid edge
/// mosaics from however many children actually exist. Keyed by task id,
/// ready to hand to `Task::add_dependencies`.
pub fn interpolation_dependencies(
	tile: TileAddress,
	from: InterpolateFrom,
	tile_results: &HashMap<TileAddress, TaskResult>,
) -> HashMap<String, TaskResult> {
	match from {
		InterpolateFrom::Higher => {
			let parent = tile.parent();
			tile_results
				.get(&parent)
				.map(|r| HashMap::from([(parent.task_id(), r.clone())]))
				.unwrap_or_default()
		}
		InterpolateFrom::Lower => tile
			.children()
			.iter()
			.filter_map(|child| tile_results.get(child).map(|r| (child.task_id(), r.clone())))
			.collect(),
	}
}
