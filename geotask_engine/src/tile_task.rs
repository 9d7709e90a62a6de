//! Tile-task runtime (§4.5): executes a single tile, either by invoking the
//! user process directly (a baselevel zoom) or by interpolating from the
//! adjacent zoom the graph builder already finished (§4.1, §9).

use crate::resolver;
use geotask_core::config::{JobConfig, ProcessContext};
use geotask_core::{InterpolateFrom, TaskOutput, TaskResult, TileAddress};
use std::collections::HashMap;
use std::fmt;

/// What role a tile batch plays in the interpolation chain (§4.1, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileBatchRole {
	/// Run the user process directly.
	Baselevel,
	/// Derive the output from an already-processed sibling tile.
	Interpolated(InterpolateFrom),
}

impl fmt::Display for TileBatchRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TileBatchRole::Baselevel => f.write_str("baselevel"),
			TileBatchRole::Interpolated(InterpolateFrom::Higher) => f.write_str("interpolated(from parent)"),
			TileBatchRole::Interpolated(InterpolateFrom::Lower) => f.write_str("interpolated(from children)"),
		}
	}
}

/// Run one tile (§4.5). `dependencies` is exactly `Task::dependencies` — for
/// a baselevel tile, the completed preprocessing-task results the job runner
/// attached (keyed by task id, resolved here against the input bindings'
/// `dependency_keys`, §4.3); for an interpolated tile, the one parent or up
/// to four children results the job runner attached (also keyed by task id).
pub fn execute_tile(config: &dyn JobConfig, tile: TileAddress, role: TileBatchRole, dependencies: &HashMap<String, TaskResult>) -> anyhow::Result<TaskOutput> {
	match role {
		TileBatchRole::Baselevel => {
			let mut input = config.get_inputs_for_tile(tile);
			resolver::resolve_preprocessing_dependencies(&mut input, dependencies)?;
			let ctx = ProcessContext {
				tile,
				params: config.get_process_func_params(tile.zoom),
				input,
				output_params: config.output_params(),
			};
			(config.process())(&ctx).inspect_err(|err| {
				if !geotask_core::error::is_nodata(err) && !geotask_core::error::is_cancelled(err) {
					log::warn!("tile {tile} failed: {err}");
				}
			})
		}
		TileBatchRole::Interpolated(InterpolateFrom::Higher) => {
			// §4.5 step 4: always read the parent from the output reader, not
			// from a dependency -- in "continue" mode the parent may have been
			// written by an earlier job invocation and never appear as a
			// dependency of this one.
			let parent = tile.parent();
			let output = config.output_reader().read(parent)?;
			let method = config
				.baselevels()
				.ok_or_else(|| anyhow::anyhow!("interpolated tile {tile} requires baselevels"))?
				.higher;
			config.resample_from_parent(tile, output, method)
		}
		TileBatchRole::Interpolated(InterpolateFrom::Lower) => {
			let method = config
				.baselevels()
				.ok_or_else(|| anyhow::anyhow!("interpolated tile {tile} requires baselevels"))?
				.lower;
			// §4.5 step 5: with a pixel buffer the tile's rendered area can
			// overlap more than its four direct children (a metatile halo
			// reaches into neighbouring tiles), so candidates come from a bounds
			// query instead of quad-tree arithmetic.
			let output_pyramid = config.output_pyramid();
			let candidate_children: Vec<TileAddress> = if output_pyramid.has_pixel_buffer() {
				output_pyramid.tiles_from_bounds(output_pyramid.tile_bounds(tile), tile.zoom + 1)
			} else {
				tile.children().to_vec()
			};
			// A child's data comes from `dependencies` (preferred, the fresher
			// in-memory result) or, if absent, from the output reader (e.g. a
			// metatiled neighbour outside this batch).
			let children: Vec<(TileAddress, TaskOutput)> = candidate_children
				.into_iter()
				.filter_map(|child| {
					if let Some(result) = dependencies.get(&child.task_id()) {
						Some((child, result.output.clone()))
					} else {
						config.output_reader().read(child).ok().map(|output| (child, output))
					}
				})
				.collect();
			config.resample_from_children(tile, children, method)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::MockJobConfig;
	use geotask_core::ResamplingMethod;

	#[test]
	fn baselevel_calls_process() {
		let config = MockJobConfig::new();
		let tile = TileAddress::new(4, 0, 0);
		let output = execute_tile(&config, tile, TileBatchRole::Baselevel, &HashMap::new()).unwrap();
		assert_eq!(output, TaskOutput::Value(serde_json::json!({"zoom": 4})));
	}

	#[test]
	fn interpolated_from_parent_requires_output_reader_data() {
		let config = MockJobConfig::new();
		let tile = TileAddress::new(5, 0, 0);
		let err = execute_tile(&config, tile, TileBatchRole::Interpolated(InterpolateFrom::Higher), &HashMap::new()).unwrap_err();
		assert!(geotask_core::error::is_nodata(&err));
	}

	#[test]
	fn interpolated_from_parent_reads_from_output_reader_not_dependencies() {
		let parent_tile = TileAddress::new(5, 0, 0).parent();
		let config = MockJobConfig::new().with_output(parent_tile, TaskOutput::Value(serde_json::json!(1)));
		let tile = TileAddress::new(5, 0, 0);
		// Dependencies carry an unrelated value — §4.5 step 4 says the parent
		// always comes from the output reader, never from a dependency.
		let mut deps = HashMap::new();
		deps.insert(parent_tile.task_id(), TaskResult::success("p", TaskOutput::Value(serde_json::json!(999)), Some(parent_tile)));
		let output = execute_tile(&config, tile, TileBatchRole::Interpolated(InterpolateFrom::Higher), &deps).unwrap();
		assert_eq!(
			output,
			TaskOutput::Value(serde_json::json!({"resampled_from_parent": true, "method": format!("{:?}", ResamplingMethod::Bilinear)}))
		);
	}

	#[test]
	fn interpolated_from_children_prefers_dependency_over_output_reader() {
		let tile = TileAddress::new(3, 0, 0);
		let kids = tile.children();
		// kids[0] only in dependencies, kids[1] only in the output reader,
		// kids[2]/kids[3] absent from both (§4.5 step 5: a sibling missing from
		// both sources is simply omitted from the mosaic).
		let config = MockJobConfig::new().with_output(kids[1], TaskOutput::Value(serde_json::json!(1)));
		let mut deps = HashMap::new();
		deps.insert(kids[0].task_id(), TaskResult::success("c0", TaskOutput::Value(serde_json::json!(1)), Some(kids[0])));
		let output = execute_tile(&config, tile, TileBatchRole::Interpolated(InterpolateFrom::Lower), &deps).unwrap();
		assert_eq!(output, TaskOutput::Value(serde_json::json!({"mosaicked_children": 2})));
	}

	#[test]
	fn interpolated_from_children_uses_bounds_query_with_pixel_buffer() {
		// With a pixel buffer, candidates come from a bounds query over the
		// output pyramid rather than direct quad-tree children, so a result
		// seeded at a tile outside the plain four-child set is still picked up.
		let tile = TileAddress::new(3, 0, 0);
		let kids = tile.children();
		let config = MockJobConfig::new().with_pixel_buffer().with_output(kids[0], TaskOutput::Value(serde_json::json!(1)));
		let output = execute_tile(&config, tile, TileBatchRole::Interpolated(InterpolateFrom::Lower), &HashMap::new()).unwrap();
		assert_eq!(output, TaskOutput::Value(serde_json::json!({"mosaicked_children": 1})));
	}
}
