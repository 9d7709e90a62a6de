//! Task batches and their `intersection()` query (§4.2).
//!
//! A batch is simply the set of tasks sharing one "generation" in the
//! dependency graph built by the graph builder: all the preprocessing tasks,
//! or all the tile tasks at one zoom. What differs between the two is how
//! `intersection()` finds the upstream tasks a new task depends on —
//! preprocessing batches are bounds-indexed since tasks can sit anywhere in
//! the process area, while tile batches exploit the quad-tree relationship
//! between adjacent zooms to do it in O(1) per query instead of a spatial
//! search.

use crate::task::Task;
use crate::tile::{Bounds, TileAddress, TilePyramid};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

struct IndexedTask {
	id: String,
	bounds: Bounds,
}

impl RTreeObject for IndexedTask {
	type Envelope = AABB<[f64; 2]>;

	fn envelope(&self) -> Self::Envelope {
		AABB::from_corners([self.bounds.left, self.bounds.bottom], [self.bounds.right, self.bounds.top])
	}
}

/// A batch of tasks with no particular tile structure — used for the
/// preprocessing generation (§4.1 step 1).
pub struct TaskBatch {
	tasks: HashMap<String, Task>,
	index: RTree<IndexedTask>,
	/// Tasks with no bounds (global scope): every query intersects them.
	unbounded: Vec<String>,
}

impl TaskBatch {
	pub fn new(tasks: Vec<Task>) -> Self {
		let mut index_entries = Vec::new();
		let mut unbounded = Vec::new();
		let mut by_id = HashMap::with_capacity(tasks.len());
		for task in tasks {
			match task.bounds {
				Some(bounds) => index_entries.push(IndexedTask { id: task.id.clone(), bounds }),
				None => unbounded.push(task.id.clone()),
			}
			by_id.insert(task.id.clone(), task);
		}
		Self {
			tasks: by_id,
			index: RTree::bulk_load(index_entries),
			unbounded,
		}
	}

	pub fn get(&self, id: &str) -> Option<&Task> {
		self.tasks.get(id)
	}

	pub fn len(&self) -> usize {
		self.tasks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tasks.is_empty()
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.tasks.keys().map(String::as_str)
	}

	/// Every task in this batch whose bounds overlap `bounds` (§4.2), plus
	/// every unbounded (global) task.
	pub fn intersection(&self, bounds: Bounds) -> Vec<&Task> {
		let envelope = AABB::from_corners([bounds.left, bounds.bottom], [bounds.right, bounds.top]);
		let mut out: Vec<&Task> = self
			.index
			.locate_in_envelope_intersecting(&envelope)
			.filter_map(|indexed| self.tasks.get(&indexed.id))
			.collect();
		out.extend(self.unbounded.iter().filter_map(|id| self.tasks.get(id)));
		out
	}
}

/// A batch of tile tasks, all at the same zoom level (§4.1 step 2/3).
pub struct TileTaskBatch {
	pub zoom: u8,
	tasks: HashMap<TileAddress, Task>,
}

impl TileTaskBatch {
	pub fn new(zoom: u8, tasks: Vec<(TileAddress, Task)>) -> Self {
		debug_assert!(tasks.iter().all(|(tile, _)| tile.zoom == zoom));
		Self {
			zoom,
			tasks: tasks.into_iter().collect(),
		}
	}

	pub fn get(&self, tile: TileAddress) -> Option<&Task> {
		self.tasks.get(&tile)
	}

	pub fn len(&self) -> usize {
		self.tasks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tasks.is_empty()
	}

	pub fn tiles(&self) -> impl Iterator<Item = TileAddress> + '_ {
		self.tasks.keys().copied()
	}

	/// The up-to-four child tasks of `tile` in this batch (§4.5 step 5,
	/// interpolate-from-lower). Requires `self.zoom == tile.zoom + 1`.
	pub fn children_of(&self, tile: TileAddress) -> Vec<&Task> {
		debug_assert_eq!(self.zoom, tile.zoom + 1);
		tile.children().iter().filter_map(|child| self.tasks.get(child)).collect()
	}

	/// The parent task of `tile` in this batch (§4.5 step 4,
	/// interpolate-from-higher). Requires `self.zoom + 1 == tile.zoom`.
	pub fn parent_of(&self, tile: TileAddress) -> Option<&Task> {
		debug_assert_eq!(self.zoom + 1, tile.zoom);
		self.tasks.get(&tile.parent())
	}

	/// Fallback path for pyramids where adjacent zooms aren't a clean
	/// quad-tree (e.g. a metatiled pyramid, §4.2 "pixelbuffer" note): scans
	/// every task's tile bounds against `bounds` instead of relying on
	/// `children()`/`parent()` arithmetic.
	pub fn intersection_by_bounds(&self, bounds: Bounds, pyramid: &dyn TilePyramid) -> Vec<&Task> {
		self.tasks
			.iter()
			.filter(|(tile, _)| pyramid.tile_bounds(**tile).intersects(&bounds))
			.map(|(_, task)| task)
			.collect()
	}
}
