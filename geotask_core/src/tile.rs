//! Tile addressing and the tile-pyramid math contract.
//!
//! The pyramid mathematics themselves (projecting bounds to tiles, CRS
//! handling, metatiling) are an external collaborator per the scope note in
//! §1 — this module only defines the addressing type and the trait the
//! engine calls into, plus a minimal XYZ-style implementation good enough to
//! exercise the engine in tests and examples.

use std::fmt;

/// A tile's address within a pyramid: zoom, row, column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
	pub zoom: u8,
	pub row: u32,
	pub column: u32,
}

impl TileAddress {
	pub fn new(zoom: u8, row: u32, column: u32) -> Self {
		Self { zoom, row, column }
	}

	/// Deterministic id used for tile tasks: `tile_task_<zoom>_<row>_<column>`.
	pub fn task_id(&self) -> String {
		format!("tile_task_{}_{}_{}", self.zoom, self.row, self.column)
	}

	/// The four children at `zoom + 1`, in deterministic
	/// top-left/top-right/bottom-left/bottom-right order (§4.2 tie-break).
	pub fn children(&self) -> [TileAddress; 4] {
		let z = self.zoom + 1;
		let r = self.row * 2;
		let c = self.column * 2;
		[
			TileAddress::new(z, r, c),
			TileAddress::new(z, r, c + 1),
			TileAddress::new(z, r + 1, c),
			TileAddress::new(z, r + 1, c + 1),
		]
	}

	/// The parent at `zoom - 1`. Panics at zoom 0 (callers only ever descend
	/// from a baselevel, which is never zoom 0 and 0 simultaneously).
	pub fn parent(&self) -> TileAddress {
		TileAddress::new(self.zoom - 1, self.row / 2, self.column / 2)
	}
}

impl fmt::Display for TileAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {}, {})", self.zoom, self.row, self.column)
	}
}

/// Axis-aligned bounds in the process CRS: `(left, bottom, right, top)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
	pub left: f64,
	pub bottom: f64,
	pub right: f64,
	pub top: f64,
}

impl Bounds {
	pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
		Self { left, bottom, right, top }
	}

	pub fn intersects(&self, other: &Bounds) -> bool {
		self.left < other.right && other.left < self.right && self.bottom < other.top && other.bottom < self.top
	}

	pub fn union(&self, other: &Bounds) -> Bounds {
		Bounds::new(
			self.left.min(other.left),
			self.bottom.min(other.bottom),
			self.right.max(other.right),
			self.top.max(other.top),
		)
	}
}

/// Resampling method used when interpolating between zoom levels (§4.5).
/// Mirrors the small, closed vocabulary GIS raster stacks use for
/// overview/warp resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplingMethod {
	Nearest,
	#[default]
	Bilinear,
	Cubic,
	CubicSpline,
	Lanczos,
	Average,
}

/// External collaborator: tile-pyramid mathematics. Implementations know how
/// to convert between a pyramid's tile grid and the process CRS; the engine
/// only ever asks for child/parent relations, tile bounds, and the tiles
/// overlapping an arbitrary bounding box.
pub trait TilePyramid: Send + Sync {
	/// Geographic bounds of a single tile.
	fn tile_bounds(&self, tile: TileAddress) -> Bounds;

	/// All tiles at `zoom` whose bounds intersect `bounds`.
	fn tiles_from_bounds(&self, bounds: Bounds, zoom: u8) -> Vec<TileAddress>;

	/// True if this pyramid enlarges tiles with a pixel buffer/halo (§ glossary,
	/// "metatiling"), which changes how neighbours are enumerated during
	/// interpolation-from-lower (§4.5 step 5).
	fn has_pixel_buffer(&self) -> bool {
		false
	}
}

/// A plain XYZ pyramid over `[-1, 1] x [-1, 1]` in the process CRS: each zoom
/// level subdivides the unit square into `2^zoom` rows and columns. Good
/// enough to drive the engine end to end without a real CRS/geometry stack.
#[derive(Debug, Clone, Copy)]
pub struct XyzPyramid {
	pixelbuffer: bool,
}

impl XyzPyramid {
	pub fn new() -> Self {
		Self { pixelbuffer: false }
	}

	pub fn with_pixel_buffer() -> Self {
		Self { pixelbuffer: true }
	}
}

impl Default for XyzPyramid {
	fn default() -> Self {
		Self::new()
	}
}

impl TilePyramid for XyzPyramid {
	fn tile_bounds(&self, tile: TileAddress) -> Bounds {
		let n = 2f64.powi(i32::from(tile.zoom));
		let size = 2.0 / n;
		let left = -1.0 + f64::from(tile.column) * size;
		let top = 1.0 - f64::from(tile.row) * size;
		Bounds::new(left, top - size, left + size, top)
	}

	fn tiles_from_bounds(&self, bounds: Bounds, zoom: u8) -> Vec<TileAddress> {
		let n = 2u32.pow(u32::from(zoom));
		let n_f = f64::from(n);
		let size = 2.0 / n_f;
		let col_lo = (((bounds.left + 1.0) / size).floor().max(0.0) as u32).min(n.saturating_sub(1));
		let col_hi = (((bounds.right + 1.0) / size).ceil().max(0.0) as u32).saturating_sub(1).min(n.saturating_sub(1));
		let row_lo = (((1.0 - bounds.top) / size).floor().max(0.0) as u32).min(n.saturating_sub(1));
		let row_hi = (((1.0 - bounds.bottom) / size).ceil().max(0.0) as u32).saturating_sub(1).min(n.saturating_sub(1));
		let mut out = Vec::new();
		for row in row_lo..=row_hi {
			for column in col_lo..=col_hi {
				out.push(TileAddress::new(zoom, row, column));
			}
		}
		out
	}

	fn has_pixel_buffer(&self) -> bool {
		self.pixelbuffer
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	#[test]
	fn children_are_in_deterministic_order() {
		let tile = TileAddress::new(4, 3, 5);
		let kids = tile.children();
		assert_eq!(kids[0], TileAddress::new(5, 6, 10));
		assert_eq!(kids[1], TileAddress::new(5, 6, 11));
		assert_eq!(kids[2], TileAddress::new(5, 7, 10));
		assert_eq!(kids[3], TileAddress::new(5, 7, 11));
	}

	#[rstest]
	#[case(TileAddress::new(0, 0, 0))]
	#[case(TileAddress::new(4, 3, 5))]
	#[case(TileAddress::new(12, 1000, 2047))]
	fn parent_of_child_round_trips(#[case] tile: TileAddress) {
		for child in tile.children() {
			assert_eq!(child.parent(), tile);
		}
	}

	#[rstest]
	#[case(Bounds::new(0.0, 0.0, 1.0, 1.0), Bounds::new(1.0, 0.0, 2.0, 1.0), false)]
	#[case(Bounds::new(0.0, 0.0, 1.0, 1.0), Bounds::new(0.5, 0.5, 1.5, 1.5), true)]
	#[case(Bounds::new(0.0, 0.0, 1.0, 1.0), Bounds::new(2.0, 2.0, 3.0, 3.0), false)]
	fn bounds_intersect_is_strict(#[case] a: Bounds, #[case] b: Bounds, #[case] expected: bool) {
		assert_eq!(a.intersects(&b), expected);
	}

	#[test]
	fn xyz_pyramid_tile_bounds_cover_whole_square() {
		let pyramid = XyzPyramid::new();
		let b = pyramid.tile_bounds(TileAddress::new(0, 0, 0));
		assert_eq!(b, Bounds::new(-1.0, -1.0, 1.0, 1.0));
	}

	#[test]
	fn xyz_pyramid_tiles_from_bounds_round_trips_single_tile() {
		let pyramid = XyzPyramid::new();
		let tile = TileAddress::new(3, 2, 5);
		let bounds = pyramid.tile_bounds(tile);
		let found = pyramid.tiles_from_bounds(bounds, 3);
		assert_eq!(found, vec![tile]);
	}
}
