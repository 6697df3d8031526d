//! Logical array shape, bounding boxes and reshape requests

use bon::Builder;
use ndarray::Array2;
use serde::Serialize;

/// Logical data shape. Spatial axes are in stored `(z, y, x)` order; formats with a
/// map axis put the map count first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataShape {
    pub maps: Option<usize>,
    pub z: usize,
    pub y: usize,
    pub x: usize,
}

impl DataShape {
    pub fn spatial(z: usize, y: usize, x: usize) -> Self {
        Self { maps: None, z, y, x }
    }

    pub fn with_maps(maps: usize, z: usize, y: usize, x: usize) -> Self {
        Self {
            maps: Some(maps),
            z,
            y,
            x,
        }
    }

    pub fn zyx(&self) -> [usize; 3] {
        [self.z, self.y, self.x]
    }

    /// `(maps, z, y, x)` or `(z, y, x)`.
    pub fn to_vec(&self) -> Vec<usize> {
        self.maps.into_iter().chain(self.zyx()).collect()
    }
}

/// Explicit bounding box in stored header coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub x: [i64; 2],
    pub y: [i64; 2],
    pub z: [i64; 2],
}

impl Bounds {
    pub fn new(x: [i64; 2], y: [i64; 2], z: [i64; 2]) -> Self {
        Self { x, y, z }
    }

    pub fn zyx(&self) -> [[i64; 2]; 3] {
        [self.z, self.y, self.x]
    }
}

/// `[[xStart, xEnd], [yStart, yEnd], [zStart, zEnd]]`
impl From<[[i64; 2]; 3]> for Bounds {
    fn from([x, y, z]: [[i64; 2]; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Requested header rewrite. Parts are applied in the order `shape`, `zyx`, `n`, so a
/// later part overrides what an earlier one wrote.
#[derive(Debug, Clone, Default, PartialEq, Builder)]
pub struct ShapeRequest {
    /// `(maps, z, y, x)` or `(z, y, x)`, spatial extents measured from the canonical start.
    #[builder(into)]
    pub shape: Option<Vec<i64>>,
    /// Explicit bounding box, overriding the canonical start.
    #[builder(into)]
    pub zyx: Option<Bounds>,
    /// Map count only.
    pub n: Option<i64>,
}

impl ShapeRequest {
    pub fn is_empty(&self) -> bool {
        self.shape.is_none() && self.zyx.is_none() && self.n.is_none()
    }
}

/// Shape plus voxel sizes and the voxel-to-world affine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geometry {
    pub shape: DataShape,
    /// Voxel size per stored axis, `(z, y, x)`.
    pub zooms: [f64; 3],
    pub affine: Array2<f64>,
}
