//! Per-format geometry parameters

use bon::Builder;

/// Header fields holding one axis' bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisFields {
    pub start: &'static str,
    pub end: &'static str,
}

impl AxisFields {
    pub const fn new(start: &'static str, end: &'static str) -> Self {
        Self { start, end }
    }
}

/// Leading map axis. When `records_field` is set, that repeated record must hold one
/// entry per map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapAxis {
    pub count_field: &'static str,
    pub records_field: Option<&'static str>,
}

/// Size of the reference volume the bounding box is placed in, `(z, y, x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingCube {
    Fields([&'static str; 3]),
    Fixed([i64; 3]),
}

/// World axis a stored data axis maps onto, and its direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    pub world: usize,
    pub sign: f64,
}

/// Stored `(z, y, x)` to world: z runs along world 0, y along world 2 and x along
/// world 1, each reversed.
pub const BV_AXIS_MAP: [AxisMapping; 3] = [
    AxisMapping { world: 0, sign: -1.0 },
    AxisMapping { world: 2, sign: -1.0 },
    AxisMapping { world: 1, sign: -1.0 },
];

/// How a format's header encodes the data shape and placement. All per-axis arrays are
/// in stored `(z, y, x)` order.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct GeometryRules {
    /// Voxel edge length in header units.
    pub resolution_field: &'static str,
    /// Millimetres per header unit.
    #[builder(default = 1.0)]
    pub base_unit: f64,
    pub axes: [AxisFields; 3],
    /// Start written when a plain shape is requested.
    pub canonical_start: [i64; 3],
    pub map_axis: Option<MapAxis>,
    pub framing_cube: FramingCube,
    #[builder(default = BV_AXIS_MAP)]
    pub axis_map: [AxisMapping; 3],
}

impl GeometryRules {
    pub fn has_map_axis(&self) -> bool {
        self.map_axis.is_some()
    }

    /// Number of entries a shape tuple must have.
    pub fn rank(&self) -> usize {
        if self.has_map_axis() { 4 } else { 3 }
    }
}
