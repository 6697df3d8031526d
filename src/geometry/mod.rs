//! Header fields to data shape, voxel sizes and affine, and back

pub mod rules;
pub mod translator;

pub use rules::{AxisFields, AxisMapping, BV_AXIS_MAP, FramingCube, GeometryRules, MapAxis};
pub use translator::{apply_shape, data_type, derive_shape, framing_cube, set_data_type, set_framing_cube};
