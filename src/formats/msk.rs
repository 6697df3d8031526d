//! Mask files (`.msk`): a 14-byte bounding box header followed by `u8` voxels.

use crate::geometry::rules::{AxisFields, FramingCube, GeometryRules};
use crate::types::datatype::{DataTypeRule, ElementType};
use crate::types::schema::{BinaryType, FieldDescriptor, RecordDescriptor};

pub const EXTENSION: &str = "msk";
pub const DATA_TYPE: DataTypeRule = DataTypeRule::Fixed(ElementType::U8);

pub fn descriptor() -> RecordDescriptor {
    [
        ("relResolution", 3),
        ("XStart", 57),
        ("XEnd", 231),
        ("YStart", 52),
        ("YEnd", 172),
        ("ZStart", 59),
        ("ZEnd", 197),
    ]
    .into_iter()
    .fold(RecordDescriptor::new(), |desc, (name, default)| {
        desc.field(FieldDescriptor::scalar(name, BinaryType::I16, default))
    })
}

pub fn geometry() -> GeometryRules {
    GeometryRules::builder()
        .resolution_field("relResolution")
        .axes([
            AxisFields::new("ZStart", "ZEnd"),
            AxisFields::new("YStart", "YEnd"),
            AxisFields::new("XStart", "XEnd"),
        ])
        .canonical_start([59, 52, 57])
        .framing_cube(FramingCube::Fixed([256, 256, 256]))
        .build()
}
