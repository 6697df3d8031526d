//! Time course files (`.vtc`), version 3.

use crate::geometry::rules::{AxisFields, FramingCube, GeometryRules, MapAxis};
use crate::types::datatype::{CodeTable, DataTypeRule, ElementType};
use crate::types::schema::{BinaryType, FieldDescriptor, RecordDescriptor};

pub const EXTENSION: &str = "vtc";
pub const DEFAULT_VERSION: u16 = 3;

pub const DATA_TYPE: DataTypeRule = DataTypeRule::Coded {
    field: "datatype",
    table: CodeTable(&[(1, ElementType::U16), (2, ElementType::F32)]),
};

fn i16_field(name: &str, default: i32) -> FieldDescriptor {
    FieldDescriptor::scalar(name, BinaryType::I16, default)
}

pub fn descriptor() -> RecordDescriptor {
    let head = RecordDescriptor::new()
        .field(i16_field("version", i32::from(DEFAULT_VERSION)))
        .field(FieldDescriptor::cstring("fmr", ""))
        .field(i16_field("nr_prts", 0))
        .repeated(
            "prts",
            "nr_prts",
            RecordDescriptor::new().field(FieldDescriptor::cstring("filename", "")),
        )
        .field(i16_field("current_prt", 0))
        .field(i16_field("datatype", 2))
        .field(i16_field("volumes", 0))
        .field(i16_field("resolution", 3));

    [
        ("x_start", 57),
        ("x_end", 231),
        ("y_start", 52),
        ("y_end", 172),
        ("z_start", 59),
        ("z_end", 197),
    ]
    .into_iter()
    .fold(head, |desc, (name, default)| desc.field(i16_field(name, default)))
    .field(FieldDescriptor::scalar("lr_convention", BinaryType::I8, 1))
    .field(FieldDescriptor::scalar("ref_space", BinaryType::I8, 3))
    .field(FieldDescriptor::scalar("tr", BinaryType::F32, 2000.0))
}

/// Volumes form the leading axis; their count has no per-volume records in the header.
pub fn geometry() -> GeometryRules {
    GeometryRules::builder()
        .resolution_field("resolution")
        .axes([
            AxisFields::new("z_start", "z_end"),
            AxisFields::new("y_start", "y_end"),
            AxisFields::new("x_start", "x_end"),
        ])
        .canonical_start([59, 52, 57])
        .map_axis(MapAxis {
            count_field: "volumes",
            records_field: None,
        })
        .framing_cube(FramingCube::Fixed([256, 256, 256]))
        .build()
}
