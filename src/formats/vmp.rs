//! Statistical map files (`.vmp`).
//!
//! Layout: a root block with the bounding box, one `maps` record per submap, then the
//! component time courses and component parameter tables, both sized by the submap
//! count. Version 5 added the FDR table, version 6 the fingerprint parameter range.

use crate::geometry::rules::{AxisFields, FramingCube, GeometryRules, MapAxis};
use crate::types::datatype::{DataTypeRule, ElementType};
use crate::types::schema::{BinaryType, FieldDescriptor, RecordDescriptor};

pub const EXTENSION: &str = "vmp";
pub const MAGIC: u32 = 0xA1B2_C3D4;
pub const DEFAULT_VERSION: u16 = 6;
pub const MIN_VERSION: u16 = 4;
pub const DATA_TYPE: DataTypeRule = DataTypeRule::Fixed(ElementType::F32);

/// `type_of_map` value of lag maps.
const LAG_MAP: i64 = 3;

fn i32_field(name: &str, default: i32) -> FieldDescriptor {
    FieldDescriptor::scalar(name, BinaryType::I32, default)
}

fn u8_field(name: &str, default: i32) -> FieldDescriptor {
    FieldDescriptor::scalar(name, BinaryType::U8, default)
}

fn f32_field(name: &str, default: f64) -> FieldDescriptor {
    FieldDescriptor::scalar(name, BinaryType::F32, default)
}

fn map_record() -> RecordDescriptor {
    let colours = [
        ("pos_min_r", 255),
        ("pos_min_g", 0),
        ("pos_min_b", 0),
        ("pos_max_r", 255),
        ("pos_max_g", 255),
        ("pos_max_b", 0),
        ("neg_min_r", 255),
        ("neg_min_g", 0),
        ("neg_min_b", 255),
        ("neg_max_r", 0),
        ("neg_max_g", 0),
        ("neg_max_b", 255),
    ];

    let head = RecordDescriptor::new()
        .field(i32_field("type_of_map", 1))
        .field(f32_field("map_threshold", 1.65))
        .field(f32_field("upper_threshold", 8.0))
        .field(FieldDescriptor::cstring("map_name", "Testmap"));

    colours
        .into_iter()
        .fold(head, |desc, (name, default)| desc.field(u8_field(name, default)))
        .field(u8_field("use_vmp_color", 0))
        .field(FieldDescriptor::cstring("lut_filename", "<default>"))
        .field(f32_field("transparent_color_factor", 1.0))
        .field(i32_field("nr_of_lags", 0).when("type_of_map", LAG_MAP))
        .field(i32_field("display_min_lag", 0).when("type_of_map", LAG_MAP))
        .field(i32_field("display_max_lag", 0).when("type_of_map", LAG_MAP))
        .field(i32_field("show_correlation_or_lag", 0).when("type_of_map", LAG_MAP))
        .field(i32_field("cluster_size_threshold", 50))
        .field(u8_field("enable_cluster_size_threshold", 0))
        .field(i32_field("show_values_above_upper_threshold", 1))
        .field(i32_field("df1", 249))
        .field(i32_field("df2", 0))
        .field(u8_field("show_pos_neg_values", 3))
        .field(i32_field("nr_of_used_voxels", 45555))
        .field(i32_field("size_of_fdr_table", 0).since(5))
        .repeated_since(
            "fdr_table_info",
            "size_of_fdr_table",
            RecordDescriptor::new()
                .field(f32_field("q", 0.0))
                .field(f32_field("crit_standard", 0.0))
                .field(f32_field("crit_conservative", 0.0)),
            5,
        )
        .field(i32_field("use_fdr_table_index", 0).since(5))
}

/// Full layout of the newest supported version.
pub fn latest_descriptor() -> RecordDescriptor {
    RecordDescriptor::new()
        .field(FieldDescriptor::scalar("magic_number", BinaryType::U32, i64::from(MAGIC)))
        .field(FieldDescriptor::scalar("version", BinaryType::I16, i64::from(DEFAULT_VERSION)))
        .field(FieldDescriptor::scalar("document_type", BinaryType::I16, 1))
        .field(i32_field("nr_of_submaps", 1))
        .field(i32_field("nr_of_timepoints", 0))
        .field(i32_field("nr_of_component_params", 0))
        .field(i32_field("show_params_range_from", 0))
        .field(i32_field("show_params_range_to", 0))
        .field(i32_field("use_for_fingerprint_params_range_from", 0).since(6))
        .field(i32_field("use_for_fingerprint_params_range_to", 0).since(6))
        .field(i32_field("x_start", 57))
        .field(i32_field("x_end", 231))
        .field(i32_field("y_start", 52))
        .field(i32_field("y_end", 172))
        .field(i32_field("z_start", 59))
        .field(i32_field("z_end", 197))
        .field(i32_field("resolution", 3))
        .field(i32_field("dim_x", 256))
        .field(i32_field("dim_y", 256))
        .field(i32_field("dim_z", 256))
        .field(FieldDescriptor::cstring("vtc_filename", ""))
        .field(FieldDescriptor::cstring("prt_filename", ""))
        .field(FieldDescriptor::cstring("voi_filename", ""))
        .repeated("maps", "nr_of_submaps", map_record())
        .repeated(
            "component_time_points",
            "nr_of_submaps",
            RecordDescriptor::new().repeated(
                "timepoints",
                "nr_of_timepoints",
                RecordDescriptor::new().field(f32_field("timepoint", 0.0)),
            ),
        )
        .repeated(
            "component_params",
            "nr_of_component_params",
            RecordDescriptor::new()
                .field(FieldDescriptor::cstring("param_name", ""))
                .repeated(
                    "param_values",
                    "nr_of_submaps",
                    RecordDescriptor::new().field(f32_field("value", 0.0)),
                ),
        )
}

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
            count_field: "nr_of_submaps",
            records_field: Some("maps"),
        })
        .framing_cube(FramingCube::Fields(["dim_z", "dim_y", "dim_x"]))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderConfig;
    use crate::error::{HeaderError, Result};
    use crate::geometry::{apply_shape, derive_shape, framing_cube, set_framing_cube};
    use crate::parser::{parse_header, serialize_header};
    use crate::types::header::HeaderTree;
    use crate::types::shape::{Bounds, DataShape, ShapeRequest};
    use ndarray::array;

    fn default_tree() -> Result<(RecordDescriptor, HeaderTree)> {
        let desc = latest_descriptor();
        let tree = desc.default_tree()?;
        Ok((desc, tree))
    }

    fn set_box(tree: &mut HeaderTree, res: i64, x: [i64; 2], y: [i64; 2], z: [i64; 2]) {
        tree.insert("resolution", res);
        for (axis, [start, end]) in [("x", x), ("y", y), ("z", z)] {
            tree.insert(format!("{}_start", axis), start);
            tree.insert(format!("{}_end", axis), end);
        }
    }

    #[test]
    fn test_descriptor_is_valid_for_all_versions() {
        for version in MIN_VERSION..=DEFAULT_VERSION {
            assert!(latest_descriptor().for_version(version).validate().is_ok());
        }
    }

    #[test]
    fn test_set_data_shape_scenarios() -> Result<()> {
        let (desc, mut tree) = default_tree()?;
        let rules = geometry();
        assert_eq!(derive_shape(&tree, &rules)?.shape, DataShape::with_maps(1, 46, 40, 58));

        let shape = ShapeRequest::builder().shape(vec![1i64, 45, 39, 57]).build();
        assert_eq!(
            apply_shape(&mut tree, &desc, &rules, &shape)?.shape,
            DataShape::with_maps(1, 45, 39, 57)
        );

        let bounds = ShapeRequest::builder()
            .zyx(Bounds::from([[57i64, 240], [52, 178], [59, 191]]))
            .build();
        assert_eq!(
            apply_shape(&mut tree, &desc, &rules, &bounds)?.shape,
            DataShape::with_maps(1, 44, 42, 61)
        );

        let n = ShapeRequest::builder().n(5).build();
        assert_eq!(
            apply_shape(&mut tree, &desc, &rules, &n)?.shape,
            DataShape::with_maps(5, 44, 42, 61)
        );
        assert_eq!(tree.records("maps").map(|m| m.len()), Some(5));
        assert_eq!(tree.records("component_time_points").map(|m| m.len()), Some(5));

        let shape = ShapeRequest::builder().shape(vec![3i64, 44, 42, 61]).build();
        assert_eq!(
            apply_shape(&mut tree, &desc, &rules, &shape)?.shape,
            DataShape::with_maps(3, 44, 42, 61)
        );

        for request in [
            ShapeRequest::default(),
            ShapeRequest::builder().shape(vec![-1i64, 45, 39, 57]).build(),
            ShapeRequest::builder().n(-1).build(),
        ] {
            assert!(matches!(
                apply_shape(&mut tree, &desc, &rules, &request),
                Err(HeaderError::HeaderData(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_affine_examples() -> Result<()> {
        let (_, mut tree) = default_tree()?;
        let rules = geometry();

        set_box(&mut tree, 3, [120, 150], [120, 150], [120, 150]);
        let geometry = derive_shape(&tree, &rules)?;
        assert_eq!(geometry.shape, DataShape::with_maps(1, 10, 10, 10));
        assert_eq!(geometry.zooms, [3.0, 3.0, 3.0]);
        assert_eq!(
            geometry.affine,
            array![
                [-3.0, 0.0, 0.0, -21.0],
                [0.0, 0.0, -3.0, -21.0],
                [0.0, -3.0, 0.0, -21.0],
                [0.0, 0.0, 0.0, 1.0],
            ]
        );

        set_box(&mut tree, 2, [102, 108], [54, 62], [62, 72]);
        let geometry = derive_shape(&tree, &rules)?;
        assert_eq!(geometry.shape, DataShape::with_maps(1, 5, 4, 3));
        assert_eq!(
            geometry.affine,
            array![
                [-2.0, 0.0, 0.0, 122.0],
                [0.0, 0.0, -2.0, 46.0],
                [0.0, -2.0, 0.0, 140.0],
                [0.0, 0.0, 0.0, 1.0],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_framing_cube_fields() -> Result<()> {
        let (_, mut tree) = default_tree()?;
        let rules = geometry();
        assert_eq!(framing_cube(&tree, &rules)?, [256, 256, 256]);
        set_framing_cube(&mut tree, &rules, [512, 513, 514])?;
        assert_eq!(framing_cube(&tree, &rules)?, [512, 513, 514]);
        assert_eq!(tree.int("dim_z"), Some(512));
        assert_eq!(tree.int("dim_x"), Some(514));
        Ok(())
    }

    #[test]
    fn test_submap_count_must_match_maps() -> Result<()> {
        let (desc, mut tree) = default_tree()?;
        let rules = geometry();
        desc.resize_counted(&mut tree, "nr_of_submaps", 2)?;
        assert_eq!(derive_shape(&tree, &rules)?.shape.maps, Some(2));

        tree.insert("nr_of_submaps", 3i64);
        assert!(matches!(derive_shape(&tree, &rules), Err(HeaderError::HeaderData(_))));
        assert!(matches!(
            serialize_header(&tree, &desc, &ReaderConfig::default()),
            Err(HeaderError::CountMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_round_trip_with_nested_tables() -> Result<()> {
        let (desc, mut tree) = default_tree()?;
        let config = ReaderConfig::default();
        desc.resize_counted(&mut tree, "nr_of_timepoints", 4)?;
        desc.resize_counted(&mut tree, "nr_of_component_params", 2)?;
        desc.resize_counted(&mut tree, "nr_of_submaps", 2)?;
        if let Some(maps) = tree.records_mut("maps") {
            maps[1].insert("type_of_map", 3i64);
            maps[1].insert("nr_of_lags", 6i64);
            maps[1].insert("map_name", "lags");
            map_record().resize_counted(&mut maps[0], "size_of_fdr_table", 3)?;
        }

        let bytes = serialize_header(&tree, &desc, &config)?;
        let parsed = parse_header(&bytes, &desc, &config)?;
        assert_eq!(serialize_header(&parsed, &desc, &config)?, bytes);

        let maps = parsed.records("maps").unwrap();
        assert_eq!(maps[0].records("fdr_table_info").map(|t| t.len()), Some(3));
        assert_eq!(maps[1].int("nr_of_lags"), Some(6));
        let params = parsed.records("component_params").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].records("param_values").map(|v| v.len()), Some(2));
        let time_points = parsed.records("component_time_points").unwrap();
        assert_eq!(time_points[1].records("timepoints").map(|t| t.len()), Some(4));
        Ok(())
    }

    #[test]
    fn test_lag_fields_only_on_lag_maps() -> Result<()> {
        let (desc, mut tree) = default_tree()?;
        let config = ReaderConfig::default();
        let plain = serialize_header(&tree, &desc, &config)?;

        if let Some(maps) = tree.records_mut("maps") {
            maps[0].insert("type_of_map", 3i64);
        }
        let lagged = serialize_header(&tree, &desc, &config)?;
        assert_eq!(lagged.len(), plain.len() + 16);

        // gated-out fields read back as their defaults
        let parsed = parse_header(&plain, &desc, &config)?;
        assert_eq!(parsed.records("maps").unwrap()[0].int("nr_of_lags"), Some(0));
        Ok(())
    }

    #[test]
    fn test_older_versions_drop_fields() -> Result<()> {
        let config = ReaderConfig::default();
        let v6 = latest_descriptor();
        let v4 = v6.for_version(4);
        let mut v4_tree = v4.default_tree()?;
        v4_tree.insert("version", 4i64);

        assert!(!v4_tree.contains("use_for_fingerprint_params_range_from"));
        assert!(!v4_tree.records("maps").unwrap()[0].contains("size_of_fdr_table"));

        let v4_bytes = serialize_header(&v4_tree, &v4, &config)?;
        let v6_bytes = serialize_header(&v6.default_tree()?, &v6, &config)?;
        // two fingerprint fields plus two FDR fields per map
        assert_eq!(v6_bytes.len() - v4_bytes.len(), 16);
        let parsed = parse_header(&v4_bytes, &v4, &config)?;
        assert_eq!(parsed.int("version"), Some(4));
        assert_eq!(serialize_header(&parsed, &v4, &config)?, v4_bytes);
        Ok(())
    }
}
