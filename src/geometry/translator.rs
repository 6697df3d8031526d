//! Conversion between header fields and the logical data shape, voxel sizes and affine.

use super::rules::{FramingCube, GeometryRules};
use crate::error::{HeaderError, Result};
use crate::types::datatype::{DataTypeRule, DatatypeRegistry, ElementType};
use crate::types::header::HeaderTree;
use crate::types::schema::RecordDescriptor;
use crate::types::shape::{DataShape, Geometry, ShapeRequest};
use itertools::izip;
use log::debug;
use ndarray::Array2;

fn resolution(tree: &HeaderTree, rules: &GeometryRules) -> Result<i64> {
    let res = tree.require_int(rules.resolution_field)?;
    if res <= 0 {
        return Err(HeaderError::header_data(format!(
            "`{}` must be positive, got {}",
            rules.resolution_field, res
        )));
    }
    Ok(res)
}

fn map_count(tree: &HeaderTree, rules: &GeometryRules) -> Result<Option<usize>> {
    let Some(axis) = rules.map_axis else {
        return Ok(None);
    };
    let count = tree.require_int(axis.count_field)?;
    let count = usize::try_from(count)
        .map_err(|_| HeaderError::header_data(format!("`{}` is negative: {}", axis.count_field, count)))?;
    if let Some(records) = axis.records_field {
        let actual = tree
            .records(records)
            .ok_or_else(|| HeaderError::MissingField(records.to_string()))?
            .len();
        if actual != count {
            return Err(HeaderError::header_data(format!(
                "`{}` = {} but `{}` holds {} entries",
                axis.count_field, count, records, actual
            )));
        }
    }
    Ok(Some(count))
}

/// Reference volume size, `(z, y, x)`.
pub fn framing_cube(tree: &HeaderTree, rules: &GeometryRules) -> Result<[i64; 3]> {
    match rules.framing_cube {
        FramingCube::Fixed(cube) => Ok(cube),
        FramingCube::Fields([z, y, x]) => Ok([tree.require_int(z)?, tree.require_int(y)?, tree.require_int(x)?]),
    }
}

pub fn set_framing_cube(tree: &mut HeaderTree, rules: &GeometryRules, cube: [i64; 3]) -> Result<()> {
    if let Some(bad) = cube.iter().find(|&&c| c <= 0) {
        return Err(HeaderError::header_data(format!("framing cube sides must be positive, got {}", bad)));
    }
    match rules.framing_cube {
        FramingCube::Fixed(fixed) if fixed == cube => Ok(()),
        FramingCube::Fixed(fixed) => Err(HeaderError::FormatConstraint(format!(
            "framing cube is fixed at {:?}",
            fixed
        ))),
        FramingCube::Fields(fields) => {
            for field in fields {
                tree.require_int(field)?;
            }
            for (field, side) in fields.into_iter().zip(cube) {
                tree.insert(field, side);
            }
            Ok(())
        }
    }
}

/// Reads the shape, voxel sizes and voxel-to-world affine out of a header tree.
pub fn derive_shape(tree: &HeaderTree, rules: &GeometryRules) -> Result<Geometry> {
    let res = resolution(tree, rules)?;
    let mut dims = [0usize; 3];
    let mut centers = [0f64; 3];
    for (axis, dim, center) in izip!(&rules.axes, &mut dims, &mut centers) {
        let start = tree.require_int(axis.start)?;
        let end = tree.require_int(axis.end)?;
        let extent = end - start;
        if extent < 0 || extent % res != 0 {
            return Err(HeaderError::header_data(format!(
                "`{}`..`{}` = {}..{} is not a whole number of {}-unit voxels",
                axis.start, axis.end, start, end, res
            )));
        }
        *dim = (extent / res) as usize;
        *center = start as f64 + extent as f64 / 2.0;
    }

    let maps = map_count(tree, rules)?;
    let zoom = res as f64 * rules.base_unit;
    let cube = framing_cube(tree, rules)?;

    let mut affine = Array2::<f64>::zeros((4, 4));
    for (d, (mapping, center, side)) in izip!(&rules.axis_map, centers, cube).enumerate() {
        let scale = mapping.sign * zoom;
        affine[[mapping.world, d]] = scale;
        affine[[mapping.world, 3]] = scale * (center - side as f64 / 2.0);
    }
    affine[[3, 3]] = 1.0;

    Ok(Geometry {
        shape: DataShape {
            maps,
            z: dims[0],
            y: dims[1],
            x: dims[2],
        },
        zooms: [zoom; 3],
        affine,
    })
}

fn set_map_count(
    tree: &mut HeaderTree,
    descriptor: &RecordDescriptor,
    rules: &GeometryRules,
    n: i64,
) -> Result<()> {
    let axis = rules
        .map_axis
        .ok_or_else(|| HeaderError::FormatConstraint("format has no map axis".to_string()))?;
    let n = usize::try_from(n).map_err(|_| HeaderError::header_data(format!("map count must be >= 0, got {}", n)))?;
    descriptor.resize_counted(tree, axis.count_field, n)
}

/// Rewrites the header so that it describes the requested shape and returns the
/// resulting geometry. The tree is only modified when every step succeeds.
pub fn apply_shape(
    tree: &mut HeaderTree,
    descriptor: &RecordDescriptor,
    rules: &GeometryRules,
    request: &ShapeRequest,
) -> Result<Geometry> {
    if request.is_empty() {
        return Err(HeaderError::header_data("shape request sets nothing"));
    }
    let mut staged = tree.clone();

    if let Some(shape) = &request.shape {
        if shape.len() != rules.rank() {
            return Err(HeaderError::header_data(format!(
                "shape needs {} entries, got {:?}",
                rules.rank(),
                shape
            )));
        }
        if shape.iter().any(|&d| d < 0) {
            return Err(HeaderError::header_data(format!("negative extent in shape {:?}", shape)));
        }
        let (maps, spatial) = shape.split_at(shape.len() - 3);
        let res = resolution(&staged, rules)?;
        for (axis, &start, &dim) in izip!(&rules.axes, &rules.canonical_start, spatial) {
            let end = dim
                .checked_mul(res)
                .and_then(|extent| start.checked_add(extent))
                .ok_or_else(|| HeaderError::header_data(format!("extent {} overflows `{}`", dim, axis.end)))?;
            staged.insert(axis.start, start);
            staged.insert(axis.end, end);
        }
        if let Some(&n) = maps.first() {
            set_map_count(&mut staged, descriptor, rules, n)?;
        }
    }

    if let Some(bounds) = &request.zyx {
        for (axis, [start, end]) in rules.axes.iter().zip(bounds.zyx()) {
            if end < start {
                return Err(HeaderError::header_data(format!(
                    "`{}` {} lies before `{}` {}",
                    axis.end, end, axis.start, start
                )));
            }
            staged.insert(axis.start, start);
            staged.insert(axis.end, end);
        }
    }

    if let Some(n) = request.n {
        set_map_count(&mut staged, descriptor, rules, n)?;
    }

    let geometry = derive_shape(&staged, rules)?;
    debug!("Applied shape {:?}", geometry.shape.to_vec());
    *tree = staged;
    Ok(geometry)
}

/// Element type of the payload described by `tree`.
pub fn data_type(tree: &HeaderTree, rule: &DataTypeRule) -> Result<ElementType> {
    match rule {
        DataTypeRule::Fixed(ty) => Ok(*ty),
        DataTypeRule::Coded { field, table } => table.type_for(tree.require_int(field)?),
    }
}

pub fn set_data_type(tree: &mut HeaderTree, rule: &DataTypeRule, ty: ElementType) -> Result<()> {
    match rule {
        DataTypeRule::Fixed(fixed) if *fixed == ty => Ok(()),
        DataTypeRule::Fixed(fixed) => Err(HeaderError::FormatConstraint(format!(
            "data type is fixed to {}, cannot store {}",
            fixed, ty
        ))),
        DataTypeRule::Coded { field, table } => {
            let code = table.code_for(ty)?;
            tree.require_int(field)?;
            tree.insert(*field, code);
            Ok(())
        }
    }
}
