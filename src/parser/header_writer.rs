//! Descriptor-driven header writer.
//!
//! Counts are never inferred from the tree: every repeated record and every field-sized
//! array or byte string must agree with the count field it references.

use super::join_path;
use crate::config::ReaderConfig;
use crate::error::{HeaderError, Result};
use crate::types::header::{HeaderTree, HeaderValue};
use crate::types::schema::{BinaryType, Count, FieldDescriptor, FieldKind, RecordDescriptor, RecordItem};
use crate::types::scope::Scope;
use log::{debug, trace};

/// Serializes a header tree into a fresh buffer. The tree itself is left untouched.
pub fn serialize_header(tree: &HeaderTree, descriptor: &RecordDescriptor, config: &ReaderConfig) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_record(&mut out, tree, descriptor, None, "", config)?;
    debug!("Serialized header: {} bytes", out.len());
    Ok(out)
}

/// Serialized length of the header, i.e. the offset of the payload that follows it.
pub fn encoded_len(tree: &HeaderTree, descriptor: &RecordDescriptor, config: &ReaderConfig) -> Result<usize> {
    serialize_header(tree, descriptor, config).map(|bytes| bytes.len())
}

fn write_record(
    out: &mut Vec<u8>,
    tree: &HeaderTree,
    descriptor: &RecordDescriptor,
    parent: Option<&Scope<'_>>,
    path: &str,
    config: &ReaderConfig,
) -> Result<()> {
    let scope = Scope::new(tree, parent);
    for item in descriptor.items() {
        match item {
            RecordItem::Field(field) => {
                if !field.is_present(&scope)? {
                    continue;
                }
                let field_path = join_path(path, &field.name);
                let value = tree
                    .get(&field.name)
                    .ok_or_else(|| HeaderError::MissingField(field_path.clone()))?;
                write_field(out, field, value, &scope, &field_path, config)?;
            }
            RecordItem::Repeated(rep) => {
                let record_path = join_path(path, &rep.name);
                let value = tree
                    .get(&rep.name)
                    .ok_or_else(|| HeaderError::MissingField(record_path.clone()))?;
                let children = value.as_records().ok_or_else(|| HeaderError::TypeMismatch {
                    field: record_path.clone(),
                    expected: "records",
                    actual: value.kind_name(),
                })?;
                let expected = scope.resolve_count(&rep.count, &record_path)?;
                if children.len() != expected {
                    return Err(HeaderError::CountMismatch {
                        field: record_path,
                        reference: rep.count.clone(),
                        expected,
                        actual: children.len(),
                    });
                }
                trace!("Writing {} x `{}`", expected, record_path);
                for (i, child) in children.iter().enumerate() {
                    let child_path = format!("{}[{}]", record_path, i);
                    write_record(out, child, &rep.record, Some(&scope), &child_path, config)?;
                }
            }
        }
    }
    Ok(())
}

fn expect_len(count: &Count, actual: usize, scope: &Scope<'_>, path: &str) -> Result<()> {
    let (expected, reference) = match count {
        Count::Fixed(n) => (*n, "<fixed>"),
        Count::Field(reference) => (scope.resolve_count(reference, path)?, reference.as_str()),
    };
    if expected != actual {
        return Err(HeaderError::CountMismatch {
            field: path.to_string(),
            reference: reference.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn write_field(
    out: &mut Vec<u8>,
    field: &FieldDescriptor,
    value: &HeaderValue,
    scope: &Scope<'_>,
    path: &str,
    config: &ReaderConfig,
) -> Result<()> {
    match &field.kind {
        FieldKind::Scalar(ty) => write_scalar(out, *ty, value, path),
        FieldKind::Array { ty, count } => {
            let HeaderValue::Array(items) = value else {
                return Err(type_mismatch(path, "array", value));
            };
            expect_len(count, items.len(), scope, path)?;
            items.iter().try_for_each(|item| write_scalar(out, *ty, item, path))
        }
        FieldKind::Bytes { len } => {
            let bytes = value.as_bytes().ok_or_else(|| type_mismatch(path, "bytes", value))?;
            match len {
                Count::Fixed(width) => {
                    let kept = bytes.len().min(*width);
                    out.extend_from_slice(&bytes[..kept]);
                    out.resize(out.len() + (width - kept), 0);
                }
                Count::Field(_) => {
                    expect_len(len, bytes.len(), scope, path)?;
                    out.extend_from_slice(bytes);
                }
            }
            Ok(())
        }
        FieldKind::CString => {
            let bytes = value.as_bytes().ok_or_else(|| type_mismatch(path, "bytes", value))?;
            // An embedded zero would end the string early on read
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            let text = &bytes[..end];
            match config.max_cstring_len {
                Some(max) if text.len() >= max => out.extend_from_slice(&text[..max]),
                _ => {
                    out.extend_from_slice(text);
                    out.push(0);
                }
            }
            Ok(())
        }
    }
}

fn type_mismatch(path: &str, expected: &'static str, value: &HeaderValue) -> HeaderError {
    HeaderError::TypeMismatch {
        field: path.to_string(),
        expected,
        actual: value.kind_name(),
    }
}

/// Encodes one little-endian scalar. Integer fields take only integers in range; float
/// fields also accept integers.
pub fn write_scalar(out: &mut Vec<u8>, ty: BinaryType, value: &HeaderValue, path: &str) -> Result<()> {
    let float = || value.as_float().ok_or_else(|| type_mismatch(path, "float", value));
    match ty {
        BinaryType::F32 => out.extend_from_slice(&(float()? as f32).to_le_bytes()),
        BinaryType::F64 => out.extend_from_slice(&float()?.to_le_bytes()),
        _ => {
            let v = checked_int(ty, value, path)?;
            match ty {
                BinaryType::I8 => out.extend_from_slice(&(v as i8).to_le_bytes()),
                BinaryType::U8 => out.push(v as u8),
                BinaryType::I16 => out.extend_from_slice(&(v as i16).to_le_bytes()),
                BinaryType::U16 => out.extend_from_slice(&(v as u16).to_le_bytes()),
                BinaryType::I32 => out.extend_from_slice(&(v as i32).to_le_bytes()),
                _ => out.extend_from_slice(&(v as u32).to_le_bytes()),
            }
        }
    }
    Ok(())
}

fn checked_int(ty: BinaryType, value: &HeaderValue, path: &str) -> Result<i64> {
    let v = value.as_int().ok_or_else(|| type_mismatch(path, "int", value))?;
    match ty.int_range() {
        Some((lo, hi)) if (lo..=hi).contains(&v) => Ok(v),
        _ => Err(HeaderError::OutOfRange {
            field: path.to_string(),
            ty: ty.name(),
            value: v.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::header_parser::parse_header;
    use crate::types::schema::FieldDescriptor;

    fn schema() -> RecordDescriptor {
        RecordDescriptor::new()
            .field(FieldDescriptor::scalar("nr_of_submaps", BinaryType::I32, 1))
            .field(FieldDescriptor::fixed_bytes("tag", 4, "BV"))
            .repeated(
                "maps",
                "nr_of_submaps",
                RecordDescriptor::new()
                    .field(FieldDescriptor::scalar("type_of_map", BinaryType::I32, 1))
                    .field(FieldDescriptor::scalar("nr_of_lags", BinaryType::I32, 0).when("type_of_map", 3))
                    .field(FieldDescriptor::cstring("map_name", "Testmap"))
                    .field(FieldDescriptor::scalar("threshold", BinaryType::F32, 1.65)),
            )
    }

    #[test]
    fn test_round_trip_is_exact() -> Result<()> {
        let schema = schema();
        let config = ReaderConfig::default();
        let mut tree = schema.default_tree()?;
        schema.resize_counted(&mut tree, "nr_of_submaps", 2)?;
        let maps = tree.records_mut("maps").unwrap();
        maps[1].insert("type_of_map", 3i64);
        maps[1].insert("nr_of_lags", 8i64);

        let bytes = serialize_header(&tree, &schema, &config)?;
        let parsed = parse_header(&bytes, &schema, &config)?;
        // f32 storage narrows the default threshold
        assert_eq!(parsed.records("maps").unwrap()[0].float("threshold"), Some(1.65f32 as f64));
        let again = serialize_header(&parsed, &schema, &config)?;
        assert_eq!(bytes, again);
        assert_eq!(parse_header(&again, &schema, &config)?, parsed);
        Ok(())
    }

    #[test]
    fn test_layout_bytes() -> Result<()> {
        let schema = schema();
        let tree = schema.default_tree()?;
        let bytes = serialize_header(&tree, &schema, &ReaderConfig::default())?;

        let mut expected = Vec::new();
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(b"BV\0\0");
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(b"Testmap\0");
        expected.extend_from_slice(&1.65f32.to_le_bytes());
        assert_eq!(bytes, expected);
        assert_eq!(encoded_len(&tree, &schema, &ReaderConfig::default())?, expected.len());
        Ok(())
    }

    #[test]
    fn test_zero_count_writes_nothing() -> Result<()> {
        let schema = schema();
        let mut tree = schema.default_tree()?;
        schema.resize_counted(&mut tree, "nr_of_submaps", 0)?;
        let bytes = serialize_header(&tree, &schema, &ReaderConfig::default())?;
        assert_eq!(bytes.len(), 8);
        Ok(())
    }

    #[test]
    fn test_count_mismatch_is_not_inferred() -> Result<()> {
        let schema = schema();
        let mut tree = schema.default_tree()?;
        tree.insert("nr_of_submaps", 3i64);
        let before = tree.clone();

        match serialize_header(&tree, &schema, &ReaderConfig::default()) {
            Err(HeaderError::CountMismatch { field, expected, actual, .. }) => {
                assert_eq!(field, "maps");
                assert_eq!(expected, 3);
                assert_eq!(actual, 1);
            }
            other => panic!("expected CountMismatch, got {:?}", other),
        }
        assert_eq!(tree, before);
        Ok(())
    }

    #[test]
    fn test_missing_field_reports_path() -> Result<()> {
        let schema = RecordDescriptor::new()
            .field(FieldDescriptor::scalar("a", BinaryType::U8, 0))
            .field(FieldDescriptor::scalar("b", BinaryType::U8, 0));
        let mut tree = HeaderTree::new();
        tree.insert("a", 1i64);

        let result = serialize_header(&tree, &schema, &ReaderConfig::default());
        assert!(matches!(result, Err(HeaderError::MissingField(ref name)) if name == "b"));
        Ok(())
    }

    #[test]
    fn test_gated_field_not_required() -> Result<()> {
        let schema = schema();
        let mut tree = schema.default_tree()?;
        if let Some(maps) = tree.records_mut("maps") {
            let mut map = HeaderTree::new();
            map.insert("type_of_map", 1i64);
            map.insert("map_name", "x");
            map.insert("threshold", 2.0f64);
            maps[0] = map;
        }
        assert!(serialize_header(&tree, &schema, &ReaderConfig::default()).is_ok());
        Ok(())
    }

    #[test]
    fn test_out_of_range_and_type_mismatch() {
        let mut out = Vec::new();
        assert!(matches!(
            write_scalar(&mut out, BinaryType::I16, &HeaderValue::Int(40_000), "x"),
            Err(HeaderError::OutOfRange { ty: "int16", .. })
        ));
        assert!(matches!(
            write_scalar(&mut out, BinaryType::U8, &HeaderValue::Float(1.0), "x"),
            Err(HeaderError::TypeMismatch { expected: "int", .. })
        ));
        assert!(write_scalar(&mut out, BinaryType::F32, &HeaderValue::Int(3), "x").is_ok());
        assert_eq!(out, 3.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_fixed_bytes_truncate_and_counted_bytes_exact() -> Result<()> {
        let schema = RecordDescriptor::new()
            .field(FieldDescriptor::fixed_bytes("tag", 2, ""))
            .field(FieldDescriptor::scalar("len", BinaryType::U8, 0))
            .field(FieldDescriptor::counted_bytes("blob", "len"));
        let mut tree = HeaderTree::new();
        tree.insert("tag", "ABCD");
        tree.insert("len", 2i64);
        tree.insert("blob", &[9u8, 8][..]);

        let bytes = serialize_header(&tree, &schema, &ReaderConfig::default())?;
        assert_eq!(bytes, vec![b'A', b'B', 2, 9, 8]);

        tree.insert("len", 3i64);
        assert!(matches!(
            serialize_header(&tree, &schema, &ReaderConfig::default()),
            Err(HeaderError::CountMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_cstring_maximum_round_trip() -> Result<()> {
        let schema = RecordDescriptor::new().field(FieldDescriptor::cstring("name", ""));
        let config = ReaderConfig::builder().max_cstring_len(4).build();
        let mut tree = HeaderTree::new();
        tree.insert("name", "abcdef");

        let bytes = serialize_header(&tree, &schema, &config)?;
        assert_eq!(bytes, b"abcd".to_vec());
        assert_eq!(parse_header(&bytes, &schema, &config)?.bytes("name"), Some(&b"abcd"[..]));
        Ok(())
    }
}
