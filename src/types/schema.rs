//! Declarative header layouts.
//!
//! A [`RecordDescriptor`] is an ordered list of fields and repeated sub-records. Counts
//! and presence conditions are symbolic references to fields read earlier, either in the
//! same record or in an enclosing one.

use crate::error::{HeaderError, Result};
use crate::types::header::{HeaderTree, HeaderValue};
use crate::types::scope::Scope;
use bon::Builder;
use itertools::Itertools;

/// On-disk scalar encoding. Every modeled format is little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl BinaryType {
    pub const fn width(self) -> usize {
        match self {
            BinaryType::I8 | BinaryType::U8 => 1,
            BinaryType::I16 | BinaryType::U16 => 2,
            BinaryType::I32 | BinaryType::U32 | BinaryType::F32 => 4,
            BinaryType::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BinaryType::I8 => "int8",
            BinaryType::U8 => "uint8",
            BinaryType::I16 => "int16",
            BinaryType::U16 => "uint16",
            BinaryType::I32 => "int32",
            BinaryType::U32 => "uint32",
            BinaryType::F32 => "float32",
            BinaryType::F64 => "float64",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, BinaryType::F32 | BinaryType::F64)
    }

    /// Inclusive value range of the integer types.
    pub const fn int_range(self) -> Option<(i64, i64)> {
        match self {
            BinaryType::I8 => Some((i8::MIN as i64, i8::MAX as i64)),
            BinaryType::U8 => Some((0, u8::MAX as i64)),
            BinaryType::I16 => Some((i16::MIN as i64, i16::MAX as i64)),
            BinaryType::U16 => Some((0, u16::MAX as i64)),
            BinaryType::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            BinaryType::U32 => Some((0, u32::MAX as i64)),
            BinaryType::F32 | BinaryType::F64 => None,
        }
    }
}

/// Element or byte count: a constant, or a reference to an earlier integer field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Count {
    Fixed(usize),
    Field(String),
}

impl Count {
    pub fn field(name: impl Into<String>) -> Self {
        Count::Field(name.into())
    }

    fn reference(&self) -> Option<&str> {
        match self {
            Count::Fixed(_) => None,
            Count::Field(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(BinaryType),
    Array { ty: BinaryType, count: Count },
    /// Fixed counts are zero padded on disk; field counts are exact.
    Bytes { len: Count },
    /// Null-terminated string.
    CString,
}

/// Presence gate: the field exists on disk only when `field == equals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub equals: i64,
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct FieldDescriptor {
    #[builder(into)]
    pub name: String,
    pub kind: FieldKind,
    /// Value of an empty header, and of this field whenever its condition is false.
    #[builder(into)]
    pub default_value: HeaderValue,
    pub condition: Option<Condition>,
    /// First format version that carries the field.
    #[builder(default)]
    pub since: u16,
}

impl FieldDescriptor {
    pub fn scalar(name: &str, ty: BinaryType, default: impl Into<HeaderValue>) -> Self {
        let default = match default.into() {
            HeaderValue::Int(v) if ty.is_float() => HeaderValue::Float(v as f64),
            other => other,
        };
        Self::builder()
            .name(name)
            .kind(FieldKind::Scalar(ty))
            .default_value(default)
            .build()
    }

    pub fn cstring(name: &str, default: &str) -> Self {
        Self::builder()
            .name(name)
            .kind(FieldKind::CString)
            .default_value(default)
            .build()
    }

    pub fn fixed_bytes(name: &str, width: usize, default: &str) -> Self {
        Self::builder()
            .name(name)
            .kind(FieldKind::Bytes { len: Count::Fixed(width) })
            .default_value(default)
            .build()
    }

    pub fn counted_bytes(name: &str, len_field: &str) -> Self {
        Self::builder()
            .name(name)
            .kind(FieldKind::Bytes { len: Count::field(len_field) })
            .default_value(HeaderValue::Bytes(Vec::new()))
            .build()
    }

    pub fn array(name: &str, ty: BinaryType, count: Count, default: Vec<HeaderValue>) -> Self {
        Self::builder()
            .name(name)
            .kind(FieldKind::Array { ty, count })
            .default_value(HeaderValue::Array(default))
            .build()
    }

    pub fn when(mut self, field: &str, equals: i64) -> Self {
        self.condition = Some(Condition {
            field: field.to_string(),
            equals,
        });
        self
    }

    pub fn since(mut self, version: u16) -> Self {
        self.since = version;
        self
    }

    /// Evaluates the presence condition against the fields read so far.
    pub fn is_present(&self, scope: &Scope<'_>) -> Result<bool> {
        match &self.condition {
            None => Ok(true),
            Some(cond) => Ok(scope.resolve_int(&cond.field, &self.name)? == cond.equals),
        }
    }

    fn is_integer_scalar(&self) -> bool {
        matches!(self.kind, FieldKind::Scalar(ty) if !ty.is_float())
    }
}

/// A sub-record repeated once per unit of `count`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatedRecord {
    pub name: String,
    pub count: String,
    pub record: RecordDescriptor,
    pub since: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordItem {
    Field(FieldDescriptor),
    Repeated(RepeatedRecord),
}

impl RecordItem {
    pub fn name(&self) -> &str {
        match self {
            RecordItem::Field(f) => &f.name,
            RecordItem::Repeated(r) => &r.name,
        }
    }

    fn since(&self) -> u16 {
        match self {
            RecordItem::Field(f) => f.since,
            RecordItem::Repeated(r) => r.since,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordDescriptor {
    items: Vec<RecordItem>,
}

impl RecordDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.items.push(RecordItem::Field(field));
        self
    }

    pub fn repeated(self, name: &str, count: &str, record: RecordDescriptor) -> Self {
        self.repeated_since(name, count, record, 0)
    }

    pub fn repeated_since(mut self, name: &str, count: &str, record: RecordDescriptor, since: u16) -> Self {
        self.items.push(RecordItem::Repeated(RepeatedRecord {
            name: name.to_string(),
            count: count.to_string(),
            record,
            since,
        }));
        self
    }

    pub fn items(&self) -> &[RecordItem] {
        &self.items
    }

    /// Copy without the fields and records introduced after `version`.
    pub fn for_version(&self, version: u16) -> Self {
        let items = self
            .items
            .iter()
            .filter(|item| item.since() <= version)
            .map(|item| match item {
                RecordItem::Field(f) => RecordItem::Field(f.clone()),
                RecordItem::Repeated(r) => RecordItem::Repeated(RepeatedRecord {
                    record: r.record.for_version(version),
                    ..r.clone()
                }),
            })
            .collect();
        Self { items }
    }

    /// Checks that every count and condition refers to an integer field declared earlier
    /// in the same record or an enclosing one, and that names are unique per record.
    pub fn validate(&self) -> Result<()> {
        let mut visible: Vec<Vec<&str>> = Vec::new();
        self.validate_in(&mut visible)
    }

    fn validate_in<'d>(&'d self, visible: &mut Vec<Vec<&'d str>>) -> Result<()> {
        visible.push(Vec::new());
        let mut seen: Vec<&str> = Vec::new();
        for item in &self.items {
            let name = item.name();
            if seen.contains(&name) {
                return Err(HeaderError::InvalidSchema(format!("duplicate field `{}`", name)));
            }
            seen.push(name);

            let references: Vec<&str> = match item {
                RecordItem::Field(f) => {
                    let count_ref = match &f.kind {
                        FieldKind::Array { count, .. } => count.reference(),
                        FieldKind::Bytes { len } => len.reference(),
                        FieldKind::Scalar(_) | FieldKind::CString => None,
                    };
                    count_ref
                        .into_iter()
                        .chain(f.condition.as_ref().map(|c| c.field.as_str()))
                        .collect()
                }
                RecordItem::Repeated(r) => vec![r.count.as_str()],
            };
            let unresolved: Vec<&str> = references
                .into_iter()
                .filter(|r| !visible.iter().any(|scope| scope.contains(r)))
                .collect();
            if !unresolved.is_empty() {
                return Err(HeaderError::InvalidSchema(format!(
                    "`{}` refers to undeclared or later field(s): {}",
                    name,
                    unresolved.iter().join(", ")
                )));
            }

            match item {
                RecordItem::Field(f) if f.is_integer_scalar() => {
                    if let Some(innermost) = visible.last_mut() {
                        innermost.push(&f.name);
                    }
                }
                RecordItem::Field(_) => {}
                RecordItem::Repeated(r) => r.record.validate_in(visible)?,
            }
        }
        visible.pop();
        Ok(())
    }

    /// Tree holding every field's default; repeated records are sized by their
    /// (default) count fields.
    pub fn default_tree(&self) -> Result<HeaderTree> {
        self.default_record(None)
    }

    fn default_record(&self, parent: Option<&Scope<'_>>) -> Result<HeaderTree> {
        let mut tree = HeaderTree::new();
        for item in &self.items {
            let value = {
                let scope = Scope::new(&tree, parent);
                match item {
                    RecordItem::Field(f) => f.default_value.clone(),
                    RecordItem::Repeated(r) => {
                        let count = scope.resolve_count(&r.count, &r.name)?;
                        let children = (0..count)
                            .map(|_| r.record.default_record(Some(&scope)))
                            .collect::<Result<Vec<_>>>()?;
                        HeaderValue::Records(children)
                    }
                }
            };
            tree.insert(item.name(), value);
        }
        Ok(tree)
    }

    /// Sets `count_field` to `n` and resizes every repeated record it gates, at any depth.
    /// Records are truncated or extended with default entries.
    ///
    /// On error the tree may be partially updated; callers stage changes on a copy.
    pub fn resize_counted(&self, tree: &mut HeaderTree, count_field: &str, n: usize) -> Result<()> {
        tree.require_int(count_field)?;
        let n = i64::try_from(n)
            .map_err(|_| HeaderError::header_data(format!("count {} does not fit `{}`", n, count_field)))?;
        tree.insert(count_field, n);
        self.resync_record(tree, None, count_field)
    }

    fn resync_record(&self, tree: &mut HeaderTree, parent: Option<&Scope<'_>>, count_field: &str) -> Result<()> {
        for item in &self.items {
            let RecordItem::Repeated(rep) = item else {
                continue;
            };
            let mut children = match tree.records_mut(&rep.name) {
                Some(children) => std::mem::take(children),
                None => return Err(HeaderError::MissingField(rep.name.clone())),
            };
            {
                let scope = Scope::new(tree, parent);
                if rep.count == count_field {
                    let target = scope.resolve_count(&rep.count, &rep.name)?;
                    children.truncate(target);
                    while children.len() < target {
                        children.push(rep.record.default_record(Some(&scope))?);
                    }
                }
                for child in children.iter_mut() {
                    rep.record.resync_record(child, Some(&scope), count_field)?;
                }
            }
            tree.insert(rep.name.clone(), HeaderValue::Records(children));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_schema() -> RecordDescriptor {
        RecordDescriptor::new()
            .field(FieldDescriptor::scalar("n_rows", BinaryType::I32, 2))
            .field(FieldDescriptor::scalar("n_cols", BinaryType::I16, 1))
            .repeated(
                "rows",
                "n_rows",
                RecordDescriptor::new()
                    .field(FieldDescriptor::scalar("kind", BinaryType::U8, 1))
                    .field(FieldDescriptor::scalar("lag", BinaryType::I32, 0).when("kind", 3).since(2))
                    .repeated(
                        "cells",
                        "n_cols",
                        RecordDescriptor::new().field(FieldDescriptor::scalar("v", BinaryType::F32, 0)),
                    ),
            )
    }

    #[test]
    fn test_validate_accepts_ancestor_references() {
        assert!(table_schema().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_forward_reference() {
        let schema = RecordDescriptor::new()
            .repeated(
                "rows",
                "n_rows",
                RecordDescriptor::new().field(FieldDescriptor::scalar("v", BinaryType::U8, 0)),
            )
            .field(FieldDescriptor::scalar("n_rows", BinaryType::I32, 0));

        assert!(matches!(schema.validate(), Err(HeaderError::InvalidSchema(_))));
    }

    #[test]
    fn test_validate_rejects_float_count_and_duplicates() {
        let float_count = RecordDescriptor::new()
            .field(FieldDescriptor::scalar("len", BinaryType::F32, 0))
            .field(FieldDescriptor::counted_bytes("payload", "len"));
        assert!(float_count.validate().is_err());

        let duplicate = RecordDescriptor::new()
            .field(FieldDescriptor::scalar("a", BinaryType::U8, 0))
            .field(FieldDescriptor::scalar("a", BinaryType::U8, 0));
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_sibling_record_scope() {
        // Fields inside one repeated record are not visible to the next item
        let schema = RecordDescriptor::new()
            .field(FieldDescriptor::scalar("n", BinaryType::I32, 1))
            .repeated(
                "a",
                "n",
                RecordDescriptor::new().field(FieldDescriptor::scalar("inner", BinaryType::I32, 1)),
            )
            .repeated("b", "inner", RecordDescriptor::new());
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_for_version_drops_new_fields() {
        let v1 = table_schema().for_version(1);
        let RecordItem::Repeated(rows) = &v1.items()[2] else {
            panic!("rows should stay a repeated record");
        };
        let names: Vec<&str> = rows.record.items().iter().map(RecordItem::name).collect();
        assert_eq!(names, vec!["kind", "cells"]);
        assert!(v1.validate().is_ok());
    }

    #[test]
    fn test_default_tree_sizes_records() -> Result<()> {
        let tree = table_schema().default_tree()?;
        let rows = tree.records("rows").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].records("cells").unwrap().len(), 1);
        assert_eq!(rows[0].records("cells").unwrap()[0].float("v"), Some(0.0));
        assert_eq!(rows[0].get("v"), None);
        Ok(())
    }

    #[test]
    fn test_resize_counted_reaches_nested_tables() -> Result<()> {
        let schema = table_schema();
        let mut tree = schema.default_tree()?;

        schema.resize_counted(&mut tree, "n_cols", 3)?;
        assert_eq!(tree.int("n_cols"), Some(3));
        for row in tree.records("rows").unwrap() {
            assert_eq!(row.records("cells").unwrap().len(), 3);
        }

        schema.resize_counted(&mut tree, "n_rows", 0)?;
        assert_eq!(tree.records("rows").unwrap().len(), 0);

        schema.resize_counted(&mut tree, "n_rows", 1)?;
        let rows = tree.records("rows").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].records("cells").unwrap().len(), 3);
        Ok(())
    }

    #[test]
    fn test_scalar_float_default_coerced() {
        let field = FieldDescriptor::scalar("tr", BinaryType::F32, 2000);
        assert_eq!(field.default_value, HeaderValue::Float(2000.0));
    }
}
