//! Descriptor-driven header reader.
//!
//! The reader walks a [`RecordDescriptor`] depth first. Scalars are decoded with winnow's
//! little-endian parsers; counts and presence conditions are resolved against the part of
//! the tree that has already been read.

use super::join_path;
use crate::config::ReaderConfig;
use crate::error::{HeaderError, Result};
use crate::types::header::{HeaderTree, HeaderValue};
use crate::types::schema::{BinaryType, Count, FieldDescriptor, FieldKind, RecordDescriptor, RecordItem};
use crate::types::scope::Scope;
use crate::utils::file_utils::ByteSource;
use log::{debug, trace};
use winnow::{
    Parser,
    binary::{le_f32, le_f64, le_i8, le_i16, le_i32, le_u8, le_u16, le_u32},
    error::ContextError,
    token::take,
};

/// Read position within the header buffer.
struct Cursor<'a> {
    input: &'a [u8],
    total: usize,
}

impl Cursor<'_> {
    fn offset(&self) -> usize {
        self.total - self.input.len()
    }

    fn remaining(&self) -> usize {
        self.input.len()
    }

    fn mark(&self) -> Mark {
        Mark {
            offset: self.offset(),
            available: self.remaining(),
        }
    }

    fn truncated(&self, field: &str, needed: usize) -> HeaderError {
        self.mark().truncated(field, needed)
    }
}

/// Position snapshot taken before a read, for error reporting.
#[derive(Clone, Copy)]
struct Mark {
    offset: usize,
    available: usize,
}

impl Mark {
    fn truncated(self, field: &str, needed: usize) -> HeaderError {
        HeaderError::TruncatedInput {
            field: field.to_string(),
            offset: self.offset,
            needed,
            available: self.available,
        }
    }
}

fn next<'i, O, P>(mut parser: P, input: &mut &'i [u8]) -> std::result::Result<O, ContextError>
where
    P: Parser<&'i [u8], O, ContextError>,
{
    parser.parse_next(input)
}

/// Decodes one little-endian scalar.
pub fn parse_scalar(input: &mut &[u8], ty: BinaryType) -> std::result::Result<HeaderValue, ContextError> {
    let value = match ty {
        BinaryType::I8 => HeaderValue::Int(next(le_i8, input)?.into()),
        BinaryType::U8 => HeaderValue::Int(next(le_u8, input)?.into()),
        BinaryType::I16 => HeaderValue::Int(next(le_i16, input)?.into()),
        BinaryType::U16 => HeaderValue::Int(next(le_u16, input)?.into()),
        BinaryType::I32 => HeaderValue::Int(next(le_i32, input)?.into()),
        BinaryType::U32 => HeaderValue::Int(next(le_u32, input)?.into()),
        BinaryType::F32 => HeaderValue::Float(next(le_f32, input)?.into()),
        BinaryType::F64 => HeaderValue::Float(next(le_f64, input)?),
    };
    Ok(value)
}

/// Parses a complete header. Bytes after the header (the payload) are ignored.
pub fn parse_header(bytes: &[u8], descriptor: &RecordDescriptor, config: &ReaderConfig) -> Result<HeaderTree> {
    parse_header_prefix(bytes, descriptor, config).map(|(tree, _)| tree)
}

/// Parses a header and reports how many bytes it occupied.
pub fn parse_header_prefix(
    bytes: &[u8],
    descriptor: &RecordDescriptor,
    config: &ReaderConfig,
) -> Result<(HeaderTree, usize)> {
    let mut cursor = Cursor {
        input: bytes,
        total: bytes.len(),
    };
    let tree = parse_record(&mut cursor, descriptor, None, "", config)?;
    let consumed = cursor.offset();
    debug!(
        "Parsed header: {} top-level fields, {} of {} bytes",
        tree.len(),
        consumed,
        bytes.len()
    );
    Ok((tree, consumed))
}

/// Parses a header through a [`ByteSource`], reading a window that doubles whenever the
/// header runs past it.
pub fn read_header<S: ByteSource + ?Sized>(
    source: &S,
    descriptor: &RecordDescriptor,
    config: &ReaderConfig,
) -> Result<(HeaderTree, usize)> {
    let total = source.len();
    let mut window = config.source_window.max(1) as u64;
    loop {
        let length = window.min(total);
        let buffer = source.read_at(0, length as usize)?;
        match parse_header_prefix(&buffer, descriptor, config) {
            Err(HeaderError::TruncatedInput { .. }) if length < total => {
                trace!("Header exceeds {} byte window, growing", length);
                window = window.saturating_mul(2);
            }
            result => return result,
        }
    }
}

fn parse_record(
    cursor: &mut Cursor<'_>,
    descriptor: &RecordDescriptor,
    parent: Option<&Scope<'_>>,
    path: &str,
    config: &ReaderConfig,
) -> Result<HeaderTree> {
    let mut tree = HeaderTree::new();
    for item in descriptor.items() {
        let value = {
            let scope = Scope::new(&tree, parent);
            match item {
                RecordItem::Field(field) => {
                    if field.is_present(&scope)? {
                        parse_field(cursor, field, &scope, &join_path(path, &field.name), config)?
                    } else {
                        field.default_value.clone()
                    }
                }
                RecordItem::Repeated(rep) => {
                    let record_path = join_path(path, &rep.name);
                    let count = scope.resolve_count(&rep.count, &record_path)?;
                    trace!("Reading {} x `{}`", count, record_path);
                    // Never trust a count for preallocation beyond what the input can hold
                    let mut children = Vec::with_capacity(count.min(cursor.remaining()));
                    for i in 0..count {
                        let child_path = format!("{}[{}]", record_path, i);
                        children.push(parse_record(cursor, &rep.record, Some(&scope), &child_path, config)?);
                    }
                    HeaderValue::Records(children)
                }
            }
        };
        tree.insert(item.name(), value);
    }
    Ok(tree)
}

fn resolve_len(count: &Count, scope: &Scope<'_>, path: &str) -> Result<usize> {
    match count {
        Count::Fixed(n) => Ok(*n),
        Count::Field(reference) => scope.resolve_count(reference, path),
    }
}

fn parse_field(
    cursor: &mut Cursor<'_>,
    field: &FieldDescriptor,
    scope: &Scope<'_>,
    path: &str,
    config: &ReaderConfig,
) -> Result<HeaderValue> {
    match &field.kind {
        FieldKind::Scalar(ty) => {
            let mark = cursor.mark();
            parse_scalar(&mut cursor.input, *ty).map_err(|_| mark.truncated(path, ty.width()))
        }
        FieldKind::Array { ty, count } => {
            let n = resolve_len(count, scope, path)?;
            let mark = cursor.mark();
            let items = (0..n)
                .map(|_| parse_scalar(&mut cursor.input, *ty))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| mark.truncated(path, n.saturating_mul(ty.width())))?;
            Ok(HeaderValue::Array(items))
        }
        FieldKind::Bytes { len } => {
            let n = resolve_len(len, scope, path)?;
            let mark = cursor.mark();
            let raw: &[u8] = next(take(n), &mut cursor.input).map_err(|_| mark.truncated(path, n))?;
            let raw = match len {
                // Padding is not part of the value
                Count::Fixed(_) => {
                    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
                    &raw[..end]
                }
                Count::Field(_) => raw,
            };
            Ok(HeaderValue::Bytes(raw.to_vec()))
        }
        FieldKind::CString => parse_cstring(cursor, path, config),
    }
}

fn parse_cstring(cursor: &mut Cursor<'_>, path: &str, config: &ReaderConfig) -> Result<HeaderValue> {
    let remaining = cursor.remaining();
    let limit = config.max_cstring_len.map_or(remaining, |max| max.min(remaining));
    match cursor.input[..limit].iter().position(|&b| b == 0) {
        Some(len) => {
            let mark = cursor.mark();
            let text: &[u8] = next(take(len), &mut cursor.input).map_err(|_| mark.truncated(path, len + 1))?;
            cursor.input = &cursor.input[1..];
            Ok(HeaderValue::Bytes(text.to_vec()))
        }
        None => match config.max_cstring_len {
            Some(max) if max <= remaining => {
                let mark = cursor.mark();
                let text: &[u8] = next(take(max), &mut cursor.input).map_err(|_| mark.truncated(path, max))?;
                Ok(HeaderValue::Bytes(text.to_vec()))
            }
            // Unterminated at end of input
            _ => Err(cursor.truncated(path, remaining + 1)),
        },
    }
}
