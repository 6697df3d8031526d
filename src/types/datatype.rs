//! Payload element types and datatype code tables

use crate::error::{HeaderError, Result};
use serde::Serialize;
use std::fmt;

/// Element type of the numeric payload that follows a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementType {
    U8,
    U16,
    F32,
}

impl ElementType {
    pub const fn size_bytes(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
            ElementType::F32 => 4,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::U8 => "uint8",
            ElementType::U16 => "uint16",
            ElementType::F32 => "float32",
        };
        f.write_str(name)
    }
}

/// Mapping between element types and the integer codes a header stores.
pub trait DatatypeRegistry {
    fn code_for(&self, ty: ElementType) -> Result<i64>;
    fn type_for(&self, code: i64) -> Result<ElementType>;
}

/// Static code table.
#[derive(Debug, Clone, Copy)]
pub struct CodeTable(pub &'static [(i64, ElementType)]);

impl DatatypeRegistry for CodeTable {
    fn code_for(&self, ty: ElementType) -> Result<i64> {
        self.0
            .iter()
            .find(|(_, t)| *t == ty)
            .map(|(code, _)| *code)
            .ok_or_else(|| HeaderError::FormatConstraint(format!("no datatype code for {}", ty)))
    }

    fn type_for(&self, code: i64) -> Result<ElementType> {
        self.0
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| HeaderError::header_data(format!("unknown datatype code {}", code)))
    }
}

/// How a format decides its payload element type.
#[derive(Debug, Clone, Copy)]
pub enum DataTypeRule {
    Fixed(ElementType),
    Coded { field: &'static str, table: CodeTable },
}
