//! Type definitions for header layouts, parsed values and data geometry

pub mod datatype;
pub mod header;
pub mod schema;
pub mod scope;
pub mod shape;

// Re-export the main types for convenience
pub use datatype::{CodeTable, DataTypeRule, DatatypeRegistry, ElementType};
pub use header::{HeaderTree, HeaderValue};
pub use schema::{BinaryType, Condition, Count, FieldDescriptor, FieldKind, RecordDescriptor, RecordItem};
pub use scope::Scope;
pub use shape::{Bounds, DataShape, Geometry, ShapeRequest};
