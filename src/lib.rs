pub mod bv_header;
pub mod config;
pub mod error;
pub mod formats;
pub mod geometry;
pub mod parser;
pub mod types;
pub mod utils;

pub use bv_header::BvHeader;
pub use config::ReaderConfig;
pub use error::{HeaderError, Result};
pub use formats::{Format, PayloadLocator};
pub use types::{
    Bounds, DataShape, ElementType, Geometry, HeaderTree, HeaderValue, RecordDescriptor, ShapeRequest,
};
pub use utils::file_utils::{ByteSource, MmapSource};
