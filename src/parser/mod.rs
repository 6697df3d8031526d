//! Binary header reading and writing

pub mod header_parser;
pub mod header_writer;

// Re-export the parsing functions
pub use header_parser::{parse_header, parse_header_prefix, parse_scalar, read_header};
pub use header_writer::{encoded_len, serialize_header, write_scalar};

/// Dotted field path used in error messages, e.g. `maps[1].map_name`.
pub(crate) fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}
