//! Reader/writer tuning knobs.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Options shared by the header reader and writer.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Longest null-terminated string, terminator excluded. `None` reads to the end of the
    /// available buffer.
    pub max_cstring_len: Option<usize>,
    /// First read size when pulling a header out of a `ByteSource`; doubled until the
    /// header fits.
    #[builder(default = 4096)]
    pub source_window: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
