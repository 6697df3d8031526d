//! Concrete BrainVoyager header formats

pub mod msk;
pub mod vmp;
pub mod vtc;

use crate::config::ReaderConfig;
use crate::error::{HeaderError, Result};
use crate::geometry::GeometryRules;
use crate::parser::{encoded_len, parse_header};
use crate::types::datatype::DataTypeRule;
use crate::types::header::HeaderTree;
use crate::types::schema::{BinaryType, FieldDescriptor, RecordDescriptor};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

/// Locates the numeric payload that follows a header.
pub trait PayloadLocator {
    /// Byte offset of the first payload element.
    fn data_offset(&self, tree: &HeaderTree) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Msk,
    Vmp,
    Vtc,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Msk, Format::Vmp, Format::Vtc];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Msk => msk::EXTENSION,
            Format::Vmp => vmp::EXTENSION,
            Format::Vtc => vtc::EXTENSION,
        }
    }

    /// Case-insensitive; a leading dot is ignored.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn default_version(self) -> u16 {
        match self {
            Format::Msk => 1,
            Format::Vmp => vmp::DEFAULT_VERSION,
            Format::Vtc => vtc::DEFAULT_VERSION,
        }
    }

    pub fn supported_versions(self) -> RangeInclusive<u16> {
        match self {
            Format::Vmp => vmp::MIN_VERSION..=vmp::DEFAULT_VERSION,
            _ => self.default_version()..=self.default_version(),
        }
    }

    /// Layout for `version`.
    pub fn descriptor(self, version: u16) -> Result<RecordDescriptor> {
        if !self.supported_versions().contains(&version) {
            return Err(HeaderError::FormatConstraint(format!(
                "{} version {} is not supported (supported: {:?})",
                self.extension(),
                version,
                self.supported_versions()
            )));
        }
        Ok(match self {
            Format::Msk => msk::descriptor(),
            Format::Vmp => vmp::latest_descriptor().for_version(version),
            Format::Vtc => vtc::descriptor(),
        })
    }

    /// Header of the default version with every field at its default.
    pub fn default_tree(self) -> Result<HeaderTree> {
        self.descriptor(self.default_version())?.default_tree()
    }

    pub fn geometry(self) -> GeometryRules {
        match self {
            Format::Msk => msk::geometry(),
            Format::Vmp => vmp::geometry(),
            Format::Vtc => vtc::geometry(),
        }
    }

    pub fn data_type_rule(self) -> DataTypeRule {
        match self {
            Format::Msk => msk::DATA_TYPE,
            Format::Vmp => vmp::DATA_TYPE,
            Format::Vtc => vtc::DATA_TYPE,
        }
    }

    pub fn config(self) -> ReaderConfig {
        match self {
            // Fixed 14-byte header
            Format::Msk => ReaderConfig::builder().source_window(14).build(),
            Format::Vmp | Format::Vtc => ReaderConfig::default(),
        }
    }

    /// Reads the version stored at the start of a header. MSK files carry none.
    pub fn peek_version(self, bytes: &[u8]) -> Result<u16> {
        let version_field = FieldDescriptor::scalar("version", BinaryType::I16, 0);
        let probe = match self {
            Format::Msk => return Ok(self.default_version()),
            Format::Vmp => RecordDescriptor::new()
                .field(FieldDescriptor::scalar("magic_number", BinaryType::U32, 0))
                .field(version_field),
            Format::Vtc => RecordDescriptor::new().field(version_field),
        };
        let tree = parse_header(bytes, &probe, &self.config())?;
        if self == Format::Vmp {
            let magic = tree.require_int("magic_number")?;
            if magic != i64::from(vmp::MAGIC) {
                return Err(HeaderError::header_data(format!(
                    "bad VMP magic number {:#010x}",
                    magic
                )));
            }
        }
        self.checked_version(tree.require_int("version")?)
    }

    /// Version recorded in a parsed tree.
    pub fn tree_version(self, tree: &HeaderTree) -> Result<u16> {
        match self {
            Format::Msk => Ok(self.default_version()),
            Format::Vmp | Format::Vtc => self.checked_version(tree.require_int("version")?),
        }
    }

    fn checked_version(self, raw: i64) -> Result<u16> {
        u16::try_from(raw)
            .ok()
            .filter(|v| self.supported_versions().contains(v))
            .ok_or_else(|| {
                HeaderError::FormatConstraint(format!("{} version {} is not supported", self.extension(), raw))
            })
    }
}

impl PayloadLocator for Format {
    fn data_offset(&self, tree: &HeaderTree) -> Result<usize> {
        let descriptor = self.descriptor(self.tree_version(tree)?)?;
        encoded_len(tree, &descriptor, &self.config())
    }
}
