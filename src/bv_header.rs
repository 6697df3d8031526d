use crate::config::ReaderConfig;
use crate::error::{HeaderError, Result};
use crate::formats::Format;
use crate::geometry;
use crate::parser::{encoded_len, parse_header_prefix, read_header, serialize_header};
use crate::types::{DataShape, ElementType, Geometry, HeaderTree, RecordDescriptor, ShapeRequest};
use crate::utils::file_utils::{ByteSource, MmapSource};
use log::debug;
use std::path::Path;

/// A parsed BrainVoyager header together with its format and version
#[derive(Debug, Clone, PartialEq)]
pub struct BvHeader {
    pub format: Format,
    version: u16,
    tree: HeaderTree,
}

impl BvHeader {
    /// Header of the format's default version with default field values
    pub fn new(format: Format) -> Result<Self> {
        Ok(Self {
            format,
            version: format.default_version(),
            tree: format.default_tree()?,
        })
    }

    pub fn from_bytes(format: Format, bytes: &[u8]) -> Result<Self> {
        let version = format.peek_version(bytes)?;
        let descriptor = format.descriptor(version)?;
        let (tree, _) = parse_header_prefix(bytes, &descriptor, &format.config())?;
        Ok(Self { format, version, tree })
    }

    /// Reads only as much of `source` as the header needs.
    pub fn read_from<S: ByteSource + ?Sized>(format: Format, source: &S) -> Result<Self> {
        Self::read_with_config(format, source, &format.config())
    }

    pub fn read_with_config<S: ByteSource + ?Sized>(format: Format, source: &S, config: &ReaderConfig) -> Result<Self> {
        let prefix = source.read_at(0, source.len().min(16) as usize)?;
        let version = format.peek_version(&prefix)?;
        let descriptor = format.descriptor(version)?;
        let (tree, len) = read_header(source, &descriptor, config)?;
        debug!("Read {} v{} header, payload at byte {}", format.extension(), version, len);
        Ok(Self { format, version, tree })
    }

    /// Opens a file, picking the format from its extension
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path).ok_or_else(|| {
            HeaderError::FormatConstraint(format!("unrecognised file extension: {}", path.display()))
        })?;
        let source = MmapSource::open(path)?;
        Self::read_from(format, &source)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialize_header(&self.tree, &self.descriptor()?, &self.format.config())
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn tree(&self) -> &HeaderTree {
        &self.tree
    }

    /// Direct field access. Counts edited here are not propagated; use
    /// [`BvHeader::resize_counted`] or [`BvHeader::set_data_shape`] for those.
    pub fn tree_mut(&mut self) -> &mut HeaderTree {
        &mut self.tree
    }

    pub fn descriptor(&self) -> Result<RecordDescriptor> {
        self.format.descriptor(self.version)
    }

    /// Sets a count field and resizes the repeated records it governs.
    pub fn resize_counted(&mut self, count_field: &str, n: usize) -> Result<()> {
        let mut staged = self.tree.clone();
        self.descriptor()?.resize_counted(&mut staged, count_field, n)?;
        self.tree = staged;
        Ok(())
    }

    pub fn geometry(&self) -> Result<Geometry> {
        geometry::derive_shape(&self.tree, &self.format.geometry())
    }

    pub fn data_shape(&self) -> Result<DataShape> {
        self.geometry().map(|g| g.shape)
    }

    pub fn zooms(&self) -> Result<[f64; 3]> {
        self.geometry().map(|g| g.zooms)
    }

    pub fn set_data_shape(&mut self, request: &ShapeRequest) -> Result<DataShape> {
        let descriptor = self.descriptor()?;
        let geometry = geometry::apply_shape(&mut self.tree, &descriptor, &self.format.geometry(), request)?;
        Ok(geometry.shape)
    }

    pub fn framing_cube(&self) -> Result<[i64; 3]> {
        geometry::framing_cube(&self.tree, &self.format.geometry())
    }

    pub fn set_framing_cube(&mut self, cube: [i64; 3]) -> Result<()> {
        geometry::set_framing_cube(&mut self.tree, &self.format.geometry(), cube)
    }

    pub fn data_type(&self) -> Result<ElementType> {
        geometry::data_type(&self.tree, &self.format.data_type_rule())
    }

    pub fn set_data_type(&mut self, ty: ElementType) -> Result<()> {
        geometry::set_data_type(&mut self.tree, &self.format.data_type_rule(), ty)
    }

    /// Byte offset of the payload, i.e. the serialized header length
    pub fn data_offset(&self) -> Result<usize> {
        encoded_len(&self.tree, &self.descriptor()?, &self.format.config())
    }

    /// Bytes of payload the header describes
    pub fn payload_len(&self) -> Result<usize> {
        let shape = self.data_shape()?;
        let element_size = self.data_type()?.size_bytes();
        shape
            .to_vec()
            .into_iter()
            .try_fold(element_size, usize::checked_mul)
            .ok_or_else(|| HeaderError::header_data(format!("payload of shape {:?} overflows", shape.to_vec())))
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.tree
            .to_json()
            .map_err(|e| HeaderError::header_data(format!("JSON rendering failed: {}", e)))
    }

    /// Get a summary of the header contents
    pub fn get_summary(&self) -> String {
        let mut result = format!("{} header, version {}\n", self.format.extension().to_uppercase(), self.version);
        match self.geometry() {
            Ok(geometry) => {
                result.push_str(&format!("  Shape: {:?}\n", geometry.shape.to_vec()));
                result.push_str(&format!("  Zooms: {:?}\n", geometry.zooms));
            }
            Err(e) => result.push_str(&format!("  Shape: invalid ({})\n", e)),
        }
        if let Ok(ty) = self.data_type() {
            result.push_str(&format!("  Data type: {}\n", ty));
        }
        if let Ok(offset) = self.data_offset() {
            result.push_str(&format!("  Data offset: {}\n", offset));
        }
        result
    }
}
