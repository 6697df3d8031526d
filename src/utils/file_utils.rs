use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::path::Path;

/// Random-access byte input for the header reader.
pub trait ByteSource {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exactly `len` bytes at `offset`; a short read is `UnexpectedEof`.
    fn read_at(&self, offset: u64, len: usize) -> io::Result<Cow<'_, [u8]>>;
}

fn slice_at(bytes: &[u8], offset: u64, len: usize) -> io::Result<Cow<'_, [u8]>> {
    let start = usize::try_from(offset).map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))?;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {} bytes at {} exceeds length {}", len, offset, bytes.len()),
            )
        })?;
    Ok(Cow::Borrowed(&bytes[start..end]))
}

impl ByteSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, len: usize) -> io::Result<Cow<'_, [u8]>> {
        slice_at(self, offset, len)
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }

    fn read_at(&self, offset: u64, len: usize) -> io::Result<Cow<'_, [u8]>> {
        slice_at(self, offset, len)
    }
}

/// Read a binary file using memory mapping for improved performance
/// This is more efficient for large files as it doesn't load the entire file into RAM
pub fn read_binary_file_mmap(path: impl AsRef<Path>) -> io::Result<Mmap> {
    let file = File::open(path)?;
    // Safety: The file is not modified while the mmap is active
    unsafe { Mmap::map(&file) }
}

/// Memory-mapped file. Only the pages the header reader touches are loaded.
pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            mmap: read_binary_file_mmap(path)?,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_at(&self, offset: u64, len: usize) -> io::Result<Cow<'_, [u8]>> {
        slice_at(&self.mmap, offset, len)
    }
}
