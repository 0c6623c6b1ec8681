//! Types for S3D archive handling

use indexmap::IndexMap;

/// Decompressed archive contents keyed by lowercase file name, in the
/// order the files are stored.
pub type ArchiveFiles = IndexMap<String, Vec<u8>>;

/// One `(crc, offset, size)` record of the archive's checksum table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Checksum of the file name ([`super::DIRECTORY_CRC`] for the name list)
    pub crc: u32,
    /// Absolute offset of the first chunk header
    pub offset: u32,
    /// Total decompressed size across all chunks
    pub size: u32,
}

impl DirectoryEntry {
    /// Whether this entry holds the filename directory rather than a file
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.crc == super::DIRECTORY_CRC
    }
}

/// A named file listed in an archive, without its contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Lowercase file name
    pub name: String,
    /// Directory record the name was matched to
    pub entry: DirectoryEntry,
}
