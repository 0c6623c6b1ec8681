//! Error types for `OpenEQ`

use thiserror::Error;

/// The error type for `OpenEQ` operations.
///
/// Only structural problems are errors. Dangling references and
/// out-of-range texture indices are expected in real zone data and are
/// reported through [`crate::scene::Diagnostics`] instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Byte Cursor Errors ====================
    /// A read would run past the end of the buffer.
    #[error("truncated data: {requested} bytes requested at offset {offset}, {available} available")]
    Truncated {
        /// Position of the failed read.
        offset: usize,
        /// Number of bytes the read needed.
        requested: usize,
        /// Number of bytes left in the buffer.
        available: usize,
    },

    // ==================== S3D Archive Errors ====================
    /// The file is not a valid S3D archive (missing `PFS ` magic).
    #[error("invalid S3D magic: expected \"PFS \", found {0:?}")]
    InvalidArchiveMagic([u8; 4]),

    /// The archive has no directory entry (checksum `0x61580AC9`).
    #[error("S3D archive has no filename directory")]
    ArchiveDirectoryMissing,

    /// The filename directory disagrees with the number of stored files.
    #[error("S3D directory declares {declared} files but {recovered} were stored")]
    ArchiveDirectoryMismatch {
        /// File count stated by the directory blob.
        declared: usize,
        /// Number of non-directory entries in the archive.
        recovered: usize,
    },

    /// A compressed chunk inflated to a different length than it declared.
    #[error("chunk at offset {offset} inflated to {actual} bytes, expected {expected}")]
    ChunkLengthMismatch {
        /// Offset of the chunk header in the archive.
        offset: usize,
        /// Decompressed length stated in the chunk header.
        expected: usize,
        /// Length actually produced by decompression.
        actual: usize,
    },

    /// The chunks of one file decompressed past its declared size.
    #[error("file at offset {offset} decompressed to {actual} bytes, declared {declared}")]
    ArchiveSizeOverrun {
        /// Offset of the file data in the archive.
        offset: usize,
        /// Total size stated by the directory entry.
        declared: usize,
        /// Accumulated decompressed length.
        actual: usize,
    },

    /// Zlib decompression failed.
    #[error("Zlib decompression failed at offset {offset}: {message}")]
    ZlibDecompressionFailed {
        /// Offset of the chunk header in the archive.
        offset: usize,
        /// The error message.
        message: String,
    },

    // ==================== WLD Format Errors ====================
    /// The stream is not a WLD file.
    #[error("invalid WLD magic: expected 0x54503D02, found {0:#010X}")]
    InvalidWldMagic(u32),

    /// A reference chain loops back on itself or is unreasonably long.
    #[error("reference cycle detected after {hops} hops starting at {start}")]
    ReferenceCycle {
        /// Human-readable form of the starting reference.
        start: String,
        /// Number of hops followed before giving up.
        hops: usize,
    },

    // ==================== Generic/Fallback Errors ====================
    /// Invalid format error (use specific variants when possible).
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl Error {
    /// Whether this error is a violated structural invariant of the data.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        !self.is_truncated()
    }

    /// Whether this error is a read past the end of a buffer.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Error::Truncated { .. })
    }
}

/// A specialized Result type for `OpenEQ` operations.
pub type Result<T> = std::result::Result<T, Error>;
