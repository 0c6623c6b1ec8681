//! S3D (PFS) archive reader/writer
//!
//! An S3D archive stores a checksum table near the end of the file and
//! keeps file names in a separate, zlib-chunked directory entry. Names are
//! matched to entries by sorting the entries by data offset.

mod reader;
mod types;
mod writer;

pub use reader::{S3dReader, parse_s3d_bytes, read_s3d};
pub use types::*;
pub use writer::S3dWriter;

/// Magic bytes following the directory offset
pub const MAGIC: [u8; 4] = *b"PFS ";

/// Archive version written by [`S3dWriter`]; not checked when reading
pub const VERSION: u32 = 0x0002_0000;

/// Checksum reserved for the filename directory entry
pub const DIRECTORY_CRC: u32 = 0x61580AC9;

/// Largest uncompressed chunk written by [`S3dWriter`]
pub const CHUNK_SIZE: usize = 8192;

/// Size of one `(crc, offset, size)` directory record
pub const DIRECTORY_ENTRY_SIZE: usize = 12;

/// Overlay each archive's files on top of every other archive's files.
///
/// For each input, the returned map holds all files of the other inputs
/// plus its own, with its own taking precedence. Zones split their
/// geometry and textures across several archives, so a WLD in one archive
/// may name a bitmap stored in a sibling.
#[must_use]
pub fn merge_fallback(archives: &[ArchiveFiles]) -> Vec<ArchiveFiles> {
    archives
        .iter()
        .enumerate()
        .map(|(i, own)| {
            let mut merged = ArchiveFiles::new();
            for (j, other) in archives.iter().enumerate() {
                if i != j {
                    merged.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        })
        .collect()
}
