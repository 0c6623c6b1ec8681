//! S3D archive reader
//!
//! Archives are read into memory once and decoded from the buffer, so the
//! per-file chunk walk can jump between absolute offsets freely.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;

use super::{ArchiveEntry, ArchiveFiles, DIRECTORY_ENTRY_SIZE, DirectoryEntry, MAGIC};
use crate::error::{Error, Result};
use crate::utils::ByteCursor;

/// Read an S3D archive from disk
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid archive.
pub fn read_s3d<P: AsRef<Path>>(path: P) -> Result<ArchiveFiles> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    parse_s3d_bytes(&buffer)
}

/// Parse an S3D archive held in memory
///
/// # Errors
/// Returns an error if the magic, directory, or any chunk is invalid.
pub fn parse_s3d_bytes(data: &[u8]) -> Result<ArchiveFiles> {
    S3dReader::new(data).read_all()
}

/// Stepwise S3D archive reader
pub struct S3dReader<'a> {
    cursor: ByteCursor<'a>,
    directory_offset: Option<usize>,
    entries: Vec<DirectoryEntry>,
}

impl<'a> S3dReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: ByteCursor::new(data),
            directory_offset: None,
            entries: Vec::new(),
        }
    }

    /// Read the directory offset and validate the magic
    ///
    /// # Errors
    /// Returns [`Error::InvalidArchiveMagic`] if the magic does not match.
    pub fn read_header(&mut self) -> Result<usize> {
        self.cursor.set_position(0);
        let offset = self.cursor.read_u32()? as usize;

        let magic: [u8; 4] = self
            .cursor
            .read_bytes(4)?
            .try_into()
            .map_err(|_| Error::InvalidFormat("short magic".to_string()))?;
        if magic != MAGIC {
            return Err(Error::InvalidArchiveMagic(magic));
        }

        self.directory_offset = Some(offset);
        Ok(offset)
    }

    /// Read the checksum table
    ///
    /// # Errors
    /// Returns an error if the table runs past the end of the archive.
    pub fn read_directory(&mut self) -> Result<&[DirectoryEntry]> {
        let offset = match self.directory_offset {
            Some(offset) => offset,
            None => self.read_header()?,
        };

        self.cursor.set_position(offset);
        let count = self.cursor.read_u32()? as usize;

        self.entries.clear();
        self.entries.reserve(count.min(self.cursor.remaining() / DIRECTORY_ENTRY_SIZE));
        for i in 0..count {
            self.cursor.set_position(offset + 4 + i * DIRECTORY_ENTRY_SIZE);
            let crc = self.cursor.read_u32()?;
            let file_offset = self.cursor.read_u32()?;
            let size = self.cursor.read_u32()?;
            self.entries.push(DirectoryEntry {
                crc,
                offset: file_offset,
                size,
            });
        }

        tracing::debug!("S3D directory at {:#X} lists {} entries", offset, count);
        Ok(&self.entries)
    }

    /// Decompress every chunk of one entry
    ///
    /// A file may span several independently compressed chunks; they are
    /// inflated in order until the declared total size is reached.
    ///
    /// # Errors
    /// Returns an error if a chunk is truncated, fails to inflate, or
    /// inflates to a length other than the one it declares.
    pub fn read_entry(&mut self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        let total = entry.size as usize;
        let mut data = Vec::with_capacity(total.min(self.cursor.len()));

        self.cursor.set_position(entry.offset as usize);
        while data.len() < total {
            let chunk_offset = self.cursor.position();
            let deflated_len = self.cursor.read_u32()? as usize;
            let inflated_len = self.cursor.read_u32()? as usize;
            let compressed = self.cursor.read_bytes(deflated_len)?;

            let before = data.len();
            ZlibDecoder::new(compressed)
                .read_to_end(&mut data)
                .map_err(|e| Error::ZlibDecompressionFailed {
                    offset: chunk_offset,
                    message: e.to_string(),
                })?;

            let actual = data.len() - before;
            if actual != inflated_len {
                return Err(Error::ChunkLengthMismatch {
                    offset: chunk_offset,
                    expected: inflated_len,
                    actual,
                });
            }
        }

        if data.len() != total {
            return Err(Error::ArchiveSizeOverrun {
                offset: entry.offset as usize,
                declared: total,
                actual: data.len(),
            });
        }

        Ok(data)
    }

    /// Decode the whole archive into a lowercase-name keyed map
    ///
    /// # Errors
    /// Returns an error if any structural check fails.
    pub fn read_all(&mut self) -> Result<ArchiveFiles> {
        let entries = self.read_directory()?.to_vec();

        let mut directory = None;
        let mut files = Vec::with_capacity(entries.len());
        for entry in &entries {
            let data = self.read_entry(entry)?;
            if entry.is_directory() {
                directory = Some(data);
            } else {
                files.push((entry.offset, data));
            }
        }

        // Names are stored in data-offset order
        files.sort_by_key(|(offset, _)| *offset);

        let directory = directory.ok_or(Error::ArchiveDirectoryMissing)?;
        let names = parse_filenames(&directory, files.len())?;

        let archive: ArchiveFiles = names
            .into_iter()
            .zip(files.into_iter().map(|(_, data)| data))
            .collect();

        tracing::debug!("Decoded {} files from S3D archive", archive.len());
        Ok(archive)
    }

    /// List stored files with their directory records, without inflating
    /// anything but the filename directory
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    pub fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = self.read_directory()?.to_vec();

        let directory_entry = entries
            .iter()
            .find(|e| e.is_directory())
            .copied()
            .ok_or(Error::ArchiveDirectoryMissing)?;
        let directory = self.read_entry(&directory_entry)?;

        entries.retain(|e| !e.is_directory());
        entries.sort_by_key(|e| e.offset);
        let names = parse_filenames(&directory, entries.len())?;

        Ok(names
            .into_iter()
            .zip(entries)
            .map(|(name, entry)| ArchiveEntry { name, entry })
            .collect())
    }

    /// Number of records in the checksum table, including the directory
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Parse the filename directory: a count followed by length-prefixed,
/// null-padded names.
fn parse_filenames(directory: &[u8], expected: usize) -> Result<Vec<String>> {
    let mut cursor = ByteCursor::new(directory);
    let declared = cursor.read_u32()? as usize;
    if declared != expected {
        return Err(Error::ArchiveDirectoryMismatch {
            declared,
            recovered: expected,
        });
    }

    let mut names = Vec::with_capacity(declared);
    for _ in 0..declared {
        let len = cursor.read_u32()? as usize;
        let raw = cursor.read_bytes(len)?;
        let name = String::from_utf8_lossy(raw)
            .trim_matches('\0')
            .to_lowercase();
        names.push(name);
    }
    Ok(names)
}
