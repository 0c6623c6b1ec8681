//! S3D archive writer
//!
//! Produces archives the reader (and the game) accept: file data first,
//! then the filename directory, then the checksum table.

use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::ZlibEncoder;

use super::{CHUNK_SIZE, DIRECTORY_CRC, MAGIC, VERSION};
use crate::error::{Error, Result};

/// File to be written to the archive
struct FileEntry {
    name: String,
    data: Vec<u8>,
}

/// S3D archive writer
#[derive(Default)]
pub struct S3dWriter {
    files: Vec<FileEntry>,
    compression: Compression,
}

impl S3dWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            compression: Compression::default(),
        }
    }

    /// Set the zlib compression level
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Queue a file; names are stored lowercase
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.add_file(name, data);
        self
    }

    /// Queue a file; names are stored lowercase
    pub fn add_file(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.push(FileEntry {
            name: name.into().to_lowercase(),
            data,
        });
    }

    /// Number of files queued
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Serialize the archive into memory
    ///
    /// # Errors
    /// Returns an error if compression fails or a size exceeds 32 bits.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        // Directory offset placeholder, filled in at the end
        out.write_u32::<LittleEndian>(0)?;
        out.write_all(&MAGIC)?;
        out.write_u32::<LittleEndian>(VERSION)?;

        let mut table = Vec::with_capacity(self.files.len() + 1);
        for file in &self.files {
            let offset = to_u32(out.len(), &file.name)?;
            self.write_chunks(&mut out, &file.data)?;
            table.push((name_crc(&file.name), offset, to_u32(file.data.len(), &file.name)?));
        }

        let directory = self.directory_blob()?;
        let offset = to_u32(out.len(), "directory")?;
        self.write_chunks(&mut out, &directory)?;
        table.push((DIRECTORY_CRC, offset, to_u32(directory.len(), "directory")?));

        let directory_offset = to_u32(out.len(), "checksum table")?;
        out.write_u32::<LittleEndian>(to_u32(table.len(), "checksum table")?)?;
        for (crc, offset, size) in table {
            out.write_u32::<LittleEndian>(crc)?;
            out.write_u32::<LittleEndian>(offset)?;
            out.write_u32::<LittleEndian>(size)?;
        }

        out[0..4].copy_from_slice(&directory_offset.to_le_bytes());
        Ok(out)
    }

    /// Write the archive to disk
    ///
    /// # Errors
    /// Returns an error if serialization or the file write fails.
    pub fn write(&self, output_path: impl AsRef<Path>) -> Result<()> {
        let output_path = output_path.as_ref();
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output_path, self.to_bytes()?)?;
        Ok(())
    }

    fn directory_blob(&self) -> Result<Vec<u8>> {
        let mut blob = Vec::new();
        blob.write_u32::<LittleEndian>(to_u32(self.files.len(), "directory")?)?;
        for file in &self.files {
            let name_len = to_u32(file.name.len() + 1, &file.name)?;
            blob.write_u32::<LittleEndian>(name_len)?;
            blob.write_all(file.name.as_bytes())?;
            blob.write_u8(0)?;
        }
        Ok(blob)
    }

    fn write_chunks(&self, out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(CHUNK_SIZE) {
            let mut encoder = ZlibEncoder::new(Vec::new(), self.compression);
            encoder.write_all(chunk)?;
            let compressed = encoder.finish()?;

            out.write_u32::<LittleEndian>(to_u32(compressed.len(), "chunk")?)?;
            out.write_u32::<LittleEndian>(to_u32(chunk.len(), "chunk")?)?;
            out.write_all(&compressed)?;
        }
        Ok(())
    }
}

/// Checksum stored for a file name. Readers match names positionally, so
/// any stable hash that avoids the reserved directory value works.
fn name_crc(name: &str) -> u32 {
    let crc = crc32fast::hash(name.as_bytes());
    if crc == DIRECTORY_CRC { crc ^ 1 } else { crc }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidFormat(format!("{what} is too large: {value} bytes")))
}
