//! WLD stream decoding
//!
//! A single forward pass over the fragment table. Each record's end is
//! computed from its declared size and the cursor is forced there after
//! the handler runs, whatever the handler did.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::handlers::{HandlerContext, handler_for};
use super::string_table::StringTable;
use super::table::{FragmentTable, RawFragment, RawFragmentTable};
use super::types::{Fragment, FragmentType};
use super::{OLD_VERSION, UNNAMED, WLD_MAGIC};
use crate::error::{Error, Result};
use crate::utils::ByteCursor;

/// Parsed WLD header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WldHeader {
    pub version: u32,
    pub fragment_count: u32,
    pub string_table_len: u32,
}

impl WldHeader {
    /// Old sub-format (16-bit texture coordinates)
    #[must_use]
    pub fn is_old(&self) -> bool {
        self.version == OLD_VERSION
    }
}

/// Read and decode a WLD file from disk
///
/// # Errors
/// Returns an error if the file cannot be read or the header is invalid.
pub fn read_wld<P: AsRef<Path>>(path: P) -> Result<FragmentTable> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    parse_wld_bytes(&buffer)
}

/// Decode a WLD stream held in memory
///
/// # Errors
/// Returns an error on a bad magic or a truncated header or table entry.
pub fn parse_wld_bytes(data: &[u8]) -> Result<FragmentTable> {
    Ok(WldReader::new(data).read_raw()?.bake())
}

/// Decode a WLD stream, bounding reference chains at `max_reference_hops`
///
/// # Errors
/// Returns an error on a bad magic or a truncated header or table entry.
pub fn parse_wld_bytes_with(data: &[u8], max_reference_hops: usize) -> Result<FragmentTable> {
    Ok(WldReader::new(data).read_raw()?.bake_with(max_reference_hops))
}

/// WLD stream reader
pub struct WldReader<'a> {
    data: &'a [u8],
    cursor: ByteCursor<'a>,
}

impl<'a> WldReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            cursor: ByteCursor::new(data),
        }
    }

    /// Read the header and string table
    ///
    /// # Errors
    /// Returns [`Error::InvalidWldMagic`] or [`Error::Truncated`].
    pub fn read_header(&mut self) -> Result<(WldHeader, StringTable)> {
        self.cursor.set_position(0);
        let magic = self.cursor.read_u32()?;
        if magic != WLD_MAGIC {
            return Err(Error::InvalidWldMagic(magic));
        }

        let version = self.cursor.read_u32()?;
        let fragment_count = self.cursor.read_u32()?;
        self.cursor.skip(8)?;
        let string_table_len = self.cursor.read_u32()?;
        self.cursor.skip(4)?;
        let strings = StringTable::from_encoded(self.cursor.read_bytes(string_table_len as usize)?);

        let header = WldHeader {
            version,
            fragment_count,
            string_table_len,
        };
        Ok((header, strings))
    }

    /// Decode every fragment record
    ///
    /// Failures inside a record are logged and the record's payload is
    /// dropped; only a truncated record header aborts. A handler cannot read
    /// past the end of its record.
    ///
    /// # Errors
    /// Returns an error if the header is invalid or a record header is cut off.
    pub fn read_raw(&mut self) -> Result<RawFragmentTable> {
        let (header, strings) = self.read_header()?;
        let count = header.fragment_count as usize;

        let mut table = RawFragmentTable {
            fragments: Vec::with_capacity(count.min(self.cursor.remaining() / 12)),
            strings,
            old: header.is_old(),
            diagnostics: Default::default(),
        };

        for index in 0..count {
            let declared_size = self.cursor.read_u32()? as usize;
            let kind = FragmentType::from_u32(self.cursor.read_u32()?);
            let record_start = self.cursor.position();
            let name_offset = self.cursor.read_i32()?;

            let name = (name_offset != UNNAMED).then(|| table.strings.name_at(name_offset));

            // Handlers only see their own record
            let record_end = (record_start + declared_size).min(self.data.len());
            let mut record = ByteCursor::new(&self.data[..record_end.max(self.cursor.position())]);
            record.set_position(self.cursor.position());

            let ctx = HandlerContext {
                strings: &table.strings,
                old: table.old,
            };
            let data = match handler_for(kind) {
                Some(handler) => match handler(&mut record, &ctx) {
                    Ok(data) => Some(data),
                    Err(e) => {
                        tracing::warn!(
                            "Fragment {} (type {}, {:?}) failed to decode: {}",
                            index,
                            kind,
                            name,
                            e
                        );
                        table.diagnostics.failed_fragments += 1;
                        None
                    }
                },
                None => {
                    *table.diagnostics.unknown_types.entry(kind.tag()).or_default() += 1;
                    None
                }
            };

            let consumed = record.position().saturating_sub(record_start);
            if data.is_some() && consumed != declared_size {
                tracing::debug!(
                    "Fragment {} (type {}) read {} bytes, declared {}",
                    index,
                    kind,
                    consumed,
                    declared_size
                );
                table.diagnostics.size_mismatches += 1;
            }

            table.fragments.push(RawFragment {
                fragment: Fragment {
                    index,
                    name,
                    kind,
                    data,
                },
                record_start,
                declared_size,
                consumed,
            });

            self.cursor.set_position(record_start + declared_size);
        }

        tracing::debug!(
            "Decoded {} fragments ({} failed, {} size mismatches)",
            table.fragments.len(),
            table.diagnostics.failed_fragments,
            table.diagnostics.size_mismatches
        );
        Ok(table)
    }

    /// Cursor position (after [`Self::read_raw`], the end of the last record)
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor.position()
    }
}
