//! WLD scene-description format
//!
//! A WLD stream is a header, an XOR-obfuscated string table, and a flat
//! table of typed records ("fragments") that point at each other by index
//! or by name.

mod handlers;
mod reader;
mod reference;
mod string_table;
mod table;
mod types;

pub use handlers::{
    DEFAULT_ATTENUATION, Handler, HandlerContext, POLY_PASSABLE, ROTATION_UNIT, SCALE_EPSILON,
    handler_for,
};
pub use reader::{WldHeader, WldReader, parse_wld_bytes, parse_wld_bytes_with, read_wld};
pub use reference::{FragRef, RefTarget};
pub use string_table::{StringTable, XOR_KEY, decode_string, xor_decode};
pub use table::{
    DEFAULT_MAX_REFERENCE_HOPS, DecodeDiagnostics, FragmentTable, RawFragment, RawFragmentTable,
    TextureBinding,
};
pub use types::*;

/// WLD magic
pub const WLD_MAGIC: u32 = 0x54503D02;

/// Version value of the old sub-format
pub const OLD_VERSION: u32 = 0x00015500;

/// Version value of the newer sub-format
pub const NEW_VERSION: u32 = 0x1000C800;

/// Name offset of an unnamed fragment
pub const UNNAMED: i32 = 0x1000000;
