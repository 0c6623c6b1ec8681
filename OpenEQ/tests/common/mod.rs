//! Synthetic WLD stream authoring for integration tests

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use openeq::wld::{NEW_VERSION, OLD_VERSION, UNNAMED, WLD_MAGIC, xor_decode};

/// Little-endian payload writer
#[derive(Default)]
pub struct Payload(pub Vec<u8>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.0.write_u16::<LittleEndian>(v).unwrap();
        self
    }

    pub fn i16(mut self, v: i16) -> Self {
        self.0.write_i16::<LittleEndian>(v).unwrap();
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.0.write_u32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.0.write_i32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.0.write_f32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn bytes(mut self, v: &[u8]) -> Self {
        self.0.extend_from_slice(v);
        self
    }
}

/// Builds a WLD stream fragment by fragment
pub struct WldBuilder {
    old: bool,
    strings: Vec<u8>,
    records: Vec<u8>,
    count: u32,
    /// (record start, declared size) of each fragment, for sync checks
    pub layout: Vec<(usize, usize)>,
}

impl WldBuilder {
    pub fn new() -> Self {
        Self {
            old: false,
            strings: vec![0],
            records: Vec::new(),
            count: 0,
            layout: Vec::new(),
        }
    }

    pub fn old() -> Self {
        Self {
            old: true,
            ..Self::new()
        }
    }

    /// Add a string, returning its negated offset
    pub fn string(&mut self, s: &str) -> i32 {
        let offset = self.strings.len() as i32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        -offset
    }

    /// Append a fragment, returning its 1-based reference value
    pub fn fragment(&mut self, kind: u32, name: Option<&str>, payload: Payload) -> i32 {
        let name_offset = match name {
            Some(n) => self.string(n),
            None => UNNAMED,
        };
        let size = payload.0.len() + 4;
        self.records.write_u32::<LittleEndian>(size as u32).unwrap();
        self.records.write_u32::<LittleEndian>(kind).unwrap();
        self.layout.push((self.records.len(), size));
        self.records.write_i32::<LittleEndian>(name_offset).unwrap();
        self.records.extend_from_slice(&payload.0);
        self.count += 1;
        self.count as i32
    }

    /// Header length, to turn `layout` positions into stream positions
    pub fn header_len(&self) -> usize {
        28 + self.strings.len()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(WLD_MAGIC).unwrap();
        out.write_u32::<LittleEndian>(if self.old { OLD_VERSION } else { NEW_VERSION })
            .unwrap();
        out.write_u32::<LittleEndian>(self.count).unwrap();
        out.extend_from_slice(&[0; 8]);
        out.write_u32::<LittleEndian>(self.strings.len() as u32).unwrap();
        out.extend_from_slice(&[0; 4]);
        out.extend(xor_decode(&self.strings));
        out.extend_from_slice(&self.records);
        out
    }

    // ---- fragment encoders ----

    pub fn texture_names(&mut self, name: &str, files: &[&str]) -> i32 {
        let mut p = Payload::new().u32(files.len() as u32 - 1);
        for file in files {
            let mut raw = file.as_bytes().to_vec();
            raw.push(0);
            p = p.u16(raw.len() as u16).bytes(&xor_decode(&raw));
        }
        self.fragment(0x03, Some(name), p)
    }

    pub fn bitmap_info(&mut self, name: &str, params: u32, names: &[i32]) -> i32 {
        let mut p = Payload::new().u32(1 << 3).u32(names.len() as u32).u32(params);
        for &r in names {
            p = p.i32(r);
        }
        self.fragment(0x04, Some(name), p)
    }

    pub fn reference(&mut self, kind: u32, name: Option<&str>, target: i32) -> i32 {
        self.fragment(kind, name, Payload::new().i32(target))
    }

    pub fn texture_ref(&mut self, raw_flags: u32, bitmap_info: i32) -> i32 {
        let p = Payload::new()
            .u32(0)
            .u32(raw_flags)
            .bytes(&[0; 12])
            .i32(bitmap_info);
        self.fragment(0x30, None, p)
    }

    pub fn texture_list(&mut self, entries: &[i32]) -> i32 {
        let mut p = Payload::new().u32(0).u32(entries.len() as u32);
        for &e in entries {
            p = p.u32(e as u32);
        }
        self.fragment(0x31, None, p)
    }

    /// Mesh with integer vertex coordinates (scale exponent 0)
    pub fn mesh(
        &mut self,
        name: Option<&str>,
        textures: i32,
        vertices: &[[i16; 3]],
        polygons: &[(bool, [u16; 3])],
        polytex: &[(u16, u16)],
    ) -> i32 {
        let mut p = Payload::new().u32(0).i32(textures).u32(0).bytes(&[0; 8]);
        for _ in 0..3 {
            p = p.f32(0.0);
        }
        p = p.bytes(&[0; 12]).f32(10.0);
        for _ in 0..6 {
            p = p.f32(0.0);
        }
        let n = vertices.len() as u16;
        for count in [n, n, n, 0, polygons.len() as u16, 0, polytex.len() as u16, 0, 0, 0] {
            p = p.u16(count);
        }
        for v in vertices {
            p = p.i16(v[0]).i16(v[1]).i16(v[2]);
        }
        for (i, _) in vertices.iter().enumerate() {
            if self.old {
                p = p.i16(i as i16 * 256).i16(0);
            } else {
                p = p.f32(i as f32).f32(0.0);
            }
        }
        for _ in vertices {
            p = p.bytes(&[0, 0, 127]);
        }
        for (collidable, indices) in polygons {
            p = p.u16(if *collidable { 0 } else { 0x10 });
            for &i in indices {
                p = p.u16(i);
            }
        }
        for &(count, texture) in polytex {
            p = p.u16(count).u16(texture);
        }
        self.fragment(0x36, name, p)
    }

    pub fn light_source(&mut self, name: &str, rgb: [f32; 3]) -> i32 {
        let p = Payload::new()
            .u32(1 << 4)
            .u32(1)
            .f32(1.0)
            .f32(rgb[0])
            .f32(rgb[1])
            .f32(rgb[2]);
        self.fragment(0x1B, Some(name), p)
    }

    pub fn light(&mut self, source: i32, position: [f32; 3], radius: f32) -> i32 {
        let p = Payload::new()
            .i32(source)
            .u32(0)
            .f32(position[0])
            .f32(position[1])
            .f32(position[2])
            .f32(radius);
        self.fragment(0x28, None, p)
    }

    pub fn placement(&mut self, actor: &str, position: [f32; 3], rotation: [f32; 3], scale: f32) -> i32 {
        let name_ref = self.string(actor);
        let mut p = Payload::new().i32(name_ref).u32(0).u32(0);
        for v in position.iter().chain(&rotation) {
            p = p.f32(*v);
        }
        p = p.f32(0.0).f32(0.0).f32(scale).bytes(&[0; 8]);
        self.fragment(0x15, None, p)
    }
}

/// One textured material chain: names → bitmap info → 0x05 → texture ref.
/// Returns the texture reference.
pub fn material(wld: &mut WldBuilder, tag: &str, raw_flags: u32, files: &[&str]) -> i32 {
    let names = wld.texture_names(&format!("{tag}_NAMES"), files);
    let info = wld.bitmap_info(&format!("{tag}_SPRITE"), 0, &[names]);
    let info_ref = wld.reference(0x05, None, info);
    wld.texture_ref(raw_flags, info_ref)
}
