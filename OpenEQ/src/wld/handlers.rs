//! Per-type fragment decoders
//!
//! Each handler reads one fragment payload (after the name offset). The
//! driver repositions the cursor to the declared record end afterwards, so
//! handlers may stop early without desynchronizing the table walk.

use std::f32::consts::PI;

use super::reference::FragRef;
use super::string_table::{StringTable, decode_string};
use super::types::{
    AmbientRegion, BitmapInfo, FragmentData, FragmentType, LightPlacement, LightSource,
    MeshFragment, ModelRef, ObjectPlacement, PieceFrame, PieceTrack, PieceTrackRef,
    PolyTexRun, Polygon, SkeletonTrack, SkeletonTrackSet, TextureRef, VertexPiece,
    normalize_flags,
};
use crate::error::Result;
use crate::utils::ByteCursor;

/// Radians per fixed-point rotation unit of an object placement
pub const ROTATION_UNIT: f32 = PI / 512.0;

/// Below this, a placement's scale is treated as unset
pub const SCALE_EPSILON: f32 = 0.0001;

/// Attenuation used when a light source does not store one
pub const DEFAULT_ATTENUATION: f32 = 200.0;

/// Polygon flag marking a non-collidable triangle
pub const POLY_PASSABLE: u16 = 0x0010;

/// Stream-wide state handlers need
pub struct HandlerContext<'a> {
    pub strings: &'a StringTable,
    /// Old sub-format: 16-bit fixed-point texcoords
    pub old: bool,
}

impl HandlerContext<'_> {
    fn reference(&self, raw: i32) -> FragRef {
        FragRef::from_raw(raw, self.strings)
    }
}

/// Fragment decoder signature
pub type Handler = fn(&mut ByteCursor<'_>, &HandlerContext<'_>) -> Result<FragmentData>;

/// Handler registered for a fragment type, if any
#[must_use]
pub fn handler_for(kind: FragmentType) -> Option<Handler> {
    let handler: Handler = match kind {
        FragmentType::TextureNames => texture_names,
        FragmentType::BitmapInfo => bitmap_info,
        FragmentType::BitmapInfoRef
        | FragmentType::SkeletonTrackSetRef
        | FragmentType::LightSourceRef
        | FragmentType::MeshRef => reference,
        FragmentType::SkeletonTrackSet => skeleton_track_set,
        FragmentType::SkeletonPieceTrack => piece_track,
        FragmentType::SkeletonPieceTrackRef => piece_track_ref,
        FragmentType::ModelRef => model_ref,
        FragmentType::ObjectPlacement => object_placement,
        FragmentType::LightSource => light_source,
        FragmentType::LightPlacement => light_placement,
        FragmentType::AmbientRegion => ambient_region,
        FragmentType::TextureRef => texture_ref,
        FragmentType::TextureList => texture_list,
        FragmentType::Mesh => mesh,
        FragmentType::Unknown(_) => return None,
    };
    Some(handler)
}

// 0x03
fn texture_names(b: &mut ByteCursor<'_>, _ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let count = b.read_u32()? as usize + 1;
    let mut names = Vec::with_capacity(count.min(b.remaining()));
    for _ in 0..count {
        let len = b.read_u16()? as usize;
        let mut name = decode_string(b.read_bytes(len)?);
        // Drop the stored terminator
        name.pop();
        names.push(name);
    }
    Ok(FragmentData::TextureNames(names))
}

// 0x04
fn bitmap_info(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let flags = b.read_u32()?;
    let count = b.read_u32()? as usize;
    let mut params = 0;
    if flags & (1 << 2) != 0 {
        b.read_u32()?;
    }
    if flags & (1 << 3) != 0 {
        params = b.read_u32()?;
    }
    let textures = b
        .read_i32_n(count)?
        .into_iter()
        .map(|raw| ctx.reference(raw))
        .collect();
    Ok(FragmentData::BitmapInfo(BitmapInfo { flags, params, textures }))
}

// 0x05, 0x11, 0x1C, 0x2D
fn reference(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    Ok(FragmentData::Reference(ctx.reference(b.read_i32()?)))
}

// 0x10
fn skeleton_track_set(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let flags = b.read_u32()?;
    let track_count = b.read_u32()? as usize;
    let _unknown_ref = b.read_i32()?;
    if flags & 1 != 0 {
        b.skip(12)?;
    }
    if flags & 2 != 0 {
        b.skip(4)?;
    }

    let mut tracks = Vec::with_capacity(track_count.min(b.remaining()));
    let mut track_meshes = Vec::new();
    for _ in 0..track_count {
        let name = ctx.strings.name_at(b.read_i32()?);
        let track_flags = b.read_u32()?;
        let piece_track = ctx.reference(b.read_i32()?);
        let mesh = b.read_i32()?;
        let child_count = b.read_u32()? as usize;
        let children = b.read_i32_n(child_count)?;

        if mesh != 0 && !track_meshes.contains(&mesh) {
            track_meshes.push(mesh);
        }
        tracks.push(SkeletonTrack {
            name,
            flags: track_flags,
            piece_track,
            mesh,
            children,
        });
    }

    let meshes = if flags & 0x200 != 0 {
        let count = b.read_u32()? as usize;
        b.read_i32_n(count)?
    } else {
        track_meshes
    };

    Ok(FragmentData::SkeletonTrackSet(SkeletonTrackSet {
        flags,
        tracks,
        meshes: meshes.into_iter().map(|raw| ctx.reference(raw)).collect(),
    }))
}

// 0x12
fn piece_track(b: &mut ByteCursor<'_>, _ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let flags = b.read_u32()?;
    let frame_count = b.read_u32()? as usize;

    let mut frames = Vec::with_capacity(frame_count.min(b.remaining() / 16));
    for _ in 0..frame_count {
        let [rot_w, rot_x, rot_y, rot_z] = read_i16x4(b)?;
        let [shift_x, shift_y, shift_z, shift_den] = read_i16x4(b)?;

        let mut frame = PieceFrame::default();
        if rot_w != 0 {
            let [w, x, y, z] = [rot_w, rot_x, rot_y, rot_z].map(|v| f32::from(v) / 16384.0);
            frame.rotation = [-x, -y, -z, w];
        }
        if shift_den != 0 {
            let den = f32::from(shift_den);
            frame.position = [shift_x, shift_y, shift_z].map(|v| f32::from(v) / den);
        }
        frames.push(frame);
    }

    Ok(FragmentData::PieceTrack(PieceTrack { flags, frames }))
}

fn read_i16x4(b: &mut ByteCursor<'_>) -> Result<[i16; 4]> {
    Ok([b.read_i16()?, b.read_i16()?, b.read_i16()?, b.read_i16()?])
}

// 0x13
fn piece_track_ref(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let track = ctx.reference(b.read_i32()?);
    let flags = b.read_u32()?;
    if flags & 1 != 0 {
        b.skip(4)?;
    }
    Ok(FragmentData::PieceTrackRef(PieceTrackRef { track, flags }))
}

// 0x14
fn model_ref(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let flags = b.read_u32()?;
    let _callback = b.read_u32()?;
    let entry_count = b.read_u32()? as usize;
    let skeleton_count = b.read_u32()? as usize;
    let _bounds = b.read_u32()?;
    if flags & 1 != 0 {
        b.skip(4)?;
    }
    if flags & 2 != 0 {
        b.skip(4)?;
    }

    // (u32, f32) distance tables; not needed for zone geometry
    for _ in 0..entry_count {
        let pairs = b.read_u32()? as usize;
        b.skip(pairs.saturating_mul(8))?;
    }

    let skeletons = b
        .read_i32_n(skeleton_count)?
        .into_iter()
        .map(|raw| ctx.reference(raw))
        .collect();

    let name_len = b.read_u32()? as usize;
    b.skip(name_len)?;

    Ok(FragmentData::ModelRef(ModelRef { flags, skeletons }))
}

// 0x15
fn object_placement(b: &mut ByteCursor<'_>, _ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let name_ref = b.read_i32()?;
    let flags = b.read_u32()?;
    let _unknown = b.read_u32()?;
    let position = b.read_vec3()?;
    let rot = b.read_vec3()?;
    let scale = b.read_vec3()?;
    b.skip(8)?;

    // Stored as (z, y, x) rotation units
    let rotation = [rot[2] * ROTATION_UNIT, rot[1] * ROTATION_UNIT, rot[0] * ROTATION_UNIT];
    let scale = if scale[2] > SCALE_EPSILON { [scale[2]; 3] } else { [1.0; 3] };

    Ok(FragmentData::ObjectPlacement(ObjectPlacement {
        name_ref,
        flags,
        position,
        rotation,
        scale,
    }))
}

// 0x1B
fn light_source(b: &mut ByteCursor<'_>, _ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let flags = b.read_u32()?;
    let _frame_count = b.read_u32()?;

    let mut attenuation = DEFAULT_ATTENUATION;
    let color = if flags & (1 << 4) != 0 {
        if flags & (1 << 3) != 0 {
            attenuation = b.read_u32()? as f32;
        }
        let _strength = b.read_f32()?;
        b.read_vec3()?
    } else {
        [b.read_f32()?; 3]
    };

    Ok(FragmentData::LightSource(LightSource { flags, attenuation, color }))
}

// 0x28
fn light_placement(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let light = ctx.reference(b.read_i32()?);
    let flags = b.read_u32()?;
    let position = b.read_vec3()?;
    let radius = b.read_f32()?;
    Ok(FragmentData::LightPlacement(LightPlacement { light, flags, position, radius }))
}

// 0x2A
fn ambient_region(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let light = ctx.reference(b.read_i32()?);
    let flags = b.read_u32()?;
    let count = b.read_u32()? as usize;
    let regions = b.read_u32_n(count)?;
    tracing::debug!("Ambient region: light {}, flags {:#X}, {} regions", light, flags, count);
    Ok(FragmentData::AmbientRegion(AmbientRegion { light, flags, regions }))
}

// 0x30
fn texture_ref(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let pair_flags = b.read_u32()?;
    let raw_flags = b.read_u32()?;
    b.skip(12)?;
    if pair_flags & 2 == 2 {
        b.skip(8)?;
    }
    let bitmap_info = ctx.reference(b.read_i32()?);
    Ok(FragmentData::TextureRef(TextureRef {
        raw_flags,
        flags: normalize_flags(raw_flags),
        bitmap_info,
    }))
}

// 0x31
fn texture_list(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let _zero = b.read_u32()?;
    let count = b.read_u32()? as usize;
    let textures = b
        .read_u32_n(count)?
        .into_iter()
        .filter(|&raw| raw != 0)
        .map(|raw| ctx.reference(raw as i32))
        .collect();
    Ok(FragmentData::TextureList(textures))
}

// 0x36
fn mesh(b: &mut ByteCursor<'_>, ctx: &HandlerContext<'_>) -> Result<FragmentData> {
    let flags = b.read_u32()?;
    let textures = ctx.reference(b.read_u32()? as i32);
    let animation = b.read_u32()?;
    b.skip(8)?;
    let center = b.read_vec3()?;
    b.skip(12)?;
    let max_distance = b.read_f32()?;
    let min = b.read_vec3()?;
    let max = b.read_vec3()?;

    let vertex_count = b.read_u16()? as usize;
    let texcoord_count = b.read_u16()? as usize;
    let normal_count = b.read_u16()? as usize;
    let color_count = b.read_u16()? as usize;
    let poly_count = b.read_u16()? as usize;
    let vertex_piece_count = b.read_u16()? as usize;
    let polytex_count = b.read_u16()? as usize;
    let _vertex_tex_count = b.read_u16()?;
    let _size9 = b.read_u16()?;
    let scale = (1u32 << (b.read_u16()? & 31)) as f32;

    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let x = f32::from(b.read_i16()?) / scale + center[0];
        let y = f32::from(b.read_i16()?) / scale + center[1];
        let z = f32::from(b.read_i16()?) / scale + center[2];
        vertices.push([x, y, z]);
    }

    let texcoords = if texcoord_count == 0 {
        vec![[0.0; 2]; vertex_count]
    } else {
        let mut texcoords = Vec::with_capacity(texcoord_count);
        for _ in 0..texcoord_count {
            texcoords.push(if ctx.old {
                [f32::from(b.read_i16()?) / 256.0, f32::from(b.read_i16()?) / 256.0]
            } else {
                [b.read_f32()?, b.read_f32()?]
            });
        }
        texcoords
    };

    let mut normals = Vec::with_capacity(normal_count);
    for _ in 0..normal_count {
        normals.push([
            f32::from(b.read_i8()?) / 127.0,
            f32::from(b.read_i8()?) / 127.0,
            f32::from(b.read_i8()?) / 127.0,
        ]);
    }

    let colors = if color_count == 0 {
        vec![0.0; vertex_count]
    } else {
        b.read_u32_n(color_count)?.into_iter().map(f32::from_bits).collect()
    };

    let mut polygons = Vec::with_capacity(poly_count);
    for _ in 0..poly_count {
        let flag = b.read_u16()?;
        let indices = [b.read_u16()?, b.read_u16()?, b.read_u16()?];
        polygons.push(Polygon {
            collidable: flag != POLY_PASSABLE,
            indices,
        });
    }

    let mut vertex_pieces = Vec::with_capacity(vertex_piece_count);
    for _ in 0..vertex_piece_count {
        vertex_pieces.push(VertexPiece {
            count: b.read_u16()?,
            bone: b.read_u16()?,
        });
    }

    let mut polytex = Vec::with_capacity(polytex_count);
    for _ in 0..polytex_count {
        polytex.push(PolyTexRun {
            count: b.read_u16()?,
            texture: b.read_u16()?,
        });
    }

    Ok(FragmentData::Mesh(Box::new(MeshFragment {
        flags,
        textures,
        animation,
        center,
        max_distance,
        min,
        max,
        vertices,
        texcoords,
        normals,
        colors,
        polygons,
        vertex_pieces,
        polytex,
    })))
}
