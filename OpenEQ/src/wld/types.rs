//! Fragment types and decoded payloads

use std::fmt;

use super::reference::FragRef;

// ============================================================================
// Fragment Types
// ============================================================================

/// Fragment type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FragmentType {
    TextureNames = 0x03,
    BitmapInfo = 0x04,
    BitmapInfoRef = 0x05,
    SkeletonTrackSet = 0x10,
    SkeletonTrackSetRef = 0x11,
    SkeletonPieceTrack = 0x12,
    SkeletonPieceTrackRef = 0x13,
    ModelRef = 0x14,
    ObjectPlacement = 0x15,
    LightSource = 0x1B,
    LightSourceRef = 0x1C,
    LightPlacement = 0x28,
    AmbientRegion = 0x2A,
    MeshRef = 0x2D,
    TextureRef = 0x30,
    TextureList = 0x31,
    Mesh = 0x36,
    Unknown(u32),
}

impl FragmentType {
    #[must_use]
    pub fn from_u32(v: u32) -> Self {
        match v {
            0x03 => Self::TextureNames,
            0x04 => Self::BitmapInfo,
            0x05 => Self::BitmapInfoRef,
            0x10 => Self::SkeletonTrackSet,
            0x11 => Self::SkeletonTrackSetRef,
            0x12 => Self::SkeletonPieceTrack,
            0x13 => Self::SkeletonPieceTrackRef,
            0x14 => Self::ModelRef,
            0x15 => Self::ObjectPlacement,
            0x1B => Self::LightSource,
            0x1C => Self::LightSourceRef,
            0x28 => Self::LightPlacement,
            0x2A => Self::AmbientRegion,
            0x2D => Self::MeshRef,
            0x30 => Self::TextureRef,
            0x31 => Self::TextureList,
            0x36 => Self::Mesh,
            _ => Self::Unknown(v),
        }
    }

    /// Raw type tag as stored in the stream
    #[must_use]
    pub fn tag(self) -> u32 {
        match self {
            Self::TextureNames => 0x03,
            Self::BitmapInfo => 0x04,
            Self::BitmapInfoRef => 0x05,
            Self::SkeletonTrackSet => 0x10,
            Self::SkeletonTrackSetRef => 0x11,
            Self::SkeletonPieceTrack => 0x12,
            Self::SkeletonPieceTrackRef => 0x13,
            Self::ModelRef => 0x14,
            Self::ObjectPlacement => 0x15,
            Self::LightSource => 0x1B,
            Self::LightSourceRef => 0x1C,
            Self::LightPlacement => 0x28,
            Self::AmbientRegion => 0x2A,
            Self::MeshRef => 0x2D,
            Self::TextureRef => 0x30,
            Self::TextureList => 0x31,
            Self::Mesh => 0x36,
            Self::Unknown(v) => v,
        }
    }
}

impl fmt::Display for FragmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04X}", self.tag())
    }
}

// ============================================================================
// Material Flags
// ============================================================================

bitflags::bitflags! {
    /// Normalized material flag set. The empty set is a normal opaque material.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u32 {
        const MASKED = 0x1;
        const TRANSLUCENT = 0x2;
        const TRANSPARENT = 0x4;
    }
}

impl MaterialFlags {
    pub const NORMAL: Self = Self::empty();

    #[must_use]
    pub const fn is_normal(self) -> bool {
        self.is_empty()
    }
}

/// A raw renderer flag value that the generic remapping misclassifies
#[derive(Debug, Clone, Copy)]
pub struct FlagOverride {
    pub mask: u32,
    pub value: u32,
    pub flags: MaterialFlags,
    /// Asset the override was added for
    pub note: &'static str,
}

/// Known misclassified raw flag values
pub const FLAG_OVERRIDES: &[FlagOverride] = &[FlagOverride {
    mask: 0xFFFF,
    value: 0x14,
    flags: MaterialFlags::NORMAL,
    note: "tiger head in Halas",
}];

/// Remap raw texture-reference renderer flags to [`MaterialFlags`]
#[must_use]
pub fn normalize_flags(raw: u32) -> MaterialFlags {
    normalize_flags_with(raw, FLAG_OVERRIDES)
}

/// Remap raw renderer flags, consulting a caller-provided override table
#[must_use]
pub fn normalize_flags_with(raw: u32, overrides: &[FlagOverride]) -> MaterialFlags {
    if let Some(o) = overrides.iter().find(|o| raw & o.mask == o.value) {
        return o.flags;
    }

    let mut flags = MaterialFlags::NORMAL;
    if raw == 0 {
        flags = MaterialFlags::TRANSPARENT;
    }
    if raw & (2 | 8 | 16) != 0 {
        flags |= MaterialFlags::MASKED;
    }
    if raw & (4 | 8) != 0 {
        flags |= MaterialFlags::TRANSLUCENT;
    }
    flags
}

// ============================================================================
// Payloads
// ============================================================================

/// 0x04: a material's texture name lists and parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapInfo {
    pub flags: u32,
    pub params: u32,
    /// References to 0x03 name lists
    pub textures: Vec<FragRef>,
}

/// One bone of a 0x10 skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonTrack {
    pub name: String,
    pub flags: u32,
    /// Reference to a 0x13 piece track reference
    pub piece_track: FragRef,
    /// Raw mesh reference attached to this bone (0 for none)
    pub mesh: i32,
    /// Indices of child bones
    pub children: Vec<i32>,
}

/// 0x10: bone hierarchy and the meshes it animates
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonTrackSet {
    pub flags: u32,
    pub tracks: Vec<SkeletonTrack>,
    /// References to 0x2D mesh references
    pub meshes: Vec<FragRef>,
}

/// One keyframe of a 0x12 piece track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceFrame {
    /// Quaternion `(x, y, z, w)`
    pub rotation: [f32; 4],
    pub position: [f32; 3],
}

impl Default for PieceFrame {
    fn default() -> Self {
        Self {
            rotation: [0.0, 0.0, 0.0, 1.0],
            position: [0.0; 3],
        }
    }
}

/// 0x12: per-frame transforms of one bone
#[derive(Debug, Clone, PartialEq)]
pub struct PieceTrack {
    pub flags: u32,
    pub frames: Vec<PieceFrame>,
}

/// 0x13: named instance of a piece track
#[derive(Debug, Clone, PartialEq)]
pub struct PieceTrackRef {
    pub track: FragRef,
    pub flags: u32,
}

/// 0x14: an actor model and its skeletons
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRef {
    pub flags: u32,
    /// References to 0x11 skeleton references
    pub skeletons: Vec<FragRef>,
}

/// 0x15: an instance of an actor placed in the zone
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPlacement {
    /// Negated string table offset of the actor name
    pub name_ref: i32,
    pub flags: u32,
    pub position: [f32; 3],
    /// Euler angles in radians
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

/// 0x1B: light color and falloff
#[derive(Debug, Clone, PartialEq)]
pub struct LightSource {
    pub flags: u32,
    pub attenuation: f32,
    pub color: [f32; 3],
}

/// 0x28: a positioned light
#[derive(Debug, Clone, PartialEq)]
pub struct LightPlacement {
    /// Reference to a 0x1C light source reference
    pub light: FragRef,
    pub flags: u32,
    pub position: [f32; 3],
    pub radius: f32,
}

/// 0x2A: ambient light regions (informational)
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientRegion {
    pub light: FragRef,
    pub flags: u32,
    pub regions: Vec<u32>,
}

/// 0x30: material flags bound to a bitmap info
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRef {
    pub raw_flags: u32,
    pub flags: MaterialFlags,
    /// Reference to a 0x05 bitmap info reference
    pub bitmap_info: FragRef,
}

/// A mesh triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polygon {
    pub collidable: bool,
    pub indices: [u16; 3],
}

/// `count` consecutive vertices bound to one bone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexPiece {
    pub count: u16,
    pub bone: u16,
}

/// `count` consecutive polygons drawn with one texture-list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolyTexRun {
    pub count: u16,
    pub texture: u16,
}

/// 0x36: mesh geometry
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFragment {
    pub flags: u32,
    /// Reference to a 0x31 texture list
    pub textures: FragRef,
    pub animation: u32,
    pub center: [f32; 3],
    pub max_distance: f32,
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub vertices: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    /// Packed vertex colors, bit pattern reinterpreted as `f32`
    pub colors: Vec<f32>,
    pub polygons: Vec<Polygon>,
    pub vertex_pieces: Vec<VertexPiece>,
    pub polytex: Vec<PolyTexRun>,
}

/// Decoded payload of a fragment
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentData {
    TextureNames(Vec<String>),
    BitmapInfo(BitmapInfo),
    /// Payload of the reference-only types (0x05, 0x11, 0x1C, 0x2D)
    Reference(FragRef),
    SkeletonTrackSet(SkeletonTrackSet),
    PieceTrack(PieceTrack),
    PieceTrackRef(PieceTrackRef),
    ModelRef(ModelRef),
    ObjectPlacement(ObjectPlacement),
    LightSource(LightSource),
    LightPlacement(LightPlacement),
    AmbientRegion(AmbientRegion),
    TextureRef(TextureRef),
    TextureList(Vec<FragRef>),
    Mesh(Box<MeshFragment>),
}

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        #[must_use]
        pub fn $name(&self) -> Option<&$ty> {
            match self {
                Self::$variant(v) => Some(v),
                _ => None,
            }
        }
    };
}

impl FragmentData {
    accessor!(as_texture_names, TextureNames, Vec<String>);
    accessor!(as_bitmap_info, BitmapInfo, BitmapInfo);
    accessor!(as_reference, Reference, FragRef);
    accessor!(as_skeleton, SkeletonTrackSet, SkeletonTrackSet);
    accessor!(as_piece_track, PieceTrack, PieceTrack);
    accessor!(as_piece_track_ref, PieceTrackRef, PieceTrackRef);
    accessor!(as_model_ref, ModelRef, ModelRef);
    accessor!(as_object_placement, ObjectPlacement, ObjectPlacement);
    accessor!(as_light_source, LightSource, LightSource);
    accessor!(as_light_placement, LightPlacement, LightPlacement);
    accessor!(as_ambient_region, AmbientRegion, AmbientRegion);
    accessor!(as_texture_ref, TextureRef, TextureRef);
    accessor!(as_texture_list, TextureList, Vec<FragRef>);
    accessor!(as_mesh, Mesh, MeshFragment);
}

/// A decoded fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Zero-based position in the fragment table
    pub index: usize,
    pub name: Option<String>,
    pub kind: FragmentType,
    /// `None` for unknown types and records whose handler failed
    pub data: Option<FragmentData>,
}

impl Fragment {
    /// Name, or the empty string for unnamed fragments
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}
