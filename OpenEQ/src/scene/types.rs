//! Scene graph produced by the assembler

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::diagnostics::Diagnostics;
use crate::wld::{MaterialFlags, PieceFrame};

/// Name of the object holding world (non-instanced) geometry
pub const WORLD_OBJECT: &str = "_ZONE_";

/// Name of the optional sky dome object
pub const SKY_OBJECT: &str = "_SKYBOX_";

/// Floats per vertex: position, normal, texcoord
pub const VERTEX_STRIDE: usize = 8;

/// Floats per skinned vertex: [`VERTEX_STRIDE`] plus a bone index
pub const SKINNED_VERTEX_STRIDE: usize = 9;

/// Index of an [`Object`] within its [`Zone`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Interleaved vertex data
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    pub data: Vec<f32>,
    /// Floats per vertex
    pub stride: usize,
    /// Number of vertices
    pub count: usize,
}

impl VertexBuffer {
    /// Interleave position, normal and texcoord per vertex.
    ///
    /// Normals and texcoords shorter than `positions` are padded with zeros.
    #[must_use]
    pub fn interleave(positions: &[[f32; 3]], normals: &[[f32; 3]], texcoords: &[[f32; 2]]) -> Self {
        let mut data = Vec::with_capacity(positions.len() * VERTEX_STRIDE);
        for (i, position) in positions.iter().enumerate() {
            data.extend_from_slice(position);
            data.extend_from_slice(normals.get(i).unwrap_or(&[0.0; 3]));
            data.extend_from_slice(texcoords.get(i).unwrap_or(&[0.0; 2]));
        }
        Self {
            data,
            stride: VERTEX_STRIDE,
            count: positions.len(),
        }
    }

    /// Interleave like [`Self::interleave`] with a trailing bone index per vertex
    #[must_use]
    pub fn skinned(
        positions: &[[f32; 3]],
        normals: &[[f32; 3]],
        texcoords: &[[f32; 2]],
        bones: &[u16],
    ) -> Self {
        let mut data = Vec::with_capacity(positions.len() * SKINNED_VERTEX_STRIDE);
        for (i, position) in positions.iter().enumerate() {
            data.extend_from_slice(position);
            data.extend_from_slice(normals.get(i).unwrap_or(&[0.0; 3]));
            data.extend_from_slice(texcoords.get(i).unwrap_or(&[0.0; 2]));
            data.push(bones.get(i).copied().map_or(0.0, f32::from));
        }
        Self {
            data,
            stride: SKINNED_VERTEX_STRIDE,
            count: positions.len(),
        }
    }

    /// Floats of one vertex
    #[must_use]
    pub fn vertex(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.stride)?;
        self.data.get(start..start + self.stride)
    }

    #[must_use]
    pub fn position(&self, index: usize) -> Option<[f32; 3]> {
        self.vertex(index).map(|v| [v[0], v[1], v[2]])
    }
}

/// A texture image copied out of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Lowercase archive file name
    pub name: String,
    /// `None` if no archive has the file
    pub data: Option<Vec<u8>>,
}

impl Texture {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.data.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub flags: MaterialFlags,
    /// Textures in binding order
    pub textures: Vec<Texture>,
    /// Opaque per-material parameter
    pub params: u32,
}

impl Material {
    pub fn texture_names(&self) -> impl Iterator<Item = &str> {
        self.textures.iter().map(|t| t.name.as_str())
    }
}

/// Triangles drawn with one material over a shared vertex buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub material: Arc<Material>,
    pub vertices: Arc<VertexBuffer>,
    pub polygons: Vec<[u32; 3]>,
    pub collidable: bool,
}

/// A named group of meshes
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub name: String,
    pub meshes: Vec<Mesh>,
}

impl Object {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meshes: Vec::new(),
        }
    }
}

/// A point light
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub position: [f32; 3],
    pub radius: f32,
    pub attenuation: f32,
    pub color: [f32; 3],
    pub flags: u32,
}

/// An instance of an object placed in the zone
#[derive(Debug, Clone, PartialEq)]
pub struct Placeable {
    pub object: ObjectId,
    pub position: [f32; 3],
    /// Euler angles in radians
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

/// Assembled zone
#[derive(Debug, Clone)]
pub struct Zone {
    pub objects: Vec<Object>,
    pub lights: Vec<Light>,
    pub placeables: Vec<Placeable>,
    pub diagnostics: Diagnostics,
    by_name: HashMap<String, ObjectId>,
}

impl Default for Zone {
    fn default() -> Self {
        Self::new()
    }
}

impl Zone {
    /// Empty zone holding only the world object
    #[must_use]
    pub fn new() -> Self {
        let mut zone = Self {
            objects: Vec::new(),
            lights: Vec::new(),
            placeables: Vec::new(),
            diagnostics: Diagnostics::default(),
            by_name: HashMap::new(),
        };
        zone.add_object(WORLD_OBJECT);
        zone
    }

    /// The world object, always [`ObjectId`] 0
    #[must_use]
    pub fn world_id(&self) -> ObjectId {
        ObjectId(0)
    }

    pub fn world_mut(&mut self) -> &mut Object {
        &mut self.objects[0]
    }

    /// Object with this name, created if absent
    pub fn add_object(&mut self, name: &str) -> ObjectId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = ObjectId(self.objects.len());
        self.objects.push(Object::new(name));
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Sky dome object, created on first use
    pub fn sky_mut(&mut self) -> &mut Object {
        let id = self.add_object(SKY_OBJECT);
        &mut self.objects[id.0]
    }

    #[must_use]
    pub fn object_id(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0)
    }

    #[must_use]
    pub fn object_by_name(&self, name: &str) -> Option<&Object> {
        self.object_id(name).and_then(|id| self.object(id))
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn add_placeable(&mut self, placeable: Placeable) {
        self.placeables.push(placeable);
    }

    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.objects.iter().map(|o| o.meshes.len()).sum()
    }
}

/// Per-bone keyframes of one animation
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    /// Empty for the rest pose
    pub name: String,
    /// Frames indexed by bone
    pub bones: Vec<Vec<PieceFrame>>,
}

/// A skinned actor model
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub name: String,
    /// Parent of each bone, `None` for the root
    pub bone_parents: Vec<Option<usize>>,
    /// Meshes over skinned vertex buffers
    pub meshes: Vec<Mesh>,
    pub animations: Vec<Animation>,
}

impl Character {
    #[must_use]
    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }
}
