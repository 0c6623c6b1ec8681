//! Zone scene graph assembly
//!
//! [`SceneAssembler`] turns one decoded [`FragmentTable`](crate::wld::FragmentTable)
//! into objects, meshes, lights and placeables; [`ZoneBuilder`] runs it over
//! the usual set of zone archives.

mod assembler;
mod character;
mod diagnostics;
mod types;
mod zone_builder;

pub use assembler::SceneAssembler;
pub use diagnostics::{CallSite, DiagnosticSummary, Diagnostics, FallbackCount, FallbackKey};
pub use types::{
    Animation, Character, Light, Material, Mesh, Object, ObjectId, Placeable, SKINNED_VERTEX_STRIDE,
    SKY_OBJECT, Texture, VERTEX_STRIDE, VertexBuffer, WORLD_OBJECT, Zone,
};
pub use zone_builder::{ZoneBuilder, characters_from_archive};
