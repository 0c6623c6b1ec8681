//! Walks a baked fragment table and builds the zone scene graph
//!
//! Every walk is best-effort. Lookup misses degrade to skipping the
//! contribution and counting it in [`Diagnostics`]; nothing here fails.

use std::collections::HashMap;
use std::sync::Arc;

use super::diagnostics::{CallSite, Diagnostics};
use super::types::{Light, Material, Mesh, Placeable, Texture, VertexBuffer, Zone};
use crate::archive::ArchiveFiles;
use crate::error::Error;
use crate::options::ConvertOptions;
use crate::wld::{FragmentData, FragmentTable, FragmentType, MeshFragment, Polygon, TextureBinding};

/// Materials built during one walk, keyed by (texture list index, slot).
/// `None` marks a binding that did not resolve.
pub(super) type MaterialCache = HashMap<(usize, usize), Option<Arc<Material>>>;

/// A polygon run bound to its material
pub(super) struct TextureRun<'m> {
    pub material: Arc<Material>,
    pub polygons: &'m [Polygon],
}

/// Meshes built from one mesh fragment
#[derive(Debug)]
struct MeshGroup {
    fragment_name: String,
    meshes: Vec<Mesh>,
}

/// Builds scene graph contributions from one decoded WLD stream
pub struct SceneAssembler<'a> {
    pub(super) table: &'a FragmentTable,
    pub(super) files: &'a ArchiveFiles,
    pub(super) options: &'a ConvertOptions,
}

impl<'a> SceneAssembler<'a> {
    #[must_use]
    pub fn new(table: &'a FragmentTable, files: &'a ArchiveFiles, options: &'a ConvertOptions) -> Self {
        Self { table, files, options }
    }

    /// Add every mesh fragment to the world object
    pub fn convert_zone(&self, zone: &mut Zone) {
        let (groups, diagnostics) = self.collect_meshes(CallSite::ConvertZone);
        let world = zone.world_mut();
        for group in groups {
            world.meshes.extend(group.meshes);
        }
        zone.diagnostics.merge(diagnostics);
    }

    /// Add each mesh fragment as its own object, then place objects
    pub fn convert_objects(&self, zone: &mut Zone) {
        let (groups, diagnostics) = self.collect_meshes(CallSite::ConvertObjects);
        self.add_objects(zone, groups);
        zone.diagnostics.merge(diagnostics);
        self.convert_placements(zone);
    }

    /// Add a light for each light placement
    pub fn convert_lights(&self, zone: &mut Zone) {
        let (lights, diagnostics) = self.collect_lights();
        zone.lights.extend(lights);
        zone.diagnostics.merge(diagnostics);
    }

    /// Add a placeable for each object placement whose object exists
    pub fn convert_placements(&self, zone: &mut Zone) {
        let mut diagnostics = Diagnostics::default();
        for fragment in self.table.of_type(FragmentType::ObjectPlacement) {
            let Some(placement) = fragment.data.as_ref().and_then(FragmentData::as_object_placement) else {
                continue;
            };
            let name = self.options.actor_name(&self.table.strings().name_at(placement.name_ref));
            let Some(object) = zone.object_id(&name) else {
                tracing::debug!("Placement {} names unknown object {:?}", fragment.index, name);
                diagnostics.record_missing_object(&name);
                continue;
            };
            zone.add_placeable(Placeable {
                object,
                position: placement.position,
                rotation: placement.rotation,
                scale: placement.scale,
            });
        }
        zone.diagnostics.merge(diagnostics);
    }

    /// Objects, meshes and lights of a self-contained stream, then placements.
    ///
    /// Mesh fragments become named objects as in [`Self::convert_objects`].
    /// The mesh and light walks run concurrently when
    /// [`ConvertOptions::parallel`] is set.
    pub fn convert_all(&self, zone: &mut Zone) {
        let ((groups, mesh_diagnostics), (lights, light_diagnostics)) = if self.options.parallel {
            rayon::join(
                || self.collect_meshes(CallSite::ConvertObjects),
                || self.collect_lights(),
            )
        } else {
            (self.collect_meshes(CallSite::ConvertObjects), self.collect_lights())
        };

        self.add_objects(zone, groups);
        zone.lights.extend(lights);
        zone.diagnostics.merge(mesh_diagnostics);
        zone.diagnostics.merge(light_diagnostics);
        self.convert_placements(zone);
    }

    fn add_objects(&self, zone: &mut Zone, groups: Vec<MeshGroup>) {
        for group in groups {
            let id = zone.add_object(&self.options.object_name(&group.fragment_name));
            if let Some(object) = zone.object_mut(id) {
                object.meshes.extend(group.meshes);
            }
        }
    }

    fn collect_meshes(&self, site: CallSite) -> (Vec<MeshGroup>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let mut cache = MaterialCache::new();
        let mut groups = Vec::new();

        for fragment in self.table.of_type(FragmentType::Mesh) {
            let Some(mesh) = fragment.data.as_ref().and_then(FragmentData::as_mesh) else {
                continue;
            };
            let vertices = Arc::new(VertexBuffer::interleave(&mesh.vertices, &mesh.normals, &mesh.texcoords));

            let mut meshes = Vec::new();
            for run in self.texture_runs(mesh, site, &mut diagnostics, &mut cache) {
                split_collidable(&run, &vertices, &mut meshes);
            }
            groups.push(MeshGroup {
                fragment_name: fragment.name().to_string(),
                meshes,
            });
        }

        tracing::debug!(
            "{}: {} mesh fragments, {} meshes",
            site,
            groups.len(),
            groups.iter().map(|g| g.meshes.len()).sum::<usize>()
        );
        (groups, diagnostics)
    }

    fn collect_lights(&self) -> (Vec<Light>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let mut lights = Vec::new();

        for fragment in self.table.of_type(FragmentType::LightPlacement) {
            let Some(placement) = fragment.data.as_ref().and_then(FragmentData::as_light_placement) else {
                continue;
            };
            let source = match self.table.resolve_data(&placement.light) {
                Ok(data) => data.and_then(FragmentData::as_light_source),
                Err(e) => {
                    self.note_reference_error(&e, &mut diagnostics);
                    None
                }
            };
            let Some(source) = source else {
                tracing::debug!("Light {} has no light source ({})", fragment.index, placement.light);
                diagnostics.unresolved_lights += 1;
                continue;
            };
            lights.push(Light {
                position: placement.position,
                radius: placement.radius,
                attenuation: source.attenuation,
                color: source.color,
                flags: placement.flags,
            });
        }
        (lights, diagnostics)
    }

    /// Bind each polygon run of a mesh to a material.
    ///
    /// Out-of-range texture indices wrap onto the texture list when
    /// fallback is enabled; each such run is counted once, including runs
    /// against an empty list, which are then dropped. Runs with an
    /// unresolved binding are dropped and counted.
    pub(super) fn texture_runs<'m>(
        &self,
        mesh: &'m MeshFragment,
        site: CallSite,
        diagnostics: &mut Diagnostics,
        cache: &mut MaterialCache,
    ) -> Vec<TextureRun<'m>> {
        let (list_index, bindings) = self.texture_list(mesh, diagnostics);
        let available = bindings.len();
        let total = mesh.polygons.len();

        let mut runs = Vec::with_capacity(mesh.polytex.len());
        let mut offset = 0usize;
        for run in &mesh.polytex {
            let start = offset.min(total);
            let end = (offset + usize::from(run.count)).min(total);
            offset += usize::from(run.count);

            let mut slot = usize::from(run.texture);
            if slot >= available {
                diagnostics.record_fallback(site, slot, available);
                if available == 0 || !self.options.texture_fallback {
                    diagnostics.skipped_runs += 1;
                    continue;
                }
                slot %= available;
            }

            let material = cache
                .entry((list_index, slot))
                .or_insert_with(|| self.material(bindings[slot].as_ref(), diagnostics))
                .clone();
            let Some(material) = material else {
                diagnostics.unresolved_bindings += 1;
                continue;
            };
            runs.push(TextureRun {
                material,
                polygons: &mesh.polygons[start..end],
            });
        }
        runs
    }

    fn texture_list(&self, mesh: &MeshFragment, diagnostics: &mut Diagnostics) -> (usize, &'a [Option<TextureBinding>]) {
        let resolved = self
            .table
            .resolve(&mesh.textures)
            .and_then(|list| Ok(list.zip(self.table.texture_bindings(&mesh.textures)?)));
        match resolved {
            Ok(Some((list, bindings))) => (list.index, bindings),
            Ok(None) => (usize::MAX, &[]),
            Err(e) => {
                self.note_reference_error(&e, diagnostics);
                (usize::MAX, &[])
            }
        }
    }

    fn material(&self, binding: Option<&TextureBinding>, diagnostics: &mut Diagnostics) -> Option<Arc<Material>> {
        let (flags, names, params) = match binding? {
            TextureBinding::Direct { flags, textures, params } => (*flags, textures.clone(), *params),
            TextureBinding::Indirect { flags, bitmap_info } => {
                let resolved = self.table.resolve_data(bitmap_info).and_then(|data| match data {
                    Some(FragmentData::BitmapInfo(info)) => {
                        Ok(Some((self.table.bitmap_texture_names(info)?, info.params)))
                    }
                    Some(FragmentData::TextureNames(names)) => Ok(Some((names.clone(), 0))),
                    _ => Ok(None),
                });
                match resolved {
                    Ok(Some((names, params))) => (*flags, names, params),
                    Ok(None) => return None,
                    Err(e) => {
                        self.note_reference_error(&e, diagnostics);
                        return None;
                    }
                }
            }
        };

        let textures = names
            .into_iter()
            .map(|name| {
                let name = name.to_lowercase();
                let data = self.files.get(&name).cloned();
                if data.is_none() {
                    tracing::debug!("Texture {} not in archive", name);
                    diagnostics.record_missing_texture(&name);
                }
                Texture { name, data }
            })
            .collect();
        Some(Arc::new(Material { flags, textures, params }))
    }

    pub(super) fn note_reference_error(&self, error: &Error, diagnostics: &mut Diagnostics) {
        tracing::warn!("{}", error);
        diagnostics.reference_cycles += 1;
    }
}

/// Split a run into a collidable and a non-collidable mesh over the same
/// vertices and material; empty halves are not emitted.
fn split_collidable(run: &TextureRun<'_>, vertices: &Arc<VertexBuffer>, out: &mut Vec<Mesh>) {
    let mut solid = Vec::new();
    let mut passable = Vec::new();
    for polygon in run.polygons {
        if polygon.collidable {
            solid.push(triangle(polygon));
        } else {
            passable.push(triangle(polygon));
        }
    }
    for (polygons, collidable) in [(solid, true), (passable, false)] {
        if polygons.is_empty() {
            continue;
        }
        out.push(Mesh {
            material: Arc::clone(&run.material),
            vertices: Arc::clone(vertices),
            polygons,
            collidable,
        });
    }
}

pub(super) fn triangle(polygon: &Polygon) -> [u32; 3] {
    polygon.indices.map(u32::from)
}
