//! Skinned actor models
//!
//! A model reference (0x14) points at a skeleton (0x10) whose tracks form a
//! bone tree. Each bone's rest pose comes from its piece track; animations
//! are extra piece track references named `<prefix><root track name>`.

use std::collections::HashSet;
use std::sync::Arc;

use super::assembler::{MaterialCache, SceneAssembler, triangle};
use super::diagnostics::{CallSite, Diagnostics};
use super::types::{Animation, Character, Mesh, VertexBuffer};
use crate::wld::{Fragment, FragmentData, FragmentType, PieceFrame, SkeletonTrackSet};

impl SceneAssembler<'_> {
    /// Build a [`Character`] for every model reference in the stream
    pub fn convert_characters(&self, diagnostics: &mut Diagnostics) -> Vec<Character> {
        let mut cache = MaterialCache::new();
        let mut characters = Vec::new();

        for fragment in self.table.of_type(FragmentType::ModelRef) {
            let Some(model) = fragment.data.as_ref().and_then(FragmentData::as_model_ref) else {
                continue;
            };
            if model.skeletons.len() > 1 {
                tracing::debug!(
                    "Model {} has {} skeletons, using the first",
                    fragment.name(),
                    model.skeletons.len()
                );
            }
            let skeleton = match model.skeletons.first().map(|r| self.table.resolve_data(r)) {
                Some(Ok(data)) => data.and_then(FragmentData::as_skeleton),
                Some(Err(e)) => {
                    self.note_reference_error(&e, diagnostics);
                    None
                }
                None => None,
            };
            let Some(skeleton) = skeleton.filter(|s| !s.tracks.is_empty()) else {
                tracing::debug!("Model {} has no usable skeleton", fragment.name());
                diagnostics.malformed_characters += 1;
                continue;
            };

            let name = self.options.actor_name(fragment.name());
            let (bone_parents, order) = bone_tree(skeleton, &name, diagnostics);
            let animations = self.animations(skeleton, &order, diagnostics);
            let meshes = self.skinned_meshes(skeleton, diagnostics, &mut cache);

            tracing::debug!(
                "Character {}: {} bones, {} meshes, {} animations",
                name,
                bone_parents.len(),
                meshes.len(),
                animations.len()
            );
            characters.push(Character {
                name,
                bone_parents,
                meshes,
                animations,
            });
        }
        characters
    }

    /// The 0x13 piece track reference a skeleton track points at
    fn piece_track_ref(&self, skeleton: &SkeletonTrackSet, bone: usize) -> Option<&Fragment> {
        let track = skeleton.tracks.get(bone)?;
        self.table
            .resolve(&track.piece_track)
            .ok()
            .flatten()
            .filter(|f| f.kind == FragmentType::SkeletonPieceTrackRef)
    }

    fn frames(&self, piece_track_ref: &Fragment, diagnostics: &mut Diagnostics) -> Vec<PieceFrame> {
        let Some(reference) = piece_track_ref.data.as_ref().and_then(FragmentData::as_piece_track_ref) else {
            return Vec::new();
        };
        match self.table.resolve_data(&reference.track) {
            Ok(data) => data
                .and_then(FragmentData::as_piece_track)
                .map(|track| track.frames.clone())
                .unwrap_or_default(),
            Err(e) => {
                self.note_reference_error(&e, diagnostics);
                Vec::new()
            }
        }
    }

    /// Rest pose plus one animation per prefix found in the stream
    fn animations(&self, skeleton: &SkeletonTrackSet, order: &[usize], diagnostics: &mut Diagnostics) -> Vec<Animation> {
        let Some(root) = self.piece_track_ref(skeleton, 0) else {
            diagnostics.malformed_characters += 1;
            return Vec::new();
        };
        let root_name = root.name();

        let mut prefixes = vec![String::new()];
        if !root_name.is_empty() {
            for fragment in self.table.of_type(FragmentType::SkeletonPieceTrackRef) {
                let name = fragment.name();
                if name == root_name {
                    continue;
                }
                if let Some(prefix) = name.strip_suffix(root_name) {
                    if !prefixes.iter().any(|p| p == prefix) {
                        prefixes.push(prefix.to_string());
                    }
                }
            }
        }

        prefixes
            .into_iter()
            .map(|prefix| {
                let mut bones = vec![Vec::new(); skeleton.tracks.len()];
                for &bone in order {
                    let Some(base) = self.piece_track_ref(skeleton, bone) else {
                        continue;
                    };
                    let track = if prefix.is_empty() {
                        base
                    } else {
                        self.table
                            .by_name(&format!("{prefix}{}", base.name()))
                            .filter(|f| f.kind == FragmentType::SkeletonPieceTrackRef)
                            .unwrap_or(base)
                    };
                    bones[bone] = self.frames(track, diagnostics);
                }
                Animation { name: prefix, bones }
            })
            .collect()
    }

    fn skinned_meshes(
        &self,
        skeleton: &SkeletonTrackSet,
        diagnostics: &mut Diagnostics,
        cache: &mut MaterialCache,
    ) -> Vec<Mesh> {
        let mut meshes = Vec::new();
        for reference in &skeleton.meshes {
            let mesh = match self.table.resolve_data(reference) {
                Ok(data) => data.and_then(FragmentData::as_mesh),
                Err(e) => {
                    self.note_reference_error(&e, diagnostics);
                    None
                }
            };
            let Some(mesh) = mesh else {
                tracing::debug!("Skeleton mesh {} did not resolve", reference);
                diagnostics.malformed_characters += 1;
                continue;
            };

            let bones: Vec<u16> = mesh
                .vertex_pieces
                .iter()
                .flat_map(|piece| std::iter::repeat_n(piece.bone, usize::from(piece.count)))
                .collect();
            let vertices = Arc::new(VertexBuffer::skinned(&mesh.vertices, &mesh.normals, &mesh.texcoords, &bones));

            for run in self.texture_runs(mesh, CallSite::ConvertCharacters, diagnostics, cache) {
                if run.polygons.is_empty() {
                    continue;
                }
                meshes.push(Mesh {
                    collidable: run.polygons.iter().all(|p| p.collidable),
                    polygons: run.polygons.iter().map(triangle).collect(),
                    material: run.material,
                    vertices: Arc::clone(&vertices),
                });
            }
        }
        meshes
    }
}

/// Parent of each bone from a depth-first walk of the child lists starting
/// at bone 0, plus the visit order. Out-of-range or already visited
/// children are cut off.
fn bone_tree(skeleton: &SkeletonTrackSet, name: &str, diagnostics: &mut Diagnostics) -> (Vec<Option<usize>>, Vec<usize>) {
    let count = skeleton.tracks.len();
    let mut parents = vec![None; count];
    let mut order = Vec::with_capacity(count);
    let mut visited = HashSet::new();
    let mut truncated = false;

    let mut stack = vec![0usize];
    visited.insert(0);
    while let Some(bone) = stack.pop() {
        order.push(bone);
        // Reverse so children are visited in list order
        for &child in skeleton.tracks[bone].children.iter().rev() {
            let Ok(child) = usize::try_from(child) else {
                truncated = true;
                continue;
            };
            if child >= count || !visited.insert(child) {
                truncated = true;
                continue;
            }
            parents[child] = Some(bone);
            stack.push(child);
        }
    }

    if truncated {
        tracing::warn!("Character {} has a malformed bone hierarchy", name);
        diagnostics.malformed_characters += 1;
    }
    (parents, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveFiles;
    use crate::options::ConvertOptions;
    use crate::wld::{
        BitmapInfo, FragRef, FragmentTable, MeshFragment, ModelRef, PieceTrack, PieceTrackRef, PolyTexRun,
        Polygon, RawFragment, RawFragmentTable, SkeletonTrack, VertexPiece,
    };

    fn frag(index: usize, name: Option<&str>, kind: FragmentType, data: FragmentData) -> RawFragment {
        RawFragment {
            fragment: Fragment {
                index,
                name: name.map(str::to_string),
                kind,
                data: Some(data),
            },
            record_start: 0,
            declared_size: 0,
            consumed: 0,
        }
    }

    fn track(name: &str, piece_track: &str, children: Vec<i32>) -> SkeletonTrack {
        SkeletonTrack {
            name: name.to_string(),
            flags: 0,
            piece_track: FragRef::name(piece_track),
            mesh: 0,
            children,
        }
    }

    fn frame(x: f32) -> PieceFrame {
        PieceFrame {
            rotation: [0.0, 0.0, 0.0, 1.0],
            position: [x, 0.0, 0.0],
        }
    }

    fn piece(index: usize, frames: Vec<PieceFrame>) -> RawFragment {
        frag(index, None, FragmentType::SkeletonPieceTrack, FragmentData::PieceTrack(PieceTrack { flags: 0, frames }))
    }

    fn piece_ref(index: usize, name: &str, track: usize) -> RawFragment {
        frag(
            index,
            Some(name),
            FragmentType::SkeletonPieceTrackRef,
            FragmentData::PieceTrackRef(PieceTrackRef {
                track: FragRef::index(track),
                flags: 0,
            }),
        )
    }

    fn table() -> FragmentTable {
        let fragments = vec![
            // Rest pose tracks
            piece(0, vec![frame(0.0)]),
            piece_ref(1, "ROOT_TRACK", 0),
            piece(2, vec![frame(1.0)]),
            piece_ref(3, "ARM_TRACK", 2),
            // "C01" animation overrides the root only
            piece(4, vec![frame(5.0), frame(6.0)]),
            piece_ref(5, "C01ROOT_TRACK", 4),
            frag(
                6,
                Some("NAMES"),
                FragmentType::TextureNames,
                FragmentData::TextureNames(vec!["skin.bmp".into()]),
            ),
            frag(
                7,
                Some("INFO"),
                FragmentType::BitmapInfo,
                FragmentData::BitmapInfo(BitmapInfo {
                    flags: 0,
                    params: 0,
                    textures: vec![FragRef::index(6)],
                }),
            ),
            frag(8, None, FragmentType::TextureList, FragmentData::TextureList(vec![FragRef::index(7)])),
            frag(
                9,
                Some("BODY_DMSPRITEDEF"),
                FragmentType::Mesh,
                FragmentData::Mesh(Box::new(MeshFragment {
                    flags: 0,
                    textures: FragRef::index(8),
                    animation: 0,
                    center: [0.0; 3],
                    max_distance: 0.0,
                    min: [0.0; 3],
                    max: [0.0; 3],
                    vertices: vec![[0.0; 3]; 3],
                    texcoords: vec![[0.0; 2]; 3],
                    normals: vec![[0.0; 3]; 3],
                    colors: vec![0.0; 3],
                    polygons: vec![Polygon {
                        collidable: true,
                        indices: [0, 1, 2],
                    }],
                    vertex_pieces: vec![VertexPiece { count: 2, bone: 0 }, VertexPiece { count: 1, bone: 1 }],
                    polytex: vec![PolyTexRun { count: 1, texture: 3 }],
                })),
            ),
            frag(10, None, FragmentType::MeshRef, FragmentData::Reference(FragRef::index(9))),
            frag(
                11,
                Some("ELF_HS_DEF"),
                FragmentType::SkeletonTrackSet,
                FragmentData::SkeletonTrackSet(SkeletonTrackSet {
                    flags: 0,
                    tracks: vec![
                        track("ROOT", "ROOT_TRACK", vec![1, 1, 7]),
                        track("ARM", "ARM_TRACK", vec![]),
                    ],
                    meshes: vec![FragRef::index(10)],
                }),
            ),
            frag(12, None, FragmentType::SkeletonTrackSetRef, FragmentData::Reference(FragRef::index(11))),
            frag(
                13,
                Some("ELF_ACTORDEF"),
                FragmentType::ModelRef,
                FragmentData::ModelRef(ModelRef {
                    flags: 0,
                    skeletons: vec![FragRef::index(12)],
                }),
            ),
        ];
        RawFragmentTable {
            fragments,
            ..RawFragmentTable::default()
        }
        .bake()
    }

    #[test]
    fn test_character_bones_animations_and_skin() {
        let table = table();
        let files = ArchiveFiles::new();
        let options = ConvertOptions::default();
        let mut diagnostics = Diagnostics::default();

        let characters = SceneAssembler::new(&table, &files, &options).convert_characters(&mut diagnostics);
        assert_eq!(characters.len(), 1);
        let elf = &characters[0];
        assert_eq!(elf.name, "ELF");

        // Duplicate and out-of-range children are cut off
        assert_eq!(elf.bone_parents, vec![None, Some(0)]);
        assert_eq!(diagnostics.malformed_characters, 1);

        let rest = elf.animation("").unwrap();
        assert_eq!(rest.bones, vec![vec![frame(0.0)], vec![frame(1.0)]]);
        let c01 = elf.animation("C01").unwrap();
        assert_eq!(c01.bones, vec![vec![frame(5.0), frame(6.0)], vec![frame(1.0)]]);
        assert_eq!(elf.animations.len(), 2);

        assert_eq!(elf.meshes.len(), 1);
        let mesh = &elf.meshes[0];
        assert_eq!(mesh.vertices.stride, 9);
        let bones: Vec<f32> = (0..3).map(|i| mesh.vertices.vertex(i).unwrap()[8]).collect();
        assert_eq!(bones, vec![0.0, 0.0, 1.0]);
        assert_eq!(mesh.polygons, vec![[0, 1, 2]]);

        // Texture index 3 wraps onto the single-entry list
        assert_eq!(diagnostics.total_fallbacks(), 1);
        assert_eq!(diagnostics.fallbacks_by_call_site()[&CallSite::ConvertCharacters], 1);
        assert_eq!(diagnostics.missing_textures["skin.bmp"], 1);
    }

    #[test]
    fn test_model_without_skeleton_is_counted() {
        let table = RawFragmentTable {
            fragments: vec![frag(
                0,
                Some("GHOST_ACTORDEF"),
                FragmentType::ModelRef,
                FragmentData::ModelRef(ModelRef {
                    flags: 0,
                    skeletons: vec![FragRef::name("MISSING")],
                }),
            )],
            ..RawFragmentTable::default()
        }
        .bake();
        let files = ArchiveFiles::new();
        let options = ConvertOptions::default();
        let mut diagnostics = Diagnostics::default();

        let characters = SceneAssembler::new(&table, &files, &options).convert_characters(&mut diagnostics);
        assert!(characters.is_empty());
        assert_eq!(diagnostics.malformed_characters, 1);
    }
}
