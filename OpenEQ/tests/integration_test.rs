mod common;

use common::{WldBuilder, material};
use openeq::archive::{DIRECTORY_CRC, S3dReader};
use openeq::prelude::*;
use openeq::scene::{CallSite, FallbackKey};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn archive(files: &[(&str, Vec<u8>)]) -> ArchiveFiles {
    let mut writer = S3dWriter::new();
    for (name, data) in files {
        writer.add_file(*name, data.clone());
    }
    parse_s3d_bytes(&writer.to_bytes().unwrap()).unwrap()
}

#[test]
fn test_archive_round_trip() {
    let big: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let files = [
        ("README.TXT", b"hello".to_vec()),
        ("big.bin", big.clone()),
        ("empty.dat", Vec::new()),
    ];

    let mut writer = S3dWriter::new();
    for (name, data) in &files {
        writer.add_file(*name, data.clone());
    }
    let bytes = writer.to_bytes().unwrap();

    let mut reader = S3dReader::new(&bytes);
    let entries = reader.read_directory().unwrap().to_vec();
    assert_eq!(entries.iter().filter(|e| e.crc == DIRECTORY_CRC).count(), 1);

    let decoded = reader.read_all().unwrap();
    assert_eq!(decoded.len(), entries.len() - 1);
    assert_eq!(decoded.keys().collect::<Vec<_>>(), vec!["readme.txt", "big.bin", "empty.dat"]);
    assert_eq!(decoded["readme.txt"], b"hello");
    assert_eq!(decoded["big.bin"], big);
    assert!(decoded["empty.dat"].is_empty());

    for entry in entries.iter().filter(|e| !e.is_directory()) {
        let data = reader.read_entry(entry).unwrap();
        assert_eq!(data.len(), entry.size as usize);
    }
}

#[test]
fn test_archive_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.s3d");
    S3dWriter::new().with_file("a.bmp", vec![1, 2, 3]).write(&path).unwrap();

    let files = read_s3d(&path).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files["a.bmp"], vec![1, 2, 3]);
}

#[test]
fn test_bad_archive_magic() {
    let mut bytes = S3dWriter::new().with_file("a", vec![0]).to_bytes().unwrap();
    bytes[4] = b'X';
    let err = parse_s3d_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidArchiveMagic(_)));
    assert!(err.is_format_error());
}

#[test]
fn test_single_mesh_scenario() {
    let mut wld = WldBuilder::new();
    let tex = material(&mut wld, "A", 1, &["a.bmp"]);
    let list = wld.texture_list(&[tex]);
    wld.mesh(
        Some("A_DMSPRITEDEF"),
        list,
        &[[0, 0, 0], [1, 0, 0], [0, 1, 0]],
        &[(true, [0, 1, 2])],
        &[(1, 0)],
    );
    let files = archive(&[("a.wld", wld.build())]);
    assert_eq!(files.len(), 1);

    let zone = ZoneBuilder::new("a", ConvertOptions::default())
        .zone_archive(files)
        .build()
        .unwrap();

    assert_eq!(zone.objects.len(), 1);
    let object = &zone.objects[0];
    assert_eq!(object.meshes.len(), 1);
    let mesh = &object.meshes[0];
    assert_eq!(mesh.vertices.count, 3);
    assert_eq!(mesh.polygons, vec![[0, 1, 2]]);
    assert!(mesh.collidable);
    assert_eq!(mesh.material.texture_names().collect::<Vec<_>>(), vec!["a.bmp"]);
    assert_eq!(mesh.vertices.position(1), Some([1.0, 0.0, 0.0]));
}

#[test]
fn test_reference_hop_bound_reaches_texture_lists() {
    let mut wld = WldBuilder::new();
    let tex = material(&mut wld, "A", 1, &["a.bmp"]);
    let hop1 = wld.reference(0x2D, None, tex);
    let hop2 = wld.reference(0x2D, None, hop1);
    let hop3 = wld.reference(0x2D, None, hop2);
    let list = wld.texture_list(&[hop3]);
    wld.mesh(None, list, &[[0, 0, 0], [1, 0, 0], [0, 1, 0]], &[(true, [0, 1, 2])], &[(1, 0)]);
    let files = archive(&[("a.wld", wld.build()), ("a.bmp", b"A".to_vec())]);

    let zone = ZoneBuilder::new("a", ConvertOptions::default().with_max_reference_hops(2))
        .zone_archive(files.clone())
        .build()
        .unwrap();
    assert_eq!(zone.mesh_count(), 0);
    assert_eq!(zone.diagnostics.reference_cycles, 1);
    assert_eq!(zone.diagnostics.unresolved_bindings, 1);

    let zone = ZoneBuilder::new("a", ConvertOptions::default())
        .zone_archive(files)
        .build()
        .unwrap();
    assert_eq!(zone.mesh_count(), 1);
    assert_eq!(zone.diagnostics.reference_cycles, 0);
}

#[test]
fn test_fallback_determinism() {
    let mut wld = WldBuilder::new();
    let first = material(&mut wld, "FIRST", 1, &["first.bmp"]);
    let second = material(&mut wld, "SECOND", 4, &["second.bmp"]);
    let list = wld.texture_list(&[first, second]);
    let polygons: Vec<(bool, [u16; 3])> = vec![(true, [0, 1, 2]); 4];
    wld.mesh(None, list, &[[0, 0, 0], [1, 0, 0], [0, 1, 0]], &polygons, &[(4, 5)]);
    let data = wld.build();

    let files = archive(&[("first.bmp", b"1".to_vec()), ("second.bmp", b"2".to_vec())]);
    let table = parse_wld_bytes(&data).unwrap();
    let options = ConvertOptions::default();

    let mut zone = Zone::new();
    SceneAssembler::new(&table, &files, &options).convert_zone(&mut zone);

    let meshes = &zone.objects[0].meshes;
    assert_eq!(meshes.len(), 1);
    assert_eq!(meshes[0].polygons.len(), 4);
    assert_eq!(meshes[0].material.texture_names().collect::<Vec<_>>(), vec!["second.bmp"]);
    assert_eq!(meshes[0].material.flags, MaterialFlags::TRANSLUCENT);

    let key = FallbackKey {
        call_site: CallSite::ConvertZone,
        index: 5,
        available: 2,
    };
    assert_eq!(zone.diagnostics.texture_fallbacks.get(&key), Some(&1));
    assert_eq!(zone.diagnostics.summary().total_fallbacks, 1);
}

#[test]
fn test_collidability_partition() {
    let mut wld = WldBuilder::new();
    let tex = material(&mut wld, "WALL", 1, &["wall.bmp"]);
    let list = wld.texture_list(&[tex]);
    let polygons = [
        (true, [0, 1, 2]),
        (false, [1, 2, 3]),
        (false, [2, 3, 0]),
        (true, [3, 0, 1]),
        (false, [0, 2, 3]),
    ];
    wld.mesh(
        None,
        list,
        &[[0, 0, 0], [1, 0, 0], [0, 1, 0], [1, 1, 0]],
        &polygons,
        &[(3, 0), (2, 0)],
    );
    let table = parse_wld_bytes(&wld.build()).unwrap();
    let files = ArchiveFiles::new();
    let options = ConvertOptions::default();

    let mut zone = Zone::new();
    SceneAssembler::new(&table, &files, &options).convert_zone(&mut zone);
    let meshes = &zone.objects[0].meshes;

    // Per run: collidable first, then non-collidable
    let expected: Vec<(bool, Vec<[u32; 3]>)> = vec![
        (true, vec![[0, 1, 2]]),
        (false, vec![[1, 2, 3], [2, 3, 0]]),
        (true, vec![[3, 0, 1]]),
        (false, vec![[0, 2, 3]]),
    ];
    let actual: Vec<(bool, Vec<[u32; 3]>)> = meshes.iter().map(|m| (m.collidable, m.polygons.clone())).collect();
    assert_eq!(actual, expected);

    let mut all: Vec<[u32; 3]> = meshes.iter().flat_map(|m| m.polygons.clone()).collect();
    let mut input: Vec<[u32; 3]> = polygons.iter().map(|(_, p)| p.map(u32::from)).collect();
    all.sort_unstable();
    input.sort_unstable();
    assert_eq!(all, input);
    assert_eq!(zone.diagnostics.missing_textures.get("wall.bmp"), Some(&1));
}

#[test]
fn test_zone_from_archive_set() {
    // Object archive: the tree mesh and its bark texture
    let mut objects = WldBuilder::new();
    let bark = material(&mut objects, "BARK", 1, &["bark.bmp"]);
    let list = objects.texture_list(&[bark]);
    objects.mesh(
        Some("TREE_DMSPRITEDEF"),
        list,
        &[[0, 0, 0], [0, 0, 5], [1, 0, 0]],
        &[(true, [0, 1, 2])],
        &[(1, 0)],
    );
    let obj_files = vec![
        ("test_obj.wld", objects.build()),
        ("bark.bmp", b"bark".to_vec()),
    ];

    // Zone archive: placements, lights, world geometry using the bark texture
    let mut placements = WldBuilder::new();
    placements.placement("TREE_ACTORDEF", [10.0, 20.0, 30.0], [512.0, 0.0, 0.0], 2.0);
    placements.placement("BUSH_ACTORDEF", [0.0; 3], [0.0; 3], 1.0);

    let mut lights = WldBuilder::new();
    let source = lights.light_source("TORCH", [1.0, 0.5, 0.0]);
    let source_ref = lights.reference(0x1C, None, source);
    lights.light(source_ref, [1.0, 2.0, 3.0], 40.0);

    let mut world = WldBuilder::new();
    let bark = material(&mut world, "GROUND", 1, &["BARK.BMP"]);
    let list = world.texture_list(&[bark]);
    world.mesh(None, list, &[[0, 0, 0], [1, 0, 0], [0, 1, 0]], &[(false, [2, 1, 0])], &[(1, 0)]);

    let zone_files = vec![
        ("objects.wld", placements.build()),
        ("lights.wld", lights.build()),
        ("test.wld", world.build()),
    ];

    let dir = tempdir().unwrap();
    let mut writer = S3dWriter::new();
    for (name, data) in obj_files {
        writer.add_file(name, data);
    }
    writer.write(dir.path().join("test_obj.s3d")).unwrap();
    let mut writer = S3dWriter::new();
    for (name, data) in zone_files {
        writer.add_file(name, data);
    }
    writer.write(dir.path().join("test.s3d")).unwrap();

    let options = ConvertOptions::default().sequential();
    let zone = ZoneBuilder::from_directory(dir.path(), "test", options).unwrap().build().unwrap();

    let names: Vec<&str> = zone.objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec![WORLD_OBJECT, "TREE"]);

    let tree = zone.object_id("TREE").unwrap();
    assert_eq!(zone.placeables.len(), 1);
    let placeable = &zone.placeables[0];
    assert_eq!(placeable.object, tree);
    assert_eq!(placeable.position, [10.0, 20.0, 30.0]);
    assert_eq!(placeable.rotation, [0.0, 0.0, std::f32::consts::PI]);
    assert_eq!(placeable.scale, [2.0; 3]);
    assert_eq!(zone.diagnostics.missing_objects.get("BUSH"), Some(&1));

    assert_eq!(zone.lights.len(), 1);
    assert_eq!(zone.lights[0].color, [1.0, 0.5, 0.0]);
    assert_eq!(zone.lights[0].radius, 40.0);
    assert_eq!(zone.lights[0].attenuation, 200.0);

    // World geometry found its texture in the object archive
    let ground = &zone.objects[0].meshes;
    assert_eq!(ground.len(), 1);
    assert!(!ground[0].collidable);
    assert_eq!(ground[0].material.textures[0].data.as_deref(), Some(&b"bark"[..]));
    assert!(zone.diagnostics.missing_textures.is_empty());

    let summary = zone.diagnostics.summary();
    assert_eq!(summary.missing_objects, 1);
    assert_eq!(summary.total_fallbacks, 0);

    // Decoding on the rayon pool assembles the same zone
    let parallel = ZoneBuilder::from_directory(dir.path(), "test", ConvertOptions::default())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(parallel.objects, zone.objects);
    assert_eq!(parallel.lights, zone.lights);
    assert_eq!(parallel.placeables, zone.placeables);
    assert_eq!(parallel.diagnostics, zone.diagnostics);
}

#[test]
fn test_characters_from_archive() {
    let mut wld = WldBuilder::new();
    let frames = common::Payload::new()
        .u32(0)
        .u32(1)
        .bytes(&[0; 8])
        .i16(4)
        .i16(0)
        .i16(0)
        .i16(2);
    let track = wld.fragment(0x12, None, frames);
    let track_ref = wld.fragment(0x13, Some("HUM_TRACK"), common::Payload::new().i32(track).u32(0));
    let bone_name = wld.string("HUM");
    let skeleton = wld.fragment(
        0x10,
        Some("HUM_HS_DEF"),
        common::Payload::new()
            .u32(0)
            .u32(1)
            .i32(0)
            .i32(bone_name)
            .u32(0)
            .i32(track_ref)
            .i32(0)
            .u32(0),
    );
    let skeleton_ref = wld.reference(0x11, None, skeleton);
    wld.fragment(
        0x14,
        Some("HUM_ACTORDEF"),
        common::Payload::new()
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(1)
            .u32(0)
            .i32(skeleton_ref)
            .u32(0),
    );
    let files = archive(&[("hum_chr.wld", wld.build())]);

    let (characters, diagnostics) = characters_from_archive(&files, &ConvertOptions::default()).unwrap();
    assert_eq!(characters.len(), 1);
    assert_eq!(characters[0].name, "HUM");
    assert_eq!(characters[0].bone_parents, vec![None]);
    let rest = characters[0].animation("").unwrap();
    assert_eq!(rest.bones[0][0].position, [2.0, 0.0, 0.0]);
    assert_eq!(rest.bones[0][0].rotation, [0.0, 0.0, 0.0, 1.0]);
    assert!(characters[0].meshes.is_empty());
    assert_eq!(diagnostics.malformed_characters, 0);
}
