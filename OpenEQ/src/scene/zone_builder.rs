//! Assemble a zone from its set of archives
//!
//! A legacy zone `<name>` ships as `<name>.s3d` (world geometry, object
//! placements, lights) plus any number of `<name>_obj*.s3d` archives holding
//! the placed object meshes. Textures may live in any of them.

use std::fs;
use std::path::Path;

use rayon::prelude::*;

use super::assembler::SceneAssembler;
use super::diagnostics::Diagnostics;
use super::types::{Character, Zone};
use crate::archive::{ArchiveFiles, merge_fallback, read_s3d};
use crate::error::Result;
use crate::options::ConvertOptions;
use crate::wld::{FragmentTable, parse_wld_bytes_with};

/// Which assembler walk to run over a WLD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Objects,
    Lights,
    World,
}

/// Builds a [`Zone`] from a zone archive and its object archives
#[derive(Debug, Clone)]
pub struct ZoneBuilder {
    name: String,
    options: ConvertOptions,
    object_archives: Vec<(String, ArchiveFiles)>,
    zone_files: ArchiveFiles,
}

impl ZoneBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, options: ConvertOptions) -> Self {
        Self {
            name: name.into(),
            options,
            object_archives: Vec::new(),
            zone_files: ArchiveFiles::new(),
        }
    }

    /// Load `<name>.s3d` and every `<name>_obj*.s3d` from a directory
    ///
    /// # Errors
    /// Returns an error if the directory or an archive cannot be read.
    pub fn from_directory<P: AsRef<Path>>(dir: P, name: &str, options: ConvertOptions) -> Result<Self> {
        let dir = dir.as_ref();
        let object_prefix = format!("{name}_obj");

        let mut object_paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_s3d = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("s3d"));
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_s3d && stem.starts_with(&object_prefix) {
                object_paths.push((stem.to_string(), path.clone()));
            }
        }
        object_paths.sort();

        let mut builder = Self::new(name, options).zone_archive(read_s3d(dir.join(format!("{name}.s3d")))?);
        for (stem, path) in object_paths {
            tracing::debug!("Object archive {}", path.display());
            builder = builder.add_object_archive(stem, read_s3d(&path)?);
        }
        Ok(builder)
    }

    /// Add an object archive; `<archive>.wld` inside it is converted as objects
    #[must_use]
    pub fn add_object_archive(mut self, archive: impl Into<String>, files: ArchiveFiles) -> Self {
        self.object_archives.push((archive.into(), files));
        self
    }

    /// Set the zone archive
    #[must_use]
    pub fn zone_archive(mut self, files: ArchiveFiles) -> Self {
        self.zone_files = files;
        self
    }

    /// Decode and assemble.
    ///
    /// Object archives are converted first so that placements in
    /// `objects.wld` can find their objects. Missing WLD files are skipped.
    /// With [`ConvertOptions::parallel`] the WLD files are decoded on the
    /// rayon pool before assembly.
    ///
    /// # Errors
    /// Returns an error if a present WLD file is structurally invalid.
    pub fn build(self) -> Result<Zone> {
        tracing::info!(
            "Building zone {} from {} object archives",
            self.name,
            self.object_archives.len()
        );

        let mut archives: Vec<ArchiveFiles> = self.object_archives.iter().map(|(_, files)| files.clone()).collect();
        archives.push(self.zone_files.clone());
        let merged = merge_fallback(&archives);

        let mut zone = Zone::new();
        let Some((zone_files, object_files)) = merged.split_last() else {
            return Ok(zone);
        };

        let mut jobs: Vec<(&ArchiveFiles, String, Walk)> = self
            .object_archives
            .iter()
            .zip(object_files)
            .map(|((archive, _), files)| (files, format!("{archive}.wld"), Walk::Objects))
            .collect();
        jobs.push((zone_files, "objects.wld".to_string(), Walk::Objects));
        jobs.push((zone_files, "lights.wld".to_string(), Walk::Lights));
        jobs.push((zone_files, format!("{}.wld", self.name), Walk::World));

        // Streams decode independently; assembly runs in job order
        let tables: Vec<Result<Option<FragmentTable>>> = if self.options.parallel {
            jobs.par_iter()
                .map(|(files, wld, _)| decode(files, wld, &self.options))
                .collect()
        } else {
            jobs.iter()
                .map(|(files, wld, _)| decode(files, wld, &self.options))
                .collect()
        };

        for ((files, wld, walk), table) in jobs.iter().zip(tables) {
            let Some(table) = table? else {
                tracing::warn!("{} not found, skipping", wld);
                continue;
            };
            self.convert(&mut zone, &table, files, *walk);
        }

        tracing::info!(
            "Zone {}: {} objects, {} meshes, {} lights, {} placeables",
            self.name,
            zone.objects.len(),
            zone.mesh_count(),
            zone.lights.len(),
            zone.placeables.len()
        );
        zone.diagnostics.log_summary();
        Ok(zone)
    }

    fn convert(&self, zone: &mut Zone, table: &FragmentTable, files: &ArchiveFiles, walk: Walk) {
        zone.diagnostics.record_decode(table.diagnostics());

        let assembler = SceneAssembler::new(table, files, &self.options);
        match walk {
            Walk::Objects => assembler.convert_objects(zone),
            Walk::Lights => assembler.convert_lights(zone),
            Walk::World => assembler.convert_zone(zone),
        }
    }
}

/// Convert the characters of every WLD in an archive (`*_chr.s3d`)
///
/// # Errors
/// Returns an error if a WLD file is structurally invalid.
pub fn characters_from_archive(files: &ArchiveFiles, options: &ConvertOptions) -> Result<(Vec<Character>, Diagnostics)> {
    let mut diagnostics = Diagnostics::default();
    let mut characters = Vec::new();

    for name in files.keys().filter(|name| name.ends_with(".wld")) {
        let Some(table) = decode(files, name, options)? else {
            continue;
        };
        diagnostics.record_decode(table.diagnostics());
        characters.extend(SceneAssembler::new(&table, files, options).convert_characters(&mut diagnostics));
    }

    tracing::info!("Converted {} characters", characters.len());
    diagnostics.log_summary();
    Ok((characters, diagnostics))
}

fn decode(files: &ArchiveFiles, wld: &str, options: &ConvertOptions) -> Result<Option<FragmentTable>> {
    let Some(data) = files.get(wld) else {
        return Ok(None);
    };
    tracing::debug!("Decoding {} ({} bytes)", wld, data.len());
    Ok(Some(parse_wld_bytes_with(data, options.max_reference_hops)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_has_world_only() {
        let zone = ZoneBuilder::new("empty", ConvertOptions::default()).build().unwrap();
        assert_eq!(zone.objects.len(), 1);
        assert!(zone.lights.is_empty());
        assert!(zone.diagnostics.is_clean());
    }

    #[test]
    fn test_invalid_wld_is_fatal() {
        let mut files = ArchiveFiles::new();
        files.insert("lights.wld".to_string(), vec![0; 32]);
        let result = ZoneBuilder::new("bad", ConvertOptions::default()).zone_archive(files).build();
        assert!(result.unwrap_err().is_format_error());
    }

    #[test]
    fn test_from_directory_reads_archives() {
        use crate::archive::S3dWriter;

        let dir = tempfile::tempdir().unwrap();
        S3dWriter::new()
            .with_file("zone.bmp", b"zone".to_vec())
            .write(dir.path().join("test.s3d"))
            .unwrap();
        S3dWriter::new()
            .with_file("obj.bmp", b"obj".to_vec())
            .write(dir.path().join("test_obj.s3d"))
            .unwrap();
        S3dWriter::new()
            .with_file("other.bmp", b"other".to_vec())
            .write(dir.path().join("other_obj.s3d"))
            .unwrap();

        let builder = ZoneBuilder::from_directory(dir.path(), "test", ConvertOptions::default()).unwrap();
        assert_eq!(builder.object_archives.len(), 1);
        assert_eq!(builder.object_archives[0].0, "test_obj");
        assert!(builder.zone_files.contains_key("zone.bmp"));

        let zone = builder.build().unwrap();
        assert_eq!(zone.objects.len(), 1);
    }
}
