//! Counted anomalies collected while decoding and assembling
//!
//! Nothing here is an error: real archives routinely carry texture indices
//! past the end of their texture lists, dangling references and the like.
//! The assembler substitutes or skips and counts each occurrence.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::wld::DecodeDiagnostics;

/// Assembler walk that recorded a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSite {
    ConvertZone,
    ConvertObjects,
    ConvertCharacters,
}

impl CallSite {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConvertZone => "convert_zone",
            Self::ConvertObjects => "convert_objects",
            Self::ConvertCharacters => "convert_characters",
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of one out-of-range texture index occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FallbackKey {
    pub call_site: CallSite,
    /// Index the polygon run asked for
    pub index: usize,
    /// Length of the texture list
    pub available: usize,
}

/// Diagnostic counters for one zone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Polygon runs whose texture index was out of range, one count per run
    pub texture_fallbacks: BTreeMap<FallbackKey, usize>,
    /// Runs dropped because the texture list was empty or fallback is off
    pub skipped_runs: usize,
    /// Runs dropped because their texture binding did not resolve
    pub unresolved_bindings: usize,
    /// Texture names not present in the archive, with occurrence counts
    pub missing_textures: BTreeMap<String, usize>,
    /// Placements naming an object the zone does not have
    pub missing_objects: BTreeMap<String, usize>,
    /// Light placements whose light source did not resolve
    pub unresolved_lights: usize,
    /// References that looped or exceeded the hop bound
    pub reference_cycles: usize,
    /// Skeleton or model references that did not lead where expected
    pub malformed_characters: usize,
    /// Records whose handler consumed a different length than declared
    pub size_mismatches: usize,
    /// Records whose handler failed
    pub failed_fragments: usize,
    /// Records with no handler, by type tag
    pub unknown_types: BTreeMap<u32, usize>,
}

impl Diagnostics {
    /// Count one out-of-range run
    pub fn record_fallback(&mut self, call_site: CallSite, index: usize, available: usize) {
        *self
            .texture_fallbacks
            .entry(FallbackKey {
                call_site,
                index,
                available,
            })
            .or_default() += 1;
    }

    pub fn record_missing_texture(&mut self, name: &str) {
        *self.missing_textures.entry(name.to_string()).or_default() += 1;
    }

    pub fn record_missing_object(&mut self, name: &str) {
        *self.missing_objects.entry(name.to_string()).or_default() += 1;
    }

    /// Fold in the decode counters of one WLD stream
    pub fn record_decode(&mut self, decode: &DecodeDiagnostics) {
        self.size_mismatches += decode.size_mismatches;
        self.failed_fragments += decode.failed_fragments;
        self.reference_cycles += decode.reference_cycles;
        for (&tag, &count) in &decode.unknown_types {
            *self.unknown_types.entry(tag).or_default() += count;
        }
    }

    /// Add another set of counters into this one
    pub fn merge(&mut self, other: Diagnostics) {
        for (key, count) in other.texture_fallbacks {
            *self.texture_fallbacks.entry(key).or_default() += count;
        }
        for (name, count) in other.missing_textures {
            *self.missing_textures.entry(name).or_default() += count;
        }
        for (name, count) in other.missing_objects {
            *self.missing_objects.entry(name).or_default() += count;
        }
        for (tag, count) in other.unknown_types {
            *self.unknown_types.entry(tag).or_default() += count;
        }
        self.skipped_runs += other.skipped_runs;
        self.unresolved_bindings += other.unresolved_bindings;
        self.unresolved_lights += other.unresolved_lights;
        self.reference_cycles += other.reference_cycles;
        self.malformed_characters += other.malformed_characters;
        self.size_mismatches += other.size_mismatches;
        self.failed_fragments += other.failed_fragments;
    }

    #[must_use]
    pub fn total_fallbacks(&self) -> usize {
        self.texture_fallbacks.values().sum()
    }

    /// Fallback runs grouped by call site
    #[must_use]
    pub fn fallbacks_by_call_site(&self) -> BTreeMap<CallSite, usize> {
        let mut grouped = BTreeMap::new();
        for (key, count) in &self.texture_fallbacks {
            *grouped.entry(key.call_site).or_default() += count;
        }
        grouped
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    /// Flattened, serializable view
    #[must_use]
    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary {
            total_fallbacks: self.total_fallbacks(),
            fallbacks_by_call_site: self
                .fallbacks_by_call_site()
                .into_iter()
                .map(|(site, count)| (site.as_str().to_string(), count))
                .collect(),
            fallbacks: self
                .texture_fallbacks
                .iter()
                .map(|(key, &runs)| FallbackCount {
                    call_site: key.call_site,
                    index: key.index,
                    available: key.available,
                    runs,
                })
                .collect(),
            skipped_runs: self.skipped_runs,
            unresolved_bindings: self.unresolved_bindings,
            missing_textures: self.missing_textures.values().sum(),
            missing_objects: self.missing_objects.values().sum(),
            unresolved_lights: self.unresolved_lights,
            reference_cycles: self.reference_cycles,
            malformed_characters: self.malformed_characters,
            size_mismatches: self.size_mismatches,
            failed_fragments: self.failed_fragments,
        }
    }

    /// Report the counters through `tracing`
    pub fn log_summary(&self) {
        let total = self.total_fallbacks();
        if total > 0 {
            tracing::info!("Texture index fallbacks: {} runs", total);
            for (site, count) in self.fallbacks_by_call_site() {
                tracing::info!("  {}: {} runs", site, count);
            }
        }
        if self.skipped_runs > 0 || self.unresolved_bindings > 0 {
            tracing::info!(
                "Dropped polygon runs: {} without textures, {} unresolved bindings",
                self.skipped_runs,
                self.unresolved_bindings
            );
        }
        if !self.missing_textures.is_empty() {
            tracing::info!("{} texture files missing from archives", self.missing_textures.len());
            for (name, count) in &self.missing_textures {
                tracing::debug!("  {} ({} uses)", name, count);
            }
        }
        if !self.missing_objects.is_empty() {
            tracing::info!("{} placed objects not found", self.missing_objects.len());
            for (name, count) in &self.missing_objects {
                tracing::debug!("  {} ({} placements)", name, count);
            }
        }
        if self.unresolved_lights > 0 {
            tracing::info!("{} lights without a light source", self.unresolved_lights);
        }
        if self.reference_cycles > 0 || self.malformed_characters > 0 {
            tracing::warn!(
                "{} reference cycles, {} malformed characters",
                self.reference_cycles,
                self.malformed_characters
            );
        }
        if self.failed_fragments > 0 || self.size_mismatches > 0 {
            tracing::info!(
                "Fragments: {} failed to decode, {} size mismatches",
                self.failed_fragments,
                self.size_mismatches
            );
        }
        for (tag, count) in &self.unknown_types {
            tracing::debug!("Unhandled fragment type {:#04X}: {}", tag, count);
        }
    }
}

/// One row of the fallback report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackCount {
    pub call_site: CallSite,
    pub index: usize,
    pub available: usize,
    pub runs: usize,
}

/// Serializable report of a conversion's diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticSummary {
    pub total_fallbacks: usize,
    pub fallbacks_by_call_site: BTreeMap<String, usize>,
    pub fallbacks: Vec<FallbackCount>,
    pub skipped_runs: usize,
    pub unresolved_bindings: usize,
    pub missing_textures: usize,
    pub missing_objects: usize,
    pub unresolved_lights: usize,
    pub reference_cycles: usize,
    pub malformed_characters: usize,
    pub size_mismatches: usize,
    pub failed_fragments: usize,
}
