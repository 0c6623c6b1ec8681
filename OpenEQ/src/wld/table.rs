//! Raw and baked fragment tables
//!
//! Decoding produces a [`RawFragmentTable`] that still carries per-record
//! bookkeeping. [`RawFragmentTable::bake`] turns it into the immutable
//! [`FragmentTable`] the assembler walks: indexed by position, by name, and
//! by type, with texture lists normalized into [`TextureBinding`]s.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::reference::{FragRef, RefTarget};
use super::string_table::StringTable;
use super::types::{BitmapInfo, Fragment, FragmentData, FragmentType, MaterialFlags};
use crate::error::{Error, Result};

/// Default bound on reference chain length
pub const DEFAULT_MAX_REFERENCE_HOPS: usize = 64;

/// Per-stream decode anomalies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeDiagnostics {
    /// Records whose handler consumed a different length than declared
    pub size_mismatches: usize,
    /// Records whose handler failed (payload dropped)
    pub failed_fragments: usize,
    /// Records with no registered handler, by type tag
    pub unknown_types: BTreeMap<u32, usize>,
    /// Texture list entries dropped at bake time for a cyclic or
    /// over-long reference chain
    pub reference_cycles: usize,
}

/// A fragment as decoded, with its position in the stream
#[derive(Debug, Clone)]
pub struct RawFragment {
    pub fragment: Fragment,
    /// Position right after the type field; the record ends at
    /// `record_start + declared_size`
    pub record_start: usize,
    pub declared_size: usize,
    /// Bytes the handler read, including the name offset
    pub consumed: usize,
}

impl RawFragment {
    #[must_use]
    pub fn end_position(&self) -> usize {
        self.record_start + self.declared_size
    }
}

/// Decode-time fragment table
#[derive(Debug, Clone, Default)]
pub struct RawFragmentTable {
    pub fragments: Vec<RawFragment>,
    pub strings: StringTable,
    pub old: bool,
    pub diagnostics: DecodeDiagnostics,
}

impl RawFragmentTable {
    /// Re-index into the final table with the default reference hop bound.
    ///
    /// Later fragments win on duplicate names. A 0x05 whose name decodes
    /// to the empty string still gets a name slot; unnamed fragments never
    /// do.
    #[must_use]
    pub fn bake(self) -> FragmentTable {
        self.bake_with(DEFAULT_MAX_REFERENCE_HOPS)
    }

    /// Re-index into the final table, bounding reference chains at
    /// `max_reference_hops`. Texture lists are normalized under that bound.
    #[must_use]
    pub fn bake_with(self, max_reference_hops: usize) -> FragmentTable {
        let fragments: Vec<Fragment> = self.fragments.into_iter().map(|raw| raw.fragment).collect();

        let mut by_name = HashMap::new();
        let mut by_type: HashMap<u32, Vec<usize>> = HashMap::new();
        for fragment in &fragments {
            if let Some(name) = fragment.name.as_deref() {
                if !name.is_empty() || fragment.kind == FragmentType::BitmapInfoRef {
                    by_name.insert(name.to_string(), fragment.index);
                }
            }
            by_type.entry(fragment.kind.tag()).or_default().push(fragment.index);
        }

        let mut table = FragmentTable {
            fragments,
            by_name,
            by_type,
            bindings: HashMap::new(),
            strings: self.strings,
            old: self.old,
            diagnostics: self.diagnostics,
            max_reference_hops: max_reference_hops.max(1),
        };
        let (bindings, cycles) = table.normalize_texture_lists();
        table.bindings = bindings;
        table.diagnostics.reference_cycles += cycles;
        table
    }
}

/// How one texture-list entry binds a material
#[derive(Debug, Clone, PartialEq)]
pub enum TextureBinding {
    /// Entry pointed straight at a bitmap info or name list
    Direct {
        flags: MaterialFlags,
        textures: Vec<String>,
        params: u32,
    },
    /// Entry is a texture reference: flags plus a bitmap info to resolve
    Indirect {
        flags: MaterialFlags,
        bitmap_info: FragRef,
    },
}

/// Final, immutable fragment table
#[derive(Debug, Clone)]
pub struct FragmentTable {
    fragments: Vec<Fragment>,
    by_name: HashMap<String, usize>,
    by_type: HashMap<u32, Vec<usize>>,
    /// Normalized entries of each texture list, keyed by fragment index
    bindings: HashMap<usize, Vec<Option<TextureBinding>>>,
    strings: StringTable,
    old: bool,
    diagnostics: DecodeDiagnostics,
    max_reference_hops: usize,
}

impl FragmentTable {
    /// Bound on reference chain length
    #[must_use]
    pub fn max_reference_hops(&self) -> usize {
        self.max_reference_hops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Fragment> {
        self.fragments.get(index)
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Fragment> {
        self.by_name.get(name).and_then(|&i| self.fragments.get(i))
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    /// Fragments of one type in stream order
    pub fn of_type(&self, kind: FragmentType) -> impl Iterator<Item = &Fragment> {
        self.by_type
            .get(&kind.tag())
            .into_iter()
            .flatten()
            .filter_map(|&i| self.fragments.get(i))
    }

    /// Type tags present in the stream
    #[must_use]
    pub fn type_tags(&self) -> Vec<u32> {
        let mut tags: Vec<u32> = self.by_type.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    #[must_use]
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Whether the stream uses the old sub-format
    #[must_use]
    pub fn is_old(&self) -> bool {
        self.old
    }

    #[must_use]
    pub fn diagnostics(&self) -> &DecodeDiagnostics {
        &self.diagnostics
    }

    /// First-hop target of a reference, without following chains
    #[must_use]
    pub fn resolve_raw(&self, reference: &FragRef) -> Option<&Fragment> {
        self.lookup(reference.target()).and_then(|i| self.fragments.get(i))
    }

    /// Follow a reference through reference-only fragments to a terminal
    /// fragment.
    ///
    /// Returns `Ok(None)` when any hop points at nothing. The terminal is
    /// memoized on the reference, so later calls do no lookups.
    ///
    /// # Errors
    /// Returns [`Error::ReferenceCycle`] if the chain revisits a fragment
    /// or exceeds the hop bound.
    pub fn resolve(&self, reference: &FragRef) -> Result<Option<&Fragment>> {
        let terminal = match reference.cached() {
            Some(cached) => cached,
            None => reference.memoize(self.follow(reference)?),
        };
        Ok(terminal.and_then(|i| self.fragments.get(i)))
    }

    /// Resolve and return only the decoded payload
    pub fn resolve_data(&self, reference: &FragRef) -> Result<Option<&FragmentData>> {
        Ok(self.resolve(reference)?.and_then(|f| f.data.as_ref()))
    }

    fn lookup(&self, target: &RefTarget) -> Option<usize> {
        match target {
            RefTarget::Index(i) => (*i < self.fragments.len()).then_some(*i),
            RefTarget::Name(name) => self.by_name.get(name).copied(),
        }
    }

    fn follow(&self, reference: &FragRef) -> Result<Option<usize>> {
        let mut visited = HashSet::new();
        let mut current = self.lookup(reference.target());

        while let Some(index) = current {
            if !visited.insert(index) || visited.len() > self.max_reference_hops {
                return Err(Error::ReferenceCycle {
                    start: reference.to_string(),
                    hops: visited.len(),
                });
            }
            match &self.fragments[index].data {
                Some(FragmentData::Reference(next)) => match next.cached() {
                    Some(cached) => return Ok(cached),
                    None => current = self.lookup(next.target()),
                },
                _ => return Ok(Some(index)),
            }
        }
        Ok(None)
    }

    /// Normalized entries of the texture list a mesh points at.
    ///
    /// Returns `None` if the reference does not lead to a texture list.
    pub fn texture_bindings(&self, list: &FragRef) -> Result<Option<&[Option<TextureBinding>]>> {
        let Some(fragment) = self.resolve(list)? else {
            return Ok(None);
        };
        Ok(self.bindings.get(&fragment.index).map(Vec::as_slice))
    }

    /// First file name of each name list a bitmap info points at
    pub fn bitmap_texture_names(&self, info: &BitmapInfo) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(info.textures.len());
        for reference in &info.textures {
            if let Some(first) = self
                .resolve_data(reference)?
                .and_then(FragmentData::as_texture_names)
                .and_then(|list| list.first())
            {
                names.push(first.clone());
            } else {
                tracing::debug!("Bitmap info texture {} has no name list", reference);
            }
        }
        Ok(names)
    }

    fn normalize_texture_lists(&self) -> (HashMap<usize, Vec<Option<TextureBinding>>>, usize) {
        let mut bindings = HashMap::new();
        let mut cycles = 0;
        for fragment in self.of_type(FragmentType::TextureList) {
            let Some(entries) = fragment.data.as_ref().and_then(FragmentData::as_texture_list) else {
                continue;
            };
            let normalized = entries
                .iter()
                .map(|entry| match self.texture_binding(entry) {
                    Ok(binding) => binding,
                    Err(e) => {
                        tracing::warn!("Texture list {}: {}", fragment.index, e);
                        cycles += 1;
                        None
                    }
                })
                .collect();
            bindings.insert(fragment.index, normalized);
        }
        (bindings, cycles)
    }

    fn texture_binding(&self, entry: &FragRef) -> Result<Option<TextureBinding>> {
        let binding = match self.resolve_data(entry)? {
            Some(FragmentData::TextureRef(texture)) => Some(TextureBinding::Indirect {
                flags: texture.flags,
                bitmap_info: texture.bitmap_info.clone(),
            }),
            Some(FragmentData::BitmapInfo(info)) => Some(TextureBinding::Direct {
                flags: MaterialFlags::NORMAL,
                textures: self.bitmap_texture_names(info)?,
                params: info.params,
            }),
            Some(FragmentData::TextureNames(names)) => Some(TextureBinding::Direct {
                flags: MaterialFlags::NORMAL,
                textures: names.clone(),
                params: 0,
            }),
            _ => None,
        };
        Ok(binding)
    }
}
