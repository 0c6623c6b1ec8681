//! Conversion options

use serde::{Deserialize, Serialize};

use crate::wld::DEFAULT_MAX_REFERENCE_HOPS;

/// Options controlling scene assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Map out-of-range texture indices onto the texture list with a modulo
    /// instead of dropping the polygons
    pub texture_fallback: bool,
    /// Decode a zone's WLD files concurrently in [`ZoneBuilder::build`] and
    /// run the mesh and light walks of [`SceneAssembler::convert_all`]
    /// concurrently
    ///
    /// [`ZoneBuilder::build`]: crate::scene::ZoneBuilder::build
    /// [`SceneAssembler::convert_all`]: crate::scene::SceneAssembler::convert_all
    pub parallel: bool,
    /// Bound on reference chain length
    pub max_reference_hops: usize,
    /// Suffix stripped from mesh fragment names to form object names
    pub object_suffix: String,
    /// Suffix stripped from placement names to find the placed object
    pub actor_suffix: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            texture_fallback: true,
            parallel: true,
            max_reference_hops: DEFAULT_MAX_REFERENCE_HOPS,
            object_suffix: "_DMSPRITEDEF".to_string(),
            actor_suffix: "_ACTORDEF".to_string(),
        }
    }
}

impl ConvertOptions {
    /// Drop polygon runs with out-of-range texture indices
    #[must_use]
    pub fn no_texture_fallback(mut self) -> Self {
        self.texture_fallback = false;
        self
    }

    /// Run every walk on the calling thread
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    #[must_use]
    pub fn with_max_reference_hops(mut self, hops: usize) -> Self {
        self.max_reference_hops = hops;
        self
    }

    #[must_use]
    pub fn with_object_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.object_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn with_actor_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.actor_suffix = suffix.into();
        self
    }

    /// Object name for a mesh fragment name
    #[must_use]
    pub fn object_name(&self, fragment_name: &str) -> String {
        strip_all(fragment_name, &self.object_suffix)
    }

    /// Object name a placement name refers to
    #[must_use]
    pub fn actor_name(&self, placement_name: &str) -> String {
        strip_all(placement_name, &self.actor_suffix)
    }
}

// Removes every occurrence, matching str::replace(suffix, "")
fn strip_all(name: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        name.to_string()
    } else {
        name.replace(suffix, "")
    }
}
