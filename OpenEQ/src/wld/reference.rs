//! Deferred fragment references
//!
//! Fragments point at each other by 1-based index or by (negated) string
//! table offset. Targets may appear later in the stream, so references are
//! stored unresolved and looked up against the baked [`FragmentTable`].
//!
//! [`FragmentTable`]: super::FragmentTable

use std::fmt;
use std::sync::OnceLock;

use super::string_table::StringTable;

/// What a reference points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefTarget {
    /// Zero-based fragment index
    Index(usize),
    /// Fragment name
    Name(String),
}

/// A lazily resolved pointer to another fragment.
///
/// The terminal fragment index (after following reference-only fragments)
/// is memoized on first resolution; `None` in the cache means the
/// reference is known to be unresolved.
#[derive(Clone)]
pub struct FragRef {
    target: RefTarget,
    resolved: OnceLock<Option<usize>>,
}

impl FragRef {
    /// Build from a raw record value: positive values are 1-based indices,
    /// anything else is a negated string table offset.
    #[must_use]
    pub fn from_raw(raw: i32, strings: &StringTable) -> Self {
        if raw > 0 {
            Self::index((raw - 1) as usize)
        } else {
            Self::name(strings.name_at(raw))
        }
    }

    #[must_use]
    pub fn index(index: usize) -> Self {
        Self::new(RefTarget::Index(index))
    }

    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::new(RefTarget::Name(name.into()))
    }

    fn new(target: RefTarget) -> Self {
        Self {
            target,
            resolved: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn target(&self) -> &RefTarget {
        &self.target
    }

    /// Memoized terminal index: `None` if never resolved,
    /// `Some(None)` if resolved to nothing
    #[must_use]
    pub fn cached(&self) -> Option<Option<usize>> {
        self.resolved.get().copied()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Store the terminal index. A racing resolver computes the same
    /// value from the same immutable table, so losing the race is harmless.
    pub(crate) fn memoize(&self, terminal: Option<usize>) -> Option<usize> {
        *self.resolved.get_or_init(|| terminal)
    }
}

impl PartialEq for FragRef {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl fmt::Debug for FragRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.target, self.cached()) {
            (RefTarget::Index(i), Some(value)) => write!(f, "FragRef(id={i}, value={value:?})"),
            (RefTarget::Index(i), None) => write!(f, "FragRef(id={i})"),
            (RefTarget::Name(n), Some(value)) => write!(f, "FragRef(name={n:?}, value={value:?})"),
            (RefTarget::Name(n), None) => write!(f, "FragRef(name={n:?})"),
        }
    }
}

impl fmt::Display for FragRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            RefTarget::Index(i) => write!(f, "#{i}"),
            RefTarget::Name(n) => write!(f, "{n:?}"),
        }
    }
}
