//! Iteration domains and dimension tags.
//!
//! A [`Domain`] is the logical iteration space of one invocation: an ordered
//! mapping from symbolic [`Dim`] tags to extents. The ordering matters — the
//! first (at most) three dimensions participate in hardware partitioning,
//! and the last dimension is the innermost, fastest-varying loop.

use std::fmt;

/// Symbolic dimension tag.
///
/// Dimensions are identified by short static names and compared by name.
/// The conventional cartesian tags are provided as [`I`], [`J`], [`K`];
/// callers with extra dimensions create their own tags with [`Dim::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dim(&'static str);

impl Dim {
    /// Create a dimension tag with the given name
    pub const fn new(name: &'static str) -> Self {
        Dim(name)
    }

    /// Get the tag's name
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// First horizontal dimension of a cartesian grid
pub const I: Dim = Dim::new("i");
/// Second horizontal dimension of a cartesian grid
pub const J: Dim = Dim::new("j");
/// Vertical dimension of a cartesian grid
pub const K: Dim = Dim::new("k");

/// Ordered mapping from dimensions to extents.
///
/// Constructed by the caller per invocation and read-only to the backend.
/// Extents are non-negative; a domain with any zero extent is degenerate and
/// produces no work.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Domain {
    entries: Vec<(Dim, u64)>,
}

impl Domain {
    /// Create an empty (rank-0, single-point) domain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append or replace a dimension's extent, preserving insertion order
    pub fn with(mut self, dim: Dim, extent: u64) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|(d, _)| *d == dim) {
            entry.1 = extent;
        } else {
            self.entries.push((dim, extent));
        }
        self
    }

    /// Look up a dimension's extent by name
    pub fn extent(&self, dim: Dim) -> Option<u64> {
        self.entries.iter().find(|(d, _)| *d == dim).map(|(_, e)| *e)
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.entries.len()
    }

    /// The ordered (dimension, extent) pairs
    pub fn entries(&self) -> &[(Dim, u64)] {
        &self.entries
    }

    /// Iterate the dimensions in order
    pub fn dims(&self) -> impl Iterator<Item = Dim> + '_ {
        self.entries.iter().map(|(d, _)| *d)
    }

    /// True when any extent is zero: the invocation is a guaranteed no-op
    pub fn is_degenerate(&self) -> bool {
        self.entries.iter().any(|(_, e)| *e == 0)
    }

    /// Total number of cells (1 for a rank-0 domain)
    pub fn cells(&self) -> u64 {
        self.entries.iter().map(|(_, e)| *e).product()
    }

    /// Copy of this domain with one dimension removed, order preserved
    pub fn without(&self, dim: Dim) -> Domain {
        Domain {
            entries: self.entries.iter().copied().filter(|(d, _)| *d != dim).collect(),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, (dim, extent)) in self.entries.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dim}: {extent}")?;
        }
        write!(f, "}}")
    }
}

// ================================================================================================
// Tests
// ================================================================================================
