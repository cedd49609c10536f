//! Collection aliases used throughout the mesher.
//!
//! Hash maps and sets use `rustc-hash` ([`FxHasher`](rustc_hash::FxHasher)),
//! which is considerably faster than `SipHash` for the small integer and
//! point keys the algorithms use. Local scratch lists that are almost always
//! short (vertex stars, cavity boundaries, crossed-edge chains) are
//! [`SmallVec`]s sized so the common case never allocates.
//!
//! # Examples
//!
//! ```rust
//! use cdt_mesher::core::collections::{FastHashMap, HalfedgeBuffer};
//!
//! let mut map: FastHashMap<(usize, usize), usize> = FastHashMap::default();
//! map.insert((0, 1), 3);
//! assert_eq!(map.get(&(0, 1)), Some(&3));
//!
//! let mut star: HalfedgeBuffer = HalfedgeBuffer::new();
//! star.extend([0, 4, 8]);
//! assert!(!star.spilled());
//! ```

use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Fast hash map for trusted keys.
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// Fast hash set for trusted keys.
pub type FastHashSet<T> = FxHashSet<T>;

/// Small-vector with inline storage for `N` elements.
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Inline capacity for per-vertex star walks. Typical Delaunay vertex degree
/// is six; sixteen covers nearly all vertices without spilling.
pub const STAR_BUFFER_SIZE: usize = 16;

/// Inline capacity for cavity boundaries and crossed-edge chains.
pub const CAVITY_BUFFER_SIZE: usize = 32;

/// Halfedge list for a vertex star.
pub type HalfedgeBuffer = SmallBuffer<usize, STAR_BUFFER_SIZE>;

/// Halfedge list for a cavity boundary or a constraint crossing chain.
pub type CavityBuffer = SmallBuffer<usize, CAVITY_BUFFER_SIZE>;

/// Creates a [`FastHashMap`] with pre-reserved capacity.
#[inline]
#[must_use]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, FxBuildHasher)
}

/// Creates a [`FastHashSet`] with pre-reserved capacity.
#[inline]
#[must_use]
pub fn fast_hash_set_with_capacity<T>(capacity: usize) -> FastHashSet<T> {
    FastHashSet::with_capacity_and_hasher(capacity, FxBuildHasher)
}
