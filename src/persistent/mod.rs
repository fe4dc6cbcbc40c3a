//! Persistent (immutable) data structures.
//!
//! This module provides efficient immutable data structures that use
//! structural sharing to minimize copying:
//!
//! - [`PersistentVector`]: Persistent vector (32-way radix trie with a tail)
//! - [`PersistentHashMap`]: Persistent hash map (HAMT)
//! - [`PersistentHashSet`]: Persistent hash set (based on HAMT)
//!
//! Each has a transient counterpart ([`TransientVector`],
//! [`TransientHashMap`], [`TransientHashSet`]) for batches of edits.
//!
//! # Structural Sharing
//!
//! All data structures in this module use structural sharing to ensure
//! that operations like appending or updating create new versions without
//! copying the entire structure. An update copies only the nodes on the path
//! it touches; every other subtree is shared with the previous version.
//!
//! # Transients
//!
//! A transient owns a unique edit token. Nodes it creates carry that token
//! and are mutated in place by its later edits, while nodes still shared with
//! persistent values are copied first. Committing hands the result back as a
//! persistent value in O(1).
//!
//! # Examples
//!
//! ## `PersistentVector`
//!
//! ```rust
//! use imshare::persistent::PersistentVector;
//!
//! let vector: PersistentVector<i32> = (0..100).collect();
//! assert_eq!(vector.get(50), Some(&50));
//!
//! // Structural sharing: the original vector is preserved
//! let updated = vector.set(50, 999).unwrap();
//! assert_eq!(vector.get(50), Some(&50));     // Original unchanged
//! assert_eq!(updated.get(50), Some(&999));   // New version
//! ```
//!
//! ## `PersistentHashMap`
//!
//! ```rust
//! use imshare::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```
//!
//! ## `PersistentHashSet`
//!
//! ```rust
//! use imshare::persistent::PersistentHashSet;
//!
//! let set = PersistentHashSet::new()
//!     .insert(1)
//!     .insert(2)
//!     .insert(3);
//! assert!(set.contains(&1));
//!
//! // Set operations
//! let other: PersistentHashSet<i32> = [2, 3, 4].into_iter().collect();
//! assert_eq!(set.union(&other).len(), 4);        // {1, 2, 3, 4}
//! assert_eq!(set.intersection(&other).len(), 2); // {2, 3}
//! ```
//!
//! ## Transients
//!
//! ```rust
//! use imshare::persistent::PersistentVector;
//!
//! let vector: PersistentVector<i32> = PersistentVector::new();
//! let mut transient = vector.transient();
//! for index in 0..1000 {
//!     transient.push_back(index).unwrap();
//! }
//! let built = transient.commit().unwrap();
//!
//! assert_eq!(built.len(), 1000);
//! assert!(vector.is_empty());
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled (default), this is `std::sync::Arc`,
/// whose atomic counts let persistent values be shared across threads.
///
/// When the `arc` feature is disabled, this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

// =============================================================================
// Default Hasher Type Alias
// =============================================================================

/// Hasher configuration used by [`PersistentHashMap::new`] and
/// [`PersistentHashSet::new`].
///
/// - `fxhash` feature: `rustc_hash::FxBuildHasher`
/// - `ahash` feature (without `fxhash`): `ahash::RandomState`
/// - otherwise: SipHash with fixed keys, so iteration order is reproducible
#[cfg(feature = "fxhash")]
pub type DefaultBuildHasher = rustc_hash::FxBuildHasher;

/// Hasher configuration used by [`PersistentHashMap::new`] and
/// [`PersistentHashSet::new`].
#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
pub type DefaultBuildHasher = ahash::RandomState;

/// Hasher configuration used by [`PersistentHashMap::new`] and
/// [`PersistentHashSet::new`].
#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
pub type DefaultBuildHasher =
    std::hash::BuildHasherDefault<std::collections::hash_map::DefaultHasher>;

mod hamt;
mod hashmap;
mod hashset;
mod ownership;
mod vector;

pub use hashmap::PersistentHashMap;
pub use hashmap::PersistentHashMapIntoIterator;
pub use hashmap::PersistentHashMapIterator;
pub use hashmap::TransientHashMap;
pub use hashset::PersistentHashSet;
pub use hashset::PersistentHashSetIntoIterator;
pub use hashset::PersistentHashSetIterator;
pub use hashset::TransientHashSet;
pub use vector::PersistentVector;
pub use vector::PersistentVectorIntoIterator;
pub use vector::PersistentVectorIterator;
pub use vector::TransientVector;

// =============================================================================
// Tests
// =============================================================================
