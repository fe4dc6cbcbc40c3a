//! Persistent (immutable) hash set based on HAMT.
//!
//! This module provides [`PersistentHashSet`], an immutable hash set
//! that uses structural sharing for efficient operations, and
//! [`TransientHashSet`], its batched-mutation builder.
//!
//! # Overview
//!
//! `PersistentHashSet` is implemented as a wrapper around
//! `PersistentHashMap<T, (), S>`. It provides:
//!
//! - O(log32 N) contains (effectively O(1) for practical sizes)
//! - O(log32 N) insert
//! - O(log32 N) remove
//! - O(1) len and `is_empty`
//! - Set operations: union, intersection, difference, symmetric difference
//!
//! # Examples
//!
//! ```rust
//! use imshare::persistent::PersistentHashSet;
//!
//! let set = PersistentHashSet::new()
//!     .insert(1)
//!     .insert(2)
//!     .insert(3);
//!
//! assert!(set.contains(&1));
//! assert!(set.contains(&2));
//! assert!(!set.contains(&4));
//!
//! // Structural sharing: the original set is preserved
//! let updated = set.insert(4);
//! assert!(!set.contains(&4));     // Original unchanged
//! assert!(updated.contains(&4));  // New version
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::rc::Rc;

use super::hashmap::{
    PersistentHashMap, PersistentHashMapIntoIterator, PersistentHashMapIterator,
    TransientHashMap, order_independent_digest,
};
use super::DefaultBuildHasher;
use super::ownership::EditToken;
use crate::error::CollectionError;

// =============================================================================
// PersistentHashSet Definition
// =============================================================================

/// A persistent (immutable) hash set based on HAMT.
///
/// # Time Complexity
///
/// | Operation      | Complexity             |
/// |----------------|------------------------|
/// | `new`          | O(1)                   |
/// | `contains`     | O(log32 N)             |
/// | `insert`       | O(log32 N)             |
/// | `remove`       | O(log32 N)             |
/// | `len`          | O(1)                   |
/// | `union`        | O(m log32 (n + m))     |
/// | `intersection` | O(min(n, m) log32 N)   |
///
/// # Examples
///
/// ```rust
/// use imshare::persistent::PersistentHashSet;
///
/// let set: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
/// assert_eq!(set.len(), 3);
/// ```
pub struct PersistentHashSet<T, S = DefaultBuildHasher> {
    inner: PersistentHashMap<T, (), S>,
}

impl<T, S: Clone> Clone for PersistentHashSet<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PersistentHashSet<T> {
    /// Creates a new empty set with the default hasher.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set: PersistentHashSet<i32> = PersistentHashSet::new();
    /// assert!(set.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: PersistentHashMap::new(),
        }
    }

    /// Creates a set containing a single element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set = PersistentHashSet::singleton(42);
    /// assert_eq!(set.len(), 1);
    /// assert!(set.contains(&42));
    /// ```
    #[must_use]
    pub fn singleton(element: T) -> Self
    where
        T: Clone + Hash + Eq,
    {
        Self::new().insert(element)
    }
}

impl<T, S> PersistentHashSet<T, S> {
    /// Creates a new empty set that hashes elements with `hasher`.
    #[must_use]
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            inner: PersistentHashMap::with_hasher(hasher),
        }
    }

    /// Returns the number of elements in the set.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the hasher configuration of this set.
    #[inline]
    #[must_use]
    pub const fn hasher(&self) -> &S {
        self.inner.hasher()
    }

    /// Returns an iterator over the elements of the set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set = PersistentHashSet::new().insert(1).insert(2).insert(3);
    /// assert_eq!(set.iter().sum::<i32>(), 6);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentHashSetIterator<'_, T> {
        PersistentHashSetIterator {
            inner: self.inner.iter(),
        }
    }

    /// Returns `true` if both sets share the same root node.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl<T, S> PersistentHashSet<T, S>
where
    T: Clone + Hash + Eq,
    S: BuildHasher + Clone,
{
    /// Returns `true` if the set contains the element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set = PersistentHashSet::new().insert("hello".to_string());
    /// assert!(set.contains("hello"));
    /// assert!(!set.contains("world"));
    /// ```
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(element)
    }

    /// Returns the stored element equal to `element`.
    pub fn get<Q>(&self, element: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get_key_value(element).map(|(stored, ())| stored)
    }

    /// Inserts an element into the set.
    ///
    /// Inserting an element that is already present returns a set sharing
    /// this set's root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set1 = PersistentHashSet::new().insert(1);
    /// let set2 = set1.insert(2);
    ///
    /// assert_eq!(set1.len(), 1); // Original unchanged
    /// assert_eq!(set2.len(), 2); // New version
    /// assert!(set2.insert(2).ptr_eq(&set2));
    /// ```
    #[must_use]
    pub fn insert(&self, element: T) -> Self {
        if self.contains(&element) {
            return self.clone();
        }
        Self {
            inner: self.inner.insert(element, ()),
        }
    }

    /// Removes an element from the set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set = PersistentHashSet::new().insert(1).insert(2);
    /// let removed = set.remove(&1);
    ///
    /// assert_eq!(set.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert!(!removed.contains(&1));
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, element: &Q) -> Self
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Self {
            inner: self.inner.remove(element),
        }
    }

    /// Returns the union of two sets.
    ///
    /// The elements of the smaller set are inserted into a copy of the
    /// larger one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set_a: PersistentHashSet<i32> = [1, 2].into_iter().collect();
    /// let set_b: PersistentHashSet<i32> = [2, 3].into_iter().collect();
    ///
    /// let union = set_a.union(&set_b);
    ///
    /// assert_eq!(union.len(), 3);
    /// assert!(union.contains(&1));
    /// assert!(union.contains(&2));
    /// assert!(union.contains(&3));
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        let token = Some(EditToken::fresh());
        let mut result = larger.clone();
        for element in smaller {
            if !result.contains(element) {
                result.inner.insert_in_place(element.clone(), (), token);
            }
        }
        result
    }

    /// Returns the intersection of two sets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set_a: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set_b: PersistentHashSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let intersection = set_a.intersection(&set_b);
    ///
    /// assert_eq!(intersection.len(), 2);
    /// assert!(intersection.contains(&2));
    /// assert!(intersection.contains(&3));
    /// ```
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        self.collect_where(smaller, |element| larger.contains(element))
    }

    /// Returns the elements of `self` that are not in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set_a: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set_b: PersistentHashSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let difference = set_a.difference(&set_b);
    ///
    /// assert_eq!(difference.len(), 1);
    /// assert!(difference.contains(&1));
    /// ```
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        self.collect_where(self, |element| !other.contains(element))
    }

    /// Returns the elements in exactly one of the two sets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set_a: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set_b: PersistentHashSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let symmetric_difference = set_a.symmetric_difference(&set_b);
    ///
    /// assert_eq!(symmetric_difference.len(), 2);
    /// assert!(symmetric_difference.contains(&1));
    /// assert!(symmetric_difference.contains(&4));
    /// ```
    #[must_use]
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        self.difference(other).union(&other.difference(self))
    }

    /// Returns `true` if every element of `self` is in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let subset: PersistentHashSet<i32> = [1, 2].into_iter().collect();
    /// let superset: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
    ///
    /// assert!(subset.is_subset(&superset));
    /// assert!(!superset.is_subset(&subset));
    /// ```
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|element| other.contains(element))
    }

    /// Returns `true` if every element of `other` is in `self`.
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns `true` if `self` and `other` have no elements in common.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set_a: PersistentHashSet<i32> = [1, 2].into_iter().collect();
    /// let set_b: PersistentHashSet<i32> = [3, 4].into_iter().collect();
    /// let set_c: PersistentHashSet<i32> = [2, 3].into_iter().collect();
    ///
    /// assert!(set_a.is_disjoint(&set_b));
    /// assert!(!set_a.is_disjoint(&set_c));
    /// ```
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        !smaller.iter().any(|element| larger.contains(element))
    }

    /// Begins a batch of edits over this set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashSet;
    ///
    /// let set: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
    ///
    /// let mut transient = set.transient();
    /// transient.insert(4).unwrap();
    /// transient.remove(&1).unwrap();
    /// let edited = transient.commit().unwrap();
    ///
    /// assert_eq!(edited.len(), 3);
    /// assert!(!edited.contains(&1));
    /// assert!(set.contains(&1)); // Original unchanged
    /// ```
    #[must_use]
    pub fn transient(&self) -> TransientHashSet<T, S> {
        TransientHashSet {
            inner: self.inner.transient(),
            _marker: PhantomData,
        }
    }

    /// Builds a set with this set's hasher from the elements of `source`
    /// accepted by `keep`.
    fn collect_where<P>(&self, source: &Self, mut keep: P) -> Self
    where
        P: FnMut(&T) -> bool,
    {
        let token = Some(EditToken::fresh());
        let mut result = Self::with_hasher(self.inner.hasher().clone());
        for element in source.iter().filter(|element| keep(*element)) {
            result.inner.insert_in_place(element.clone(), (), token);
        }
        result
    }
}

// =============================================================================
// TransientHashSet Definition
// =============================================================================

/// A transient (temporarily mutable) hash set for efficient batch updates.
///
/// Wraps a [`TransientHashMap`] with unit values and follows the same
/// lifecycle: edits after [`commit`](Self::commit) or
/// [`abandon`](Self::abandon) fail with [`CollectionError::StaleTransient`].
///
/// # Examples
///
/// ```rust
/// use imshare::persistent::TransientHashSet;
///
/// let mut transient = TransientHashSet::new();
/// assert_eq!(transient.insert(1), Ok(true));
/// assert_eq!(transient.insert(1), Ok(false));
/// transient.extend([2, 3]).unwrap();
///
/// let set = transient.commit().unwrap();
/// assert_eq!(set.len(), 3);
/// ```
pub struct TransientHashSet<T, S = DefaultBuildHasher> {
    inner: TransientHashMap<T, (), S>,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientHashSet<i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientHashSet<String>: Send, Sync);

impl<T> TransientHashSet<T> {
    /// Creates a transient over an empty set with the default hasher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: TransientHashMap::new(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TransientHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> TransientHashSet<T, S> {
    /// Returns the number of elements, or 0 once the builder is stale.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the set is empty or the builder is stale.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns `true` until the builder is committed or abandoned.
    #[inline]
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    /// Finishes the batch and returns the edited set.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] if already committed or abandoned.
    pub fn commit(&mut self) -> Result<PersistentHashSet<T, S>, CollectionError> {
        Ok(PersistentHashSet {
            inner: self.inner.commit()?,
        })
    }

    /// Discards the batch. The source set is unaffected.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] if already committed or abandoned.
    pub fn abandon(&mut self) -> Result<(), CollectionError> {
        self.inner.abandon()
    }
}

impl<T, S> TransientHashSet<T, S>
where
    T: Clone + Hash + Eq,
    S: BuildHasher + Clone,
{
    /// Returns `true` if the element is present in a live builder.
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(element)
    }

    /// Adds an element. Returns `true` if it was not already present.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon.
    pub fn insert(&mut self, element: T) -> Result<bool, CollectionError> {
        // A stale builder contains nothing, so it always reaches `insert`.
        if self.inner.contains_key(&element) {
            return Ok(false);
        }
        Ok(self.inner.insert(element, ())?.is_none())
    }

    /// Removes an element. Returns `true` if it was present.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon.
    pub fn remove<Q>(&mut self, element: &Q) -> Result<bool, CollectionError>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ok(self.inner.remove(element)?.is_some())
    }

    /// Adds every element of `iter`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<(), CollectionError> {
        self.inner
            .extend(iter.into_iter().map(|element| (element, ())))
    }
}

impl<T: fmt::Debug, S> fmt::Debug for TransientHashSet<T, S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_live() {
            formatter
                .debug_struct("TransientHashSet")
                .field("len", &self.len())
                .finish()
        } else {
            formatter.write_str("TransientHashSet(<stale>)")
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the elements of a [`PersistentHashSet`].
pub struct PersistentHashSetIterator<'a, T> {
    inner: PersistentHashMapIterator<'a, T, ()>,
}

impl<'a, T> Iterator for PersistentHashSetIterator<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, ())| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for PersistentHashSetIterator<'_, T> {}

/// An owning iterator over the elements of a [`PersistentHashSet`].
pub struct PersistentHashSetIntoIterator<T> {
    inner: PersistentHashMapIntoIterator<T, ()>,
}

impl<T> Iterator for PersistentHashSetIntoIterator<T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, ())| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for PersistentHashSetIntoIterator<T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T, S: Default> Default for PersistentHashSet<T, S> {
    #[inline]
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<T, S> FromIterator<T> for PersistentHashSet<T, S>
where
    T: Clone + Hash + Eq,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().map(|element| (element, ())).collect(),
        }
    }
}

impl<T: Clone, S> IntoIterator for PersistentHashSet<T, S> {
    type Item = T;
    type IntoIter = PersistentHashSetIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        PersistentHashSetIntoIterator {
            inner: self.inner.into_iter(),
        }
    }
}

impl<'a, T, S> IntoIterator for &'a PersistentHashSet<T, S> {
    type Item = &'a T;
    type IntoIter = PersistentHashSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, S> PartialEq for PersistentHashSet<T, S>
where
    T: Clone + Hash + Eq,
    S: BuildHasher + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T, S> Eq for PersistentHashSet<T, S>
where
    T: Clone + Hash + Eq,
    S: BuildHasher + Clone,
{
}

impl<T: Hash, S> Hash for PersistentHashSet<T, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        order_independent_digest(self.inner.iter()).hash(state);
    }
}

impl<T: fmt::Debug, S> fmt::Debug for PersistentHashSet<T, S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize, S> serde::Serialize for PersistentHashSet<T, S> {
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentHashSetVisitor<T, S> {
    marker: PhantomData<(T, S)>,
}

#[cfg(feature = "serde")]
impl<'de, T, S> serde::de::Visitor<'de> for PersistentHashSetVisitor<T, S>
where
    T: serde::Deserialize<'de> + Clone + Hash + Eq,
    S: BuildHasher + Clone + Default,
{
    type Value = PersistentHashSet<T, S>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let token = Some(EditToken::fresh());
        let mut set = PersistentHashSet::default();
        while let Some(element) = seq.next_element()? {
            set.inner.insert_in_place(element, (), token);
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, S> serde::Deserialize<'de> for PersistentHashSet<T, S>
where
    T: serde::Deserialize<'de> + Clone + Hash + Eq,
    S: BuildHasher + Clone + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentHashSetVisitor {
            marker: PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================


#[cfg(all(test, feature = "arc"))]
mod send_sync_tests {
    use super::*;

    static_assertions::assert_impl_all!(PersistentHashSet<i32>: Send, Sync);
    static_assertions::assert_impl_all!(PersistentHashSet<String>: Send, Sync);
}
