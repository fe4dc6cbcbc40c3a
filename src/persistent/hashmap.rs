//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`PersistentHashMap`], an immutable hash map
//! that uses structural sharing for efficient operations, and
//! [`TransientHashMap`], its batched-mutation builder.
//!
//! # Overview
//!
//! `PersistentHashMap` is based on Hash Array Mapped Trie (HAMT), a data structure
//! that provides efficient immutable operations. It uses a 32-way branching trie
//! where hash bits are used to navigate the tree.
//!
//! - O(log32 N) get (effectively O(1) for practical sizes)
//! - O(log32 N) insert
//! - O(log32 N) remove
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original,
//! and structural sharing ensures memory efficiency.
//!
//! # Hashing
//!
//! Each map carries its own [`BuildHasher`]. Key equality is the key's
//! [`Eq`] implementation; lookups by a borrowed form `Q` follow the usual
//! [`Borrow`] contract.
//!
//! # Examples
//!
//! ```rust
//! use imshare::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2)
//!     .insert("three".to_string(), 3);
//!
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(map.get("two"), Some(&2));
//! assert_eq!(map.get("three"), Some(&3));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::ops::Index;
use std::rc::Rc;

use super::hamt::{self, Branch};
use super::ownership::{EditToken, clone_for_write, retain};
use super::{DefaultBuildHasher, ReferenceCounter};
use crate::error::CollectionError;

// =============================================================================
// PersistentHashMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on HAMT.
///
/// `PersistentHashMap` is an immutable data structure that uses structural
/// sharing to efficiently support functional programming patterns.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log32 N)        |
/// | `insert`       | O(log32 N)        |
/// | `remove`       | O(log32 N)        |
/// | `contains_key` | O(log32 N)        |
/// | `len`          | O(1)              |
/// | `transient`    | O(1)              |
///
/// # Examples
///
/// ```rust
/// use imshare::persistent::PersistentHashMap;
///
/// let map = PersistentHashMap::new()
///     .insert(1, "one")
///     .insert(2, "two");
///
/// assert_eq!(map.get(&1), Some(&"one"));
/// assert_eq!(map.len(), 2);
/// ```
pub struct PersistentHashMap<K, V, S = DefaultBuildHasher> {
    /// Root branch of the trie
    root: ReferenceCounter<Branch<K, V>>,
    /// Number of entries
    length: usize,
    /// Hasher configuration of this map
    hasher: S,
}

impl<K, V, S: Clone> Clone for PersistentHashMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            root: retain(&self.root),
            length: self.length,
            hasher: self.hasher.clone(),
        }
    }
}

impl<K, V> PersistentHashMap<K, V> {
    /// Creates a new empty map with the default hasher.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<String, i32> = PersistentHashMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(DefaultBuildHasher::default())
    }

    /// Creates a map containing a single entry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get("key"), Some(&42));
    /// ```
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self
    where
        K: Clone + Hash + Eq,
        V: Clone,
    {
        Self::new().insert(key, value)
    }
}

impl<K, V, S> PersistentHashMap<K, V, S> {
    /// Creates a new empty map that hashes keys with `hasher`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::collections::hash_map::RandomState;
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::with_hasher(RandomState::new()).insert("key", 1);
    /// assert_eq!(map.get("key"), Some(&1));
    /// ```
    #[must_use]
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            root: ReferenceCounter::new(Branch::new(None)),
            length: 0,
            hasher,
        }
    }

    /// Returns the number of entries in the map.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the hasher configuration of this map.
    #[inline]
    #[must_use]
    pub const fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Returns an iterator over key-value pairs.
    ///
    /// The walk is lazy and depth-first. Its order follows the hash
    /// distribution and is stable for a given map value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let mut total = 0;
    /// for (_, value) in map.iter() {
    ///     total += value;
    /// }
    /// assert_eq!(total, 3);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator {
            inner: self.root.iter(self.length),
        }
    }

    /// Returns an iterator over keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Returns `true` if both maps share the same root node.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.root, &other.root)
    }
}

impl<K, V, S> PersistentHashMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Returns a reference to the value associated with the key.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("key".to_string(), 42);
    /// assert_eq!(map.get("key"), Some(&42));
    /// assert_eq!(map.get("other"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the stored key and its value.
    ///
    /// The stored key is the one first inserted, which matters for keys
    /// whose `Eq` ignores part of their contents.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root.get(self.hash_of(key), key)
    }

    /// Returns a reference to the value associated with the key.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::KeyNotFound`] if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::CollectionError;
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("a", 1);
    /// assert_eq!(map.try_get("a"), Ok(&1));
    /// assert_eq!(map.try_get("b"), Err(CollectionError::KeyNotFound));
    /// ```
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(CollectionError::KeyNotFound)
    }

    /// Returns `true` if the map contains the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("key".to_string(), 42);
    /// assert!(map.contains_key("key"));
    /// assert!(!map.contains_key("other"));
    /// ```
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).is_some()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the value is replaced and the
    /// stored key is kept.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new().insert("key".to_string(), 1);
    /// let map2 = map1.insert("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// assert_eq!(map2.len(), 1);
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let mut next = self.clone();
        next.insert_in_place(key, value, None);
        next
    }

    /// Removes a key from the map.
    ///
    /// Removing an absent key returns a map sharing this map's root; nothing
    /// is allocated.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let removed = map.remove("a");
    ///
    /// assert_eq!(map.len(), 2);       // Original unchanged
    /// assert_eq!(removed.len(), 1);   // New version
    /// assert_eq!(removed.get("a"), None);
    /// assert!(removed.remove("a").ptr_eq(&removed));
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut next = self.clone();
        next.remove_in_place(key, None);
        next
    }

    /// Replaces the value for a present key with `function` applied to it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::KeyNotFound`] if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::CollectionError;
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("count".to_string(), 10);
    /// let updated = map.update("count", |value| value + 1).unwrap();
    ///
    /// assert_eq!(updated.get("count"), Some(&11));
    /// assert_eq!(map.update("other", |value| value + 1), Err(CollectionError::KeyNotFound));
    /// ```
    pub fn update<Q, F>(&self, key: &Q, function: F) -> Result<Self, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> V,
    {
        let (stored_key, value) = self
            .get_key_value(key)
            .ok_or(CollectionError::KeyNotFound)?;
        let new_value = function(value);
        Ok(self.insert(stored_key.clone(), new_value))
    }

    /// Updates or removes a value for a key using an updater function.
    ///
    /// The updater function receives `Some(&V)` if the key exists, or `None` if it doesn't.
    /// If the updater returns `Some(V)`, the value is inserted or updated.
    /// If the updater returns `None`, the key is removed (if it exists).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("count".to_string(), 10);
    ///
    /// // Increment existing value
    /// let updated = map.update_with("count", |maybe_value| {
    ///     maybe_value.map(|value| value + 1)
    /// });
    /// assert_eq!(updated.get("count"), Some(&11));
    ///
    /// // Insert if not exists
    /// let inserted = map.update_with("new_key", |maybe_value| {
    ///     maybe_value.copied().or(Some(100))
    /// });
    /// assert_eq!(inserted.get("new_key"), Some(&100));
    ///
    /// // Remove by returning None
    /// let removed = map.update_with("count", |_| None);
    /// assert_eq!(removed.get("count"), None);
    /// ```
    #[must_use]
    pub fn update_with<Q, F>(&self, key: &Q, updater: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let current = self.get_key_value(key);
        match (current, updater(current.map(|(_, value)| value))) {
            (Some((stored_key, _)), Some(value)) => self.insert(stored_key.clone(), value),
            (Some(_), None) => self.remove(key),
            (None, Some(value)) => self.insert(key.to_owned(), value),
            (None, None) => self.clone(),
        }
    }

    /// Merges two maps, with values from `other` taking precedence on key conflicts.
    ///
    /// # Complexity
    ///
    /// O(m log32 (n + m)) where m is the size of `other`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let map2 = PersistentHashMap::new()
    ///     .insert("b".to_string(), 20)
    ///     .insert("c".to_string(), 3);
    ///
    /// let merged = map1.merge(&map2);
    ///
    /// assert_eq!(merged.get("a"), Some(&1));
    /// assert_eq!(merged.get("b"), Some(&20)); // From map2
    /// assert_eq!(merged.get("c"), Some(&3));
    /// ```
    #[must_use]
    pub fn merge<S2>(&self, other: &PersistentHashMap<K, V, S2>) -> Self {
        let token = Some(EditToken::fresh());
        let mut merged = self.clone();
        for (key, value) in other {
            merged.insert_in_place(key.clone(), value.clone(), token);
        }
        merged
    }

    /// Begins a batch of edits over this map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert(0, "zero");
    /// let mut transient = map.transient();
    /// transient.insert(1, "one").unwrap();
    /// transient.remove(&0).unwrap();
    /// let edited = transient.commit().unwrap();
    ///
    /// assert_eq!(edited.len(), 1);
    /// assert_eq!(map.get(&0), Some(&"zero")); // Original unchanged
    /// ```
    #[must_use]
    pub fn transient(&self) -> TransientHashMap<K, V, S> {
        TransientHashMap::from_persistent(self.clone())
    }

    // -------------------------------------------------------------------------
    // Editing core, shared with TransientHashMap and PersistentHashSet.
    // -------------------------------------------------------------------------

    pub(super) fn insert_in_place(
        &mut self,
        key: K,
        value: V,
        token: Option<EditToken>,
    ) -> Option<V> {
        let hash = self.hash_of(&key);
        let replaced = clone_for_write(&mut self.root, token).insert(0, hash, key, value, token);
        if replaced.is_none() {
            self.length += 1;
        }
        replaced
    }

    pub(super) fn remove_in_place<Q>(&mut self, key: &Q, token: Option<EditToken>) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.root.get(hash, key)?;

        let removed = clone_for_write(&mut self.root, token).remove(0, hash, key, token);
        if removed.is_some() {
            self.length -= 1;
        }
        removed
    }
}

// =============================================================================
// TransientHashMap Definition
// =============================================================================

/// A transient (temporarily mutable) hash map for efficient batch updates.
///
/// Obtained from [`PersistentHashMap::transient`] or
/// [`TransientHashMap::new`]. Branches created by this builder are tagged
/// with its owner token and edited in place afterwards;
/// [`commit`](Self::commit) hands the result back as a
/// [`PersistentHashMap`] in O(1).
///
/// After `commit` or [`abandon`](Self::abandon) every edit fails with
/// [`CollectionError::StaleTransient`] and lookups behave as on an empty map.
///
/// # Examples
///
/// ```rust
/// use imshare::persistent::TransientHashMap;
///
/// let mut transient = TransientHashMap::new();
/// for index in 0..100 {
///     transient.insert(index, index * 2).unwrap();
/// }
/// let map = transient.commit().unwrap();
///
/// assert_eq!(map.len(), 100);
/// assert_eq!(map.get(&50), Some(&100));
/// ```
pub struct TransientHashMap<K, V, S = DefaultBuildHasher> {
    map: Option<PersistentHashMap<K, V, S>>,
    token: EditToken,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientHashMap<String, i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientHashMap<i32, i32>: Send, Sync);

impl<K, V> TransientHashMap<K, V> {
    /// Creates a transient over an empty map with the default hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::from_persistent(PersistentHashMap::new())
    }
}

impl<K, V> Default for TransientHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> TransientHashMap<K, V, S> {
    fn from_persistent(map: PersistentHashMap<K, V, S>) -> Self {
        tracing::trace!(length = map.len(), "began hash map transient");
        Self {
            map: Some(map),
            token: EditToken::fresh(),
            _marker: PhantomData,
        }
    }

    /// Returns the number of entries, or 0 once the builder is stale.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.as_ref().map_or(0, PersistentHashMap::len)
    }

    /// Returns `true` if the map is empty or the builder is stale.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` until the builder is committed or abandoned.
    #[inline]
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.map.is_some()
    }

    fn live_mut(&mut self) -> Result<&mut PersistentHashMap<K, V, S>, CollectionError> {
        self.map.as_mut().ok_or_else(|| {
            tracing::trace!("rejected edit on stale hash map transient");
            CollectionError::StaleTransient
        })
    }

    /// Finishes the batch and returns the edited map.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] if already committed or abandoned.
    pub fn commit(&mut self) -> Result<PersistentHashMap<K, V, S>, CollectionError> {
        let map = self.map.take().ok_or(CollectionError::StaleTransient)?;
        tracing::trace!(length = map.len(), "committed hash map transient");
        Ok(map)
    }

    /// Discards the batch. The source map is unaffected.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] if already committed or abandoned.
    pub fn abandon(&mut self) -> Result<(), CollectionError> {
        self.map.take().ok_or(CollectionError::StaleTransient)?;
        tracing::trace!("abandoned hash map transient");
        Ok(())
    }
}

impl<K, V, S> TransientHashMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Returns a reference to the value for `key`, or `None` if absent or
    /// stale.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.as_ref()?.get(key)
    }

    /// Returns `true` if the key is present in a live builder.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts an entry, returning the value it replaced.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, CollectionError> {
        let token = self.token;
        Ok(self.live_mut()?.insert_in_place(key, value, Some(token)))
    }

    /// Removes an entry, returning its value. Absent keys leave every node
    /// untouched.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<Option<V>, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let token = self.token;
        Ok(self
            .live_mut()?
            .remove_in_place(key, Some(token))
            .map(|(_, value)| value))
    }

    /// Inserts every entry of `iter`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon.
    pub fn extend<I>(&mut self, iter: I) -> Result<(), CollectionError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let token = self.token;
        let map = self.live_mut()?;
        for (key, value) in iter {
            map.insert_in_place(key, value, Some(token));
        }
        Ok(())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for TransientHashMap<K, V, S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.map {
            Some(map) => formatter.debug_tuple("TransientHashMap").field(map).finish(),
            None => formatter.write_str("TransientHashMap(<stale>)"),
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentHashMap`].
pub struct PersistentHashMapIterator<'a, K, V> {
    inner: hamt::Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for PersistentHashMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIterator<'_, K, V> {}

impl<K, V> std::iter::FusedIterator for PersistentHashMapIterator<'_, K, V> {}

/// An owning iterator over key-value pairs of a [`PersistentHashMap`].
///
/// Entries are cloned out because the nodes may be shared.
pub struct PersistentHashMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentHashMapIntoIterator<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIntoIterator<K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, S: Default> Default for PersistentHashMap<K, V, S> {
    #[inline]
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> FromIterator<(K, V)> for PersistentHashMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let token = Some(EditToken::fresh());
        let mut map = Self::default();
        for (key, value) in iter {
            map.insert_in_place(key, value, token);
        }
        map
    }
}

impl<K: Clone, V: Clone, S> IntoIterator for PersistentHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = PersistentHashMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentHashMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a PersistentHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentHashMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S, Q> Index<&Q> for PersistentHashMap<K, V, S>
where
    K: Clone + Hash + Eq + Borrow<Q>,
    V: Clone,
    S: BuildHasher + Clone,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is absent. Use [`PersistentHashMap::get`] or
    /// [`PersistentHashMap::try_get`] for a non-panicking lookup.
    fn index(&self, key: &Q) -> &Self::Output {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key not found"),
        }
    }
}

impl<K, V, S> PartialEq for PersistentHashMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone + PartialEq,
    S: BuildHasher + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        if self.ptr_eq(other) {
            return true;
        }

        self.iter()
            .all(|(key, value)| other.get(key).is_some_and(|other_value| other_value == value))
    }
}

impl<K, V, S> Eq for PersistentHashMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone + Eq,
    S: BuildHasher + Clone,
{
}

/// Sums per-entry SipHash digests so the result ignores iteration order
/// and the map's own hasher state.
pub(super) fn order_independent_digest<'a, K, V, I>(entries: I) -> u64
where
    K: Hash + 'a,
    V: Hash + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    entries.fold(0u64, |digest, (key, value)| {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        value.hash(&mut hasher);
        digest.wrapping_add(hasher.finish())
    })
}

impl<K: Hash, V: Hash, S> Hash for PersistentHashMap<K, V, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        order_independent_digest(self.iter()).hash(state);
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for PersistentHashMap<K, V, S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V, S> serde::Serialize for PersistentHashMap<K, V, S>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentHashMapVisitor<K, V, S> {
    marker: PhantomData<(K, V, S)>,
}

#[cfg(feature = "serde")]
impl<'de, K, V, S> serde::de::Visitor<'de> for PersistentHashMapVisitor<K, V, S>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
    S: BuildHasher + Clone + Default,
{
    type Value = PersistentHashMap<K, V, S>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let token = Some(EditToken::fresh());
        let mut map = PersistentHashMap::default();
        while let Some((key, value)) = access.next_entry()? {
            map.insert_in_place(key, value, token);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, S> serde::Deserialize<'de> for PersistentHashMap<K, V, S>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
    S: BuildHasher + Clone + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentHashMapVisitor {
            marker: PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Thread Safety Tests (arc feature only)
// =============================================================================
