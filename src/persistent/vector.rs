//! Persistent (immutable) vector based on a 32-way radix trie.
//!
//! This module provides [`PersistentVector`], an immutable dynamic array
//! that uses structural sharing for efficient operations, and
//! [`TransientVector`], its batched-mutation builder.
//!
//! # Overview
//!
//! `PersistentVector` is a 32-way branching trie in the style of Clojure's
//! `PersistentVector`. It provides:
//!
//! - O(log32 N) random access (effectively O(1) for practical sizes)
//! - O(log32 N) `push_back` and `pop_back`, amortized O(1) through the tail
//! - O(log32 N) `set`
//! - O(1) len and `is_empty`
//!
//! All operations return new vectors without modifying the original,
//! and structural sharing ensures memory efficiency.
//!
//! # Internal Structure
//!
//! The vector consists of:
//! - A root branch whose depth is given by `shift`
//! - A tail leaf (up to 32 elements) holding the newest elements
//!
//! Index bits are consumed five at a time from `shift` down to zero. A full
//! tail is moved into the trie as its new rightmost leaf without copying.
//!
//! # Examples
//!
//! ```rust
//! use imshare::persistent::PersistentVector;
//!
//! let vector = PersistentVector::new()
//!     .push_back(1)
//!     .push_back(2)
//!     .push_back(3);
//!
//! assert_eq!(vector.get(0), Some(&1));
//! assert_eq!(vector.get(1), Some(&2));
//! assert_eq!(vector.get(2), Some(&3));
//!
//! // Structural sharing: the original vector is preserved
//! let extended = vector.push_back(4);
//! assert_eq!(vector.len(), 3);     // Original unchanged
//! assert_eq!(extended.len(), 4);   // New vector
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::ops::Index;
use std::rc::Rc;

use arrayvec::ArrayVec;

use super::ReferenceCounter;
use super::ownership::{EditToken, Editable, clone_for_write, retain};
use crate::error::CollectionError;

// =============================================================================
// Constants
// =============================================================================

/// Branching factor (2^5 = 32)
const BRANCHING_FACTOR: usize = 32;

/// Bits per level in the trie
const BITS_PER_LEVEL: usize = 5;

/// Bit mask for extracting index within a node
const MASK: usize = BRANCHING_FACTOR - 1;

// =============================================================================
// Node Definition
// =============================================================================

/// Leaf node holding up to 32 elements. Also used as the tail buffer.
#[derive(Clone)]
struct Leaf<T> {
    edit: Option<EditToken>,
    elements: ArrayVec<T, BRANCHING_FACTOR>,
}

/// Branch node. Children are packed to the left.
#[derive(Clone)]
struct Branch<T> {
    edit: Option<EditToken>,
    children: ArrayVec<Child<T>, BRANCHING_FACTOR>,
}

/// A slot of a branch: a sub-branch, or a leaf at the bottom level.
#[derive(Clone)]
enum Child<T> {
    Branch(ReferenceCounter<Branch<T>>),
    Leaf(ReferenceCounter<Leaf<T>>),
}

impl<T> Leaf<T> {
    const fn new(edit: Option<EditToken>) -> Self {
        Self {
            edit,
            elements: ArrayVec::new_const(),
        }
    }
}

impl<T> Branch<T> {
    const fn new(edit: Option<EditToken>) -> Self {
        Self {
            edit,
            children: ArrayVec::new_const(),
        }
    }
}

impl<T: Clone> Editable for Leaf<T> {
    fn edit_token(&self) -> Option<EditToken> {
        self.edit
    }

    fn set_edit_token(&mut self, token: Option<EditToken>) {
        self.edit = token;
    }
}

impl<T: Clone> Editable for Branch<T> {
    fn edit_token(&self) -> Option<EditToken> {
        self.edit
    }

    fn set_edit_token(&mut self, token: Option<EditToken>) {
        self.edit = token;
    }
}

// =============================================================================
// PersistentVector Definition
// =============================================================================

/// A persistent (immutable) vector based on a 32-way radix trie.
///
/// `PersistentVector` is an immutable data structure that uses structural
/// sharing to efficiently support functional programming patterns.
///
/// # Time Complexity
///
/// | Operation    | Complexity                      |
/// |--------------|---------------------------------|
/// | `new`        | O(1)                            |
/// | `get`        | O(log32 N)                      |
/// | `set`        | O(log32 N)                      |
/// | `push_back`  | O(log32 N) amortized O(1)       |
/// | `pop_back`   | O(log32 N) amortized O(1)       |
/// | `len`        | O(1)                            |
/// | `transient`  | O(1)                            |
/// | `iter`       | O(1) to create, O(N) to iterate |
///
/// # Examples
///
/// ```rust
/// use imshare::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (0..100).collect();
/// assert_eq!(vector.len(), 100);
/// assert_eq!(vector.get(50), Some(&50));
/// ```
pub struct PersistentVector<T> {
    /// Total number of elements
    length: usize,
    /// Shift amount of the root: (depth - 1) * `BITS_PER_LEVEL`
    shift: usize,
    /// Root branch of the trie
    root: ReferenceCounter<Branch<T>>,
    /// Tail buffer (up to 32 elements, non-empty unless the vector is)
    tail: ReferenceCounter<Leaf<T>>,
}

impl<T> Clone for PersistentVector<T> {
    fn clone(&self) -> Self {
        Self {
            length: self.length,
            shift: self.shift,
            root: retain(&self.root),
            tail: retain(&self.tail),
        }
    }
}

impl<T> PersistentVector<T> {
    /// Creates a new empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = PersistentVector::new();
    /// assert!(vector.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            length: 0,
            shift: BITS_PER_LEVEL,
            root: ReferenceCounter::new(Branch::new(None)),
            tail: ReferenceCounter::new(Leaf::new(None)),
        }
    }

    /// Creates a vector containing a single element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::singleton(42);
    /// assert_eq!(vector.len(), 1);
    /// assert_eq!(vector.get(0), Some(&42));
    /// ```
    #[must_use]
    pub fn singleton(element: T) -> Self {
        let mut tail = Leaf::new(None);
        tail.elements.push(element);
        Self {
            length: 1,
            shift: BITS_PER_LEVEL,
            root: ReferenceCounter::new(Branch::new(None)),
            tail: ReferenceCounter::new(tail),
        }
    }

    /// Returns the number of elements in the vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.len(), 5);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the vector contains no elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let empty: PersistentVector<i32> = PersistentVector::new();
    /// assert!(empty.is_empty());
    /// assert!(!empty.push_back(1).is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the starting index of the tail buffer.
    #[inline]
    const fn tail_offset(&self) -> usize {
        if self.length < BRANCHING_FACTOR {
            0
        } else {
            ((self.length - 1) >> BITS_PER_LEVEL) << BITS_PER_LEVEL
        }
    }

    /// Returns the leaf holding `index`, which must be in bounds.
    fn leaf_for(&self, index: usize) -> &[T] {
        if index >= self.tail_offset() {
            return &self.tail.elements;
        }

        let mut branch = &self.root;
        let mut level = self.shift;
        loop {
            match branch.children.get((index >> level) & MASK) {
                Some(Child::Branch(child)) => {
                    branch = child;
                    level -= BITS_PER_LEVEL;
                }
                Some(Child::Leaf(leaf)) => return &leaf.elements,
                None => return &[],
            }
        }
    }

    /// Returns a reference to the element at the given index.
    ///
    /// Returns `None` if the index is out of bounds.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.get(0), Some(&1));
    /// assert_eq!(vector.get(4), Some(&5));
    /// assert_eq!(vector.get(10), None);
    /// ```
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.length {
            return None;
        }
        self.leaf_for(index).get(index & MASK)
    }

    /// Returns a reference to the element at the given index.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::CollectionError;
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=3).collect();
    /// assert_eq!(vector.try_get(1), Ok(&2));
    /// assert_eq!(
    ///     vector.try_get(3),
    ///     Err(CollectionError::IndexOutOfRange { index: 3, length: 3 })
    /// );
    /// ```
    pub fn try_get(&self, index: usize) -> Result<&T, CollectionError> {
        self.get(index)
            .ok_or(CollectionError::index_out_of_range(index, self.length))
    }

    /// Returns a reference to the first element, or `None` if empty.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// Returns a reference to the last element, or `None` if empty.
    ///
    /// # Complexity
    ///
    /// O(1) - the last element is always in the tail
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.tail.elements.last()
    }

    /// Returns an iterator over references to the elements.
    ///
    /// The iterator walks the trie leaf by leaf, front to back (or back to
    /// front). Each call creates a fresh traversal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let collected: Vec<&i32> = vector.iter().collect();
    /// assert_eq!(collected, vec![&1, &2, &3, &4, &5]);
    ///
    /// let reversed: Vec<&i32> = vector.iter().rev().collect();
    /// assert_eq!(reversed, vec![&5, &4, &3, &2, &1]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentVectorIterator<'_, T> {
        PersistentVectorIterator {
            vector: self,
            front: 0,
            back: self.length,
            front_chunk: [].iter(),
            back_chunk: [].iter(),
        }
    }

    /// Returns `true` if both vectors share the same root and tail nodes.
    ///
    /// Pointer-equal vectors are always equal; the converse does not hold.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.length == other.length
            && ReferenceCounter::ptr_eq(&self.root, &other.root)
            && ReferenceCounter::ptr_eq(&self.tail, &other.tail)
    }
}

impl<T: Clone> PersistentVector<T> {
    /// Appends an element to the back of the vector.
    ///
    /// # Complexity
    ///
    /// O(log32 N) amortized O(1) due to the tail buffer
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new()
    ///     .push_back(1)
    ///     .push_back(2)
    ///     .push_back(3);
    ///
    /// assert_eq!(vector.len(), 3);
    /// assert_eq!(vector.get(2), Some(&3));
    /// ```
    #[must_use]
    pub fn push_back(&self, element: T) -> Self {
        let mut next = self.clone();
        next.push_back_in_place(element, None);
        next
    }

    /// Appends every element of `iter`, batching the edits through a
    /// transient.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=3).collect();
    /// let extended = vector.push_back_many(4..=6);
    ///
    /// assert_eq!(extended.len(), 6);
    /// assert_eq!(vector.len(), 3);
    /// ```
    #[must_use]
    pub fn push_back_many<I>(&self, iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let token = Some(EditToken::fresh());
        let mut next = self.clone();
        for element in iter {
            next.push_back_in_place(element, token);
        }
        next
    }

    /// Creates a `PersistentVector` from a slice, cloning the elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::from_slice(&[1, 2, 3, 4, 5]);
    /// assert_eq!(vector.len(), 5);
    /// assert_eq!(vector.get(0), Some(&1));
    /// ```
    #[must_use]
    pub fn from_slice(slice: &[T]) -> Self {
        slice.iter().cloned().collect()
    }

    /// Removes the last element from the vector.
    ///
    /// Returns the new vector together with the removed element.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if the vector is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let (remaining, element) = vector.pop_back().unwrap();
    ///
    /// assert_eq!(element, 5);
    /// assert_eq!(remaining.len(), 4);
    /// assert!(PersistentVector::<i32>::new().pop_back().is_err());
    /// ```
    pub fn pop_back(&self) -> Result<(Self, T), CollectionError> {
        if self.is_empty() {
            return Err(CollectionError::index_out_of_range(0, 0));
        }
        let mut next = self.clone();
        let element = next.pop_back_in_place(None)?;
        Ok((next, element))
    }

    /// Replaces the element at the given index.
    ///
    /// Only the path from the root to the touched leaf is copied; every
    /// other subtree is shared with `self`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index >= len()`.
    /// The check happens before any node is copied.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let updated = vector.set(2, 100).unwrap();
    ///
    /// assert_eq!(updated.get(2), Some(&100));
    /// assert_eq!(vector.get(2), Some(&3)); // Original unchanged
    /// assert!(vector.set(5, 0).is_err());
    /// ```
    pub fn set(&self, index: usize, element: T) -> Result<Self, CollectionError> {
        if index >= self.length {
            return Err(CollectionError::index_out_of_range(index, self.length));
        }
        let mut next = self.clone();
        next.set_in_place(index, element, None)?;
        Ok(next)
    }

    /// Replaces the element at `index` with `function` applied to it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=3).collect();
    /// let doubled = vector.update_with(1, |value| value * 2).unwrap();
    /// assert_eq!(doubled.get(1), Some(&4));
    /// ```
    pub fn update_with<F>(&self, index: usize, function: F) -> Result<Self, CollectionError>
    where
        F: FnOnce(&T) -> T,
    {
        let element = function(self.try_get(index)?);
        self.set(index, element)
    }

    /// Begins a batch of edits over this vector.
    ///
    /// The transient retains the current root; no subtree is copied until
    /// an edit touches it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imshare::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..10).collect();
    /// let mut transient = vector.transient();
    /// transient.push_back(10).unwrap();
    /// transient.set(0, -1).unwrap();
    /// let edited = transient.commit().unwrap();
    ///
    /// assert_eq!(edited.len(), 11);
    /// assert_eq!(edited.get(0), Some(&-1));
    /// assert_eq!(vector.get(0), Some(&0)); // Original unchanged
    /// ```
    #[must_use]
    pub fn transient(&self) -> TransientVector<T> {
        TransientVector::from_persistent(self.clone())
    }

    // -------------------------------------------------------------------------
    // Editing core, shared by persistent and transient operations. A `None`
    // token path-copies every shared node it touches.
    // -------------------------------------------------------------------------

    fn push_back_in_place(&mut self, element: T, token: Option<EditToken>) {
        if self.tail.elements.len() < BRANCHING_FACTOR {
            clone_for_write(&mut self.tail, token).elements.push(element);
        } else {
            let mut fresh_tail = Leaf::new(token);
            fresh_tail.elements.push(element);
            let full_tail = std::mem::replace(&mut self.tail, ReferenceCounter::new(fresh_tail));
            self.push_tail(full_tail, token);
        }
        self.length += 1;
    }

    /// Moves a full tail into the trie as its new rightmost leaf.
    fn push_tail(&mut self, leaf: ReferenceCounter<Leaf<T>>, token: Option<EditToken>) {
        let trie_length = self.length - BRANCHING_FACTOR;

        if (trie_length >> BITS_PER_LEVEL) == (1 << self.shift) {
            let old_root =
                std::mem::replace(&mut self.root, ReferenceCounter::new(Branch::new(token)));
            let root = clone_for_write(&mut self.root, token);
            root.children.push(Child::Branch(old_root));
            root.children.push(Self::new_path(self.shift, leaf, token));
            self.shift += BITS_PER_LEVEL;
            tracing::debug!(shift = self.shift, "vector trie grew one level");
        } else {
            let root = clone_for_write(&mut self.root, token);
            Self::push_tail_into(root, self.shift, trie_length, leaf, token);
        }
    }

    /// Builds a chain of single-child branches from `level` down to `leaf`.
    fn new_path(
        level: usize,
        leaf: ReferenceCounter<Leaf<T>>,
        token: Option<EditToken>,
    ) -> Child<T> {
        if level == 0 {
            Child::Leaf(leaf)
        } else {
            let mut branch = Branch::new(token);
            branch
                .children
                .push(Self::new_path(level - BITS_PER_LEVEL, leaf, token));
            Child::Branch(ReferenceCounter::new(branch))
        }
    }

    fn push_tail_into(
        branch: &mut Branch<T>,
        level: usize,
        index: usize,
        leaf: ReferenceCounter<Leaf<T>>,
        token: Option<EditToken>,
    ) {
        if level == BITS_PER_LEVEL {
            branch.children.push(Child::Leaf(leaf));
            return;
        }

        let subindex = (index >> level) & MASK;
        match branch.children.get_mut(subindex) {
            Some(Child::Branch(child)) => Self::push_tail_into(
                clone_for_write(child, token),
                level - BITS_PER_LEVEL,
                index,
                leaf,
                token,
            ),
            _ => branch
                .children
                .push(Self::new_path(level - BITS_PER_LEVEL, leaf, token)),
        }
    }

    fn pop_back_in_place(&mut self, token: Option<EditToken>) -> Result<T, CollectionError> {
        let empty = CollectionError::index_out_of_range(0, self.length);

        if self.length == 0 {
            return Err(empty);
        }

        if self.length == 1 || self.tail.elements.len() > 1 {
            let element = clone_for_write(&mut self.tail, token)
                .elements
                .pop()
                .ok_or(empty)?;
            self.length -= 1;
            return Ok(element);
        }

        // The tail holds one element: the last trie leaf becomes the tail.
        let last_trie_index = self.length - 2;
        let root = clone_for_write(&mut self.root, token);
        let new_tail =
            Self::pop_tail_from(root, self.shift, last_trie_index, token).ok_or(empty)?;

        if self.shift > BITS_PER_LEVEL && self.root.children.len() == 1 {
            let only_child = match self.root.children.first() {
                Some(Child::Branch(child)) => Some(retain(child)),
                _ => None,
            };
            if let Some(child) = only_child {
                self.root = child;
                self.shift -= BITS_PER_LEVEL;
                tracing::debug!(shift = self.shift, "vector trie shrank one level");
            }
        }

        let mut old_tail = std::mem::replace(&mut self.tail, new_tail);
        let element = clone_for_write(&mut old_tail, token)
            .elements
            .pop()
            .ok_or(empty)?;
        self.length -= 1;
        Ok(element)
    }

    /// Detaches the rightmost leaf, pruning branches it leaves empty.
    fn pop_tail_from(
        branch: &mut Branch<T>,
        level: usize,
        index: usize,
        token: Option<EditToken>,
    ) -> Option<ReferenceCounter<Leaf<T>>> {
        if level == BITS_PER_LEVEL {
            return match branch.children.pop()? {
                Child::Leaf(leaf) => Some(leaf),
                Child::Branch(_) => None,
            };
        }

        let subindex = (index >> level) & MASK;
        let (leaf, child_is_empty) = match branch.children.get_mut(subindex)? {
            Child::Branch(child) => {
                let child = clone_for_write(child, token);
                let leaf = Self::pop_tail_from(child, level - BITS_PER_LEVEL, index, token)?;
                (leaf, child.children.is_empty())
            }
            Child::Leaf(_) => return None,
        };

        if child_is_empty {
            branch.children.pop();
        }
        Some(leaf)
    }

    fn set_in_place(
        &mut self,
        index: usize,
        element: T,
        token: Option<EditToken>,
    ) -> Result<(), CollectionError> {
        let length = self.length;
        let slot = self
            .element_mut(index, token)
            .ok_or(CollectionError::index_out_of_range(index, length))?;
        *slot = element;
        Ok(())
    }

    /// Clones-for-write the path to `index` and returns its slot.
    fn element_mut(&mut self, index: usize, token: Option<EditToken>) -> Option<&mut T> {
        if index >= self.length {
            return None;
        }

        if index >= self.tail_offset() {
            return clone_for_write(&mut self.tail, token)
                .elements
                .get_mut(index & MASK);
        }

        let root = clone_for_write(&mut self.root, token);
        Self::leaf_mut_in(root, self.shift, index, token)?
            .elements
            .get_mut(index & MASK)
    }

    fn leaf_mut_in(
        branch: &mut Branch<T>,
        level: usize,
        index: usize,
        token: Option<EditToken>,
    ) -> Option<&mut Leaf<T>> {
        match branch.children.get_mut((index >> level) & MASK)? {
            Child::Branch(child) => Self::leaf_mut_in(
                clone_for_write(child, token),
                level - BITS_PER_LEVEL,
                index,
                token,
            ),
            Child::Leaf(leaf) => Some(clone_for_write(leaf, token)),
        }
    }
}

// =============================================================================
// TransientVector Definition
// =============================================================================

/// A transient (temporarily mutable) vector for efficient batch updates.
///
/// Obtained from [`PersistentVector::transient`] or [`TransientVector::new`].
/// Nodes created by this builder are tagged with its owner token and are
/// edited in place by later operations; nodes still shared with persistent
/// values are copied on first write. [`commit`](Self::commit) turns the
/// builder back into a [`PersistentVector`] in O(1).
///
/// After `commit` or [`abandon`](Self::abandon) every edit fails with
/// [`CollectionError::StaleTransient`].
///
/// # Design
///
/// - `PhantomData<Rc<()>>` makes the builder `!Send` and `!Sync`
/// - Clone is intentionally not implemented
///
/// # Examples
///
/// ```rust
/// use imshare::CollectionError;
/// use imshare::persistent::TransientVector;
///
/// let mut transient = TransientVector::new();
/// for index in 0..1000 {
///     transient.push_back(index).unwrap();
/// }
/// let vector = transient.commit().unwrap();
///
/// assert_eq!(vector.len(), 1000);
/// assert_eq!(transient.push_back(0), Err(CollectionError::StaleTransient));
/// ```
pub struct TransientVector<T> {
    vector: Option<PersistentVector<T>>,
    token: EditToken,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientVector<i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientVector<String>: Send, Sync);

impl<T> TransientVector<T> {
    fn from_persistent(vector: PersistentVector<T>) -> Self {
        tracing::trace!(length = vector.len(), "began vector transient");
        Self {
            vector: Some(vector),
            token: EditToken::fresh(),
            _marker: PhantomData,
        }
    }

    /// Creates a transient over an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::from_persistent(PersistentVector::new())
    }

    /// Returns the number of elements, or 0 once the builder is stale.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vector.as_ref().map_or(0, PersistentVector::len)
    }

    /// Returns `true` if the vector is empty or the builder is stale.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` until the builder is committed or abandoned.
    #[inline]
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.vector.is_some()
    }

    /// Returns a reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon,
    /// [`CollectionError::IndexOutOfRange`] if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<&T, CollectionError> {
        self.vector
            .as_ref()
            .ok_or(CollectionError::StaleTransient)?
            .try_get(index)
    }

    fn live_mut(&mut self) -> Result<&mut PersistentVector<T>, CollectionError> {
        self.vector.as_mut().ok_or_else(|| {
            tracing::trace!("rejected edit on stale vector transient");
            CollectionError::StaleTransient
        })
    }

    /// Finishes the batch and returns the edited vector.
    ///
    /// The builder becomes stale. Nodes it tagged become ordinary shared
    /// nodes because its token is never handed out again.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] if already committed or abandoned.
    pub fn commit(&mut self) -> Result<PersistentVector<T>, CollectionError> {
        let vector = self.vector.take().ok_or(CollectionError::StaleTransient)?;
        tracing::trace!(length = vector.len(), "committed vector transient");
        Ok(vector)
    }

    /// Discards the batch, releasing the builder's root reference.
    ///
    /// The vector the transient was created from is unaffected.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] if already committed or abandoned.
    pub fn abandon(&mut self) -> Result<(), CollectionError> {
        self.vector.take().ok_or(CollectionError::StaleTransient)?;
        tracing::trace!("abandoned vector transient");
        Ok(())
    }
}

impl<T: Clone> TransientVector<T> {
    /// Appends an element.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon.
    pub fn push_back(&mut self, element: T) -> Result<(), CollectionError> {
        let token = self.token;
        self.live_mut()?.push_back_in_place(element, Some(token));
        Ok(())
    }

    /// Appends every element of `iter`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<(), CollectionError> {
        let token = self.token;
        let vector = self.live_mut()?;
        for element in iter {
            vector.push_back_in_place(element, Some(token));
        }
        Ok(())
    }

    /// Removes and returns the last element.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon,
    /// [`CollectionError::IndexOutOfRange`] if the vector is empty.
    pub fn pop_back(&mut self) -> Result<T, CollectionError> {
        let token = self.token;
        self.live_mut()?.pop_back_in_place(Some(token))
    }

    /// Replaces the element at `index`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::StaleTransient`] after commit/abandon,
    /// [`CollectionError::IndexOutOfRange`] if `index >= len()`.
    pub fn set(&mut self, index: usize, element: T) -> Result<(), CollectionError> {
        let token = self.token;
        self.live_mut()?.set_in_place(index, element, Some(token))
    }
}

impl<T> Default for TransientVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for TransientVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.vector {
            Some(vector) => formatter
                .debug_tuple("TransientVector")
                .field(vector)
                .finish(),
            None => formatter.write_str("TransientVector(<stale>)"),
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over references to the elements of a [`PersistentVector`].
///
/// Elements are visited leaf by leaf; each end caches the leaf it is
/// currently reading.
pub struct PersistentVectorIterator<'a, T> {
    vector: &'a PersistentVector<T>,
    /// Index of the next element from the front
    front: usize,
    /// One past the index of the next element from the back
    back: usize,
    front_chunk: std::slice::Iter<'a, T>,
    back_chunk: std::slice::Iter<'a, T>,
}

impl<'a, T> Iterator for PersistentVectorIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        if self.front_chunk.as_slice().is_empty() {
            let leaf = self.vector.leaf_for(self.front);
            self.front_chunk = leaf.get((self.front & MASK)..).unwrap_or(&[]).iter();
        }
        self.front += 1;
        self.front_chunk.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back.saturating_sub(self.front);
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for PersistentVectorIterator<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        if self.back_chunk.as_slice().is_empty() {
            let last = self.back - 1;
            let leaf = self.vector.leaf_for(last);
            self.back_chunk = leaf.get(..=(last & MASK)).unwrap_or(&[]).iter();
        }
        self.back -= 1;
        self.back_chunk.next_back()
    }
}

impl<T> ExactSizeIterator for PersistentVectorIterator<'_, T> {}

impl<T> std::iter::FusedIterator for PersistentVectorIterator<'_, T> {}

/// An owning iterator over the elements of a [`PersistentVector`].
///
/// Elements are cloned out because the nodes may be shared.
pub struct PersistentVectorIntoIterator<T> {
    vector: PersistentVector<T>,
    front: usize,
    back: usize,
}

impl<T: Clone> Iterator for PersistentVectorIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let element = self.vector.get(self.front).cloned();
        self.front += 1;
        element
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back.saturating_sub(self.front);
        (remaining, Some(remaining))
    }
}

impl<T: Clone> DoubleEndedIterator for PersistentVectorIntoIterator<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.vector.get(self.back).cloned()
    }
}

impl<T: Clone> ExactSizeIterator for PersistentVectorIntoIterator<T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for PersistentVector<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new().push_back_many(iter)
    }
}

impl<T: Clone> IntoIterator for PersistentVector<T> {
    type Item = T;
    type IntoIter = PersistentVectorIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        let back = self.length;
        PersistentVectorIntoIterator {
            vector: self,
            front: 0,
            back,
        }
    }
}

impl<'a, T> IntoIterator for &'a PersistentVector<T> {
    type Item = &'a T;
    type IntoIter = PersistentVectorIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> Index<usize> for PersistentVector<T> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if `index >= len()`. Use [`PersistentVector::get`] or
    /// [`PersistentVector::try_get`] for a non-panicking lookup.
    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(element) => element,
            None => panic!("index {index} is out of range for length {}", self.length),
        }
    }
}

impl<T: PartialEq> PartialEq for PersistentVector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && (self.ptr_eq(other) || self.iter().eq(other.iter()))
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

impl<T: Hash> Hash for PersistentVector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        for element in self {
            element.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        for (position, element) in self.iter().enumerate() {
            if position > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "]")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PersistentVector<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
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
struct PersistentVectorVisitor<T> {
    marker: PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentVectorVisitor<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentVector<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let token = Some(EditToken::fresh());
        let mut vector = PersistentVector::new();
        while let Some(element) = seq.next_element()? {
            vector.push_back_in_place(element, token);
        }
        Ok(vector)
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentVector<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentVectorVisitor {
            marker: PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Returns the child of `branch` at `position` as a branch handle.
    fn branch_child<T>(branch: &Branch<T>, position: usize) -> &ReferenceCounter<Branch<T>> {
        match &branch.children[position] {
            Child::Branch(child) => child,
            Child::Leaf(_) => panic!("expected a branch at position {position}"),
        }
    }

    fn leaf_child<T>(branch: &Branch<T>, position: usize) -> &ReferenceCounter<Leaf<T>> {
        match &branch.children[position] {
            Child::Leaf(leaf) => leaf,
            Child::Branch(_) => panic!("expected a leaf at position {position}"),
        }
    }

    // =========================================================================
    // Display Tests
    // =========================================================================

    #[rstest]
    fn test_display_empty_vector() {
        let vector: PersistentVector<i32> = PersistentVector::new();
        assert_eq!(format!("{vector}"), "[]");
    }

    #[rstest]
    fn test_display_multiple_elements_vector() {
        let vector: PersistentVector<i32> = (1..=3).collect();
        assert_eq!(format!("{vector}"), "[1, 2, 3]");
    }

    // =========================================================================
    // Shape Tests
    // =========================================================================

    #[rstest]
    #[case(0, BITS_PER_LEVEL)]
    #[case(32, BITS_PER_LEVEL)]
    #[case(33, BITS_PER_LEVEL)]
    #[case(1024 + 32, BITS_PER_LEVEL)]
    #[case(1024 + 33, 2 * BITS_PER_LEVEL)]
    #[case(32 * 32 * 32 + 32, 2 * BITS_PER_LEVEL)]
    #[case(32 * 32 * 32 + 33, 3 * BITS_PER_LEVEL)]
    fn test_shift_tracks_length(#[case] length: usize, #[case] expected_shift: usize) {
        let vector: PersistentVector<usize> = (0..length).collect();
        assert_eq!(vector.shift, expected_shift);
        assert_eq!(vector.len(), length);
    }

    #[rstest]
    fn test_small_vector_lives_in_tail() {
        let vector: PersistentVector<i32> = (0..32).collect();
        assert!(vector.root.children.is_empty());
        assert_eq!(vector.tail.elements.len(), 32);
    }

    #[rstest]
    fn test_pop_shrinks_depth_symmetrically() {
        let mut vector: PersistentVector<usize> = (0..1024 + 33).collect();
        assert_eq!(vector.shift, 2 * BITS_PER_LEVEL);

        let (shrunk, element) = vector.pop_back().unwrap();
        assert_eq!(element, 1024 + 32);
        assert_eq!(shrunk.shift, BITS_PER_LEVEL);
        assert_eq!(shrunk.len(), 1024 + 32);

        vector = shrunk;
        for expected in (0..1024 + 32).rev() {
            let (next, element) = vector.pop_back().unwrap();
            assert_eq!(element, expected);
            vector = next;
        }
        assert!(vector.is_empty());
        assert_eq!(vector.shift, BITS_PER_LEVEL);
        assert!(vector.root.children.is_empty());
    }

    // =========================================================================
    // Structural Sharing Tests
    // =========================================================================

    #[rstest]
    fn test_set_copies_only_the_path() {
        // 2048 elements: shift 10, two sub-branches plus a full tail
        let vector: PersistentVector<usize> = (0..2048).collect();
        assert_eq!(vector.shift, 2 * BITS_PER_LEVEL);

        let updated = vector.set(5, 999).unwrap();

        assert!(!ReferenceCounter::ptr_eq(&vector.root, &updated.root));
        assert!(ReferenceCounter::ptr_eq(&vector.tail, &updated.tail));

        let old_first = branch_child(&vector.root, 0);
        let new_first = branch_child(&updated.root, 0);
        assert!(!ReferenceCounter::ptr_eq(old_first, new_first));
        assert!(ReferenceCounter::ptr_eq(
            branch_child(&vector.root, 1),
            branch_child(&updated.root, 1)
        ));

        assert!(!ReferenceCounter::ptr_eq(
            leaf_child(old_first, 0),
            leaf_child(new_first, 0)
        ));
        for position in 1..BRANCHING_FACTOR {
            assert!(ReferenceCounter::ptr_eq(
                leaf_child(old_first, position),
                leaf_child(new_first, position)
            ));
        }

        assert_eq!(vector.get(5), Some(&5));
        assert_eq!(updated.get(5), Some(&999));
    }

    #[rstest]
    fn test_push_shares_full_tail_as_leaf() {
        let vector: PersistentVector<i32> = (0..32).collect();
        let pushed = vector.push_back(32);

        assert!(ReferenceCounter::ptr_eq(
            &vector.tail,
            leaf_child(&pushed.root, 0)
        ));
        assert_eq!(pushed.tail.elements.as_slice(), &[32]);
    }

    #[rstest]
    fn test_pop_shares_last_leaf_as_tail() {
        let vector: PersistentVector<i32> = (0..33).collect();
        let (popped, element) = vector.pop_back().unwrap();

        assert_eq!(element, 32);
        assert!(ReferenceCounter::ptr_eq(
            &popped.tail,
            leaf_child(&vector.root, 0)
        ));
    }

    // =========================================================================
    // Transient Tests
    // =========================================================================

    #[rstest]
    fn test_transient_edits_owned_nodes_in_place() {
        let mut transient = TransientVector::new();
        for index in 0..64 {
            transient.push_back(index).unwrap();
        }

        let root_before = transient
            .vector
            .as_ref()
            .map(|vector| ReferenceCounter::as_ptr(&vector.root));
        for index in 64..1000 {
            transient.push_back(index).unwrap();
        }
        transient.set(3, -3).unwrap();
        let root_after = transient
            .vector
            .as_ref()
            .map(|vector| ReferenceCounter::as_ptr(&vector.root));

        assert_eq!(root_before, root_after);
        let vector = transient.commit().unwrap();
        assert_eq!(vector.get(3), Some(&-3));
        assert_eq!(vector.len(), 1000);
    }

    #[rstest]
    fn test_transient_copies_shared_nodes_once() {
        let vector: PersistentVector<i32> = (0..100).collect();
        let mut transient = vector.transient();

        transient.set(0, -1).unwrap();
        let first_leaf = transient
            .vector
            .as_ref()
            .map(|edited| ReferenceCounter::as_ptr(leaf_child(&edited.root, 0)));
        transient.set(1, -2).unwrap();
        let second_leaf = transient
            .vector
            .as_ref()
            .map(|edited| ReferenceCounter::as_ptr(leaf_child(&edited.root, 0)));

        assert_eq!(first_leaf, second_leaf);
        assert_ne!(first_leaf, Some(ReferenceCounter::as_ptr(leaf_child(&vector.root, 0))));

        let edited = transient.commit().unwrap();
        assert_eq!(vector.get(0), Some(&0));
        assert_eq!(vector.get(1), Some(&1));
        assert_eq!(edited.get(0), Some(&-1));
        assert_eq!(edited.get(1), Some(&-2));
        assert!(ReferenceCounter::ptr_eq(
            leaf_child(&vector.root, 1),
            leaf_child(&edited.root, 1)
        ));
    }

    #[rstest]
    fn test_committed_nodes_are_copied_by_later_edits() {
        let mut transient = TransientVector::new();
        transient.extend(0..100).unwrap();
        let committed = transient.commit().unwrap();

        let updated = committed.set(0, -1).unwrap();
        assert_eq!(committed.get(0), Some(&0));
        assert_eq!(updated.get(0), Some(&-1));
    }

    #[rstest]
    fn test_stale_transient_rejects_edits() {
        let mut transient: TransientVector<i32> = TransientVector::new();
        transient.abandon().unwrap();

        assert!(!transient.is_live());
        assert_eq!(transient.push_back(1), Err(CollectionError::StaleTransient));
        assert_eq!(transient.pop_back(), Err(CollectionError::StaleTransient));
        assert_eq!(transient.set(0, 1), Err(CollectionError::StaleTransient));
        assert_eq!(transient.get(0), Err(CollectionError::StaleTransient));
        assert!(transient.commit().is_err());
        assert!(transient.abandon().is_err());
        assert_eq!(transient.len(), 0);
    }
}

// =============================================================================
// Thread Safety Tests (arc feature only)
// =============================================================================


#[cfg(all(test, feature = "arc"))]
mod multithread_tests {
    use super::*;
    use rstest::rstest;
    use std::thread;

    #[rstest]
    fn test_vector_shared_across_threads() {
        let vector: PersistentVector<i32> = (0..10000).collect();

        let vector1 = vector.clone();
        let vector2 = vector;

        let handle1 = thread::spawn(move || vector1.iter().sum::<i32>());
        let handle2 = thread::spawn(move || vector2.iter().sum::<i32>());

        let sum1 = handle1.join().unwrap();
        let sum2 = handle2.join().unwrap();

        assert_eq!(sum1, sum2);
        assert_eq!(sum1, (0..10000).sum::<i32>());
    }

    #[rstest]
    fn test_readers_observe_old_version_while_writer_builds() {
        let vector: PersistentVector<i32> = (0..10000).collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = vector.clone();
                thread::spawn(move || {
                    (0..snapshot.len())
                        .map(|index| *snapshot.get(index).unwrap())
                        .sum::<i32>()
                })
            })
            .collect();

        let mut transient = vector.transient();
        for index in 0..10000 {
            transient.set(index, 0).unwrap();
        }
        let zeroed = transient.commit().unwrap();

        for reader in readers {
            assert_eq!(reader.join().unwrap(), (0..10000).sum::<i32>());
        }
        assert!(zeroed.iter().all(|element| *element == 0));
    }
}
