//! Hash Array Mapped Trie shared by [`PersistentHashMap`] and
//! [`PersistentHashSet`].
//!
//! The 64-bit hash of a key is consumed five bits per level, least
//! significant bits first. Each branch keeps a 32-bit bitmap of populated
//! slots and a compacted child array, so `popcount(bitmap)` always equals the
//! number of children. Entries are stored inline in their parent's slot. Keys
//! whose full hashes are equal live together in a collision node.
//!
//! Every function here edits in place through [`clone_for_write`]; the
//! persistent collections pass no token (pure path copying) and the
//! transients pass their own.
//!
//! [`PersistentHashMap`]: super::PersistentHashMap
//! [`PersistentHashSet`]: super::PersistentHashSet

use std::borrow::Borrow;

use smallvec::{SmallVec, smallvec};

use super::ReferenceCounter;
use super::ownership::{EditToken, Editable, clone_for_write};

// =============================================================================
// Constants
// =============================================================================

/// Bits per level in the trie
const BITS_PER_LEVEL: u32 = 5;

/// Bit mask for extracting the slot index at one level
const MASK: u64 = 0x1f;

/// Extracts the slot index for `hash` at the level starting at `shift`.
#[inline]
const fn hash_index(hash: u64, shift: u32) -> u32 {
    ((hash >> shift) & MASK) as u32
}

/// Returns the position of `bit` in the compacted child array.
#[inline]
const fn compact_position(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// =============================================================================
// Node Definition
// =============================================================================

/// Bitmap-indexed branch node.
#[derive(Clone)]
pub(crate) struct Branch<K, V> {
    edit: Option<EditToken>,
    /// Bitmap indicating which slots are occupied
    bitmap: u32,
    /// Children in slot order, compacted
    children: Vec<Child<K, V>>,
}

/// Entries whose keys differ but whose full hashes are equal.
#[derive(Clone)]
pub(crate) struct Collision<K, V> {
    edit: Option<EditToken>,
    hash: u64,
    entries: SmallVec<[(K, V); 2]>,
}

/// A populated slot of a branch.
#[derive(Clone)]
pub(crate) enum Child<K, V> {
    /// A key-value entry stored inline
    Entry { hash: u64, key: K, value: V },
    /// A sub-branch one level deeper
    Branch(ReferenceCounter<Branch<K, V>>),
    /// A collision node
    Collision(ReferenceCounter<Collision<K, V>>),
}

impl<K: Clone, V: Clone> Editable for Branch<K, V> {
    fn edit_token(&self) -> Option<EditToken> {
        self.edit
    }

    fn set_edit_token(&mut self, token: Option<EditToken>) {
        self.edit = token;
    }
}

impl<K: Clone, V: Clone> Editable for Collision<K, V> {
    fn edit_token(&self) -> Option<EditToken> {
        self.edit
    }

    fn set_edit_token(&mut self, token: Option<EditToken>) {
        self.edit = token;
    }
}

impl<K, V> Child<K, V> {
    /// The full hash shared by everything below this slot, if it is a leaf.
    fn leaf_hash(&self) -> Option<u64> {
        match self {
            Self::Entry { hash, .. } => Some(*hash),
            Self::Collision(node) => Some(node.hash),
            Self::Branch(_) => None,
        }
    }
}

// =============================================================================
// Lookup
// =============================================================================

impl<K, V> Branch<K, V> {
    /// Creates an empty branch tagged with `edit`.
    pub(crate) const fn new(edit: Option<EditToken>) -> Self {
        Self {
            edit,
            bitmap: 0,
            children: Vec::new(),
        }
    }

    /// Returns the child in the slot selected by `hash` at `shift`.
    fn child(&self, hash: u64, shift: u32) -> Option<&Child<K, V>> {
        let bit = 1u32 << hash_index(hash, shift);
        if self.bitmap & bit == 0 {
            None
        } else {
            self.children.get(compact_position(self.bitmap, bit))
        }
    }

    /// Looks up the entry stored under `key`, whose hash is `hash`.
    pub(crate) fn get<Q>(&self, hash: u64, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut branch = self;
        let mut shift = 0;
        loop {
            match branch.child(hash, shift)? {
                Child::Entry {
                    hash: entry_hash,
                    key: entry_key,
                    value,
                } => {
                    return (*entry_hash == hash && entry_key.borrow() == key)
                        .then_some((entry_key, value));
                }
                Child::Branch(next) => {
                    branch = next;
                    shift += BITS_PER_LEVEL;
                }
                Child::Collision(node) => {
                    if node.hash != hash {
                        return None;
                    }
                    return node
                        .entries
                        .iter()
                        .find(|(entry_key, _)| entry_key.borrow() == key)
                        .map(|(entry_key, value)| (entry_key, value));
                }
            }
        }
    }

    /// Returns a lazy depth-first iterator over the entries below this node.
    pub(crate) fn iter(&self, length: usize) -> Iter<'_, K, V> {
        Iter {
            stack: vec![Frame::Branch(self.children.iter())],
            remaining: length,
        }
    }

    /// Returns `true` if this branch holds nothing.
    pub(crate) const fn is_empty(&self) -> bool {
        self.bitmap == 0
    }
}

// =============================================================================
// Insertion
// =============================================================================

impl<K: Clone + Eq, V: Clone> Branch<K, V> {
    /// Inserts `key -> value` below this branch, which sits at `shift`.
    ///
    /// Returns the replaced value if `key` was present. The stored key is
    /// kept in that case.
    pub(crate) fn insert(
        &mut self,
        shift: u32,
        hash: u64,
        key: K,
        value: V,
        token: Option<EditToken>,
    ) -> Option<V> {
        let bit = 1u32 << hash_index(hash, shift);
        let position = compact_position(self.bitmap, bit);

        if self.bitmap & bit == 0 {
            self.children.insert(position, Child::Entry { hash, key, value });
            self.bitmap |= bit;
            return None;
        }

        match &mut self.children[position] {
            Child::Entry {
                hash: entry_hash,
                key: entry_key,
                value: entry_value,
            } if *entry_hash == hash && *entry_key == key => {
                return Some(std::mem::replace(entry_value, value));
            }
            Child::Branch(node) => {
                return clone_for_write(node, token).insert(
                    shift + BITS_PER_LEVEL,
                    hash,
                    key,
                    value,
                    token,
                );
            }
            Child::Collision(node) if node.hash == hash => {
                return clone_for_write(node, token).insert(key, value);
            }
            _ => {}
        }

        // The slot holds a different key, or a collision node for another
        // hash: both move one level down next to the new entry.
        let existing = self.children.remove(position);
        let merged = match existing {
            Child::Entry {
                hash: entry_hash,
                key: entry_key,
                value: entry_value,
            } if entry_hash == hash => Child::Collision(ReferenceCounter::new(Collision {
                edit: token,
                hash,
                entries: smallvec![(entry_key, entry_value), (key, value)],
            })),
            other => match other.leaf_hash() {
                Some(other_hash) => Self::pair(
                    shift + BITS_PER_LEVEL,
                    other,
                    other_hash,
                    Child::Entry { hash, key, value },
                    hash,
                    token,
                ),
                // Branches were descended into above.
                None => other,
            },
        };
        self.children.insert(position, merged);
        None
    }

    /// Builds the smallest subtree at `shift` holding two leaves with
    /// different hashes.
    fn pair(
        shift: u32,
        first: Child<K, V>,
        first_hash: u64,
        second: Child<K, V>,
        second_hash: u64,
        token: Option<EditToken>,
    ) -> Child<K, V> {
        let first_index = hash_index(first_hash, shift);
        let second_index = hash_index(second_hash, shift);
        let mut branch = Self::new(token);

        if first_index == second_index {
            branch.bitmap = 1 << first_index;
            branch.children.push(Self::pair(
                shift + BITS_PER_LEVEL,
                first,
                first_hash,
                second,
                second_hash,
                token,
            ));
        } else {
            branch.bitmap = (1 << first_index) | (1 << second_index);
            if first_index < second_index {
                branch.children.extend([first, second]);
            } else {
                branch.children.extend([second, first]);
            }
        }

        Child::Branch(ReferenceCounter::new(branch))
    }
}

impl<K: Clone + Eq, V: Clone> Collision<K, V> {
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entries.iter_mut().find(|(entry_key, _)| *entry_key == key) {
            Some((_, entry_value)) => Some(std::mem::replace(entry_value, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }
}

// =============================================================================
// Removal
// =============================================================================

impl<K: Clone, V: Clone> Branch<K, V> {
    /// Removes the entry stored under `key` below this branch.
    ///
    /// Callers check presence first: nodes on the path are cloned for write
    /// before the entry is found.
    pub(crate) fn remove<Q>(
        &mut self,
        shift: u32,
        hash: u64,
        key: &Q,
        token: Option<EditToken>,
    ) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let bit = 1u32 << hash_index(hash, shift);
        if self.bitmap & bit == 0 {
            return None;
        }
        let position = compact_position(self.bitmap, bit);

        match &mut self.children[position] {
            Child::Entry {
                hash: entry_hash,
                key: entry_key,
                ..
            } => {
                if *entry_hash != hash || (*entry_key).borrow() != key {
                    return None;
                }
            }
            Child::Branch(node) => {
                let node = clone_for_write(node, token);
                let removed = node.remove(shift + BITS_PER_LEVEL, hash, key, token)?;
                if node.is_empty() {
                    self.children.remove(position);
                    self.bitmap &= !bit;
                } else if let Some(lone) = node.take_lone_leaf() {
                    self.children[position] = lone;
                }
                return Some(removed);
            }
            Child::Collision(node) => {
                if node.hash != hash {
                    return None;
                }
                let node = clone_for_write(node, token);
                let index = node
                    .entries
                    .iter()
                    .position(|(entry_key, _)| entry_key.borrow() == key)?;
                let removed = node.entries.remove(index);
                let lone = if node.entries.len() == 1 {
                    node.entries.pop()
                } else {
                    None
                };
                if let Some((lone_key, lone_value)) = lone {
                    self.children[position] = Child::Entry {
                        hash,
                        key: lone_key,
                        value: lone_value,
                    };
                }
                return Some(removed);
            }
        }

        self.bitmap &= !bit;
        match self.children.remove(position) {
            Child::Entry { key, value, .. } => Some((key, value)),
            Child::Branch(_) | Child::Collision(_) => None,
        }
    }

    /// Detaches the only child if it is an entry or a collision node, so the
    /// parent can store it directly.
    fn take_lone_leaf(&mut self) -> Option<Child<K, V>> {
        match self.children.as_slice() {
            [Child::Entry { .. } | Child::Collision(_)] => {
                self.bitmap = 0;
                self.children.pop()
            }
            _ => None,
        }
    }
}

// =============================================================================
// Iterator
// =============================================================================

enum Frame<'a, K, V> {
    Branch(std::slice::Iter<'a, Child<K, V>>),
    Collision(std::slice::Iter<'a, (K, V)>),
}

/// Lazy depth-first walk over the entries of a trie, in bitmap order.
pub(crate) struct Iter<'a, K, V> {
    stack: Vec<Frame<'a, K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.last_mut()? {
                Frame::Branch(children) => match children.next() {
                    None => {
                        self.stack.pop();
                    }
                    Some(Child::Entry { key, value, .. }) => {
                        self.remaining = self.remaining.saturating_sub(1);
                        return Some((key, value));
                    }
                    Some(Child::Branch(node)) => {
                        self.stack.push(Frame::Branch(node.children.iter()));
                    }
                    Some(Child::Collision(node)) => {
                        self.stack.push(Frame::Collision(node.entries.iter()));
                    }
                },
                Frame::Collision(entries) => match entries.next() {
                    None => {
                        self.stack.pop();
                    }
                    Some((key, value)) => {
                        self.remaining = self.remaining.saturating_sub(1);
                        return Some((key, value));
                    }
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

// =============================================================================
// Tests
// =============================================================================
