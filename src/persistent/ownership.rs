//! Node ownership: shared handles, owner tokens and clone-for-write.
//!
//! Every trie node in this crate lives behind a [`ReferenceCounter`]. The
//! strong count of a handle is the number of parents (persistent roots,
//! transients or other nodes) pointing at the node:
//!
//! - *retain* is [`retain`] (a handle clone),
//! - *release* is dropping a handle; the node and, recursively, its children
//!   are freed when the last handle goes away,
//! - *clone-for-write* is [`clone_for_write`], the only way node contents are
//!   ever mutated.
//!
//! A transient tags the nodes it creates with its [`EditToken`]. A node is
//! edited in place only when its handle is unique and, inside a transient,
//! it carries that transient's token. Tokens are never reissued, so retiring
//! a token (committing the transient) turns every node it tagged back into an
//! ordinary node without walking the tree.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use super::ReferenceCounter;

// =============================================================================
// EditToken
// =============================================================================

/// Identity of one transient builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EditToken(NonZeroU64);

impl EditToken {
    /// Returns a token distinct from every token handed out before.
    pub(crate) fn fresh() -> Self {
        static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

        let identifier = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(identifier).unwrap_or(NonZeroU64::MIN))
    }
}

// =============================================================================
// Editable nodes
// =============================================================================

/// A node that records which transient (if any) created it.
pub(crate) trait Editable: Clone {
    /// The token of the transient that created this node.
    fn edit_token(&self) -> Option<EditToken>;

    /// Retags the node.
    fn set_edit_token(&mut self, token: Option<EditToken>);
}

/// Takes one more shared reference to `node`.
#[inline]
pub(crate) fn retain<N>(node: &ReferenceCounter<N>) -> ReferenceCounter<N> {
    ReferenceCounter::clone(node)
}

/// Returns `true` if the node in `slot` may be mutated in place by an edit
/// carrying `token`.
#[inline]
fn is_writable<N: Editable>(slot: &mut ReferenceCounter<N>, token: Option<EditToken>) -> bool {
    ReferenceCounter::get_mut(slot)
        .is_some_and(|node| token.is_none() || node.edit_token() == token)
}

/// Returns the node in `slot` ready for direct mutation.
///
/// If the node is exclusively owned (and, for a transient edit, tagged with
/// `token`) it is returned as is. Otherwise it is replaced in `slot` by a
/// shallow copy tagged with `token`: the copy retains every child, and the
/// slot's reference to the original is released.
pub(crate) fn clone_for_write<N: Editable>(
    slot: &mut ReferenceCounter<N>,
    token: Option<EditToken>,
) -> &mut N {
    if !is_writable(slot, token) {
        let mut copy = N::clone(slot);
        copy.set_edit_token(token);
        *slot = ReferenceCounter::new(copy);
    }
    ReferenceCounter::make_mut(slot)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Clone, Debug, PartialEq)]
    struct Cell {
        token: Option<EditToken>,
        value: i32,
        child: Option<ReferenceCounter<Cell>>,
    }

    impl Editable for Cell {
        fn edit_token(&self) -> Option<EditToken> {
            self.token
        }

        fn set_edit_token(&mut self, token: Option<EditToken>) {
            self.token = token;
        }
    }

    fn cell(value: i32, token: Option<EditToken>) -> ReferenceCounter<Cell> {
        ReferenceCounter::new(Cell {
            token,
            value,
            child: None,
        })
    }

    #[rstest]
    fn test_fresh_tokens_are_unique() {
        let first = EditToken::fresh();
        let second = EditToken::fresh();
        assert_ne!(first, second);
    }

    #[rstest]
    fn test_retain_increments_count() {
        let node = cell(1, None);
        let retained = retain(&node);
        assert!(ReferenceCounter::ptr_eq(&node, &retained));
        assert_eq!(ReferenceCounter::strong_count(&node), 2);
        drop(retained);
        assert_eq!(ReferenceCounter::strong_count(&node), 1);
    }

    #[rstest]
    fn test_clone_for_write_reuses_exclusive_node() {
        let mut slot = cell(1, None);
        let before = ReferenceCounter::as_ptr(&slot);
        clone_for_write(&mut slot, None).value = 2;
        assert_eq!(ReferenceCounter::as_ptr(&slot), before);
        assert_eq!(slot.value, 2);
    }

    #[rstest]
    fn test_clone_for_write_copies_shared_node() {
        let original = cell(1, None);
        let mut slot = retain(&original);
        clone_for_write(&mut slot, None).value = 2;

        assert!(!ReferenceCounter::ptr_eq(&original, &slot));
        assert_eq!(original.value, 1);
        assert_eq!(slot.value, 2);
        assert_eq!(ReferenceCounter::strong_count(&original), 1);
    }

    #[rstest]
    fn test_clone_for_write_retains_children_of_copy() {
        let child = cell(10, None);
        let parent = ReferenceCounter::new(Cell {
            token: None,
            value: 1,
            child: Some(retain(&child)),
        });
        let mut slot = retain(&parent);
        clone_for_write(&mut slot, None);

        assert_eq!(ReferenceCounter::strong_count(&child), 3);
        drop(parent);
        assert_eq!(ReferenceCounter::strong_count(&child), 2);
    }

    #[rstest]
    fn test_clone_for_write_requires_matching_token() {
        let token = EditToken::fresh();
        let mut slot = cell(1, None);
        let before = ReferenceCounter::as_ptr(&slot);

        clone_for_write(&mut slot, Some(token)).value = 2;
        let tagged = ReferenceCounter::as_ptr(&slot);
        assert_ne!(tagged, before);
        assert_eq!(slot.token, Some(token));

        clone_for_write(&mut slot, Some(token)).value = 3;
        assert_eq!(ReferenceCounter::as_ptr(&slot), tagged);
        assert_eq!(slot.value, 3);
    }

    #[rstest]
    fn test_clone_for_write_copies_node_of_other_token() {
        let mut slot = cell(1, Some(EditToken::fresh()));
        let before = ReferenceCounter::as_ptr(&slot);
        let token = EditToken::fresh();

        clone_for_write(&mut slot, Some(token));
        assert_ne!(ReferenceCounter::as_ptr(&slot), before);
        assert_eq!(slot.token, Some(token));
    }
}
