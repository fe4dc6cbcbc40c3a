//! # imshare
//!
//! Persistent (immutable, structurally shared) collections for Rust.
//!
//! ## Overview
//!
//! Every update operation returns a new collection that shares most of its
//! internal nodes with the original, which stays valid and unchanged. This
//! makes snapshots O(1), equality of unchanged subtrees a pointer check, and
//! concurrent reads of old versions safe while a new version is being built.
//!
//! - **[`PersistentVector`](persistent::PersistentVector)**: 32-way radix
//!   trie with a tail buffer
//! - **[`PersistentHashMap`](persistent::PersistentHashMap)**: hash array
//!   mapped trie with collision nodes
//! - **[`PersistentHashSet`](persistent::PersistentHashSet)**: set view over
//!   the map
//! - **Transients**: owner-token builders for fast batches of edits
//!
//! ## Feature Flags
//!
//! - `arc` (default): nodes are shared through `Arc`; persistent values are
//!   `Send + Sync`. Without it, `Rc` is used.
//! - `fxhash`: default map/set hasher is `rustc_hash::FxBuildHasher`
//! - `ahash`: default map/set hasher is `ahash::RandomState`
//! - `serde`: `Serialize`/`Deserialize` for all persistent collections
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (transient lifecycle at `trace`, vector
//! depth changes at `debug`) and never installs a subscriber.
//!
//! ## Example
//!
//! ```rust
//! use imshare::prelude::*;
//!
//! let vector: PersistentVector<i32> = (1..=3).collect();
//! let (shorter, last) = vector.pop_back()?;
//!
//! assert_eq!(last, 3);
//! assert_eq!(shorter.len(), 2);
//! assert_eq!(
//!     shorter.try_get(2),
//!     Err(CollectionError::IndexOutOfRange { index: 2, length: 2 })
//! );
//! # Ok::<(), CollectionError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports the collections, their builders and the error type.
///
/// # Usage
///
/// ```rust
/// use imshare::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::CollectionError;
    pub use crate::persistent::*;
}

pub mod error;
pub mod persistent;

pub use error::CollectionError;
