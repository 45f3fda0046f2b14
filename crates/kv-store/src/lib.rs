//! # Keel storage backends
//!
//! Keel does not persist anything by itself. Everything it needs from a
//! persistence engine is captured by the [`KvStore`] trait: an ordered map of
//! byte keys to byte values that supports point lookups, single writes,
//! atomic batches and bounded double-ended scans.
//!
//! Keys are ordered by plain byte-wise comparison. A scan never yields two
//! entries with the same key.
//!
//! [`MemKvStore`] is the in-memory implementation shipped with Keel.
//!
//! ```text
//!          scan(Excluded("b"), Unbounded)
//!                 │
//!   "a"   "b"   "c"   "d"
//!               ──────────▶  next()
//!   ◀──────────              next_back() of scan(Unbounded, Excluded("c"))
//! ```
use std::ops::Bound;

use bytes::Bytes;
use keel_common::{KeelResult, RawEntry};

pub mod mem_store;
pub use mem_store::MemKvStore;

/// A single write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Put { key: Bytes, value: Bytes },
    Del { key: Bytes },
}

pub type KvScan<'a> = Box<dyn DoubleEndedIterator<Item = RawEntry> + 'a>;

/// The ordered byte storage primitive Keel is layered on.
///
/// Implementations may fail on any call; such failures are passed through to
/// the caller untouched, so they should use [`keel_common::KeelError::Backend`].
pub trait KvStore: std::fmt::Debug + Send + Sync {
    fn get(&self, key: &[u8]) -> KeelResult<Option<Bytes>>;
    fn set(&mut self, key: &[u8], value: Bytes) -> KeelResult<()>;
    fn remove(&mut self, key: &[u8]) -> KeelResult<()>;
    fn contains_key(&self, key: &[u8]) -> KeelResult<bool> {
        Ok(self.get(key)?.is_some())
    }
    /// Apply every op or none of them. Later ops on the same key win.
    fn apply(&mut self, ops: Vec<KvOp>) -> KeelResult<()>;
    fn scan(&self, start: Bound<&[u8]>, end: Bound<&[u8]>) -> KeelResult<KvScan<'_>>;
    /// Number of live entries.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Total bytes held by keys and values.
    fn size(&self) -> usize;

    /// The first entry of `scan(start, end)` in the given direction.
    fn first_in(
        &self,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        reverse: bool,
    ) -> KeelResult<Option<RawEntry>> {
        let mut iter = self.scan(start, end)?;
        Ok(if reverse {
            iter.next_back()
        } else {
            iter.next()
        })
    }
}
