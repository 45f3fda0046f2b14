use std::collections::BTreeMap;
use std::ops::Bound;

use bytes::Bytes;
use keel_common::{KeelResult, RawEntry};
use tracing::trace;

use crate::{KvOp, KvScan, KvStore};

/// An in-memory ordered byte store.
///
/// Values may be empty; only [`MemKvStore::remove`] deletes a key.
#[derive(Debug, Clone, Default)]
pub struct MemKvStore {
    mem_table: BTreeMap<Bytes, Bytes>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.mem_table.get(key).cloned()
    }

    pub fn set(&mut self, key: &[u8], value: Bytes) {
        self.mem_table.insert(Bytes::copy_from_slice(key), value);
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.mem_table.remove(key);
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.mem_table.contains_key(key)
    }

    pub fn apply(&mut self, ops: Vec<KvOp>) {
        trace!("apply {} ops", ops.len());
        for op in ops {
            match op {
                KvOp::Put { key, value } => {
                    self.mem_table.insert(key, value);
                }
                KvOp::Del { key } => {
                    self.mem_table.remove(&key);
                }
            }
        }
    }

    /// Scan the entries between `start` and `end`.
    ///
    /// An inverted or empty pair of bounds yields nothing instead of panicking.
    pub fn scan(
        &self,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> Box<dyn DoubleEndedIterator<Item = RawEntry> + '_> {
        if is_empty_range(start, end) {
            return Box::new(std::iter::empty());
        }

        Box::new(
            self.mem_table
                .range::<[u8], _>((start, end))
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }

    pub fn len(&self) -> usize {
        self.mem_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem_table.is_empty()
    }

    pub fn size(&self) -> usize {
        self.mem_table
            .iter()
            .fold(0, |acc, (k, v)| acc + k.len() + v.len())
    }
}

fn is_empty_range(start: Bound<&[u8]>, end: Bound<&[u8]>) -> bool {
    match (start, end) {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e))
        | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
        _ => false,
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &[u8]) -> KeelResult<Option<Bytes>> {
        Ok(MemKvStore::get(self, key))
    }

    fn set(&mut self, key: &[u8], value: Bytes) -> KeelResult<()> {
        MemKvStore::set(self, key, value);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> KeelResult<()> {
        MemKvStore::remove(self, key);
        Ok(())
    }

    fn contains_key(&self, key: &[u8]) -> KeelResult<bool> {
        Ok(MemKvStore::contains_key(self, key))
    }

    fn apply(&mut self, ops: Vec<KvOp>) -> KeelResult<()> {
        MemKvStore::apply(self, ops);
        Ok(())
    }

    fn scan(&self, start: Bound<&[u8]>, end: Bound<&[u8]>) -> KeelResult<KvScan<'_>> {
        Ok(MemKvStore::scan(self, start, end))
    }

    fn len(&self) -> usize {
        MemKvStore::len(self)
    }

    fn size(&self) -> usize {
        MemKvStore::size(self)
    }
}
