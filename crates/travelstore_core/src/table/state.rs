//! In-memory rows and indexes of a table.

use super::Entity;
use crate::record::{RecordId, Row};
use std::collections::{BTreeMap, BTreeSet, HashMap};

struct Slot<T> {
    seq: u64,
    row: Row<T>,
}

/// Rows keyed by id, with insertion order, field indexes and the dirty set.
///
/// Indexes and the dirty set refer to rows by insertion sequence so that
/// lookups come back in creation order.
pub(super) struct TableState<T> {
    slots: HashMap<RecordId, Slot<T>>,
    order: BTreeMap<u64, RecordId>,
    next_seq: u64,
    index: HashMap<(&'static str, String), BTreeSet<u64>>,
    dirty: BTreeSet<u64>,
}

impl<T> Default for TableState<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            index: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }
}

impl<T: Entity> TableState<T> {
    /// Inserts or replaces a row, keeping its original insertion slot.
    pub(super) fn put(&mut self, row: Row<T>) {
        let id = row.id();
        let seq = match self.slots.remove(&id) {
            Some(old) => {
                self.unindex(old.seq, &old.row);
                old.seq
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.order.insert(seq, id);
                seq
            }
        };

        for key in row.data.index_values() {
            self.index.entry(key).or_default().insert(seq);
        }
        if row.meta.is_dirty() {
            self.dirty.insert(seq);
        }
        self.slots.insert(id, Slot { seq, row });
    }

    fn unindex(&mut self, seq: u64, row: &Row<T>) {
        for key in row.data.index_values() {
            if let Some(seqs) = self.index.get_mut(&key) {
                seqs.remove(&seq);
                if seqs.is_empty() {
                    self.index.remove(&key);
                }
            }
        }
        self.dirty.remove(&seq);
    }

    pub(super) fn get(&self, id: RecordId) -> Option<&Row<T>> {
        self.slots.get(&id).map(|slot| &slot.row)
    }

    pub(super) fn contains(&self, id: RecordId) -> bool {
        self.slots.contains_key(&id)
    }

    pub(super) fn len(&self) -> usize {
        self.slots.len()
    }

    fn at(&self, seq: &u64) -> Option<&Row<T>> {
        self.order.get(seq).and_then(|id| self.get(*id))
    }

    /// All rows, tombstones included, in insertion order.
    pub(super) fn rows(&self) -> impl Iterator<Item = &Row<T>> {
        self.order.values().filter_map(|id| self.get(*id))
    }

    pub(super) fn lookup<'a>(
        &'a self,
        field: &'static str,
        value: &str,
    ) -> impl Iterator<Item = &'a Row<T>> {
        self.index
            .get(&(field, value.to_string()))
            .into_iter()
            .flatten()
            .filter_map(|seq| self.at(seq))
    }

    pub(super) fn dirty_rows(&self) -> impl Iterator<Item = &Row<T>> {
        self.dirty.iter().filter_map(|seq| self.at(seq))
    }
}
