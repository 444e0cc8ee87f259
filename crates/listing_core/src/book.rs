use std::collections::{BTreeMap, BTreeSet};

use crate::{ChangeSet, ListingId, ListingPatch, ListingRecord};

/// Read-only view of the known, non-excluded listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingStore {
    records: BTreeMap<ListingId, ListingRecord>,
}

impl ListingStore {
    pub fn get(&self, id: &str) -> Option<&ListingRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ListingId, &ListingRecord)> {
        self.records.iter()
    }

    /// Borrowed map, for serialization.
    pub fn as_map(&self) -> &BTreeMap<ListingId, ListingRecord> {
        &self.records
    }
}

/// Read-only view of the permanently rejected listing ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    ids: BTreeSet<ListingId>,
}

impl ExclusionSet {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListingId> {
        self.ids.iter()
    }
}

/// The record store and the exclusion set, kept mutually exclusive.
///
/// No id is ever present in both. Excluding an id removes its record in the
/// same call, and an excluded id can never be rediscovered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingBook {
    store: ListingStore,
    excluded: ExclusionSet,
}

impl ListingBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from persisted parts.
    ///
    /// Records whose id is also excluded are dropped, and derived fields are
    /// recomputed. The returned change set reports the dropped records, since
    /// the record document on disk no longer matches the book.
    pub fn from_parts(
        records: impl IntoIterator<Item = (ListingId, ListingRecord)>,
        excluded: impl IntoIterator<Item = ListingId>,
    ) -> (Self, ChangeSet) {
        let excluded = ExclusionSet {
            ids: excluded.into_iter().filter(|id| !id.is_empty()).collect(),
        };
        let mut dropped = ChangeSet::NONE;
        let records = records
            .into_iter()
            .filter(|(id, _)| {
                let overlaps = excluded.contains(id);
                if overlaps {
                    dropped = ChangeSet::records();
                }
                !overlaps
            })
            .map(|(id, mut record)| {
                record.recompute_derived();
                (id, record)
            })
            .collect();
        let book = Self {
            store: ListingStore { records },
            excluded,
        };
        (book, dropped)
    }

    pub fn store(&self) -> &ListingStore {
        &self.store
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.excluded
    }

    pub fn get(&self, id: &str) -> Option<&ListingRecord> {
        self.store.get(id)
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.excluded.contains(id)
    }

    /// True when the id is either stored or excluded.
    pub fn is_known(&self, id: &str) -> bool {
        self.store.contains(id) || self.excluded.contains(id)
    }

    /// Creates a bare record for a newly seen id.
    ///
    /// No-op for ids that are already stored or excluded.
    pub fn upsert_discovered(&mut self, id: &str, distance_tier: u32) -> ChangeSet {
        if id.is_empty() || self.is_known(id) {
            return ChangeSet::NONE;
        }
        self.store
            .records
            .insert(id.to_owned(), ListingRecord::discovered(distance_tier));
        ChangeSet::records()
    }

    /// Merges observed fields into an existing record.
    ///
    /// Unknown ids are left alone: merging never creates a record.
    pub fn merge(&mut self, id: &str, patch: &ListingPatch) -> ChangeSet {
        match self.store.records.get_mut(id) {
            Some(record) => {
                if record.apply(patch) {
                    ChangeSet::records()
                } else {
                    ChangeSet::NONE
                }
            }
            None => ChangeSet::NONE,
        }
    }

    pub fn remove(&mut self, id: &str) -> ChangeSet {
        if self.store.records.remove(id).is_some() {
            ChangeSet::records()
        } else {
            ChangeSet::NONE
        }
    }

    /// Permanently rejects `id`, dropping its record if there is one.
    pub fn exclude(&mut self, id: &str) -> ChangeSet {
        if id.is_empty() {
            return ChangeSet::NONE;
        }
        let removed = self.remove(id);
        let added = if self.excluded.ids.insert(id.to_owned()) {
            ChangeSet::exclusions()
        } else {
            ChangeSet::NONE
        };
        removed.union(added)
    }

    /// Ids that still need a detail fetch, in id order.
    pub fn pending_details(&self, force_refresh: bool) -> Vec<ListingId> {
        self.store
            .iter()
            .filter(|(_, record)| force_refresh || !record.has_details())
            .map(|(id, _)| id.clone())
            .collect()
    }
}
