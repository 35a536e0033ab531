//! Keyed entry collections addressable by id and by key
//!
//! [`MappedModel`] stores entries under monotonically increasing ids and keeps
//! a secondary index from key to id. Keys are not required to be unique: when
//! several entries share a key, all of them stay reachable by id, and lookup by
//! key resolves to a single one of them (see [`MappedModel::get_id_for_key`]).

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use indexmap::IndexMap;

use super::cacheable::{CacheCell, Cacheable};
use crate::error::{Error, Result};

/// Stable id of an entry within a [`MappedModel`].
pub type EntryId = u32;

/// An entry in a [`MappedModel`].
///
/// Entries own a cache cell that the model links to its own, so a change to
/// an entry's key or value invalidates the model's serialized bytes.
pub trait MappedEntry: Sized {
    /// Key type. Equality is by value, never by identity.
    type Key: Clone + Eq + Hash + fmt::Debug;
    /// Value type.
    type Value;

    /// Creates a new, unowned entry.
    fn new(key: Self::Key, value: Self::Value) -> Self;

    /// The key of this entry.
    fn key(&self) -> &Self::Key;

    /// The value of this entry.
    fn value(&self) -> &Self::Value;

    /// The entry's own cache cell.
    fn cacheable(&self) -> &dyn Cacheable;

    /// Checks that the key and value are writable.
    fn validate(&self) -> Result<()>;

    /// True iff keys are equal and values are equal.
    fn equals(&self, other: &Self) -> bool;

    /// Value equality against this entry's key.
    fn key_equals(&self, key: &Self::Key) -> bool {
        self.key() == key
    }
}

/// A collection of keyed entries, addressable by id and by key.
pub struct MappedModel<E: MappedEntry> {
    entry_map: IndexMap<EntryId, E>,
    key_map: HashMap<E::Key, EntryId>,
    next_id: EntryId,
    cached_ids: OnceCell<Rc<[EntryId]>>,
    cache: CacheCell,
}

impl<E: MappedEntry> MappedModel<E> {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::from_entries(Vec::new(), CacheCell::new())
    }

    /// Creates a model from key/value pairs. Ids are assigned in order,
    /// starting at 0.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (E::Key, E::Value)>) -> Self {
        Self::from_entries(
            pairs.into_iter().map(|(key, value)| E::new(key, value)),
            CacheCell::new(),
        )
    }

    /// Creates a model from already-built entries and an initial cache.
    ///
    /// Used when reading, so the model can start out holding the bytes it was
    /// read from.
    pub(crate) fn from_entries(entries: impl IntoIterator<Item = E>, cache: CacheCell) -> Self {
        let owner = cache.owner_link();
        let mut entry_map = IndexMap::new();
        let mut key_map = HashMap::new();

        for (id, entry) in (0..).zip(entries) {
            entry.cacheable().set_owner(&owner);
            key_map.insert(entry.key().clone(), id);
            entry_map.insert(id, entry);
        }

        let next_id = EntryId::try_from(entry_map.len()).unwrap_or(EntryId::MAX);

        Self {
            entry_map,
            key_map,
            next_id,
            cached_ids: OnceCell::new(),
            cache,
        }
    }

    /// The cell holding the serialized bytes of whatever owns this model.
    pub fn cache(&self) -> &CacheCell {
        &self.cache
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entry_map.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry_map.is_empty()
    }

    /// Ids of all entries in ascending order.
    ///
    /// The returned slice is memoized: repeated calls return the same
    /// allocation until an entry is added or deleted, or the model is cleared.
    /// Changing an existing entry's key or value does not rebuild it.
    pub fn entry_ids(&self) -> Rc<[EntryId]> {
        Rc::clone(
            self.cached_ids
                .get_or_init(|| self.entry_map.keys().copied().collect()),
        )
    }

    /// Iterates over `(id, entry)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &E)> {
        self.entry_map.iter().map(|(&id, entry)| (id, entry))
    }

    /// Iterates over entries in ascending id order.
    pub fn entries(&self) -> impl Iterator<Item = &E> {
        self.entry_map.values()
    }

    /// Creates an entry for `key` and `value`, adds it, and returns its id.
    ///
    /// Duplicate keys are accepted. The new entry becomes the one returned by
    /// key lookups; earlier entries with the same key stay reachable by id.
    pub fn add(&mut self, key: E::Key, value: E::Value) -> Result<EntryId> {
        let id = self.next_id;
        if self.entry_map.contains_key(&id) {
            return Err(Error::DuplicateId { id });
        }
        self.next_id += 1;

        let entry = E::new(key, value);
        entry.cacheable().set_owner(&self.cache.owner_link());
        self.key_map.insert(entry.key().clone(), id);
        self.entry_map.insert(id, entry);

        self.reset_entries();
        self.cache.uncache();
        Ok(id)
    }

    /// Adds every pair in order and returns the new ids.
    pub fn add_all(
        &mut self,
        pairs: impl IntoIterator<Item = (E::Key, E::Value)>,
    ) -> Result<Vec<EntryId>> {
        pairs
            .into_iter()
            .map(|(key, value)| self.add(key, value))
            .collect()
    }

    /// Removes all entries and resets id assignment to 0.
    ///
    /// Does nothing, and invalidates nothing, if the model is already empty.
    pub fn clear(&mut self) {
        if self.entry_map.is_empty() {
            return;
        }
        self.entry_map.clear();
        self.key_map.clear();
        self.next_id = 0;
        self.reset_entries();
        self.cache.uncache();
    }

    /// Removes the entry with `id`. Returns whether anything was removed.
    ///
    /// Ids of the remaining entries are unchanged, and `id` is not reused
    /// until the model is cleared.
    pub fn delete(&mut self, id: EntryId) -> bool {
        let Some(entry) = self.entry_map.shift_remove(&id) else {
            return false;
        };

        let key = entry.key();
        if self.key_map.get(key) == Some(&id) {
            self.key_map.remove(key);
            self.repair_key(key);
        }

        self.reset_entries();
        self.cache.uncache();
        true
    }

    /// Removes the entry that key lookups resolve to for `key`.
    pub fn delete_by_key(&mut self, key: &E::Key) -> bool {
        match self.get_id_for_key(key) {
            Some(id) => self.delete(id),
            None => false,
        }
    }

    /// Returns the entry with `id`.
    pub fn get(&self, id: EntryId) -> Option<&E> {
        self.entry_map.get(&id)
    }

    /// Returns a mutable handle to the entry with `id`.
    ///
    /// The handle keeps the key index and the owner link in sync when it is
    /// dropped, so entry keys may be changed through it.
    pub fn get_mut(&mut self, id: EntryId) -> Option<EntryMut<'_, E>> {
        let original_key = self.entry_map.get(&id)?.key().clone();
        Some(EntryMut {
            model: self,
            id,
            original_key,
        })
    }

    /// Returns the entry that key lookups resolve to for `key`.
    pub fn get_by_key(&self, key: &E::Key) -> Option<&E> {
        self.get_id_for_key(key).and_then(|id| self.get(id))
    }

    /// Mutable counterpart of [`MappedModel::get_by_key`].
    pub fn get_by_key_mut(&mut self, key: &E::Key) -> Option<EntryMut<'_, E>> {
        let id = self.get_id_for_key(key)?;
        self.get_mut(id)
    }

    /// Returns the id that key lookups resolve to for `key`.
    ///
    /// With duplicate keys this is the most recently indexed entry. After that
    /// entry is deleted, it is the lowest remaining id with the key.
    pub fn get_id_for_key(&self, key: &E::Key) -> Option<EntryId> {
        self.key_map.get(key).copied()
    }

    /// Returns every id whose entry has `key`, in ascending order.
    ///
    /// This is a linear scan; use sparingly.
    pub fn get_ids_for_key(&self, key: &E::Key) -> Vec<EntryId> {
        self.iter()
            .filter(|(_, entry)| entry.key_equals(key))
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether any entry has `key`.
    pub fn has_key(&self, key: &E::Key) -> bool {
        self.key_map.contains_key(key)
    }

    /// Returns each key held by more than one entry, once.
    ///
    /// Entries are scanned in id order and the key is reported from the first
    /// entry found to repeat it.
    pub fn find_repeated_keys(&self) -> Vec<E::Key> {
        let mut repeated = Vec::new();
        if self.entry_map.len() == self.key_map.len() {
            return repeated;
        }

        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for entry in self.entry_map.values() {
            let key = entry.key();
            if !seen.insert(key) && reported.insert(key) {
                repeated.push(key.clone());
            }
        }
        repeated
    }

    /// Validates every entry, stopping at the first failure.
    pub fn validate_entries(&self) -> Result<()> {
        self.entry_map.values().try_for_each(E::validate)
    }

    /// Order-insensitive entry equality.
    pub fn entries_equal(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries()
                .all(|entry| other.entries().any(|candidate| entry.equals(candidate)))
    }

    /// Points the key index at the lowest remaining id holding `key`, if any.
    fn repair_key(&mut self, key: &E::Key) {
        let replacement = self
            .entry_map
            .iter()
            .find(|(_, entry)| entry.key_equals(key))
            .map(|(&id, _)| id);
        if let Some(replacement) = replacement {
            self.key_map.insert(key.clone(), replacement);
        }
    }

    /// Moves the key index entry for `id` from `previous` to `current`.
    fn on_key_update(&mut self, id: EntryId, previous: &E::Key, current: E::Key) {
        if self.key_map.get(previous) == Some(&id) {
            self.key_map.remove(previous);
            self.repair_key(previous);
        }
        self.key_map.insert(current, id);
        self.cache.uncache();
    }

    fn reset_entries(&mut self) {
        self.cached_ids.take();
    }
}

impl<E: MappedEntry> Default for MappedModel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MappedEntry + Clone> Clone for MappedModel<E> {
    /// Clones every entry into a new, uncached model. Ids are renumbered from 0.
    fn clone(&self) -> Self {
        Self::from_entries(self.entries().cloned(), CacheCell::new())
    }
}

impl<E: MappedEntry + fmt::Debug> fmt::Debug for MappedModel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedModel")
            .field("entries", &self.entry_map)
            .field("next_id", &self.next_id)
            .field("cached", &self.cache.is_cached())
            .finish_non_exhaustive()
    }
}

/// Mutable access to one entry of a [`MappedModel`].
///
/// On drop, re-indexes the entry if its key changed, and re-links it to the
/// model if the entry itself was replaced.
pub struct EntryMut<'a, E: MappedEntry> {
    model: &'a mut MappedModel<E>,
    id: EntryId,
    original_key: E::Key,
}

impl<E: MappedEntry> EntryMut<'_, E> {
    /// Id of the entry.
    #[must_use]
    pub fn id(&self) -> EntryId {
        self.id
    }
}

impl<E: MappedEntry> Deref for EntryMut<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.model.entry_map[&self.id]
    }
}

impl<E: MappedEntry> DerefMut for EntryMut<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.model.entry_map[&self.id]
    }
}

impl<E: MappedEntry> Drop for EntryMut<'_, E> {
    fn drop(&mut self) {
        let owner = self.model.cache.owner_link();
        let entry = &self.model.entry_map[&self.id];

        if !entry.cacheable().is_owned_by(&owner) {
            entry.cacheable().set_owner(&owner);
            self.model.cache.uncache();
        }

        if !entry.key_equals(&self.original_key) {
            let current = entry.key().clone();
            self.model.on_key_update(self.id, &self.original_key, current);
        }
    }
}
