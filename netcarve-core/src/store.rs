//! Keyed-record persistence contract.
//!
//! The engine does not persist anything itself. Hosts implement
//! [`RecordStore`] over their backing store; [`MemoryStore`] is the in-process
//! implementation used by tests and the CLI.
//!
//! Writes are acknowledged synchronously. A store that cannot accept a write
//! returns [`StoreError::Unavailable`] so callers can tell "stored" apart from
//! "storage unavailable". Retrying is the store's concern.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::files::FileReference;
use crate::flow::Flow;
use crate::packet::ParsedPacket;
use crate::timeline::TimelineEvent;

/// A value with a stable string key.
pub trait Record {
    fn record_id(&self) -> String;
}

impl Record for ParsedPacket {
    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

impl Record for Flow {
    fn record_id(&self) -> String {
        self.key.to_string()
    }
}

impl Record for FileReference {
    fn record_id(&self) -> String {
        self.id.clone()
    }
}

impl Record for TimelineEvent {
    fn record_id(&self) -> String {
        self.id.clone()
    }
}

/// Store for one record type.
pub trait RecordStore<T: Record> {
    /// Insert or replace one record.
    fn insert_one(&mut self, record: T) -> Result<(), StoreError>;

    /// Insert or replace a batch. Returns the number of records written.
    fn insert_many(&mut self, records: Vec<T>) -> Result<usize, StoreError> {
        let count = records.len();
        for record in records {
            self.insert_one(record)?;
        }
        Ok(count)
    }

    /// Remove and return the record with `id`.
    fn delete(&mut self, id: &str) -> Result<T, StoreError>;

    /// Every record, in insertion order.
    fn get_all(&self) -> Result<Vec<T>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<T>, StoreError>;

    fn clear(&mut self) -> Result<(), StoreError>;
}

/// In-memory [`RecordStore`].
///
/// Records keep insertion order; an id index makes upserts and lookups
/// constant time.
#[derive(Debug, Clone)]
pub struct MemoryStore<T> {
    records: Vec<T>,
    index: HashMap<String, usize>,
    unavailable: Option<String>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            unavailable: None,
        }
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every operation, as a backing store that failed
    /// to initialize would.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        match &self.unavailable {
            Some(reason) => Err(StoreError::Unavailable {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }
}

impl<T: Record + Clone> RecordStore<T> for MemoryStore<T> {
    fn insert_one(&mut self, record: T) -> Result<(), StoreError> {
        self.check()?;
        let id = record.record_id();
        match self.position(&id) {
            Some(idx) => self.records[idx] = record,
            None => {
                self.index.insert(id, self.records.len());
                self.records.push(record);
            }
        }
        Ok(())
    }

    fn insert_many(&mut self, records: Vec<T>) -> Result<usize, StoreError> {
        // All or nothing: an unavailable store writes no part of the batch.
        self.check()?;
        let count = records.len();
        for record in records {
            self.insert_one(record)?;
        }
        Ok(count)
    }

    fn delete(&mut self, id: &str) -> Result<T, StoreError> {
        self.check()?;
        let idx = self
            .index
            .remove(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        let record = self.records.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Ok(record)
    }

    fn get_all(&self) -> Result<Vec<T>, StoreError> {
        self.check()?;
        Ok(self.records.clone())
    }

    fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.check()?;
        Ok(self.position(id).map(|idx| self.records[idx].clone()))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.check()?;
        self.records.clear();
        self.index.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: &'static str,
        text: &'static str,
    }

    impl Record for Note {
        fn record_id(&self) -> String {
            self.id.to_string()
        }
    }

    fn note(id: &'static str, text: &'static str) -> Note {
        Note { id, text }
    }

    // Test 1: insert, get, replace
    #[test]
    fn test_insert_and_get() {
        let mut store = MemoryStore::new();
        store.insert_one(note("a", "one")).unwrap();
        store.insert_one(note("b", "two")).unwrap();
        store.insert_one(note("a", "uno")).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap(), Some(note("a", "uno")));
        assert_eq!(store.get("zzz").unwrap(), None);
        assert_eq!(
            store.get_all().unwrap(),
            vec![note("a", "uno"), note("b", "two")]
        );
    }

    // Test 2: batch insert, delete, clear
    #[test]
    fn test_many_delete_clear() {
        let mut store = MemoryStore::new();
        assert_eq!(store.insert_many(vec![note("a", "1"), note("b", "2")]).unwrap(), 2);
        assert_eq!(store.delete("a").unwrap(), note("a", "1"));
        assert_eq!(
            store.delete("a"),
            Err(StoreError::NotFound { id: "a".to_string() })
        );
        store.clear().unwrap();
        assert!(store.is_empty());
    }

    // Test 3: unavailable store reports every operation as failed
    #[test]
    fn test_unavailable() {
        let mut store: MemoryStore<Note> = MemoryStore::unavailable("disk offline");
        let err = StoreError::Unavailable {
            reason: "disk offline".to_string(),
        };
        assert_eq!(store.insert_one(note("a", "1")), Err(err.clone()));
        assert_eq!(store.insert_many(vec![note("b", "2")]), Err(err.clone()));
        assert_eq!(store.get_all(), Err(err.clone()));
        assert_eq!(store.get("a"), Err(err.clone()));
        assert_eq!(store.clear(), Err(err));
        assert!(store.is_empty());
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Numbered(usize);

    impl Record for Numbered {
        fn record_id(&self) -> String {
            format!("n-{}", self.0)
        }
    }

    // Test 4: lookups stay correct after deleting from the middle
    #[test]
    fn test_delete_reindexes() {
        let mut store = MemoryStore::new();
        store.insert_many((0..5).map(Numbered).collect()).unwrap();
        store.delete("n-1").unwrap();

        assert_eq!(store.get("n-3").unwrap(), Some(Numbered(3)));
        store.insert_one(Numbered(4)).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(
            store.get_all().unwrap(),
            vec![Numbered(0), Numbered(2), Numbered(3), Numbered(4)]
        );
    }

    // Test 5: a capture-sized batch upserts by id
    #[test]
    fn test_large_batch() {
        let mut store = MemoryStore::new();
        assert_eq!(store.insert_many((0..20_000).map(Numbered).collect()).unwrap(), 20_000);
        assert_eq!(store.insert_many((0..20_000).map(Numbered).collect()).unwrap(), 20_000);
        assert_eq!(store.len(), 20_000);
        assert_eq!(store.get("n-19999").unwrap(), Some(Numbered(19_999)));
    }
}
