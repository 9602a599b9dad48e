//! In-memory store backend using the papaya lock-free HashMap.
//!
//! Reads are lock-free; writes serialize on a single gate so that the
//! version compare-and-swap in `replace` is atomic. Transactions apply
//! writes eagerly and keep per-key snapshots for rollback, newest first.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::StorageError;
use crate::query::{lookup, Query, QueryFilter, QueryResult};
use crate::traits::{ChartStore, StoreTransaction};
use crate::types::{EntityKind, StoredEntity};

fn make_key(kind: EntityKind, id: &str) -> String {
    format!("{kind}/{id}")
}

/// In-memory `ChartStore` backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Arc<PapayaHashMap<String, StoredEntity>>,
    write_gate: Arc<Mutex<()>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    fn create_inner(
        data: &PapayaHashMap<String, StoredEntity>,
        kind: EntityKind,
        id: &str,
        body: Value,
    ) -> Result<StoredEntity, StorageError> {
        let key = make_key(kind, id);
        let guard = data.pin();
        if guard.get(&key).is_some() {
            return Err(StorageError::already_exists(kind.as_str(), id));
        }
        let entity = StoredEntity::new(id, kind, body);
        guard.insert(key, entity.clone());
        Ok(entity)
    }

    fn replace_inner(
        data: &PapayaHashMap<String, StoredEntity>,
        kind: EntityKind,
        id: &str,
        body: Value,
        expected_version: u64,
    ) -> Result<(StoredEntity, StoredEntity), StorageError> {
        let key = make_key(kind, id);
        let guard = data.pin();
        let existing = guard
            .get(&key)
            .ok_or_else(|| StorageError::not_found(kind.as_str(), id))?
            .clone();
        if existing.version != expected_version {
            return Err(StorageError::version_conflict(
                kind.as_str(),
                id,
                expected_version,
                existing.version,
            ));
        }
        let next = existing.next_version(body);
        guard.insert(key, next.clone());
        Ok((existing, next))
    }

    fn delete_inner(
        data: &PapayaHashMap<String, StoredEntity>,
        kind: EntityKind,
        id: &str,
    ) -> Result<StoredEntity, StorageError> {
        let key = make_key(kind, id);
        let guard = data.pin();
        let existing = guard
            .get(&key)
            .ok_or_else(|| StorageError::not_found(kind.as_str(), id))?
            .clone();
        guard.remove(&key);
        Ok(existing)
    }

    fn sort_entities(entities: &mut [StoredEntity], field: &str, descending: bool) {
        entities.sort_by(|a, b| {
            let ord = compare_fields(lookup(&a.body, field), lookup(&b.body, field));
            if descending { ord.reverse() } else { ord }
        });
    }
}

/// Compare two optional JSON values: numbers numerically, everything else
/// as strings; missing values sort last.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => {
                let a = a.as_str().map(str::to_string).unwrap_or_else(|| a.to_string());
                let b = b.as_str().map(str::to_string).unwrap_or_else(|| b.to_string());
                a.cmp(&b)
            }
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl ChartStore for InMemoryStore {
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<StoredEntity>, StorageError> {
        let key = make_key(kind, id);
        let guard = self.data.pin();
        Ok(guard.get(&key).cloned())
    }

    async fn create(
        &self,
        kind: EntityKind,
        id: &str,
        body: Value,
    ) -> Result<StoredEntity, StorageError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| StorageError::internal("write gate poisoned"))?;
        Self::create_inner(&self.data, kind, id, body)
    }

    async fn replace(
        &self,
        kind: EntityKind,
        id: &str,
        body: Value,
        expected_version: u64,
    ) -> Result<StoredEntity, StorageError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| StorageError::internal("write gate poisoned"))?;
        Self::replace_inner(&self.data, kind, id, body, expected_version).map(|(_, next)| next)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), StorageError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| StorageError::internal("write gate poisoned"))?;
        Self::delete_inner(&self.data, kind, id).map(|_| ())
    }

    async fn query(&self, query: &Query) -> Result<QueryResult, StorageError> {
        let prefix = format!("{}/", query.kind);
        let guard = self.data.pin();
        let mut matching: Vec<StoredEntity> = guard
            .iter()
            .filter(|(key, entity)| key.starts_with(&prefix) && query.matches(entity))
            .map(|(_, entity)| entity.clone())
            .collect();

        if let Some(field) = &query.sort_field {
            Self::sort_entities(&mut matching, field, query.sort_descending);
        }

        let total = matching.len();
        let page: Vec<StoredEntity> = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(QueryResult::new(total, page, query.offset, query.limit))
    }

    async fn count(
        &self,
        kind: EntityKind,
        filters: &[QueryFilter],
    ) -> Result<usize, StorageError> {
        let prefix = format!("{kind}/");
        let guard = self.data.pin();
        Ok(guard
            .iter()
            .filter(|(key, entity)| {
                key.starts_with(&prefix) && filters.iter().all(|f| f.matches(&entity.body))
            })
            .count())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        Ok(Box::new(MemoryTransaction {
            data: Arc::clone(&self.data),
            write_gate: Arc::clone(&self.write_gate),
            undo: Vec::new(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Undo snapshot: the stored value before a transactional write, `None`
/// when the key did not exist.
type UndoEntry = (String, Option<StoredEntity>);

pub struct MemoryTransaction {
    data: Arc<PapayaHashMap<String, StoredEntity>>,
    write_gate: Arc<Mutex<()>>,
    undo: Vec<UndoEntry>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        debug!(writes = self.undo.len(), "transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| StorageError::internal("write gate poisoned"))?;
        let guard = self.data.pin();
        for (key, snapshot) in self.undo.iter().rev() {
            match snapshot {
                Some(entity) => {
                    guard.insert(key.clone(), entity.clone());
                }
                None => {
                    guard.remove(key);
                }
            }
        }
        debug!(writes = self.undo.len(), "transaction rolled back");
        Ok(())
    }

    async fn create(
        &mut self,
        kind: EntityKind,
        id: &str,
        body: Value,
    ) -> Result<StoredEntity, StorageError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| StorageError::internal("write gate poisoned"))?;
        let entity = InMemoryStore::create_inner(&self.data, kind, id, body)?;
        self.undo.push((make_key(kind, id), None));
        Ok(entity)
    }

    async fn replace(
        &mut self,
        kind: EntityKind,
        id: &str,
        body: Value,
        expected_version: u64,
    ) -> Result<StoredEntity, StorageError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| StorageError::internal("write gate poisoned"))?;
        let (old, next) =
            InMemoryStore::replace_inner(&self.data, kind, id, body, expected_version)?;
        self.undo.push((make_key(kind, id), Some(old)));
        Ok(next)
    }

    async fn delete(&mut self, kind: EntityKind, id: &str) -> Result<(), StorageError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| StorageError::internal("write gate poisoned"))?;
        let old = InMemoryStore::delete_inner(&self.data, kind, id)?;
        self.undo.push((make_key(kind, id), Some(old)));
        Ok(())
    }

    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<StoredEntity>, StorageError> {
        let key = make_key(kind, id);
        let guard = self.data.pin();
        Ok(guard.get(&key).cloned())
    }
}
