//! redb-backed durable store with change notification
//!
//! # Collections
//!
//! One redb table per named collection, JSON-serialized records keyed
//! by a UUID string. `orders` and `cash_sessions` are written by this
//! core; the rest is reference data maintained by the back office.
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`: once `commit()` returns
//! the record survives power loss, and the file is always in a
//! consistent state. Terminals are edge devices that get unplugged.
//!
//! # Change feed
//!
//! Every committed write broadcasts a [`ChangeEvent`] naming the
//! collection and record id. Subscribers re-read whatever they care
//! about; the event carries no payload on purpose, so a lagging
//! receiver can only ever be stale, never wrong.

mod live;

pub use live::LiveQuery;

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::broadcast;

use shared::util::new_id;

use crate::config::Config;

/// Named collections this store serves
pub mod collections {
    pub const TABLES: &str = "tables";
    pub const PRODUCTS: &str = "products";
    pub const CATEGORIES: &str = "categories";
    pub const ORDERS: &str = "orders";
    pub const CASH_SESSIONS: &str = "cash_sessions";
    pub const CUSTOMERS: &str = "customers";
    pub const EMPLOYEES: &str = "employees";
    pub const SETTINGS: &str = "settings";

    pub const ALL: &[&str] = &[
        TABLES,
        PRODUCTS,
        CATEGORIES,
        ORDERS,
        CASH_SESSIONS,
        CUSTOMERS,
        EMPLOYEES,
        SETTINGS,
    ];
}

/// Confirmation phrase required by [`DataStore::wipe_all`]
pub const WIPE_CONFIRMATION: &str = "EFFACER TOUT";

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

fn table_def(collection: &'static str) -> TableDefinition<'static, &'static str, &'static [u8]> {
    TableDefinition::new(collection)
}

/// A committed write. `id` is `"*"` for whole-collection operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: &'static str,
    pub id: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record must serialize to a JSON object")]
    NotAnObject,

    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: &'static str, id: String },

    #[error("Conflicting record already exists in {0}")]
    Conflict(&'static str),

    #[error("Wipe rejected: confirmation phrase mismatch")]
    BadConfirmation,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable record store shared by every terminal on the device.
///
/// All methods run synchronously; redb transactions are short and
/// local. Clones share the same database and change feed.
#[derive(Clone)]
pub struct DataStore {
    db: Arc<Database>,
    change_tx: broadcast::Sender<ChangeEvent>,
}

impl DataStore {
    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open at the configured data directory, creating it if needed.
    pub fn open_default(config: &Config) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        Self::open(config.store_path())
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        // Create every collection table up front so reads never race
        // table creation.
        let txn = db.begin_write()?;
        for collection in collections::ALL {
            let _ = txn.open_table(table_def(collection))?;
        }
        txn.commit()?;

        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            db: Arc::new(db),
            change_tx,
        })
    }

    /// Subscribe to the change feed. Only events committed after this
    /// call are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.change_tx.subscribe()
    }

    fn notify(&self, collection: &'static str, id: &str) {
        let event = ChangeEvent {
            collection,
            id: id.to_string(),
        };
        if self.change_tx.send(event).is_err() {
            tracing::trace!(collection, id, "Change event dropped, no subscribers");
        }
    }

    /// Serialize a record and force its `id` field to the storage key,
    /// so the document always carries its own identity.
    fn encode_with_id<T: Serialize>(record: &T, id: &str) -> StoreResult<Vec<u8>> {
        let mut value = serde_json::to_value(record)?;
        let Some(map) = value.as_object_mut() else {
            return Err(StoreError::NotAnObject);
        };
        map.insert("id".to_string(), serde_json::Value::String(id.to_string()));
        Ok(serde_json::to_vec(&value)?)
    }

    /// Insert a record under a freshly generated id. Returns the id.
    pub fn create<T: Serialize>(&self, collection: &'static str, record: &T) -> StoreResult<String> {
        let id = new_id();
        let value = Self::encode_with_id(record, &id)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table_def(collection))?;
            table.insert(id.as_str(), value.as_slice())?;
        }
        txn.commit()?;

        self.notify(collection, &id);
        Ok(id)
    }

    /// Full-snapshot overwrite. Last writer wins; there is no version
    /// check by design.
    pub fn put<T: Serialize>(
        &self,
        collection: &'static str,
        id: &str,
        record: &T,
    ) -> StoreResult<()> {
        let value = Self::encode_with_id(record, id)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table_def(collection))?;
            table.insert(id, value.as_slice())?;
        }
        txn.commit()?;

        self.notify(collection, id);
        Ok(())
    }

    /// Merge top-level fields of `patch` into an existing record,
    /// atomically. Fields absent from the patch are untouched.
    pub fn merge(
        &self,
        collection: &'static str,
        id: &str,
        patch: serde_json::Value,
    ) -> StoreResult<()> {
        let Some(patch) = patch.as_object() else {
            return Err(StoreError::NotAnObject);
        };

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table_def(collection))?;
            let existing = match table.get(id)? {
                Some(guard) => guard.value().to_vec(),
                None => {
                    return Err(StoreError::NotFound {
                        collection,
                        id: id.to_string(),
                    });
                }
            };

            let mut value: serde_json::Value = serde_json::from_slice(&existing)?;
            let Some(map) = value.as_object_mut() else {
                return Err(StoreError::NotAnObject);
            };
            for (key, field) in patch {
                map.insert(key.clone(), field.clone());
            }
            // Identity is the storage key, never patchable.
            map.insert("id".to_string(), serde_json::Value::String(id.to_string()));

            let merged = serde_json::to_vec(&value)?;
            table.insert(id, merged.as_slice())?;
        }
        txn.commit()?;

        self.notify(collection, id);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        collection: &'static str,
        id: &str,
    ) -> StoreResult<Option<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table_def(collection))?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Remove a record. Removing an absent id is a no-op.
    pub fn delete(&self, collection: &'static str, id: &str) -> StoreResult<()> {
        let removed;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table_def(collection))?;
            removed = table.remove(id)?.is_some();
        }
        txn.commit()?;

        if removed {
            self.notify(collection, id);
        }
        Ok(())
    }

    pub fn list<T: DeserializeOwned>(&self, collection: &'static str) -> StoreResult<Vec<T>> {
        self.query(collection, |_| true)
    }

    /// All records matching `filter`, in key order.
    pub fn query<T, F>(&self, collection: &'static str, filter: F) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table_def(collection))?;

        let mut records = Vec::new();
        for row in table.iter()? {
            let (_key, value) = row?;
            let record: T = serde_json::from_slice(value.value())?;
            if filter(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Conditional create inside one write transaction: scans the
    /// collection and aborts with [`StoreError::Conflict`] if any
    /// existing record matches `conflict`. This is how singleton
    /// constraints (one open cash session) are enforced at the store,
    /// not by check-then-act at the caller.
    pub fn create_unique<T, F>(
        &self,
        collection: &'static str,
        record: &T,
        conflict: F,
    ) -> StoreResult<String>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let id = new_id();
        let value = Self::encode_with_id(record, &id)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table_def(collection))?;

            let rows: Vec<Vec<u8>> = table
                .iter()?
                .map(|row| row.map(|(_k, v)| v.value().to_vec()))
                .collect::<Result<_, _>>()?;
            for row in &rows {
                let existing: T = serde_json::from_slice(row)?;
                if conflict(&existing) {
                    // Dropping the transaction without commit aborts it.
                    return Err(StoreError::Conflict(collection));
                }
            }

            table.insert(id.as_str(), value.as_slice())?;
        }
        txn.commit()?;

        self.notify(collection, &id);
        Ok(id)
    }

    /// Clear every collection. Gated on the literal confirmation
    /// phrase; anything else is rejected before touching data.
    pub fn wipe_all(&self, confirmation: &str) -> StoreResult<()> {
        if confirmation != WIPE_CONFIRMATION {
            tracing::warn!("Wipe attempted with wrong confirmation phrase");
            return Err(StoreError::BadConfirmation);
        }

        let txn = self.db.begin_write()?;
        for collection in collections::ALL {
            txn.delete_table(table_def(collection))?;
            let _ = txn.open_table(table_def(collection))?;
        }
        txn.commit()?;

        tracing::info!("All collections wiped");
        for collection in collections::ALL {
            self.notify(collection, "*");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        #[serde(default)]
        id: Option<String>,
        name: String,
        count: i64,
    }

    fn doc(name: &str, count: i64) -> Doc {
        Doc {
            id: None,
            name: name.to_string(),
            count,
        }
    }

    #[test]
    fn create_assigns_and_stores_id() {
        let store = DataStore::open_in_memory().unwrap();
        let id = store.create(collections::PRODUCTS, &doc("cafe", 1)).unwrap();

        let loaded: Doc = store.get(collections::PRODUCTS, &id).unwrap().unwrap();
        assert_eq!(loaded.id.as_deref(), Some(id.as_str()));
        assert_eq!(loaded.name, "cafe");
    }

    #[test]
    fn put_overwrites_whole_record() {
        let store = DataStore::open_in_memory().unwrap();
        let id = store.create(collections::PRODUCTS, &doc("cafe", 1)).unwrap();

        store
            .put(collections::PRODUCTS, &id, &doc("cortado", 2))
            .unwrap();
        let loaded: Doc = store.get(collections::PRODUCTS, &id).unwrap().unwrap();
        assert_eq!(loaded.name, "cortado");
        assert_eq!(loaded.count, 2);
    }

    #[test]
    fn merge_touches_only_named_fields() {
        let store = DataStore::open_in_memory().unwrap();
        let id = store.create(collections::PRODUCTS, &doc("cafe", 1)).unwrap();

        store
            .merge(
                collections::PRODUCTS,
                &id,
                serde_json::json!({"count": 7, "id": "spoofed"}),
            )
            .unwrap();

        let loaded: Doc = store.get(collections::PRODUCTS, &id).unwrap().unwrap();
        assert_eq!(loaded.name, "cafe");
        assert_eq!(loaded.count, 7);
        // id stays the storage key even when the patch tries to change it
        assert_eq!(loaded.id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn merge_missing_record_is_not_found() {
        let store = DataStore::open_in_memory().unwrap();
        let err = store
            .merge(collections::PRODUCTS, "nope", serde_json::json!({"count": 1}))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn query_filters_records() {
        let store = DataStore::open_in_memory().unwrap();
        store.create(collections::PRODUCTS, &doc("a", 1)).unwrap();
        store.create(collections::PRODUCTS, &doc("b", 2)).unwrap();
        store.create(collections::PRODUCTS, &doc("c", 3)).unwrap();

        let big: Vec<Doc> = store.query(collections::PRODUCTS, |d: &Doc| d.count >= 2).unwrap();
        assert_eq!(big.len(), 2);
        let all: Vec<Doc> = store.list(collections::PRODUCTS).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = DataStore::open_in_memory().unwrap();
        let id = store.create(collections::PRODUCTS, &doc("a", 1)).unwrap();
        store.delete(collections::PRODUCTS, &id).unwrap();
        store.delete(collections::PRODUCTS, &id).unwrap();
        assert!(store.get::<Doc>(collections::PRODUCTS, &id).unwrap().is_none());
    }

    #[test]
    fn create_unique_rejects_conflicts() {
        let store = DataStore::open_in_memory().unwrap();
        store
            .create_unique(collections::CASH_SESSIONS, &doc("open", 1), |d: &Doc| {
                d.name == "open"
            })
            .unwrap();

        let err = store
            .create_unique(collections::CASH_SESSIONS, &doc("open", 2), |d: &Doc| {
                d.name == "open"
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // The losing attempt must leave nothing behind.
        let all: Vec<Doc> = store.list(collections::CASH_SESSIONS).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn writes_broadcast_change_events() {
        let store = DataStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();

        let id = store.create(collections::ORDERS, &doc("a", 1)).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.collection, collections::ORDERS);
        assert_eq!(event.id, id);

        store.delete(collections::ORDERS, &id).unwrap();
        assert_eq!(rx.try_recv().unwrap().id, id);

        // Deleting again commits nothing and must not notify.
        store.delete(collections::ORDERS, &id).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn wipe_requires_exact_phrase() {
        let store = DataStore::open_in_memory().unwrap();
        let id = store.create(collections::PRODUCTS, &doc("a", 1)).unwrap();

        let err = store.wipe_all("effacer tout").unwrap_err();
        assert!(matches!(err, StoreError::BadConfirmation));
        assert!(store.get::<Doc>(collections::PRODUCTS, &id).unwrap().is_some());

        store.wipe_all(WIPE_CONFIRMATION).unwrap();
        assert!(store.get::<Doc>(collections::PRODUCTS, &id).unwrap().is_none());
        assert!(store.list::<Doc>(collections::ORDERS).unwrap().is_empty());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pos.redb");

        let id = {
            let store = DataStore::open(&path).unwrap();
            store.create(collections::PRODUCTS, &doc("cafe", 1)).unwrap()
        };

        let store = DataStore::open(&path).unwrap();
        let loaded: Doc = store.get(collections::PRODUCTS, &id).unwrap().unwrap();
        assert_eq!(loaded.name, "cafe");
    }
}
