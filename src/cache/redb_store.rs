//! `redb`-backed [`CheckStore`].
//!
//! One table keyed by `(entry key, field name)`. Reads run in a single read
//! transaction and writes in a single write transaction, so an entry is
//! always observed whole. redb is synchronous; calls run on the blocking
//! pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};

use super::store::{CheckStore, FieldMap, StoreError};

const CHECKS: TableDefinition<(&str, &str), &str> = TableDefinition::new("previous_checks");

/// Embedded database store, opened once per process.
#[derive(Clone)]
pub struct RedbCheckStore {
    db: Arc<Database>,
}

impl RedbCheckStore {
    /// Open (or create) the database file and make sure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(redb::Error::from)?;

        let txn = db.begin_write().map_err(redb::Error::from)?;
        {
            txn.open_table(CHECKS).map_err(redb::Error::from)?;
        }
        txn.commit().map_err(redb::Error::from)?;

        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl CheckStore for RedbCheckStore {
    async fn read_entry(&self, key: &str) -> Result<FieldMap, StoreError> {
        let db = self.db.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
            let txn = db.begin_read().map_err(redb::Error::from)?;
            let table = txn.open_table(CHECKS).map_err(redb::Error::from)?;
            read_fields(&table, &key)
        })
        .await?
    }

    async fn write_entry(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let db = self.db.clone();
        let key = key.to_string();
        let fields = fields.clone();

        tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
            let txn = db.begin_write().map_err(redb::Error::from)?;
            {
                let mut table = txn.open_table(CHECKS).map_err(redb::Error::from)?;
                let previous = read_fields(&table, &key)?;
                for name in previous.keys() {
                    table
                        .remove((key.as_str(), name.as_str()))
                        .map_err(redb::Error::from)?;
                }
                for (name, value) in &fields {
                    table
                        .insert((key.as_str(), name.as_str()), value.as_str())
                        .map_err(redb::Error::from)?;
                }
            }
            txn.commit().map_err(redb::Error::from)?;
            Ok(())
        })
        .await?
    }
}

fn read_fields(
    table: &impl ReadableTable<(&'static str, &'static str), &'static str>,
    key: &str,
) -> Result<FieldMap, StoreError> {
    let mut fields = FieldMap::new();
    for item in table.range((key, "")..).map_err(redb::Error::from)? {
        let (stored_key, value) = item.map_err(redb::Error::from)?;
        let (entry, field) = stored_key.value();
        if entry != key {
            break;
        }
        fields.insert(field.to_string(), value.value().to_string());
    }
    Ok(fields)
}
