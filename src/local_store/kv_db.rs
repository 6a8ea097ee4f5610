//! This module provides a key-value database abstraction using the `sled` library.
//!
//! It defines traits for schema types and database operations, and implements these
//! traits for a disk-based key-value database. Values are stored as JSON so a stored
//! collection stays readable with ordinary tooling.
//!
//! # Traits
//!
//! - `SchemaType`: Represents a schema type with a static keyspace name.
//! - `KvDbOps`: Defines operations for a key-value database.
//!
//! # Structs
//!
//! - `DiskBasedDb`: Represents a disk-based key-value database and implements `KvDbOps`.

use crate::error::Result;
use log::{debug, info};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

#[cfg(test)]
use mockall::automock;

/// A trait representing a schema type with a static keyspace name.
pub trait SchemaType {
    const KEYSPACE_NAME: &'static str;
}

/// A trait defining operations for a key-value database.
#[cfg_attr(test, automock)]
pub trait KvDbOps: Send + Sync + 'static {
    /// Adds an item to the database, unless the key already holds a value.
    ///
    /// # Returns
    ///
    /// `true` if the item was written, `false` if the key was already taken.
    fn add<ItemType>(&self, key: &str, data: &ItemType) -> Result<bool>
    where
        ItemType: Serialize + SchemaType + 'static;

    /// Reads an item from the database.
    ///
    /// # Returns
    ///
    /// An `Option` containing the item if found, or `None` if not found.
    /// A stored value that does not decode as `ItemType` is an error.
    fn read<ItemType>(&self, key: &str) -> Result<Option<ItemType>>
    where
        ItemType: DeserializeOwned + SchemaType + 'static;

    /// Writes an item to the database, replacing any previous value.
    fn update<ItemType>(&self, key: &str, data: &ItemType) -> Result<()>
    where
        ItemType: Serialize + SchemaType + 'static;
}

/// A struct representing a disk-based key-value database.
pub struct DiskBasedDb {
    db: sled::Db,
}

impl DiskBasedDb {
    /// Opens a disk-based database from the given path.
    pub fn open_from<P: AsRef<Path>>(path: P) -> Result<DiskBasedDb> {
        let db = sled::open(path)?;
        info!("Database opened");
        Ok(DiskBasedDb { db })
    }

    /// Opens a database that lives only as long as the returned handle.
    pub fn open_temporary() -> Result<DiskBasedDb> {
        let db = sled::Config::new().temporary(true).open()?;
        info!("Temporary database opened");
        Ok(DiskBasedDb { db })
    }

    #[cfg(test)]
    pub(crate) fn write_raw(
        &self, keyspace: &str, key: &str, bytes: &[u8],
    ) -> Result<()> {
        self.db.open_tree(keyspace)?.insert(key, bytes)?;
        Ok(())
    }
}

impl KvDbOps for DiskBasedDb {
    fn add<ItemType>(&self, key: &str, data: &ItemType) -> Result<bool>
    where
        ItemType: Serialize + SchemaType,
    {
        let tree = self.db.open_tree(ItemType::KEYSPACE_NAME)?;
        let serialized = serde_json::to_vec(data)?;
        let written = tree
            .compare_and_swap(key, None as Option<&[u8]>, Some(serialized))?
            .is_ok();
        if written {
            tree.flush()?;
            info!(
                "Added item with key: {} to keyspace: {}",
                key,
                ItemType::KEYSPACE_NAME
            );
        } else {
            debug!(
                "Key: {} already present in keyspace: {}",
                key,
                ItemType::KEYSPACE_NAME
            );
        }
        Ok(written)
    }

    fn read<ItemType>(&self, key: &str) -> Result<Option<ItemType>>
    where
        ItemType: DeserializeOwned + SchemaType,
    {
        let tree = self.db.open_tree(ItemType::KEYSPACE_NAME)?;
        if let Some(data) = tree.get(key)? {
            let item: ItemType = serde_json::from_slice(&data)?;
            debug!(
                "Read item with key: {} from keyspace: {}",
                key,
                ItemType::KEYSPACE_NAME
            );
            return Ok(Some(item));
        }
        debug!(
            "Item with key: {} not found in keyspace: {}",
            key,
            ItemType::KEYSPACE_NAME
        );
        Ok(None)
    }

    fn update<ItemType>(&self, key: &str, data: &ItemType) -> Result<()>
    where
        ItemType: Serialize + SchemaType,
    {
        let tree = self.db.open_tree(ItemType::KEYSPACE_NAME)?;
        let serialized = serde_json::to_vec(data)?;
        tree.insert(key, serialized)?;
        tree.flush()?;
        debug!(
            "Updated item with key: {} in keyspace: {}",
            key,
            ItemType::KEYSPACE_NAME
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        value: u32,
    }

    impl SchemaType for Sample {
        const KEYSPACE_NAME: &'static str = "samples";
    }

    #[test]
    fn test_read_missing_key() {
        let db = DiskBasedDb::open_temporary().unwrap();
        assert_eq!(db.read::<Sample>("missing").unwrap(), None);
    }

    #[test]
    fn test_add_does_not_overwrite() {
        let db = DiskBasedDb::open_temporary().unwrap();
        assert!(db.add("k", &Sample { value: 1 }).unwrap());
        assert!(!db.add("k", &Sample { value: 2 }).unwrap());
        assert_eq!(db.read::<Sample>("k").unwrap(), Some(Sample { value: 1 }));
    }

    #[test]
    fn test_update_replaces() {
        let db = DiskBasedDb::open_temporary().unwrap();
        db.update("k", &Sample { value: 1 }).unwrap();
        db.update("k", &Sample { value: 5 }).unwrap();
        assert_eq!(db.read::<Sample>("k").unwrap(), Some(Sample { value: 5 }));
    }

    #[test]
    fn test_read_undecodable_value_is_error() {
        let db = DiskBasedDb::open_temporary().unwrap();
        db.write_raw(Sample::KEYSPACE_NAME, "k", b"not json").unwrap();
        let err = db.read::<Sample>("k").unwrap_err();
        assert!(err.downcast_ref::<serde_json::Error>().is_some());
    }
}
