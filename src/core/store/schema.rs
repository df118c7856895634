//! Default inventory schema

use tracing::debug;

use super::{SqliteStore, StoreError};

/// Declared field types of user columns. Every user column is stored as
/// TEXT so values keep the exact text they were imported with.
pub(super) const FIELD_TYPES_TABLE: &str = "ait_field_types";

impl SqliteStore {
    /// Create the field type registry if it does not exist yet
    pub(super) fn init_registry(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                table_name TEXT NOT NULL,
                column_name TEXT NOT NULL,
                field_type TEXT NOT NULL,
                PRIMARY KEY (table_name, column_name)
            );",
            FIELD_TYPES_TABLE
        ))?;
        Ok(())
    }

    /// Create the default device tables if they do not exist yet
    pub fn init_schema(&self) -> Result<(), StoreError> {
        debug!("initializing default inventory schema");
        self.conn.execute_batch(
            r#"
            -- Workstations, laptops and servers
            CREATE TABLE IF NOT EXISTS Computers (
                AssetName TEXT PRIMARY KEY,
                AssetTag TEXT,
                SerialNumber TEXT,
                Manufacturer TEXT,
                Model TEXT,
                OS TEXT,
                AssignedUser TEXT,
                Location TEXT,
                PurchaseDate TEXT,
                PurchaseCost TEXT
            );

            -- Routers, switches and access points
            CREATE TABLE IF NOT EXISTS Routers (
                AssetName TEXT PRIMARY KEY,
                AssetTag TEXT,
                SerialNumber TEXT,
                Manufacturer TEXT,
                Model TEXT,
                IPAddress TEXT,
                MACAddress TEXT,
                Location TEXT,
                FirmwareVersion TEXT
            );

            INSERT OR IGNORE INTO ait_field_types (table_name, column_name, field_type)
                VALUES ('Computers', 'PurchaseDate', 'date');
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Storage;

    #[test]
    fn test_init_schema_creates_device_tables() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();

        let tables = store.tables().unwrap();
        assert_eq!(tables, vec!["Computers".to_string(), "Routers".to_string()]);
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store.init_schema().unwrap();

        assert_eq!(store.columns("Computers").unwrap().len(), 10);
    }

    #[test]
    fn test_registry_is_not_listed_as_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();

        let tables = store.tables().unwrap();
        assert!(!tables.iter().any(|t| t == FIELD_TYPES_TABLE));
    }
}
