//! Storage operations for the SQLite store

use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::debug;

use super::schema::FIELD_TYPES_TABLE;
use super::{quote_ident, Column, FieldType, Record, SqliteStore, Storage, StoreError};

impl Storage for SqliteStore {
    fn tables(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ?1 \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map(params![FIELD_TYPES_TABLE], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>, StoreError> {
        let sql = format!(
            "SELECT p.name, p.type, r.field_type \
             FROM pragma_table_info(?1) AS p \
             LEFT JOIN {} AS r ON r.table_name = ?1 AND r.column_name = p.name \
             ORDER BY p.cid",
            FIELD_TYPES_TABLE
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let columns = stmt
            .query_map(params![table], |row| {
                let name: String = row.get(0)?;
                let declared: String = row.get(1)?;
                let registered: Option<String> = row.get(2)?;
                // Tables created outside ait have no registry rows
                let field_type = registered
                    .and_then(|t| t.parse().ok())
                    .unwrap_or_else(|| FieldType::from_declared(&declared));
                Ok(Column::new(name, field_type))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        Ok(columns)
    }

    fn add_column(
        &mut self,
        table: &str,
        name: &str,
        field_type: FieldType,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT",
            quote_ident(table)?,
            quote_ident(name)?
        );
        debug!(table, column = name, %field_type, "adding column");

        let tx = self.conn.transaction()?;
        tx.execute(&sql, [])?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (table_name, column_name, field_type) VALUES (?1, ?2, ?3)",
                FIELD_TYPES_TABLE
            ),
            params![table, name, field_type.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn fetch(
        &self,
        table: &str,
        key_field: &str,
        key: &str,
    ) -> Result<Option<Record>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 LIMIT 1",
            quote_ident(table)?,
            quote_ident(key_field)?
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let record = stmt
            .query_row(params![key], |row| {
                let mut record = Record::new();
                for (idx, name) in names.iter().enumerate() {
                    let value = match row.get_ref(idx)? {
                        ValueRef::Null => None,
                        ValueRef::Integer(i) => Some(i.to_string()),
                        ValueRef::Real(f) => Some(f.to_string()),
                        ValueRef::Text(t) | ValueRef::Blob(t) => {
                            Some(String::from_utf8_lossy(t).into_owned())
                        }
                    };
                    record.insert(name.clone(), value);
                }
                Ok(record)
            })
            .optional()?;
        Ok(record)
    }

    fn insert(&mut self, table: &str, values: &Record) -> Result<(), StoreError> {
        let columns = values
            .keys()
            .map(|name| quote_ident(name))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table)?,
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(values.values()))?;
        Ok(())
    }

    fn update(
        &mut self,
        table: &str,
        key_field: &str,
        key: &str,
        values: &Record,
    ) -> Result<usize, StoreError> {
        let assignments = values
            .keys()
            .enumerate()
            .map(|(i, name)| Ok(format!("{} = ?{}", quote_ident(name)?, i + 1)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(table)?,
            assignments.join(", "),
            quote_ident(key_field)?,
            values.len() + 1
        );

        let mut bound: Vec<Option<&str>> = values.values().map(|v| v.as_deref()).collect();
        bound.push(Some(key));
        let changed = self.conn.execute(&sql, params_from_iter(bound))?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    fn record(pairs: &[(&str, Option<&str>)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(String::from)))
            .collect()
    }

    #[test]
    fn test_columns_report_declared_types() {
        let store = store();
        let columns = store.columns("Computers").unwrap();

        assert_eq!(columns[0], Column::new("AssetName", FieldType::Text));
        let purchase = columns.iter().find(|c| c.name == "PurchaseDate").unwrap();
        assert_eq!(purchase.field_type, FieldType::Date);
    }

    #[test]
    fn test_columns_unknown_table() {
        let store = store();
        let err = store.columns("Printers").unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable(t) if t == "Printers"));
    }

    #[test]
    fn test_insert_and_fetch() {
        let mut store = store();
        store
            .insert(
                "Computers",
                &record(&[("AssetName", Some("PC1")), ("OS", Some("Win10")), ("Model", None)]),
            )
            .unwrap();

        let fetched = store.fetch("Computers", "AssetName", "PC1").unwrap().unwrap();
        assert_eq!(fetched.get("OS"), Some(&Some("Win10".to_string())));
        assert_eq!(fetched.get("Model"), Some(&None));
        assert_eq!(fetched.len(), 10);

        assert!(store.fetch("Computers", "AssetName", "PC2").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_key_fails() {
        let mut store = store();
        let row = record(&[("AssetName", Some("PC1"))]);
        store.insert("Computers", &row).unwrap();

        let err = store.insert("Computers", &row).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn test_update_by_key() {
        let mut store = store();
        store
            .insert("Computers", &record(&[("AssetName", Some("PC1")), ("OS", Some("Win10"))]))
            .unwrap();

        let changed = store
            .update(
                "Computers",
                "AssetName",
                "PC1",
                &record(&[("AssetName", Some("PC1")), ("OS", Some("Win11"))]),
            )
            .unwrap();
        assert_eq!(changed, 1);

        let fetched = store.fetch("Computers", "AssetName", "PC1").unwrap().unwrap();
        assert_eq!(fetched.get("OS"), Some(&Some("Win11".to_string())));

        let missing = store
            .update("Computers", "AssetName", "PC9", &record(&[("OS", Some("Win11"))]))
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_add_column_with_spaces() {
        let mut store = store();
        store
            .add_column("Computers", "Warranty End", FieldType::Date)
            .unwrap();

        let columns = store.columns("Computers").unwrap();
        let added = columns.last().unwrap();
        assert_eq!(added, &Column::new("Warranty End", FieldType::Date));
    }

    #[test]
    fn test_typed_columns_keep_text_verbatim() {
        let mut store = store();
        store.add_column("Computers", "Ram", FieldType::Integer).unwrap();
        store.add_column("Computers", "Managed", FieldType::Boolean).unwrap();
        store
            .insert(
                "Computers",
                &record(&[
                    ("AssetName", Some("PC1")),
                    ("Ram", Some("16.0")),
                    ("PurchaseDate", Some("2024.10")),
                    ("Model", Some("007")),
                    ("Managed", Some("1.0")),
                ]),
            )
            .unwrap();

        let fetched = store.fetch("Computers", "AssetName", "PC1").unwrap().unwrap();
        assert_eq!(fetched["Ram"], Some("16.0".to_string()));
        assert_eq!(fetched["PurchaseDate"], Some("2024.10".to_string()));
        assert_eq!(fetched["Model"], Some("007".to_string()));
        assert_eq!(fetched["Managed"], Some("1.0".to_string()));

        let columns = store.columns("Computers").unwrap();
        assert!(columns.contains(&Column::new("Ram", FieldType::Integer)));
        assert!(columns.contains(&Column::new("Managed", FieldType::Boolean)));
    }

    #[test]
    fn test_columns_fall_back_to_declared_type() {
        let store = store();
        store
            .execute_batch("CREATE TABLE Printers (AssetName TEXT PRIMARY KEY, PageCount INTEGER);")
            .unwrap();

        let columns = store.columns("Printers").unwrap();
        assert_eq!(columns[1], Column::new("PageCount", FieldType::Integer));
    }

    #[test]
    fn test_values_are_bound_not_interpolated() {
        let mut store = store();
        let hostile = "x'); DROP TABLE Computers; --";
        store
            .insert("Computers", &record(&[("AssetName", Some(hostile))]))
            .unwrap();

        assert!(store.fetch("Computers", "AssetName", hostile).unwrap().is_some());
        assert!(store.tables().unwrap().contains(&"Computers".to_string()));
    }
}
