use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use shipdash_schema::Value;

use crate::error::StoreError;

/// Column every persisted row carries for run traceability.
pub const RUN_ID_COLUMN: &str = "pipeline_run_id";

// ---------------------------------------------------------------------------
// Table layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
}

impl ColumnKind {
    fn sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// Static layout of one result table. The run id column is appended
/// automatically and is not listed here.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
}

impl TableSpec {
    fn create_sql(&self) -> String {
        let mut cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.kind.sql()))
            .collect();
        cols.push(format!("{RUN_ID_COLUMN} TEXT NOT NULL"));
        format!("CREATE TABLE {} ({})", self.name, cols.join(", "))
    }

    fn insert_sql(&self) -> String {
        let names: Vec<&str> = self
            .columns
            .iter()
            .map(|c| c.name)
            .chain([RUN_ID_COLUMN])
            .collect();
        let placeholders: Vec<String> =
            (1..=names.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            names.join(", "),
            placeholders.join(", ")
        )
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct TableStore {
    conn: Connection,
}

impl TableStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Replace the table's contents with `rows` in a single transaction,
    /// tagging every row with `run_id`. On any error the prior contents
    /// remain unchanged.
    pub fn replace_table(
        &mut self,
        spec: &TableSpec,
        rows: &[Vec<Value>],
        run_id: &str,
    ) -> Result<usize, StoreError> {
        let write_err = |message: String| StoreError::Write {
            table: spec.name.to_string(),
            message,
        };

        for (i, row) in rows.iter().enumerate() {
            if row.len() != spec.columns.len() {
                return Err(write_err(format!(
                    "row {i} has {} values, table has {} columns",
                    row.len(),
                    spec.columns.len()
                )));
            }
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| write_err(e.to_string()))?;

        tx.execute(&format!("DROP TABLE IF EXISTS {}", spec.name), [])
            .map_err(|e| write_err(e.to_string()))?;
        tx.execute(&spec.create_sql(), [])
            .map_err(|e| write_err(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(&spec.insert_sql())
                .map_err(|e| write_err(e.to_string()))?;
            for row in rows {
                let params: Vec<rusqlite::types::Value> = row
                    .iter()
                    .map(sql_value)
                    .chain([rusqlite::types::Value::Text(run_id.to_string())])
                    .collect();
                stmt.execute(rusqlite::params_from_iter(params))
                    .map_err(|e| write_err(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| write_err(e.to_string()))?;
        Ok(rows.len())
    }

    /// Read a whole table back in insertion order.
    pub fn read_table(&self, name: &str) -> Result<Vec<BTreeMap<String, Value>>, StoreError> {
        let read_err = |message: String| StoreError::Read {
            table: name.to_string(),
            message,
        };

        if !is_identifier(name) {
            return Err(read_err("invalid table name".into()));
        }

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {name} ORDER BY rowid"))
            .map_err(|e| read_err(e.to_string()))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = Vec::new();
        let mut raw_rows = stmt.query([]).map_err(|e| read_err(e.to_string()))?;
        while let Some(raw) = raw_rows.next().map_err(|e| read_err(e.to_string()))? {
            let mut row = BTreeMap::new();
            for (i, column) in columns.iter().enumerate() {
                let value = match raw.get_ref(i).map_err(|e| read_err(e.to_string()))? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(n) => Value::Int(n),
                    ValueRef::Real(x) => Value::Float(x),
                    ValueRef::Text(bytes) => Value::Text(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| read_err(e.to_string()))?,
                    ),
                    ValueRef::Blob(_) => {
                        return Err(read_err(format!("column '{column}' holds a blob")))
                    }
                };
                row.insert(column.clone(), value);
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

fn sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Int(n) => rusqlite::types::Value::Integer(*n),
        Value::Float(x) => rusqlite::types::Value::Real(*x),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Null => rusqlite::types::Value::Null,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const STATS: TableSpec = TableSpec {
        name: "stats",
        columns: &[
            ColumnSpec {
                name: "state",
                kind: ColumnKind::Text,
            },
            ColumnSpec {
                name: "population",
                kind: ColumnKind::Real,
            },
            ColumnSpec {
                name: "rank",
                kind: ColumnKind::Integer,
            },
        ],
    };

    fn row(state: &str, population: f64, rank: i64) -> Vec<Value> {
        vec![
            Value::Text(state.into()),
            Value::Float(population),
            Value::Int(rank),
        ]
    }

    #[test]
    fn every_row_carries_the_run_id() {
        let mut store = TableStore::in_memory().unwrap();
        store
            .replace_table(&STATS, &[row("CA", 100.0, 1), row("TX", 200.0, 2)], "run-1")
            .unwrap();

        let rows = store.read_table("stats").unwrap();
        assert_eq!(rows.len(), 2);
        for r in &rows {
            assert_eq!(r[RUN_ID_COLUMN], Value::Text("run-1".into()));
        }
    }

    #[test]
    fn replace_is_full_snapshot() {
        let mut store = TableStore::in_memory().unwrap();
        store
            .replace_table(&STATS, &[row("CA", 100.0, 1), row("TX", 200.0, 2)], "run-1")
            .unwrap();
        store
            .replace_table(&STATS, &[row("OH", 300.0, 3)], "run-2")
            .unwrap();

        let rows = store.read_table("stats").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["state"], Value::Text("OH".into()));
        assert_eq!(rows[0][RUN_ID_COLUMN], Value::Text("run-2".into()));
    }

    #[test]
    fn failed_write_leaves_prior_contents() {
        let mut store = TableStore::in_memory().unwrap();
        store
            .replace_table(&STATS, &[row("CA", 100.0, 1)], "run-1")
            .unwrap();

        let bad_row = vec![Value::Text("TX".into())];
        let err = store
            .replace_table(&STATS, &[row("OH", 300.0, 3), bad_row], "run-2")
            .unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));

        let rows = store.read_table("stats").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["state"], Value::Text("CA".into()));
        assert_eq!(rows[0][RUN_ID_COLUMN], Value::Text("run-1".into()));
    }

    #[test]
    fn nulls_round_trip() {
        let mut store = TableStore::in_memory().unwrap();
        store
            .replace_table(
                &STATS,
                &[vec![Value::Text("CA".into()), Value::Null, Value::Int(1)]],
                "run-1",
            )
            .unwrap();

        let rows = store.read_table("stats").unwrap();
        assert_eq!(rows[0]["population"], Value::Null);
    }

    #[test]
    fn unknown_table_is_read_error() {
        let store = TableStore::in_memory().unwrap();
        assert!(matches!(
            store.read_table("nope"),
            Err(StoreError::Read { .. })
        ));
        assert!(matches!(
            store.read_table("nope; DROP TABLE x"),
            Err(StoreError::Read { .. })
        ));
    }

    #[test]
    fn persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.db");
        {
            let mut store = TableStore::open(&path).unwrap();
            store
                .replace_table(&STATS, &[row("CA", 100.0, 1)], "run-1")
                .unwrap();
        }
        let store = TableStore::open(&path).unwrap();
        assert_eq!(store.read_table("stats").unwrap().len(), 1);
    }
}
