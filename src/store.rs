//! In-memory row store backing the emulated tables.
//!
//! Each named table holds an ordered sequence of schemaless rows and a map of
//! standing errors keyed by [`Operation`]. Tables come into existence on
//! first write; reading a table nobody configured behaves as reading an
//! empty one.
//!
//! Row identity is positional: every stored row carries a hidden [`RowId`]
//! assigned when it entered the store. Query builders remember the ids of
//! their snapshot rows, and updates/deletes target the store by id, never by
//! value.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::EmulatorError;
use crate::sync::lock;

/// A schemaless record.
pub type Row = Map<String, Value>;

/// Hidden identity of a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RowId(u64);

/// The kind of operation a query builder resolves with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Read rows.
    #[default]
    Select,
    /// Append rows.
    Insert,
    /// Merge a patch into matching rows.
    Update,
    /// Remove matching rows.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Convert a JSON payload into rows: an object is one row, an array yields
/// each of its object elements. Anything else yields no rows.
pub fn rows_from_value(value: Value) -> Vec<Row> {
    match value {
        Value::Object(row) => vec![row],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Default)]
struct Table {
    rows: Vec<(RowId, Row)>,
    errors: HashMap<Operation, EmulatorError>,
}

#[derive(Default)]
struct StoreState {
    tables: HashMap<String, Table>,
    next_id: u64,
}

impl StoreState {
    fn assign(&mut self, rows: Vec<Row>) -> Vec<(RowId, Row)> {
        rows.into_iter()
            .map(|row| {
                let id = RowId(self.next_id);
                self.next_id += 1;
                (id, row)
            })
            .collect()
    }
}

/// Shared handle to the emulator's tables.
///
/// Cloning yields another handle to the same tables.
#[derive(Clone, Default)]
pub struct RowStore {
    inner: Arc<Mutex<StoreState>>,
}

impl RowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows of `table` wholesale, keeping the given order.
    pub fn set_rows(&self, table: &str, rows: Vec<Row>) {
        let mut state = lock(&self.inner);
        let rows = state.assign(rows);
        debug!(table, rows = rows.len(), "table data replaced");
        state.tables.entry(table.to_owned()).or_default().rows = rows;
    }

    /// Install (`Some`) or clear (`None`) the standing error for
    /// `table` + `operation`.
    pub fn set_error(&self, table: &str, operation: Operation, error: Option<EmulatorError>) {
        let mut state = lock(&self.inner);
        let errors = &mut state.tables.entry(table.to_owned()).or_default().errors;
        match error {
            Some(error) => {
                debug!(table, %operation, %error, "standing error installed");
                errors.insert(operation, error);
            }
            None => {
                errors.remove(&operation);
            }
        }
    }

    /// Copy of the current rows of `table`.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        lock(&self.inner)
            .tables
            .get(table)
            .map(|t| t.rows.iter().map(|(_, row)| row.clone()).collect())
            .unwrap_or_default()
    }

    /// Drop every table and standing error.
    pub fn clear(&self) {
        lock(&self.inner).tables.clear();
    }

    pub(crate) fn snapshot(&self, table: &str) -> Vec<(RowId, Row)> {
        lock(&self.inner)
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub(crate) fn standing_error(
        &self,
        table: &str,
        operation: Operation,
    ) -> Option<EmulatorError> {
        lock(&self.inner)
            .tables
            .get(table)
            .and_then(|t| t.errors.get(&operation).cloned())
    }

    /// Append `rows` to `table`, returning them.
    pub(crate) fn append(&self, table: &str, rows: Vec<Row>) -> Vec<Row> {
        let mut state = lock(&self.inner);
        let rows = state.assign(rows);
        let inserted = rows.iter().map(|(_, row)| row.clone()).collect();
        state
            .tables
            .entry(table.to_owned())
            .or_default()
            .rows
            .extend(rows);
        inserted
    }

    /// Merge `patch` into every stored row whose id is in `ids`, returning
    /// the patched rows in `ids` order. Ids no longer stored are skipped.
    pub(crate) fn patch(&self, table: &str, ids: &[RowId], patch: &Row) -> Vec<Row> {
        let mut state = lock(&self.inner);
        let Some(stored) = state.tables.get_mut(table) else {
            return Vec::new();
        };
        let mut patched = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, row)) = stored.rows.iter_mut().find(|(row_id, _)| row_id == id) {
                for (column, value) in patch {
                    row.insert(column.clone(), value.clone());
                }
                patched.push(row.clone());
            }
        }
        patched
    }

    /// Remove every stored row whose id is in `ids`, returning the removed
    /// rows in `ids` order. Ids no longer stored are skipped.
    pub(crate) fn remove(&self, table: &str, ids: &[RowId]) -> Vec<Row> {
        let mut state = lock(&self.inner);
        let Some(stored) = state.tables.get_mut(table) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(pos) = stored.rows.iter().position(|(row_id, _)| row_id == id) {
                removed.push(stored.rows.remove(pos).1);
            }
        }
        removed
    }
}

impl fmt::Debug for RowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner);
        let mut tables: Vec<_> = state
            .tables
            .iter()
            .map(|(name, t)| (name.clone(), t.rows.len()))
            .collect();
        tables.sort();
        f.debug_struct("RowStore").field("tables", &tables).finish()
    }
}
