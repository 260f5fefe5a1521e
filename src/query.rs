//! Fluent query builder with deferred resolution.
//!
//! [`QueryBuilder`] is an owned value: every chain method takes it by value,
//! updates it and hands it back. Filters run eagerly against a point-in-time
//! copy of the table taken when the builder was created, so each call can
//! only shrink the working set. Operation setters (`select`, `insert`,
//! `update`, `delete`) only record intent; the store is touched when the
//! builder is finalized:
//!
//! - [`single`](QueryBuilder::single) resolves against the first record;
//! - [`execute`](QueryBuilder::execute), or awaiting the builder directly
//!   (it implements [`IntoFuture`]), resolves against all records.
//!
//! # Example
//!
//! ```
//! # tokio_test::block_on(async {
//! use data_client_emulator::{ClientEmulator, EmulatorConfig};
//! use serde_json::json;
//!
//! let (client, _scheduler) = ClientEmulator::manual(EmulatorConfig::new());
//! client.set_table_data("people", json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]));
//!
//! let res = client.from("people").equals("id", 2).single().await;
//! assert_eq!(res.data, json!({"id": 2, "name": "B"}).as_object().cloned());
//!
//! let res = client.from("people").update(json!({"name": "X"})).greater_than("id", 0).await;
//! assert_eq!(res.data.map(|rows| rows.len()), Some(2));
//! # });
//! ```

use std::future::{ready, IntoFuture, Ready};

use serde_json::Value;
use tracing::debug;

use crate::filter::{order_fields, Predicate};
use crate::response::Response;
use crate::store::{rows_from_value, Operation, Row, RowId, RowStore};

/// A chainable query against one table.
///
/// Created by [`ClientEmulator::from`](crate::ClientEmulator::from).
#[must_use = "a query builder does nothing until it is finalized or awaited"]
pub struct QueryBuilder {
    store: RowStore,
    table: String,
    operation: Operation,
    working_set: Vec<(RowId, Row)>,
    insert_payload: Vec<Row>,
    update_patch: Row,
}

impl QueryBuilder {
    pub(crate) fn new(store: RowStore, table: impl Into<String>) -> Self {
        let table = table.into();
        let working_set = store.snapshot(&table);
        Self {
            store,
            table,
            operation: Operation::default(),
            working_set,
            insert_payload: Vec::new(),
            update_patch: Row::new(),
        }
    }

    /// Name of the table this builder targets.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The operation the builder will resolve with.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Copy of the rows currently in the working set.
    pub fn working_set(&self) -> Vec<Row> {
        self.working_set.iter().map(|(_, row)| row.clone()).collect()
    }

    // ── Operation setters ───────────────────────────────────────────

    /// Resolve as a read. The column list is accepted for call-site
    /// compatibility and not applied; rows are returned whole.
    pub fn select(mut self, _columns: &str) -> Self {
        self.operation = Operation::Select;
        self
    }

    /// Resolve as an insert of `payload` (an object or an array of objects).
    pub fn insert(mut self, payload: Value) -> Self {
        self.operation = Operation::Insert;
        self.insert_payload = rows_from_value(payload);
        self
    }

    /// Resolve as an update merging `patch` (an object) into matched rows.
    pub fn update(mut self, patch: Value) -> Self {
        self.operation = Operation::Update;
        self.update_patch = match patch {
            Value::Object(patch) => patch,
            _ => Row::new(),
        };
        self
    }

    /// Resolve as a delete of matched rows.
    pub fn delete(mut self) -> Self {
        self.operation = Operation::Delete;
        self
    }

    // ── Filters ─────────────────────────────────────────────────────

    /// Keep only rows satisfying `predicate`.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.working_set.retain(|(_, row)| predicate.matches(row));
        self
    }

    /// Column equals `value`; numbers compare by magnitude.
    pub fn equals(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Equals(column.to_owned(), value.into()))
    }

    /// Column is present and differs from `value`.
    pub fn not_equals(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::NotEquals(column.to_owned(), value.into()))
    }

    /// Column is strictly greater than `value`.
    pub fn greater_than(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::GreaterThan(column.to_owned(), value.into()))
    }

    /// Column is greater than or equal to `value`.
    pub fn greater_or_equal(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::GreaterOrEqual(column.to_owned(), value.into()))
    }

    /// Column is strictly less than `value`.
    pub fn less_than(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::LessThan(column.to_owned(), value.into()))
    }

    /// Column is less than or equal to `value`.
    pub fn less_or_equal(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::LessOrEqual(column.to_owned(), value.into()))
    }

    /// Case-sensitive `LIKE` match (`%` any run, `_` one character).
    pub fn matches_pattern(self, column: &str, pattern: &str) -> Self {
        self.filter(Predicate::Like {
            column: column.to_owned(),
            pattern: pattern.to_owned(),
            case_insensitive: false,
        })
    }

    /// Case-insensitive `LIKE` match.
    pub fn matches_pattern_insensitive(self, column: &str, pattern: &str) -> Self {
        self.filter(Predicate::Like {
            column: column.to_owned(),
            pattern: pattern.to_owned(),
            case_insensitive: true,
        })
    }

    /// Column is exactly `value`; meant for `null`, `true` and `false`.
    pub fn is_exactly(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Is(column.to_owned(), value.into()))
    }

    /// Column equals one of `values`.
    pub fn is_one_of<V: Into<Value>>(
        self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Predicate::In(column.to_owned(), values))
    }

    /// Array column contains every one of `values`.
    pub fn array_contains<V: Into<Value>>(
        self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Predicate::Contains(column.to_owned(), values))
    }

    /// Every element of the array column is one of `values`.
    pub fn array_contained_by<V: Into<Value>>(
        self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Predicate::ContainedBy(column.to_owned(), values))
    }

    /// Stable sort of the working set by `column`. Nulls sort last when
    /// ascending.
    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.working_set
            .sort_by(|(_, a), (_, b)| order_fields(a.get(column), b.get(column), ascending));
        self
    }

    /// Keep at most `count` rows.
    pub fn limit(mut self, count: usize) -> Self {
        self.working_set.truncate(count);
        self
    }

    /// Keep the rows at offsets `from..=to` of the working set.
    pub fn range(mut self, from: usize, to: usize) -> Self {
        let keep = to.saturating_add(1).saturating_sub(from);
        self.working_set = self.working_set.into_iter().skip(from).take(keep).collect();
        self
    }

    // ── Finalizers ──────────────────────────────────────────────────

    /// Resolve against a single record.
    ///
    /// | Operation | Effect on the store                         | `data`               |
    /// |-----------|---------------------------------------------|----------------------|
    /// | select    | none                                        | first working row    |
    /// | insert    | appends the first payload row               | that row             |
    /// | update    | patches every stored row in the working set | first patched row    |
    /// | delete    | removes the first working row               | that row             |
    ///
    /// A standing error for this table and operation wins over all of the
    /// above and leaves the store untouched.
    pub async fn single(self) -> Response<Row> {
        self.resolve_one()
    }

    /// Resolve against every record. Awaiting the builder does the same.
    pub async fn execute(self) -> Response<Vec<Row>> {
        self.resolve_all()
    }

    fn ids(&self) -> Vec<RowId> {
        self.working_set.iter().map(|(id, _)| *id).collect()
    }

    fn resolve_one(self) -> Response<Row> {
        debug!(table = %self.table, operation = %self.operation, "resolving single");
        if let Some(error) = self.store.standing_error(&self.table, self.operation) {
            debug!(table = %self.table, %error, "standing error short-circuits");
            return Response::err(error);
        }

        let data = match self.operation {
            Operation::Select => self.working_set.into_iter().next().map(|(_, row)| row),
            Operation::Insert => {
                let first = self.insert_payload.into_iter().take(1).collect();
                self.store.append(&self.table, first).into_iter().next()
            }
            Operation::Update => {
                let ids = self.ids();
                self.store
                    .patch(&self.table, &ids, &self.update_patch)
                    .into_iter()
                    .next()
            }
            Operation::Delete => {
                let first: Vec<RowId> =
                    self.working_set.first().map(|(id, _)| *id).into_iter().collect();
                self.store.remove(&self.table, &first).into_iter().next()
            }
        };

        Response {
            data,
            error: None,
        }
    }

    fn resolve_all(self) -> Response<Vec<Row>> {
        debug!(
            table = %self.table,
            operation = %self.operation,
            rows = self.working_set.len(),
            "resolving all"
        );
        if let Some(error) = self.store.standing_error(&self.table, self.operation) {
            debug!(table = %self.table, %error, "standing error short-circuits");
            return Response::err(error);
        }

        let data = match self.operation {
            Operation::Select => self.working_set.into_iter().map(|(_, row)| row).collect(),
            Operation::Insert => self.store.append(&self.table, self.insert_payload),
            Operation::Update => {
                let ids = self.ids();
                self.store.patch(&self.table, &ids, &self.update_patch)
            }
            Operation::Delete => {
                let ids = self.ids();
                self.store.remove(&self.table, &ids)
            }
        };

        Response::ok(data)
    }
}

impl IntoFuture for QueryBuilder {
    type Output = Response<Vec<Row>>;
    type IntoFuture = Ready<Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        ready(self.resolve_all())
    }
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("table", &self.table)
            .field("operation", &self.operation)
            .field("working_set", &self.working_set.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::EmulatorError;
    use serde_json::json;
    use tokio_test::block_on;

    fn store_with(rows: Value) -> RowStore {
        let store = RowStore::new();
        store.set_rows("t", rows_from_value(rows));
        store
    }

    fn people() -> RowStore {
        store_with(json!([
            {"id": 1, "name": "Ada", "age": 36, "tags": ["math", "poetry"]},
            {"id": 2, "name": "bob", "age": 17, "tags": ["chess"]},
            {"id": 3, "name": "Cy", "age": null, "tags": []},
        ]))
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn last_operation_setter_wins() {
        let builder = QueryBuilder::new(people(), "t")
            .insert(json!({"id": 4}))
            .delete()
            .select("*");
        assert_eq!(builder.operation(), Operation::Select);
    }

    #[test]
    fn filters_shrink_working_set() {
        let builder = QueryBuilder::new(people(), "t").greater_than("id", 1);
        assert_eq!(ids(&builder.working_set()), vec![2, 3]);
        let builder = builder.less_or_equal("id", 2);
        assert_eq!(ids(&builder.working_set()), vec![2]);
    }

    #[test]
    fn pattern_filters() {
        let rows = QueryBuilder::new(people(), "t")
            .matches_pattern("name", "b%")
            .working_set();
        assert_eq!(ids(&rows), vec![2]);
        let rows = QueryBuilder::new(people(), "t")
            .matches_pattern_insensitive("name", "A%")
            .working_set();
        assert_eq!(ids(&rows), vec![1]);
    }

    #[test]
    fn membership_and_array_filters() {
        let rows = QueryBuilder::new(people(), "t").is_one_of("id", [1, 3]).working_set();
        assert_eq!(ids(&rows), vec![1, 3]);
        let rows = QueryBuilder::new(people(), "t")
            .array_contains("tags", ["poetry"])
            .working_set();
        assert_eq!(ids(&rows), vec![1]);
        let rows = QueryBuilder::new(people(), "t")
            .array_contained_by("tags", ["chess", "go"])
            .working_set();
        assert_eq!(ids(&rows), vec![2, 3]);
        let rows = QueryBuilder::new(people(), "t").is_exactly("age", Value::Null).working_set();
        assert_eq!(ids(&rows), vec![3]);
    }

    #[test]
    fn order_limit_and_range() {
        let rows = QueryBuilder::new(people(), "t").order_by("age", true).working_set();
        assert_eq!(ids(&rows), vec![2, 1, 3]);
        let rows = QueryBuilder::new(people(), "t").order_by("age", false).working_set();
        assert_eq!(ids(&rows), vec![3, 1, 2]);
        let rows = QueryBuilder::new(people(), "t").order_by("id", false).limit(2).working_set();
        assert_eq!(ids(&rows), vec![3, 2]);
        let rows = QueryBuilder::new(people(), "t").range(1, 5).working_set();
        assert_eq!(ids(&rows), vec![2, 3]);
        assert!(QueryBuilder::new(people(), "t").range(2, 1).working_set().is_empty());
    }

    #[test]
    fn single_select_returns_first_or_none() {
        let store = people();
        let res = block_on(QueryBuilder::new(store.clone(), "t").equals("id", 2).single());
        assert_eq!(res.data.unwrap()["name"], json!("bob"));
        let res = block_on(QueryBuilder::new(store, "t").equals("id", 99).single());
        assert!(res.data.is_none());
        assert!(res.error.is_none());
    }

    #[test]
    fn single_insert_appends_only_first_payload_row() {
        let store = people();
        let res = block_on(
            QueryBuilder::new(store.clone(), "t")
                .insert(json!([{"id": 4}, {"id": 5}]))
                .single(),
        );
        assert_eq!(res.data.unwrap()["id"], json!(4));
        assert_eq!(ids(&store.rows("t")), vec![1, 2, 3, 4]);
    }

    #[test]
    fn single_delete_removes_first_match() {
        let store = people();
        let res = block_on(
            QueryBuilder::new(store.clone(), "t")
                .delete()
                .greater_than("id", 1)
                .single(),
        );
        assert_eq!(res.data.unwrap()["id"], json!(2));
        assert_eq!(ids(&store.rows("t")), vec![1, 3]);
    }

    #[test]
    fn single_update_patches_all_matches_returns_first() {
        let store = people();
        let res = block_on(
            QueryBuilder::new(store.clone(), "t")
                .update(json!({"name": "Z"}))
                .less_than("id", 3)
                .single(),
        );
        assert_eq!(res.data.unwrap()["id"], json!(1));
        let names: Vec<_> = store.rows("t").iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("Z"), json!("Z"), json!("Cy")]);
    }

    #[test]
    fn awaiting_builder_resolves_all() {
        let store = people();
        let res = block_on(async {
            QueryBuilder::new(store.clone(), "t")
                .delete()
                .equals("age", 17)
                .await
        });
        assert_eq!(ids(&res.data.unwrap()), vec![2]);
        assert_eq!(ids(&store.rows("t")), vec![1, 3]);
    }

    #[test]
    fn standing_error_short_circuits_before_mutation() {
        let store = people();
        store.set_error("t", Operation::Delete, Some(EmulatorError::injected("denied")));
        let res = block_on(QueryBuilder::new(store.clone(), "t").delete().execute());
        assert_eq!(res.error, Some(EmulatorError::injected("denied")));
        assert!(res.data.is_none());
        assert_eq!(store.rows("t").len(), 3);

        // Other operations are unaffected.
        let res = block_on(QueryBuilder::new(store, "t").execute());
        assert_eq!(res.data.unwrap().len(), 3);
    }

    #[test]
    fn non_object_payloads_are_no_ops() {
        let store = people();
        let res = block_on(QueryBuilder::new(store.clone(), "t").insert(json!(42)).execute());
        assert_eq!(res.data, Some(vec![]));
        let res = block_on(QueryBuilder::new(store.clone(), "t").update(json!("x")).execute());
        assert_eq!(res.data.unwrap().len(), 3);
        assert_eq!(store.rows("t"), people().rows("t"));
    }

    #[test]
    fn debug_impl_for_builder() {
        let builder = QueryBuilder::new(people(), "t").limit(1);
        let debug = format!("{builder:?}");
        assert!(debug.contains("working_set: 1"), "got {debug}");
    }
}
