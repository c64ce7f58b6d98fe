//! Scripted in-memory store.
//!
//! Responses are keyed by query text and parameters. A query with no
//! scripted response fails with `MOCK_DATA_NOT_FOUND`, so a test notices
//! every statement it did not expect.
//!
//! ```
//! use trezer_sql::{MockStore, SqlMiddleware, SqlQuery};
//!
//! let store = MockStore::new();
//! store.on_exec(SqlQuery::new("DELETE FROM pet"), 3);
//!
//! let sql = SqlMiddleware::<(), ()>::new(store.clone());
//! # let _ = sql;
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use trezer_core::Fault;

use crate::store::{Connector, SqlQuery, Store, StoreError, Transaction};

#[derive(Debug, Default)]
struct MockState {
    exec: HashMap<SqlQuery, Result<u64, StoreError>>,
    select: HashMap<SqlQuery, Result<Vec<Value>, StoreError>>,
    calls: HashMap<SqlQuery, usize>,
    connects: usize,
    begins: usize,
    commits: usize,
    rollbacks: usize,
    closes: usize,
    connect_failures: usize,
    begin_error: Option<StoreError>,
    commit_error: Option<StoreError>,
    rollback_error: Option<StoreError>,
}

impl MockState {
    fn hit(&mut self, query: &SqlQuery) {
        *self.calls.entry(query.clone()).or_default() += 1;
    }
}

/// A store answering from scripted responses.
///
/// Clones share their script and counters.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
}

impl MockStore {
    /// Creates a store with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the affected row count of a statement.
    pub fn on_exec(&self, query: SqlQuery, rows_affected: u64) {
        self.state.lock().exec.insert(query, Ok(rows_affected));
    }

    /// Scripts a statement failure.
    pub fn on_exec_error(&self, query: SqlQuery, error: StoreError) {
        self.state.lock().exec.insert(query, Err(error));
    }

    /// Scripts the rows returned by a query.
    pub fn on_select(&self, query: SqlQuery, rows: Vec<Value>) {
        self.state.lock().select.insert(query, Ok(rows));
    }

    /// Scripts the rows returned by a query from serializable values.
    ///
    /// Values that do not serialize are skipped.
    pub fn on_select_rows<T: Serialize>(&self, query: SqlQuery, rows: &[T]) {
        let rows = rows
            .iter()
            .filter_map(|row| serde_json::to_value(row).ok())
            .collect();
        self.on_select(query, rows);
    }

    /// Scripts a query failure.
    pub fn on_select_error(&self, query: SqlQuery, error: StoreError) {
        self.state.lock().select.insert(query, Err(error));
    }

    /// Fails the next `times` connection attempts.
    pub fn fail_connect(&self, times: usize) {
        self.state.lock().connect_failures = times;
    }

    /// Fails every `begin` until cleared.
    pub fn fail_begin(&self, error: StoreError) {
        self.state.lock().begin_error = Some(error);
    }

    /// Fails every commit until cleared.
    pub fn fail_commit(&self, error: StoreError) {
        self.state.lock().commit_error = Some(error);
    }

    /// Fails every rollback until cleared.
    pub fn fail_rollback(&self, error: StoreError) {
        self.state.lock().rollback_error = Some(error);
    }

    /// Clears scripted begin, commit and rollback failures.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.begin_error = None;
        state.commit_error = None;
        state.rollback_error = None;
    }

    /// Number of times a scripted query was answered.
    pub fn calls(&self, query: &SqlQuery) -> usize {
        self.state.lock().calls.get(query).copied().unwrap_or(0)
    }

    /// Number of successful connections.
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Number of `begin` calls, failed ones included.
    pub fn begins(&self) -> usize {
        self.state.lock().begins
    }

    /// Number of commits, failed ones included.
    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    /// Number of rollbacks, failed ones included.
    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }
}

#[async_trait]
impl Store for MockStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let mut state = self.state.lock();
        state.begins += 1;
        if let Some(err) = state.begin_error.clone() {
            return Err(err);
        }
        Ok(Box::new(MockTransaction {
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) {
        self.state.lock().closes += 1;
    }
}

#[async_trait]
impl Connector for MockStore {
    async fn connect(&self) -> Result<Arc<dyn Store>, Fault> {
        let mut state = self.state.lock();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(
                Fault::sql("SQL_CONNECTION_ERROR", "Cannot connect to the database")
                    .cause(StoreError::Connection("scripted failure".to_string()))
                    .build(),
            );
        }
        state.connects += 1;
        Ok(Arc::new(self.clone()))
    }
}

struct MockTransaction {
    state: Arc<Mutex<MockState>>,
}

fn not_scripted(query: &SqlQuery) -> StoreError {
    StoreError::NotScripted {
        query: query.text().to_string(),
    }
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn execute(&mut self, query: &SqlQuery) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        let response = state.exec.get(query).cloned().ok_or_else(|| not_scripted(query))?;
        state.hit(query);
        response
    }

    async fn fetch_all(&mut self, query: &SqlQuery) -> Result<Vec<Value>, StoreError> {
        let mut state = self.state.lock();
        let response = state
            .select
            .get(query)
            .cloned()
            .ok_or_else(|| not_scripted(query))?;
        state.hit(query);
        response
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.commits += 1;
        state.commit_error.clone().map_or(Ok(()), Err)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.rollbacks += 1;
        state.rollback_error.clone().map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_exec_counts_calls() {
        let store = MockStore::new();
        let query = SqlQuery::new("UPDATE pet SET name = $1").bind("rex");
        store.on_exec(query.clone(), 2);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.execute(&query).await.unwrap(), 2);
        assert_eq!(tx.execute(&query).await.unwrap(), 2);
        tx.commit().await.unwrap();

        assert_eq!(store.calls(&query), 2);
        assert_eq!(store.begins(), 1);
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn test_unscripted_query_fails() {
        let store = MockStore::new();
        store.on_select(SqlQuery::new("SELECT 1").bind(1_i64), vec![json!({"n": 1})]);

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .fetch_all(&SqlQuery::new("SELECT 1").bind(2_i64))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MOCK_DATA_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let store = MockStore::new();
        store.fail_begin(StoreError::Closed);
        assert!(store.begin().await.is_err());

        store.clear_failures();
        store.fail_rollback(StoreError::Connection("lost".into()));
        let tx = store.begin().await.unwrap();
        assert!(tx.rollback().await.is_err());
        assert_eq!(store.begins(), 2);
        assert_eq!(store.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_connect_failures_count_down() {
        let store = MockStore::new();
        store.fail_connect(1);

        let fault = store.connect().await.err().unwrap();
        assert_eq!(fault.code(), "SQL_CONNECTION_ERROR");
        assert!(store.connect().await.is_ok());
        assert_eq!(store.connects(), 1);
    }
}
