//! Transactional SQL middleware.
//!
//! Binds one unit-of-work to each invocation:
//!
//! | Hook | Effect |
//! |------|--------|
//! | Setup | connect the store (retried until it succeeds) |
//! | Before | begin a READ COMMITTED, read-write transaction |
//! | After | roll back on a fault, commit otherwise |
//! | Shutdown | close the pool |
//!
//! Adapters registered after this middleware run their statements through
//! [`SqlMiddleware::exec`], [`SqlMiddleware::exec_one`] and
//! [`SqlMiddleware::select`] while the handler executes.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::Span;
use trezer_core::{format_elapsed, BoxFuture, Fault, FaultResult, InvocationContext};
use trezer_middleware::Middleware;

use crate::postgres::PgConnector;
use crate::store::{Connector, RollbackFailure, SqlQuery, Store, StoreError, Transaction};

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn store_fault(err: StoreError, query: &SqlQuery, elapsed: Duration) -> Fault {
    Fault::sql(err.code(), err.fault_message())
        .meta("query", query.text())
        .duration(elapsed)
        .cause(err)
        .build()
}

/// Owns the connection pool and the current invocation's transaction.
pub struct SqlMiddleware<Req, Res> {
    connector: Box<dyn Connector>,
    store: RwLock<Option<Arc<dyn Store>>>,
    tx: Mutex<Option<Box<dyn Transaction>>>,
    span: RwLock<Span>,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> SqlMiddleware<Req, Res> {
    /// Creates the middleware around a connector.
    pub fn new(connector: impl Connector) -> Self {
        Self {
            connector: Box::new(connector),
            store: RwLock::new(None),
            tx: Mutex::new(None),
            span: RwLock::new(Span::none()),
            _marker: PhantomData,
        }
    }

    /// Connects to Postgres using the `SQL_*` deployment variables.
    pub fn postgres() -> Self {
        Self::new(PgConnector::from_env())
    }

    /// Returns `true` once Setup connected the store.
    pub fn is_connected(&self) -> bool {
        self.store.read().is_some()
    }

    /// Returns `true` while a unit-of-work is open.
    pub async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    fn span(&self) -> Span {
        self.span.read().clone()
    }

    /// Runs a statement inside the current unit-of-work and returns the
    /// number of affected rows.
    ///
    /// # Errors
    ///
    /// `NO_ACTIVE_TRANSACTION` outside a unit-of-work, otherwise an SQL fault
    /// named after the store error (`UNIQUE_VIOLATION`,
    /// `PREPARED_STATEMENT_FAILED`, ...).
    pub async fn exec(&self, query: &SqlQuery) -> FaultResult<u64> {
        let span = self.span();
        tracing::debug!(parent: &span, query = %query, "Executing SQL...");

        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(|| no_active_transaction(query))?;

        let started = Instant::now();
        let rows = tx
            .execute(query)
            .await
            .map_err(|err| store_fault(err, query, started.elapsed()))?;

        let elapsed = started.elapsed();
        tracing::debug!(
            parent: &span,
            duration = millis(elapsed),
            rows_affected = rows,
            "Executed SQL in {}",
            format_elapsed(elapsed)
        );
        Ok(rows)
    }

    /// Like [`exec`](Self::exec), but fails unless exactly one row was
    /// affected.
    ///
    /// # Errors
    ///
    /// `ROW_AFFECTED_NOT_ONE`, or any error of [`exec`](Self::exec).
    pub async fn exec_one(&self, query: &SqlQuery) -> FaultResult<()> {
        let rows = self.exec(query).await?;
        if rows != 1 {
            return Err(Fault::sql("ROW_AFFECTED_NOT_ONE", "The number of row affected is not 1")
                .meta("query", query.text())
                .meta("rows_affected", rows)
                .build());
        }
        Ok(())
    }

    /// Runs a query inside the current unit-of-work and decodes every row.
    ///
    /// Rows are JSON objects keyed by column name, so `T` deserializes from
    /// the selected columns.
    ///
    /// # Errors
    ///
    /// `SELECT_DECODE_ERROR` when a row does not decode into `T`, or any
    /// error of [`exec`](Self::exec).
    pub async fn select<T: DeserializeOwned>(&self, query: &SqlQuery) -> FaultResult<Vec<T>> {
        let span = self.span();
        tracing::debug!(parent: &span, query = %query, "Executing SQL...");

        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(|| no_active_transaction(query))?;

        let started = Instant::now();
        let rows = tx
            .fetch_all(query)
            .await
            .map_err(|err| store_fault(err, query, started.elapsed()))?;
        drop(guard);

        let elapsed = started.elapsed();
        tracing::debug!(
            parent: &span,
            duration = millis(elapsed),
            rows = rows.len(),
            "Executed SQL in {}",
            format_elapsed(elapsed)
        );

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|err| {
                    Fault::sql("SELECT_DECODE_ERROR", "Cannot decode the selected rows")
                        .meta("query", query.text())
                        .duration(elapsed)
                        .cause(err)
                        .build()
                })
            })
            .collect()
    }

    async fn rollback(&self, tx: Option<Box<dyn Transaction>>, fault: Fault) -> Fault {
        tracing::warn!(parent: &self.span(), error = %fault, "Rollback main transaction");
        let Some(tx) = tx else {
            return Fault::sql(
                "SQL_ROLLBACK_NIL_TRANSACTION",
                "Rollbacking main transaction is impossible because it's nil",
            )
            .cause(fault)
            .build();
        };

        let started = Instant::now();
        match tx.rollback().await {
            Ok(()) => fault,
            Err(err) => Fault::sql(
                "SQL_ROLLBACK_ERROR",
                "Rollbacking main transaction raised an error",
            )
            .meta("rollback", err.to_string())
            .meta("interrupted", fault.code())
            .duration(started.elapsed())
            .cause(RollbackFailure::new(err, fault))
            .build(),
        }
    }

    async fn commit(&self, tx: Option<Box<dyn Transaction>>) -> Option<Fault> {
        tracing::info!(parent: &self.span(), "Commit main transaction");
        let Some(tx) = tx else {
            return Some(
                Fault::sql(
                    "SQL_COMMIT_NIL_TRANSACTION",
                    "Commit is impossible because the main transaction is nil",
                )
                .build(),
            );
        };

        let started = Instant::now();
        tx.commit().await.err().map(|err| {
            Fault::sql("SQL_COMMIT_ERROR", "Commit raised an error")
                .duration(started.elapsed())
                .cause(err)
                .build()
        })
    }
}

fn no_active_transaction(query: &SqlQuery) -> Fault {
    Fault::sql("NO_ACTIVE_TRANSACTION", "No transaction is open for this invocation")
        .meta("query", query.text())
        .build()
}

impl<Req, Res> std::fmt::Debug for SqlMiddleware<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlMiddleware")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl<Req, Res> Middleware<Req, Res> for SqlMiddleware<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "sql"
    }

    fn on_setup<'a>(
        &'a self,
        ctx: &'a InvocationContext,
        _first_request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            let span =
                tracing::info_span!(parent: &ctx.log_context().span(), "sql", framework = "SQL");
            *self.span.write() = span.clone();
            tracing::trace!(parent: &span, "OnSetup");

            // A retried Setup replaces the pool of the previous attempt.
            let previous = self.store.write().take();
            if let Some(previous) = previous {
                previous.close().await;
            }

            tracing::debug!(parent: &span, "Connecting to the database...");
            let started = Instant::now();
            let store = match self.connector.connect().await {
                Ok(store) => store,
                Err(fault) => {
                    let elapsed = started.elapsed();
                    tracing::warn!(
                        parent: &span,
                        duration = millis(elapsed),
                        "Cannot connect to the database at the moment ({})",
                        format_elapsed(elapsed)
                    );
                    return Err(fault);
                }
            };

            tracing::debug!(
                parent: &span,
                "Connected to the database in {}",
                format_elapsed(started.elapsed())
            );
            *self.store.write() = Some(store);
            Ok(())
        })
    }

    fn on_before<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        _request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            tracing::trace!(parent: &self.span(), "OnBefore");
            let store = self.store.read().clone();
            let begun = match store {
                Some(store) => store.begin().await,
                None => Err(StoreError::Closed),
            };
            let tx = begun.map_err(|err| {
                Fault::sql("NEW_TRANSACTION_ERROR", "Cannot create new transaction")
                    .cause(err)
                    .build()
            })?;
            *self.tx.lock().await = Some(tx);
            Ok(())
        })
    }

    fn on_after<'a>(
        &'a self,
        _response: &'a mut Res,
        fault: Option<Fault>,
    ) -> BoxFuture<'a, Option<Fault>> {
        Box::pin(async move {
            tracing::trace!(parent: &self.span(), fault = ?fault.as_ref().map(Fault::code), "OnAfter");
            let tx = self.tx.lock().await.take();
            match fault {
                Some(fault) => Some(self.rollback(tx, fault).await),
                None => self.commit(tx).await,
            }
        })
    }

    fn on_shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let span = self.span();
            tracing::trace!(parent: &span, "OnShutdown");
            let store = self.store.write().take();
            if let Some(store) = store {
                tracing::debug!(parent: &span, "Closing database connections...");
                let started = Instant::now();
                store.close().await;
                tracing::debug!(
                    parent: &span,
                    duration = millis(started.elapsed()),
                    "Closed database connections in {}",
                    format_elapsed(started.elapsed())
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockStore;
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;
    use trezer_middleware::{handler_fn, Pipeline};

    type Sql = SqlMiddleware<u32, String>;

    async fn ready(store: &MockStore) -> Sql {
        let sql = Sql::new(store.clone());
        let ctx = InvocationContext::new("req");
        sql.on_setup(&ctx, &0).await.unwrap();
        sql.on_before(&ctx, &0).await.unwrap();
        sql
    }

    fn failure() -> Fault {
        Fault::use_case("PetUseCase", "PET_CREATION_FAILED", "Pet creation failed").build()
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let store = MockStore::new();
        let sql = ready(&store).await;
        assert!(sql.in_transaction().await);

        assert!(sql.on_after(&mut String::new(), None).await.is_none());
        assert_eq!(store.commits(), 1);
        assert_eq!(store.rollbacks(), 0);
        assert!(!sql.in_transaction().await);
    }

    #[tokio::test]
    async fn test_rollback_forwards_fault() {
        let store = MockStore::new();
        let sql = ready(&store).await;

        let fault = sql.on_after(&mut String::new(), Some(failure())).await.unwrap();
        assert_eq!(fault.code(), "PET_CREATION_FAILED");
        assert_eq!(store.rollbacks(), 1);
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_becomes_fault() {
        let store = MockStore::new();
        store.fail_commit(StoreError::database("40001", "could not serialize"));
        let sql = ready(&store).await;

        let fault = sql.on_after(&mut String::new(), None).await.unwrap();
        assert_eq!(fault.code(), "SQL_COMMIT_ERROR");
        assert!(fault.metadata().contains_key("duration"));
    }

    #[tokio::test]
    async fn test_rollback_failure_reaches_store_error() {
        let store = MockStore::new();
        store.fail_rollback(StoreError::Connection("lost".into()));
        let sql = ready(&store).await;

        let fault = sql.on_after(&mut String::new(), Some(failure())).await.unwrap();
        assert_eq!(fault.code(), "SQL_ROLLBACK_ERROR");
        assert_eq!(fault.metadata()["rollback"], "connection error: lost");
        assert_eq!(fault.metadata()["interrupted"], "PET_CREATION_FAILED");

        let failure = fault
            .cause()
            .and_then(|cause| cause.downcast_ref::<RollbackFailure>())
            .unwrap();
        assert_eq!(failure.interrupted().code(), "PET_CREATION_FAILED");

        let store_error = fault
            .chain()
            .find_map(|err| err.downcast_ref::<StoreError>())
            .unwrap();
        assert!(matches!(store_error, StoreError::Connection(reason) if reason == "lost"));
        assert_eq!(fault.root_cause().to_string(), "connection error: lost");
    }

    #[tokio::test]
    async fn test_nil_transaction_faults() {
        let store = MockStore::new();
        let sql = Sql::new(store.clone());

        let fault = sql.on_after(&mut String::new(), None).await.unwrap();
        assert_eq!(fault.code(), "SQL_COMMIT_NIL_TRANSACTION");

        let fault = sql.on_after(&mut String::new(), Some(failure())).await.unwrap();
        assert_eq!(fault.code(), "SQL_ROLLBACK_NIL_TRANSACTION");
        assert!(fault.has_code("PET_CREATION_FAILED"));
    }

    #[tokio::test]
    async fn test_begin_failure() {
        let store = MockStore::new();
        store.fail_begin(StoreError::Closed);
        let sql = Sql::new(store.clone());
        let ctx = InvocationContext::new("req");
        sql.on_setup(&ctx, &0).await.unwrap();

        let fault = sql.on_before(&ctx, &0).await.unwrap_err();
        assert_eq!(fault.code(), "NEW_TRANSACTION_ERROR");
    }

    #[tokio::test]
    async fn test_postgres_connects_lazily() {
        let sql = Sql::postgres();
        assert!(!sql.is_connected());
        assert!(!sql.in_transaction().await);
        assert_eq!(format!("{sql:?}"), "SqlMiddleware { connected: false, .. }");
    }

    #[tokio::test]
    async fn test_exec_outside_transaction() {
        let sql = Sql::new(MockStore::new());
        let fault = sql.exec(&SqlQuery::new("DELETE FROM pet")).await.unwrap_err();
        assert_eq!(fault.code(), "NO_ACTIVE_TRANSACTION");
    }

    #[tokio::test]
    async fn test_exec_one() {
        let store = MockStore::new();
        let one = SqlQuery::new("INSERT INTO pet(id) VALUES($1)").bind(1_i64);
        let two = SqlQuery::new("INSERT INTO pet(id) VALUES($1)").bind(2_i64);
        store.on_exec(one.clone(), 1);
        store.on_exec(two.clone(), 2);
        let sql = ready(&store).await;

        sql.exec_one(&one).await.unwrap();
        let fault = sql.exec_one(&two).await.unwrap_err();
        assert_eq!(fault.code(), "ROW_AFFECTED_NOT_ONE");
        assert_eq!(fault.metadata()["rows_affected"], 2);
    }

    #[tokio::test]
    async fn test_exec_store_error_is_classified() {
        let store = MockStore::new();
        let query = SqlQuery::new("INSERT INTO pet(id) VALUES($1)").bind(1_i64);
        store.on_exec_error(query.clone(), StoreError::database("23505", "duplicate key"));
        let sql = ready(&store).await;

        let fault = sql.exec(&query).await.unwrap_err();
        assert_eq!(fault.code(), "UNIQUE_VIOLATION");
        assert_eq!(fault.component(), "Sql");
        assert_eq!(fault.metadata()["query"], "INSERT INTO pet(id) VALUES($1)");
    }

    #[tokio::test]
    async fn test_unscripted_query() {
        let sql = ready(&MockStore::new()).await;
        let fault = sql.exec(&SqlQuery::new("DELETE FROM pet")).await.unwrap_err();
        assert_eq!(fault.code(), "MOCK_DATA_NOT_FOUND");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: i64,
        name: String,
    }

    #[tokio::test]
    async fn test_select_decodes_rows() {
        let store = MockStore::new();
        let query = SqlQuery::new("SELECT id, name FROM pet");
        store.on_select(query.clone(), vec![json!({"id": 1, "name": "rex"})]);
        let sql = ready(&store).await;

        let rows: Vec<Row> = sql.select(&query).await.unwrap();
        assert_eq!(rows, vec![Row { id: 1, name: "rex".into() }]);
        assert_eq!(store.calls(&query), 1);
    }

    #[tokio::test]
    async fn test_select_decode_error() {
        let store = MockStore::new();
        let query = SqlQuery::new("SELECT id, name FROM pet");
        store.on_select(query.clone(), vec![json!({"id": "one"})]);
        let sql = ready(&store).await;

        let fault = sql.select::<Row>(&query).await.unwrap_err();
        assert_eq!(fault.code(), "SELECT_DECODE_ERROR");
    }

    #[tokio::test]
    async fn test_setup_retry_and_shutdown() {
        let store = MockStore::new();
        store.fail_connect(1);
        let sql = Sql::new(store.clone());
        let ctx = InvocationContext::new("req");

        let fault = sql.on_setup(&ctx, &0).await.unwrap_err();
        assert_eq!(fault.code(), "SQL_CONNECTION_ERROR");
        assert!(!sql.is_connected());

        sql.on_setup(&ctx, &0).await.unwrap();
        assert!(sql.is_connected());

        sql.on_shutdown().await;
        assert_eq!(store.closes(), 1);
        assert!(!sql.is_connected());
    }

    fn pipeline(store: &MockStore, fail: bool) -> Pipeline<u32, String> {
        Pipeline::builder()
            .use_middleware(Sql::new(store.clone()))
            .build(handler_fn(move |_ctx: InvocationContext, req: u32| async move {
                if fail {
                    Err(Fault::use_case("Test", "FAILED", "handler failed").build())
                } else {
                    Ok(req.to_string())
                }
            }))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_commit_iff_no_fault(outcomes in proptest::collection::vec(any::<bool>(), 1..8)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = MockStore::new();
            let ok = pipeline(&store, false);
            let failing = pipeline(&store, true);

            runtime.block_on(async {
                for fail in &outcomes {
                    let target = if *fail { &failing } else { &ok };
                    let _ = target.handle(InvocationContext::new("req"), 1).await;
                }
            });

            let failures = outcomes.iter().filter(|fail| **fail).count();
            prop_assert_eq!(store.rollbacks(), failures);
            prop_assert_eq!(store.commits(), outcomes.len() - failures);
        }
    }
}
