//! # Trezer SQL
//!
//! Transactional SQL middleware. Every invocation runs inside one
//! unit-of-work, committed when the invocation succeeds and rolled back when
//! a fault reaches the middleware's After hook.
//!
//! ```no_run
//! use std::sync::Arc;
//! use trezer_middleware::events::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
//! use trezer_middleware::{handler_fn, Fault, InvocationContext, Pipeline};
//! use trezer_sql::{SqlMiddleware, SqlQuery};
//!
//! let sql = Arc::new(SqlMiddleware::postgres());
//! let db = Arc::clone(&sql);
//!
//! let pipeline = Pipeline::builder()
//!     .use_shared(sql)
//!     .build(handler_fn(move |_ctx: InvocationContext, _req: ApiGatewayProxyRequest| {
//!         let db = Arc::clone(&db);
//!         async move {
//!             db.exec(&SqlQuery::new("DELETE FROM pet WHERE name = $1").bind("rex")).await?;
//!             Ok::<_, Fault>(ApiGatewayProxyResponse::default())
//!         }
//!     }));
//! # let _ = pipeline;
//! ```
//!
//! Store errors surface as SQL faults named after the Postgres condition
//! (see [`sqlstate`]), so adapters can branch on `UNIQUE_VIOLATION` and
//! similar codes without touching the driver.

#![doc(html_root_url = "https://docs.rs/trezer-sql/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod middleware;
#[cfg(any(test, feature = "test-support"))]
mod mock;
mod postgres;
pub mod sqlstate;
mod store;

pub use middleware::SqlMiddleware;
#[cfg(any(test, feature = "test-support"))]
pub use mock::MockStore;
pub use postgres::{PgConnector, PgStore, PoolSettings};
pub use store::{
    Connector, RollbackFailure, SqlParam, SqlQuery, Store, StoreError, Transaction,
};
