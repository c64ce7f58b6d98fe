//! Store abstraction.
//!
//! A [`Store`] hands out one [`Transaction`] per invocation. The SQL
//! middleware never talks to a driver directly, so the Postgres store and
//! the scripted mock are interchangeable.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use trezer_core::Fault;
use uuid::Uuid;

use crate::sqlstate;

/// A positional query parameter (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlParam {
    /// A `uuid` value.
    Uuid(Uuid),
    /// A `text` value.
    Text(String),
    /// A `bigint` value.
    Int(i64),
    /// A `boolean` value.
    Bool(bool),
    /// SQL `NULL`.
    Null,
}

impl From<Uuid> for SqlParam {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Query text with its positional parameters.
///
/// Queries are compared by text and parameters, which is how the mock store
/// looks up scripted responses.
///
/// ```
/// use trezer_sql::SqlQuery;
///
/// let query = SqlQuery::new("SELECT name FROM pet WHERE id = $1").bind("rex");
/// assert_eq!(query.params().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlQuery {
    text: String,
    params: Vec<SqlParam>,
}

impl SqlQuery {
    /// Creates a query without parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Appends the next positional parameter.
    #[must_use]
    pub fn bind(mut self, param: impl Into<SqlParam>) -> Self {
        self.params.push(param.into());
        self
    }

    /// The query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The positional parameters.
    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Errors raised by a store or a transaction.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The database rejected a statement.
    #[error("database error {sqlstate}: {message}")]
    Database {
        /// Five-character SQLSTATE, empty when the driver gave none.
        sqlstate: String,
        /// Message reported by the database.
        message: String,
    },

    /// The connection could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// A returned row could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The store was closed.
    #[error("store is closed")]
    Closed,

    /// The mock store has no response scripted for a query.
    #[error("no scripted response for query: {query}")]
    NotScripted {
        /// The query text.
        query: String,
    },
}

impl StoreError {
    /// Builds a database error from its SQLSTATE.
    pub fn database(sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            sqlstate: sqlstate.into(),
            message: message.into(),
        }
    }

    /// The fault code this error is reported under.
    ///
    /// ```
    /// use trezer_sql::StoreError;
    ///
    /// assert_eq!(StoreError::database("23505", "dup").code(), "UNIQUE_VIOLATION");
    /// assert_eq!(StoreError::database("42P01", "no table").code(), "PREPARED_STATEMENT_FAILED");
    /// ```
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database { sqlstate, .. } => sqlstate::code_name(sqlstate),
            Self::Connection(_) | Self::Closed => "SQL_CONNECTION_ERROR",
            Self::Decode(_) => "SELECT_DECODE_ERROR",
            Self::NotScripted { .. } => "MOCK_DATA_NOT_FOUND",
        }
    }

    /// The message of the fault this error is reported under.
    pub fn fault_message(&self) -> &'static str {
        match self.code() {
            sqlstate::PREPARED_STATEMENT_FAILED => "Prepared statement cannot be created",
            "MOCK_DATA_NOT_FOUND" => "Mock data not found",
            "SELECT_DECODE_ERROR" => "Cannot decode the selected rows",
            _ => "Error while executing SQL",
        }
    }
}

/// A rollback that failed while answering an earlier fault.
///
/// Its [`source`](std::error::Error::source) is the store error, so the chain
/// of the resulting `SQL_ROLLBACK_ERROR` ends at the driver. The fault that
/// triggered the rollback stays reachable through [`interrupted`](Self::interrupted).
#[derive(Debug, Clone, Error)]
#[error("rollback after `{interrupted}` failed: {error}")]
pub struct RollbackFailure {
    #[source]
    error: StoreError,
    interrupted: Fault,
}

impl RollbackFailure {
    /// Pairs a rollback error with the fault that triggered the rollback.
    pub const fn new(error: StoreError, interrupted: Fault) -> Self {
        Self { error, interrupted }
    }

    /// The store error raised by the rollback.
    pub const fn error(&self) -> &StoreError {
        &self.error
    }

    /// The fault the unit-of-work was being rolled back for.
    pub const fn interrupted(&self) -> &Fault {
        &self.interrupted
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::Database {
                sqlstate: db.code().map(|code| code.into_owned()).unwrap_or_default(),
                message: db.message().to_string(),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => Self::Connection(err.to_string()),
            sqlx::Error::PoolClosed => Self::Closed,
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::RowNotFound => Self::Decode(err.to_string()),
            other => Self::database("", other.to_string()),
        }
    }
}

/// A unit-of-work opened by [`Store::begin`].
///
/// Committing or rolling back consumes the transaction.
#[async_trait]
pub trait Transaction: Send {
    /// Runs a statement and returns the number of affected rows.
    async fn execute(&mut self, query: &SqlQuery) -> Result<u64, StoreError>;

    /// Runs a query and returns every row as a JSON object keyed by column.
    async fn fetch_all(&mut self, query: &SqlQuery) -> Result<Vec<Value>, StoreError>;

    /// Commits the unit-of-work.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Rolls the unit-of-work back.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// A pooled connection to the backing store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a read-write unit-of-work at READ COMMITTED isolation.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Closes every pooled connection.
    async fn close(&self);
}

/// Resolves settings and connects a [`Store`] during Setup.
///
/// Errors are faults so that configuration problems keep their own codes
/// (`NO_SQL_CONNECTION_MAX_IDLE_TIME`, ...).
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connects to the store.
    async fn connect(&self) -> Result<Arc<dyn Store>, Fault>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_equality_includes_params() {
        let id = Uuid::nil();
        let a = SqlQuery::new("SELECT 1 WHERE $1").bind(id);
        let b = SqlQuery::new("SELECT 1 WHERE $1").bind(id);
        let c = SqlQuery::new("SELECT 1 WHERE $1").bind("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "SELECT 1 WHERE $1");
    }

    #[test]
    fn test_optional_params() {
        let query = SqlQuery::new("x").bind(None::<i64>).bind(Some(true));
        assert_eq!(query.params(), &[SqlParam::Null, SqlParam::Bool(true)]);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(StoreError::Closed.code(), "SQL_CONNECTION_ERROR");
        assert_eq!(StoreError::Decode("bad".into()).code(), "SELECT_DECODE_ERROR");
        assert_eq!(
            StoreError::NotScripted { query: "q".into() }.code(),
            "MOCK_DATA_NOT_FOUND"
        );
        assert_eq!(StoreError::database("", "boom").code(), "SQL_ERROR");
    }

    #[test]
    fn test_fault_messages() {
        assert_eq!(
            StoreError::database("42601", "syntax").fault_message(),
            "Prepared statement cannot be created"
        );
        assert_eq!(
            StoreError::database("23505", "dup").fault_message(),
            "Error while executing SQL"
        );
    }

    #[test]
    fn test_from_sqlx_error() {
        let err: StoreError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, StoreError::Closed));
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), "SELECT_DECODE_ERROR");
    }
}
