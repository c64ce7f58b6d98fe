//! PostgreSQL store on `sqlx`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Postgres, Row};
use std::sync::Arc;
use std::time::{Duration, Instant};
use trezer_config::{ConfigError, ConfigLoader, SqlConfig};
use trezer_core::{format_elapsed, Fault};

use crate::store::{Connector, SqlParam, SqlQuery, Store, StoreError, Transaction};

const ISOLATION: &str = "SET TRANSACTION ISOLATION LEVEL READ COMMITTED, READ WRITE";

/// Pool settings resolved from [`SqlConfig`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Connection URL.
    pub url: String,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum connection lifetime.
    pub max_lifetime: Duration,
}

impl PoolSettings {
    /// Resolves pool settings, failing with the fault code of the first
    /// missing duration.
    pub fn from_config(config: &SqlConfig) -> Result<Self, Fault> {
        let idle_timeout = config.connection_max_idle_time.ok_or_else(|| {
            Fault::sql(
                "NO_SQL_CONNECTION_MAX_IDLE_TIME",
                "Cannot parse duration from SQL_CONNECTION_MAX_IDLE_TIME",
            )
            .build()
        })?;
        let max_lifetime = config.connection_max_life_time.ok_or_else(|| {
            Fault::sql(
                "NO_SQL_CONNECTION_MAX_LIFE_TIME",
                "Cannot parse duration from SQL_CONNECTION_MAX_LIFE_TIME",
            )
            .build()
        })?;
        Ok(Self {
            url: config.connection_url(),
            idle_timeout,
            max_lifetime,
        })
    }
}

fn config_fault(err: ConfigError) -> Fault {
    let (code, message) = if err.concerns("SQL_CONNECTION_MAX_IDLE_TIME") {
        (
            "NO_SQL_CONNECTION_MAX_IDLE_TIME",
            "Cannot parse duration from SQL_CONNECTION_MAX_IDLE_TIME",
        )
    } else if err.concerns("SQL_CONNECTION_MAX_LIFE_TIME") {
        (
            "NO_SQL_CONNECTION_MAX_LIFE_TIME",
            "Cannot parse duration from SQL_CONNECTION_MAX_LIFE_TIME",
        )
    } else {
        ("SQL_CONFIGURATION_ERROR", "Invalid SQL configuration")
    };
    Fault::sql(code, message).cause(err).build()
}

enum Source {
    Env,
    Fixed(SqlConfig),
}

/// Connects a [`PgStore`] from deployment variables or an explicit config.
pub struct PgConnector {
    source: Source,
}

impl PgConnector {
    /// Reads `SQL_*` variables at connect time, so a fixed environment is
    /// picked up by the next Setup retry.
    pub const fn from_env() -> Self {
        Self { source: Source::Env }
    }

    /// Uses an already loaded configuration.
    pub const fn with_config(config: SqlConfig) -> Self {
        Self {
            source: Source::Fixed(config),
        }
    }

    /// Uses `config` when it names a host, deployment variables otherwise.
    pub fn with_config_or_env(config: SqlConfig) -> Self {
        if config.is_configured() {
            Self::with_config(config)
        } else {
            Self::from_env()
        }
    }

    fn resolve(&self) -> Result<SqlConfig, Fault> {
        match &self.source {
            Source::Env => ConfigLoader::new()
                .with_lambda_env()
                .and_then(ConfigLoader::load)
                .map(|config| config.sql)
                .map_err(config_fault),
            Source::Fixed(config) => Ok(config.clone()),
        }
    }
}

impl std::fmt::Debug for PgConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            Source::Env => "env",
            Source::Fixed(_) => "config",
        };
        f.debug_struct("PgConnector").field("source", &source).finish()
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<Arc<dyn Store>, Fault> {
        let settings = PoolSettings::from_config(&self.resolve()?)?;
        let store = PgStore::connect(&settings).await.map_err(|err| {
            Fault::sql("SQL_CONNECTION_ERROR", "Cannot connect to the database")
                .cause(err)
                .build()
        })?;
        Ok(Arc::new(store))
    }
}

/// A single-connection Postgres pool.
///
/// One invocation runs at a time per instance, so one idle and one open
/// connection are enough.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects the pool.
    pub async fn connect(settings: &PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .idle_timeout(settings.idle_timeout)
            .max_lifetime(settings.max_lifetime)
            .connect(&settings.url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(ISOLATION).execute(&mut *tx).await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn close(&self) {
        let started = Instant::now();
        self.pool.close().await;
        tracing::debug!(
            duration = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Closed database connections in {}",
            format_elapsed(started.elapsed())
        );
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Uuid(value) => query.bind(*value),
            SqlParam::Text(value) => query.bind(value.as_str()),
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Bool(value) => query.bind(*value),
            SqlParam::Null => query.bind(None::<String>),
        };
    }
    query
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn execute(&mut self, query: &SqlQuery) -> Result<u64, StoreError> {
        let result = bind_all(sqlx::query(query.text()), query.params())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, query: &SqlQuery) -> Result<Vec<Value>, StoreError> {
        // Each row comes back as one JSON object keyed by column name.
        let wrapped = format!("SELECT to_jsonb(q) AS row FROM ({}) q", query.text());
        let rows = bind_all(sqlx::query(&wrapped), query.params())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter()
            .map(|row| {
                row.try_get::<Json<Value>, _>("row")
                    .map(|Json(value)| value)
                    .map_err(StoreError::from)
            })
            .collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
