//! Postgres sink
//!
//! Opens one connection per batch, runs a single multi-row insert and closes
//! the connection again. There is no pooling; batches are infrequent.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::SinkError;
use crate::sink::{check_parameter_limit, insert_statement, RecordSink, TableRow};

/// Bulk inserts rows into Postgres.
#[derive(Debug, Clone)]
pub struct PgSink {
    options: PgConnectOptions,
    statement_timeout: Duration,
}

impl PgSink {
    pub fn new(options: PgConnectOptions, statement_timeout: Duration) -> Self {
        Self {
            options,
            statement_timeout,
        }
    }

    /// Creates a sink from the `PG_*` configuration values.
    pub fn from_config(config: &Config) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.pg_host)
            .port(config.pg_port)
            .username(&config.pg_user)
            .password(&config.pg_password)
            .database(&config.pg_database)
            .application_name(&config.package_name);
        Self::new(options, config.operation_timeout())
    }
}

#[async_trait]
impl<R: TableRow> RecordSink<R> for PgSink {
    async fn insert_rows(&self, rows: &[R]) -> Result<u64, SinkError> {
        if rows.is_empty() {
            return Ok(0);
        }
        check_parameter_limit::<R>(rows.len())?;

        let sql = insert_statement::<R>(rows.len());
        let query = rows
            .iter()
            .fold(sqlx::query(&sql), |query, row| row.bind(query));

        let mut conn = tokio::time::timeout(
            self.statement_timeout,
            PgConnection::connect_with(&self.options),
        )
        .await
        .map_err(|_| SinkError::Timeout(self.statement_timeout))?
        .map_err(SinkError::Connect)?;

        let outcome = tokio::time::timeout(self.statement_timeout, query.execute(&mut conn)).await;

        if let Err(err) = conn.close().await {
            warn!(error = %err, "Failed to close database connection cleanly");
        }

        let done = outcome
            .map_err(|_| SinkError::Timeout(self.statement_timeout))?
            .map_err(SinkError::Query)?;

        debug!(
            table = R::TABLE,
            rows = done.rows_affected(),
            "Bulk insert complete"
        );
        Ok(done.rows_affected())
    }
}
