//! Relational Sink Module
//!
//! Typed row schemas and the bulk insert path into Postgres.

mod postgres;
mod row;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use crate::error::SinkError;

pub use postgres::PgSink;
pub use row::DataFrameRow;

/// Most bind parameters a single Postgres statement accepts.
pub const MAX_BIND_PARAMETERS: usize = u16::MAX as usize;

/// A Postgres query with positional arguments.
pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

// == Table Row ==
/// Schema of one table the sink can bulk insert into.
pub trait TableRow: Send + Sync + 'static {
    const TABLE: &'static str;

    /// Column names, in the order `bind` binds them
    const COLUMNS: &'static [&'static str];

    /// Binds this row's values, one per column.
    fn bind<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q>;

    /// Identifier of the row in debug logs.
    fn log_key(&self) -> &str;
}

// == Record Sink ==
/// Durable destination for drained rows.
#[async_trait]
pub trait RecordSink<R: TableRow>: Send + Sync {
    /// Persists all rows in one statement, returning the affected row count.
    async fn insert_rows(&self, rows: &[R]) -> Result<u64, SinkError>;
}

/// Builds a multi-row insert with positional parameters:
/// `INSERT INTO t (a, b) VALUES ($1, $2), ($3, $4)`.
pub fn insert_statement<R: TableRow>(row_count: usize) -> String {
    let columns = R::COLUMNS;
    let mut sql = format!("INSERT INTO {} ({}) VALUES ", R::TABLE, columns.join(", "));

    let mut parameter = 0;
    for row in 0..row_count {
        if row > 0 {
            sql.push_str(", ");
        }
        let placeholders: Vec<String> = columns
            .iter()
            .map(|_| {
                parameter += 1;
                format!("${}", parameter)
            })
            .collect();
        sql.push('(');
        sql.push_str(&placeholders.join(", "));
        sql.push(')');
    }
    sql
}

/// Rejects batches Postgres would refuse for binding too many parameters.
pub fn check_parameter_limit<R: TableRow>(row_count: usize) -> Result<(), SinkError> {
    let needed = row_count * R::COLUMNS.len();
    if needed > MAX_BIND_PARAMETERS {
        return Err(SinkError::TooManyParameters {
            needed,
            limit: MAX_BIND_PARAMETERS,
        });
    }
    Ok(())
}
