//! Generic statement execution shared by every endpoint family.

use std::time::{Duration, Instant};

use futures::TryStreamExt;
use futures::stream::BoxStream;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgQueryResult, PgRow};
use sqlx::{Either, Executor, Row, Statement};

use crate::db::params;
use crate::db::rows::{FieldInfo, field_info, row_to_json};

/// Everything the driver reported for one request.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub rows: Vec<Value>,
    pub fields: Vec<FieldInfo>,
    /// Sum of the command tags' counts: rows returned for `SELECT`, rows touched for DML.
    pub row_count: u64,
    pub elapsed: Duration,
}

impl QueryOutput {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Run `sql` once.
///
/// Without parameters the simple query protocol is used, so a batch of
/// statements separated by `;` runs in one call. With parameters the
/// statement is prepared first, each JSON value is converted to the type
/// the server inferred for its placeholder, and it must be a single command.
pub async fn run(
    conn: &mut PgConnection,
    sql: &str,
    params: &[Value],
) -> Result<QueryOutput, sqlx::Error> {
    let started = Instant::now();
    let mut out = QueryOutput::default();

    if params.is_empty() {
        collect(Executor::fetch_many(&mut *conn, sqlx::raw_sql(sql)), &mut out).await?;
    } else {
        let statement = Executor::prepare(&mut *conn, sql).await?;
        let types = match statement.parameters() {
            Some(Either::Left(types)) => types.to_vec(),
            _ => Vec::new(),
        };
        let bound =
            params::coerce_all(params, &types).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let query = bound
            .into_iter()
            .fold(statement.query(), |query, param| query.bind(param));
        collect(Executor::fetch_many(&mut *conn, query), &mut out).await?;
    }

    out.elapsed = started.elapsed();
    Ok(out)
}

async fn collect<'e>(
    mut stream: BoxStream<'e, Result<Either<PgQueryResult, PgRow>, sqlx::Error>>,
    out: &mut QueryOutput,
) -> Result<(), sqlx::Error> {
    while let Some(step) = stream.try_next().await? {
        match step {
            Either::Left(done) => out.row_count += done.rows_affected(),
            Either::Right(row) => {
                if out.fields.is_empty() {
                    out.fields = field_info(row.columns());
                }
                out.rows.push(row_to_json(&row));
            }
        }
    }
    Ok(())
}
