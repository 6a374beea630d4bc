//! Fixed `information_schema` queries used to browse a database.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Postgres};

/// User tables and views; system schemas are excluded.
pub const LIST_TABLES: &str = r#"
SELECT
    table_name::text AS table_name,
    table_schema::text AS table_schema,
    table_type::text AS table_type
FROM information_schema.tables
WHERE table_schema NOT IN ('information_schema', 'pg_catalog')
ORDER BY table_schema, table_name
"#;

/// Columns of every table named `$1`, in ordinal order.
pub const TABLE_COLUMNS: &str = r#"
SELECT
    column_name::text AS column_name,
    data_type::text AS data_type,
    is_nullable::text AS is_nullable,
    column_default::text AS column_default,
    character_maximum_length::int4 AS character_maximum_length,
    numeric_precision::int4 AS numeric_precision,
    numeric_scale::int4 AS numeric_scale
FROM information_schema.columns
WHERE table_name = $1
ORDER BY ordinal_position
"#;

/// As [`TABLE_COLUMNS`], restricted to non-system schemas.
pub const USER_TABLE_COLUMNS: &str = r#"
SELECT
    column_name::text AS column_name,
    data_type::text AS data_type,
    is_nullable::text AS is_nullable,
    column_default::text AS column_default,
    character_maximum_length::int4 AS character_maximum_length,
    numeric_precision::int4 AS numeric_precision,
    numeric_scale::int4 AS numeric_scale
FROM information_schema.columns
WHERE table_name = $1
  AND table_schema NOT IN ('information_schema', 'pg_catalog')
ORDER BY ordinal_position
"#;

/// Server identity probe used by the serverless test-connection action.
pub const SERVER_IDENTITY: &str =
    "SELECT version() AS version, current_database()::text AS database";

/// Server clock probe used by the proxy server's health and test-connection.
pub const SERVER_CLOCK: &str = "SELECT NOW() AS server_time, version() AS version";

pub const COUNT_USER_TABLES: &str = r#"
SELECT COUNT(*) AS table_count
FROM information_schema.tables
WHERE table_schema NOT IN ('information_schema', 'pg_catalog')
"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct TableInfo {
    pub table_name: String,
    pub table_schema: String,
    pub table_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct ServerIdentity {
    pub version: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct ServerClock {
    pub server_time: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

pub async fn list_tables<'c, E>(executor: E) -> Result<Vec<TableInfo>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(LIST_TABLES).fetch_all(executor).await
}

/// `user_only` also drops columns of same-named tables in system schemas.
pub async fn table_columns<'c, E>(
    executor: E,
    table_name: &str,
    user_only: bool,
) -> Result<Vec<ColumnInfo>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let sql = if user_only {
        USER_TABLE_COLUMNS
    } else {
        TABLE_COLUMNS
    };
    sqlx::query_as(sql).bind(table_name).fetch_all(executor).await
}

pub async fn server_identity<'c, E>(executor: E) -> Result<ServerIdentity, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(SERVER_IDENTITY).fetch_one(executor).await
}

pub async fn server_clock<'c, E>(executor: E) -> Result<ServerClock, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(SERVER_CLOCK).fetch_one(executor).await
}

pub async fn count_user_tables<'c, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_scalar(COUNT_USER_TABLES).fetch_one(executor).await
}
