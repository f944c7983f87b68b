//! SQLite engine backed by a sqlx pool.
//!
//! The main database file is opened read-only. Every `*.db`, `*.sqlite` or
//! `*.sqlite3` file in the optional attach directory is attached on each
//! pooled connection under its file stem, so `SELECT * FROM finance.loans`
//! reads `finance.db`. Attached files inherit the read-only open flags.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlclaw_core::error::DatabaseError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, SqlitePool, Statement, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::engine::{ColumnInfo, SqlEngine};
use crate::result::{CellValue, QueryResult};

/// A read-only SQLite database exposed as schemas of tables.
pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    /// Open `path` read-only and attach the databases found in `attach_dir`.
    pub async fn open(path: &Path, attach_dir: Option<&Path>) -> Result<Self, DatabaseError> {
        if !path.exists() {
            return Err(DatabaseError::Open {
                path: path.display().to_string(),
                reason: "file does not exist".into(),
            });
        }

        let attachments = match attach_dir {
            Some(dir) => discover_attachments(dir)?,
            None => Vec::new(),
        };
        let attached = attachments.len();

        let options = SqliteConnectOptions::new().filename(path).read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .after_connect(move |conn, _meta| {
                let attachments = attachments.clone();
                Box::pin(async move {
                    for (schema, file) in &attachments {
                        let sql = format!(
                            "ATTACH DATABASE {} AS {}",
                            quote_literal(&file.to_string_lossy()),
                            quote_ident(schema)
                        );
                        sqlx::query(&sql).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        info!(path = %path.display(), attached, "SQLite engine opened");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// An ephemeral, writable engine: attaches each named in-memory schema,
    /// then runs the `setup` statements in order.
    pub async fn in_memory(schemas: &[&str], setup: &[&str]) -> Result<Self, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DatabaseError::Open {
                path: ":memory:".into(),
                reason: e.to_string(),
            })?;

        for schema in schemas {
            let sql = format!("ATTACH DATABASE ':memory:' AS {}", quote_ident(schema));
            pool.execute(sql.as_str())
                .await
                .map_err(|e| DatabaseError::Query(format!("attach {schema}: {e}")))?;
        }
        for stmt in setup {
            pool.execute(*stmt)
                .await
                .map_err(|e| DatabaseError::Query(format!("setup: {e}")))?;
        }
        Ok(Self { pool })
    }

    async fn resolve_schema(&self, schema: &str) -> Result<String, DatabaseError> {
        self.list_schemas()
            .await?
            .into_iter()
            .find(|s| s.eq_ignore_ascii_case(schema))
            .ok_or_else(|| DatabaseError::UnknownSchema(schema.to_string()))
    }
}

/// Database files in `dir`, as (schema name, path), sorted by schema.
fn discover_attachments(dir: &Path) -> Result<Vec<(String, PathBuf)>, DatabaseError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DatabaseError::Open {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut found: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "db" | "sqlite" | "sqlite3"))
        })
        .filter_map(|p| {
            let stem = p.file_stem()?.to_str()?.to_string();
            (!matches!(stem.as_str(), "main" | "temp")).then_some((stem, p))
        })
        .collect();
    found.sort();
    Ok(found)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn query_err(e: sqlx::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

fn decode_cell(row: &SqliteRow, index: usize) -> Result<CellValue, DatabaseError> {
    let raw = row.try_get_raw(index).map_err(query_err)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => CellValue::Integer(row.try_get_unchecked::<i64, _>(index).map_err(query_err)?),
        "REAL" | "NUMERIC" => CellValue::Real(row.try_get_unchecked::<f64, _>(index).map_err(query_err)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index).map_err(query_err)?;
            CellValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => CellValue::Text(row.try_get_unchecked::<String, _>(index).map_err(query_err)?),
    };
    Ok(value)
}

#[async_trait]
impl SqlEngine for SqliteEngine {
    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(DatabaseError::Query("empty query".into()));
        }

        let mut conn = self.pool.acquire().await.map_err(query_err)?;
        let stmt = (&mut *conn).prepare(sql).await.map_err(query_err)?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = stmt.query().fetch_all(&mut *conn).await.map_err(query_err)?;

        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_cell(row, i)).collect())
            .collect::<Result<Vec<Vec<CellValue>>, _>>()?;

        debug!(rows = rows.len(), columns = columns.len(), "Query executed");
        Ok(QueryResult::new(columns, rows))
    }

    async fn list_schemas(&self) -> Result<Vec<String>, DatabaseError> {
        let rows = sqlx::query("PRAGMA database_list")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        let mut schemas = rows
            .iter()
            .map(|r| r.try_get::<String, _>("name").map_err(query_err))
            .collect::<Result<Vec<_>, _>>()?;
        schemas.retain(|s| s != "temp");
        schemas.sort();
        Ok(schemas)
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, DatabaseError> {
        let schema = self.resolve_schema(schema).await?;
        let sql = format!(
            "SELECT name FROM {}.sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name",
            quote_ident(&schema)
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(query_err)?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(query_err))
            .collect()
    }

    async fn describe_table(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let schema = self.resolve_schema(schema).await?;
        let sql = format!("PRAGMA {}.table_info({})", quote_ident(&schema), quote_ident(table));
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(query_err)?;

        if rows.is_empty() {
            return Err(DatabaseError::UnknownTable(format!("{schema}.{table}")));
        }

        rows.iter()
            .map(|r| {
                let name: String = r.try_get("name").map_err(query_err)?;
                let data_type: String = r.try_get("type").map_err(query_err)?;
                let notnull: i64 = r.try_get("notnull").map_err(query_err)?;
                let pk: i64 = r.try_get("pk").map_err(query_err)?;
                Ok(ColumnInfo {
                    name,
                    data_type,
                    nullable: notnull == 0 && pk == 0,
                })
            })
            .collect()
    }
}
