//! SQLite-backed database adapter.
//!
//! Each logical database of an app maps to one SQLite file under the
//! app's box root. Rows come back as JSON objects keyed by column name,
//! which is what the script-facing `db` module expects.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use warren::db_adapter::{DbAdapterFactory, DbConnConfig, DbPool};
use warren::error::{Error, WrResult};

fn backend_err(err: &sqlx::Error) -> Error {
	Error::Backend(format!("sqlite: {}", err))
}

/// Lexically keeps a configured database file inside the box root.
fn database_path(box_root: &Path, config: &DbConnConfig) -> WrResult<PathBuf> {
	let file = config
		.connection
		.get("file")
		.and_then(|v| v.as_str())
		.map_or_else(|| format!("data/{}.sqlite", config.name), ToString::to_string);

	let mut resolved = box_root.to_path_buf();
	for comp in Path::new(&file).components() {
		match comp {
			Component::Normal(seg) => resolved.push(seg),
			Component::CurDir => {}
			_ => {
				return Err(Error::Validation(format!(
					"database file escapes the box root: '{}'",
					file
				)));
			}
		}
	}
	Ok(resolved)
}

#[derive(Debug)]
pub struct SqliteDbPool {
	pool: SqlitePool,
	dialect: &'static str,
}

fn row_to_json(row: &SqliteRow) -> serde_json::Value {
	let mut object = serde_json::Map::new();
	for (idx, column) in row.columns().iter().enumerate() {
		let value = match column.type_info().name() {
			"INTEGER" | "BOOLEAN" => row
				.try_get::<Option<i64>, _>(idx)
				.ok()
				.flatten()
				.map_or(serde_json::Value::Null, serde_json::Value::from),
			"REAL" => row
				.try_get::<Option<f64>, _>(idx)
				.ok()
				.flatten()
				.map_or(serde_json::Value::Null, serde_json::Value::from),
			"BLOB" => row
				.try_get::<Option<Vec<u8>>, _>(idx)
				.ok()
				.flatten()
				.map_or(serde_json::Value::Null, serde_json::Value::from),
			_ => row
				.try_get::<Option<String>, _>(idx)
				.ok()
				.flatten()
				.map_or(serde_json::Value::Null, serde_json::Value::from),
		};
		object.insert(column.name().to_string(), value);
	}
	serde_json::Value::Object(object)
}

fn bind_params<'q>(
	mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
	params: &'q [serde_json::Value],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
	for param in params {
		query = match param {
			serde_json::Value::Null => query.bind(Option::<String>::None),
			serde_json::Value::Bool(b) => query.bind(*b),
			serde_json::Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					query.bind(i)
				} else {
					query.bind(n.as_f64().unwrap_or_default())
				}
			}
			serde_json::Value::String(s) => query.bind(s.as_str()),
			other => query.bind(other.to_string()),
		};
	}
	query
}

#[async_trait]
impl DbPool for SqliteDbPool {
	fn dialect(&self) -> &str {
		self.dialect
	}

	async fn query(
		&self,
		sql: &str,
		params: &[serde_json::Value],
	) -> WrResult<Vec<serde_json::Value>> {
		let query = bind_params(sqlx::query(sql), params);
		let rows = query.fetch_all(&self.pool).await.map_err(|e| backend_err(&e))?;
		Ok(rows.iter().map(row_to_json).collect())
	}

	async fn execute(&self, sql: &str, params: &[serde_json::Value]) -> WrResult<u64> {
		let query = bind_params(sqlx::query(sql), params);
		let result = query.execute(&self.pool).await.map_err(|e| backend_err(&e))?;
		Ok(result.rows_affected())
	}

	async fn close(&self) {
		self.pool.close().await;
	}
}

#[derive(Debug, Default)]
pub struct DbAdapterSqliteFactory;

impl DbAdapterSqliteFactory {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl DbAdapterFactory for DbAdapterSqliteFactory {
	async fn open(
		&self,
		app_name: &str,
		box_root: &Path,
		config: &DbConnConfig,
	) -> WrResult<Arc<dyn DbPool>> {
		if config.dialect != "sqlite" {
			return Err(Error::Config(format!(
				"app '{}': database '{}' wants dialect '{}', this adapter speaks sqlite",
				app_name, config.name, config.dialect
			)));
		}

		let path = database_path(box_root, config)?;
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		debug!("Opening sqlite database {}", path.display());

		let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
		let pool = SqlitePoolOptions::new()
			.max_connections(4)
			.connect_with(options)
			.await
			.map_err(|e| backend_err(&e))?;

		info!("Opened database '{}' for app '{}'", config.name, app_name);
		Ok(Arc::new(SqliteDbPool { pool, dialect: "sqlite" }))
	}
}

// vim: ts=4
