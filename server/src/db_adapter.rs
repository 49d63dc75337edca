//! Database adapter interface
//!
//! Each app owns one pool per configured logical database. Adapter
//! internals (drivers, dialect translation) live in separate crates; the
//! engine only opens, queries and closes pools through these traits.

use async_trait::async_trait;
use serde::Deserialize;
use std::{path::Path, sync::Arc};

use crate::prelude::*;

/// One entry of an app's `databases` configuration list.
#[derive(Clone, Debug, Deserialize, serde::Serialize)]
pub struct DbConnConfig {
	/// Logical name scripts refer to (`db::query("main", ...)`).
	pub name: String,
	/// SQL dialect hint for the adapter ("sqlite", "postgres", ...).
	pub dialect: String,
	/// Adapter-specific connection parameters.
	#[serde(default)]
	pub connection: serde_json::Value,
}

/// A live connection pool for one logical database of one app.
#[async_trait]
pub trait DbPool: Send + Sync + std::fmt::Debug {
	fn dialect(&self) -> &str;

	/// Runs a row-returning statement. Rows come back as JSON objects
	/// keyed by column name.
	async fn query(
		&self,
		sql: &str,
		params: &[serde_json::Value],
	) -> WrResult<Vec<serde_json::Value>>;

	/// Runs a statement and returns the number of affected rows.
	async fn execute(&self, sql: &str, params: &[serde_json::Value]) -> WrResult<u64>;

	/// Closes the pool. Called on app delete and reload before the app
	/// directory is touched.
	async fn close(&self);
}

/// Opens pools for apps at registration time.
#[async_trait]
pub trait DbAdapterFactory: Send + Sync + std::fmt::Debug {
	async fn open(
		&self,
		app_name: &str,
		box_root: &Path,
		config: &DbConnConfig,
	) -> WrResult<Arc<dyn DbPool>>;
}

/// Factory used when no database adapter is wired in: opening any pool
/// fails with a configuration error, so apps without `databases` entries
/// work and apps with them fail loudly at init.
#[derive(Debug)]
pub struct NoDbAdapterFactory;

#[async_trait]
impl DbAdapterFactory for NoDbAdapterFactory {
	async fn open(
		&self,
		app_name: &str,
		_box_root: &Path,
		config: &DbConnConfig,
	) -> WrResult<Arc<dyn DbPool>> {
		Err(Error::Config(format!(
			"app '{}' declares database '{}' but no db adapter is configured",
			app_name, config.name
		)))
	}
}

// vim: ts=4
