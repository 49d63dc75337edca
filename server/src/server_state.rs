//! Process-wide engine state.

use parking_lot::Mutex;
use std::{collections::HashSet, path::Path, sync::Arc};

use crate::app::{permissions::PermissionStore, AppRegistry};
use crate::cache::CacheService;
use crate::core::{config::ServerConfig, http_client::HttpClient, worker::WorkerPool};
use crate::db_adapter::DbAdapterFactory;
use crate::script::ScriptHost;

/// Shared state behind every request and lifecycle operation.
#[derive(Debug)]
pub struct ServerState {
	pub config: ServerConfig,
	/// Parsed `max_body_size`, in bytes.
	pub max_body_size: u64,

	pub registry: Arc<AppRegistry>,
	pub cache: CacheService,
	pub script_host: ScriptHost,
	pub worker: Arc<WorkerPool>,
	pub perm_store: PermissionStore,
	pub db_factory: Arc<dyn DbAdapterFactory>,
	pub http_client: HttpClient,

	/// Directory scanned for apps; every app lives at `<web_root>/<name>`.
	pub web_root: Box<Path>,
	pub settings_dir: Box<Path>,
	pub backups_dir: Box<Path>,
	pub temp_dir: Box<Path>,
	pub logs_dir: Box<Path>,
	/// Shared rhai library modules available to all apps by file name.
	pub modules_dir: Box<Path>,

	/// Names of apps with a lifecycle operation in flight. A second
	/// operation on the same app is rejected with Conflict.
	pub lifecycle_locks: Mutex<HashSet<Box<str>>>,
}

pub type Server = Arc<ServerState>;

// vim: ts=4
