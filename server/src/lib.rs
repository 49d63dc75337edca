//! warren — a multi-tenant application server.
//!
//! One process hosts many self-contained apps: public web assets plus
//! private server scripts executed in a per-app sandbox with
//! capability-gated host modules. A privileged app manages the lifecycle
//! of the others at runtime.

pub mod app;
pub mod bootstrap;
pub mod cache;
pub mod cache_adapter;
pub mod core;
pub mod db_adapter;
pub mod dispatch;
pub mod error;
pub mod prelude;
pub mod script;
pub mod server_state;
pub mod types;

use std::{
	collections::HashSet,
	path::{Path, PathBuf},
	sync::Arc,
};

use crate::cache::{CacheService, MemoryCacheAdapter};
use crate::cache_adapter::CacheAdapter;
use crate::core::{config::ServerConfig, http_client::HttpClient, webserver, worker::WorkerPool};
use crate::db_adapter::{DbAdapterFactory, NoDbAdapterFactory};
use crate::prelude::*;
use crate::script::ScriptHost;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Builder {
	config: Option<ServerConfig>,
	config_path: PathBuf,
	base_dir: PathBuf,
	remote_cache: Option<Arc<dyn CacheAdapter>>,
	db_factory: Option<Arc<dyn DbAdapterFactory>>,
	worker: Option<Arc<WorkerPool>>,
}

impl Builder {
	pub fn new() -> Self {
		Builder {
			config: None,
			config_path: PathBuf::from("./server.json"),
			base_dir: PathBuf::from("."),
			remote_cache: None,
			db_factory: None,
			worker: None,
		}
	}

	pub fn config(&mut self, config: ServerConfig) -> &mut Self {
		self.config = Some(config);
		self
	}

	pub fn config_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
		self.config_path = path.into();
		self
	}

	/// Directory holding `logs/`, `settings/`, `backups/`, `temp/` and
	/// `modules/`.
	pub fn base_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
		self.base_dir = dir.into();
		self
	}

	/// An already-connected remote cache backend. When the configured
	/// provider is remote and none is supplied (or its connection
	/// failed), the engine falls back to the in-memory backend.
	pub fn remote_cache(&mut self, adapter: Arc<dyn CacheAdapter>) -> &mut Self {
		self.remote_cache = Some(adapter);
		self
	}

	pub fn db_factory(&mut self, factory: Arc<dyn DbAdapterFactory>) -> &mut Self {
		self.db_factory = Some(factory);
		self
	}

	pub fn worker(&mut self, worker: Arc<WorkerPool>) -> &mut Self {
		self.worker = Some(worker);
		self
	}

	/// Builds the engine state and serves until shutdown.
	pub async fn run(self) -> WrResult<()> {
		info!("warren v{}", VERSION);

		let config = match self.config {
			Some(config) => config,
			None => ServerConfig::load(&self.config_path).await?,
		};
		let max_body_size = config.max_body_size()?;

		// Working directories beside the process root
		let logs_dir: Box<Path> = self.base_dir.join("logs").into();
		let settings_dir: Box<Path> = self.base_dir.join("settings").into();
		let backups_dir: Box<Path> = self.base_dir.join("backups").into();
		let temp_dir: Box<Path> = self.base_dir.join("temp").into();
		let modules_dir: Box<Path> = self.base_dir.join("modules").into();
		bootstrap::ensure_dirs(&[&logs_dir, &settings_dir, &backups_dir, &temp_dir]).await?;

		// The web root must exist; refusing to start beats serving nothing
		let web_root: Box<Path> = config.web_root.clone().into();
		if !web_root.is_dir() {
			error!("FATAL: web root {} does not exist", web_root.display());
			return Err(Error::Config(format!(
				"web root {} does not exist",
				web_root.display()
			)));
		}

		// Cache service: remote backend when configured and reachable,
		// in-memory otherwise (in-memory cannot fail)
		let backend: Arc<dyn CacheAdapter> = match (config.cache.provider.as_str(), &self.remote_cache)
		{
			("memory", _) => Arc::new(MemoryCacheAdapter::new()),
			(_, Some(adapter)) => adapter.clone(),
			(provider, None) => {
				warn!(
					"Cache provider '{}' unavailable, falling back to in-memory",
					provider
				);
				Arc::new(MemoryCacheAdapter::new())
			}
		};
		let cache = CacheService::new(backend, config.cache.ttl);

		let worker = self.worker.unwrap_or_else(|| Arc::new(WorkerPool::new(2, 2, 2)));
		let script_host = ScriptHost::new(worker.clone(), tokio::runtime::Handle::current());
		let db_factory = self.db_factory.unwrap_or_else(|| Arc::new(NoDbAdapterFactory));
		let perm_store = app::permissions::PermissionStore::new(&settings_dir);

		let server: Server = Arc::new(server_state::ServerState {
			config,
			max_body_size,
			registry: Arc::new(app::AppRegistry::new()),
			cache,
			script_host,
			worker,
			perm_store,
			db_factory,
			http_client: HttpClient::new()?,
			web_root,
			settings_dir,
			backups_dir,
			temp_dir,
			logs_dir,
			modules_dir,
			lifecycle_locks: parking_lot::Mutex::new(HashSet::new()),
		});

		bootstrap::scan_apps(&server).await?;

		let router = dispatch::router(server.clone());
		let mut handles: Vec<webserver::ServeHandle> = Vec::new();

		if server.config.server.http.enabled {
			handles.push(webserver::bind_http(server.config.server.http.port, router.clone()).await?);
		}
		if server.config.server.https.enabled {
			let (Some(cert), Some(key)) = (
				server.config.server.https.cert_file.clone(),
				server.config.server.https.key_file.clone(),
			) else {
				return Err(Error::Config("https enabled without key_file/cert_file".into()));
			};
			handles.push(
				webserver::bind_https(server.config.server.https.port, &cert, &key, router.clone())
					.await?,
			);
		}
		if handles.is_empty() {
			return Err(Error::Config("no listener enabled".into()));
		}

		tokio::spawn(bootstrap::shutdown_on_signal(server.clone()));

		for handle in handles {
			handle.await??;
		}
		Ok(())
	}
}

impl Default for Builder {
	fn default() -> Self {
		Self::new()
	}
}

// vim: ts=4
