//! Live app model: per-app state and the process-wide registry.

pub mod config;
pub mod lifecycle;
pub mod logger;
pub mod package;
pub mod permissions;
pub mod routes;

use parking_lot::RwLock;
use std::{
	collections::{HashMap, HashSet},
	path::Path,
	sync::atomic::{AtomicBool, Ordering},
	sync::Arc,
};

use crate::db_adapter::{DbAdapterFactory, DbPool};
use crate::prelude::*;

use config::AppConfig;
use logger::AppLogger;
use permissions::PermissionStore;
use routes::CompiledRoute;

/// One registered app. Immutable after initialization apart from the
/// maintenance flag and the dev-server child handle; reload swaps a fresh
/// entry into the registry instead of mutating in place.
#[derive(Debug)]
pub struct AppEntry {
	pub name: AppName,
	pub config: AppConfig,
	/// `<webRoot>/<name>` — public assets.
	pub web_root: Box<Path>,
	/// `<webRoot>/<name>/box` — private scripts and data, never served.
	pub box_root: Box<Path>,
	pub routes: Box<[CompiledRoute]>,
	pub permissions: HashSet<Permission>,
	pub in_maintenance: AtomicBool,
	pub logger: AppLogger,
	pub db_pools: HashMap<Box<str>, Arc<dyn DbPool>>,
	pub dev_child: tokio::sync::Mutex<Option<tokio::process::Child>>,
	/// Compiled `cache_policy.no_client_cache_regex` patterns.
	pub no_client_cache: Vec<regex::Regex>,
	/// Compiled `cache_policy.no_server_cache_regex` patterns.
	pub no_server_cache: Vec<regex::Regex>,
}

fn compile_regexes(patterns: &[String]) -> WrResult<Vec<regex::Regex>> {
	patterns.iter().map(|p| regex::Regex::new(p).map_err(Error::from)).collect()
}

impl AppEntry {
	pub fn is_in_maintenance(&self) -> bool {
		self.in_maintenance.load(Ordering::Acquire)
	}

	/// Sets the maintenance flag; returns false if it was already set
	/// (a lifecycle operation is running on this app).
	pub fn enter_maintenance(&self) -> bool {
		self.in_maintenance
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
	}

	pub fn clear_maintenance(&self) {
		self.in_maintenance.store(false, Ordering::Release);
	}

	pub fn db_pool(&self, logical_name: &str) -> WrResult<Arc<dyn DbPool>> {
		self.db_pools
			.get(logical_name)
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("database '{}'", logical_name)))
	}

	pub async fn close_db_pools(&self) {
		for (name, pool) in &self.db_pools {
			debug!("Closing db pool '{}' of app '{}'", name, self.name);
			pool.close().await;
		}
	}

	pub async fn kill_dev_child(&self) {
		let mut guard = self.dev_child.lock().await;
		if let Some(mut child) = guard.take() {
			info!("Stopping dev server of app '{}'", self.name);
			if let Err(e) = child.kill().await {
				warn!("Failed to kill dev server of '{}': {}", self.name, e);
			}
		}
	}
}

/// Builds an [`AppEntry`] from an on-disk app directory. Startup scripts
/// and dev-server children are handled by the caller.
pub async fn init_app(
	server_web_root: &Path,
	name: &AppName,
	perm_store: &PermissionStore,
	db_factory: &Arc<dyn DbAdapterFactory>,
) -> WrResult<Arc<AppEntry>> {
	let web_root = server_web_root.join(name.as_str());
	let box_root = web_root.join("box");

	let config_path = box_root.join("app.json");
	let json = tokio::fs::read_to_string(&config_path).await.map_err(|e| {
		Error::Validation(format!("app '{}': cannot read box/app.json: {}", name, e))
	})?;
	let config = AppConfig::from_json(&json)?;

	let routes = routes::compile(&config.routes)?;
	let logger = AppLogger::new(name.as_str(), &config.logging.level);
	let permissions = perm_store.granted_for(name.as_str()).await?;
	let no_client_cache = compile_regexes(&config.cache_policy.no_client_cache_regex)?;
	let no_server_cache = compile_regexes(&config.cache_policy.no_server_cache_regex)?;

	let mut db_pools = HashMap::new();
	for db in &config.databases {
		let pool = db_factory.open(name.as_str(), &box_root, db).await?;
		db_pools.insert(db.name.clone().into_boxed_str(), pool);
	}

	info!(
		"Initialized app '{}' v{} ({} routes, {} permissions, {} databases)",
		name,
		config.version,
		routes.len(),
		permissions.len(),
		db_pools.len()
	);

	Ok(Arc::new(AppEntry {
		name: name.clone(),
		config,
		web_root: web_root.into(),
		box_root: box_root.into(),
		routes,
		permissions,
		in_maintenance: AtomicBool::new(false),
		logger,
		db_pools,
		dev_child: tokio::sync::Mutex::new(None),
		no_client_cache,
		no_server_cache,
	}))
}

/// Process-wide `appName → App` map. Mutated only by the lifecycle
/// manager and the startup orchestrator.
#[derive(Debug, Default)]
pub struct AppRegistry {
	apps: RwLock<HashMap<Box<str>, Arc<AppEntry>>>,
}

impl AppRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<Arc<AppEntry>> {
		self.apps.read().get(name).cloned()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.apps.read().contains_key(name)
	}

	pub fn insert(&self, entry: Arc<AppEntry>) {
		self.apps.write().insert(entry.name.as_str().into(), entry);
	}

	pub fn remove(&self, name: &str) -> Option<Arc<AppEntry>> {
		self.apps.write().remove(name)
	}

	pub fn names(&self) -> Vec<Box<str>> {
		let mut names: Vec<Box<str>> = self.apps.read().keys().cloned().collect();
		names.sort();
		names
	}

	pub fn snapshot(&self) -> Vec<Arc<AppEntry>> {
		self.apps.read().values().cloned().collect()
	}
}

#[cfg(test)]
pub mod test_support {
	use super::*;

	/// A minimal in-memory app entry for unit tests that never touches
	/// the filesystem, returned unwrapped so tests can tweak it.
	pub fn make_test_app_parts(name: &str) -> (AppEntry, Arc<AppRegistry>) {
		let web_root = std::path::PathBuf::from("/srv/web").join(name);
		let box_root = web_root.join("box");
		let entry = AppEntry {
			name: AppName::new(name).expect("test app name"),
			config: AppConfig::default(),
			web_root: web_root.into(),
			box_root: box_root.into(),
			routes: Box::new([]),
			permissions: HashSet::new(),
			in_maintenance: AtomicBool::new(false),
			logger: AppLogger::new(name, "info"),
			db_pools: HashMap::new(),
			dev_child: tokio::sync::Mutex::new(None),
			no_client_cache: Vec::new(),
			no_server_cache: Vec::new(),
		};
		let registry = Arc::new(AppRegistry::new());
		(entry, registry)
	}

	pub fn make_test_app(name: &str) -> (Arc<AppEntry>, Arc<AppRegistry>) {
		let (entry, registry) = make_test_app_parts(name);
		let entry = Arc::new(entry);
		registry.insert(entry.clone());
		(entry, registry)
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::make_test_app;
	use super::*;

	#[test]
	fn maintenance_gate_is_exclusive() {
		let (app, _) = make_test_app("demo");
		assert!(!app.is_in_maintenance());
		assert!(app.enter_maintenance());
		assert!(!app.enter_maintenance()); // second entry refused
		assert!(app.is_in_maintenance());
		app.clear_maintenance();
		assert!(app.enter_maintenance());
	}

	#[test]
	fn registry_insert_get_remove() {
		let (app, registry) = make_test_app("demo");
		assert!(registry.contains("demo"));
		assert_eq!(registry.get("demo").unwrap().name.as_str(), "demo");
		assert_eq!(registry.names(), vec![Box::from("demo")]);
		let removed = registry.remove("demo").unwrap();
		assert_eq!(removed.name.as_str(), app.name.as_str());
		assert!(!registry.contains("demo"));
	}
}

// vim: ts=4
