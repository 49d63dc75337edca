//! Shared test harness: an engine instance over a temp directory tree.

use std::{collections::HashSet, path::Path, sync::Arc};

use tempfile::TempDir;

use warren::app::{permissions::PermissionStore, AppRegistry};
use warren::cache::{CacheService, MemoryCacheAdapter};
use warren::core::{config::ServerConfig, http_client::HttpClient, worker::WorkerPool};
use warren::db_adapter::NoDbAdapterFactory;
use warren::script::ScriptHost;
use warren::server_state::{Server, ServerState};

pub struct TestServer {
	pub server: Server,
	/// Kept alive for the duration of the test.
	pub _dir: TempDir,
}

pub fn write_file(root: &Path, rel: &str, content: &str) {
	let path = root.join(rel);
	std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
	std::fs::write(path, content).expect("write");
}

/// Builds an engine over a fresh temp tree. Apps written under
/// `web_root()` before calling `scan()` are picked up like at boot.
pub async fn test_server(extra_config: serde_json::Value) -> TestServer {
	let dir = TempDir::new().expect("tempdir");
	let base = dir.path();
	let web_root = base.join("web");

	for sub in ["web", "logs", "settings", "backups", "temp", "modules"] {
		std::fs::create_dir_all(base.join(sub)).expect("mkdir");
	}

	let mut config_json = serde_json::json!({
		"web_root": web_root.to_string_lossy(),
		"max_body_size": "1kb",
	});
	if let (Some(base_map), serde_json::Value::Object(extra)) =
		(config_json.as_object_mut(), extra_config)
	{
		for (k, v) in extra {
			base_map.insert(k, v);
		}
	}
	let config = ServerConfig::from_json(&config_json.to_string()).expect("config");
	let max_body_size = config.max_body_size().expect("body size");

	let worker = Arc::new(WorkerPool::new(1, 2, 1));
	let server: Server = Arc::new(ServerState {
		config,
		max_body_size,
		registry: Arc::new(AppRegistry::new()),
		cache: CacheService::new(Arc::new(MemoryCacheAdapter::new()), 60),
		script_host: ScriptHost::new(worker.clone(), tokio::runtime::Handle::current()),
		worker,
		perm_store: PermissionStore::new(&base.join("settings")),
		db_factory: Arc::new(NoDbAdapterFactory),
		http_client: HttpClient::new().expect("http client"),
		web_root: web_root.into(),
		settings_dir: base.join("settings").into(),
		backups_dir: base.join("backups").into(),
		temp_dir: base.join("temp").into(),
		logs_dir: base.join("logs").into(),
		modules_dir: base.join("modules").into(),
		lifecycle_locks: parking_lot::Mutex::new(HashSet::new()),
	});

	TestServer { server, _dir: dir }
}

impl TestServer {
	pub fn web_root(&self) -> &Path {
		&self.server.web_root
	}

	pub async fn scan(&self) {
		warren::bootstrap::scan_apps(&self.server).await.expect("scan");
	}
}

// vim: ts=4
