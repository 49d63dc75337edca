//! Startup orchestrator: directory layout, app discovery and dev-server
//! child supervision.

use std::sync::Arc;

use crate::app::{config::AppMode, config::AppType, init_app, AppEntry};
use crate::prelude::*;
use crate::script;

/// Ensures the engine's working directories exist next to the web root.
pub async fn ensure_dirs(server_dirs: &[&std::path::Path]) -> WrResult<()> {
	for dir in server_dirs {
		tokio::fs::create_dir_all(dir).await.map_err(|e| {
			error!("FATAL: cannot create directory {}: {}", dir.display(), e);
			Error::Config(format!("cannot create directory {}: {}", dir.display(), e))
		})?;
	}
	Ok(())
}

/// Spawns the dev build server of a development-mode SPA app, if one is
/// configured. The child handle is owned by the app entry and reaped on
/// delete, reload and process shutdown.
pub async fn spawn_dev_server(entry: &Arc<AppEntry>) {
	if entry.config.app_type != AppType::Spa || entry.config.mode != AppMode::Development {
		return;
	}
	let Some(spa) = &entry.config.spa else { return };
	let Some(command) = &spa.dev_command else { return };

	let mut parts = command.split_whitespace();
	let Some(program) = parts.next() else { return };

	let mut cmd = tokio::process::Command::new(program);
	cmd.args(parts).current_dir(&entry.web_root).kill_on_drop(true);

	match cmd.spawn() {
		Ok(child) => {
			info!("Started dev server for app '{}': {}", entry.name, command);
			*entry.dev_child.lock().await = Some(child);
		}
		Err(e) => {
			warn!("Failed to start dev server for app '{}': {}", entry.name, e);
		}
	}
}

/// Scans the web root for app directories (`<dir>/box/app.json`) that are
/// not registered yet, initialises and starts each. Per-app failures are
/// logged and skipped so one broken app cannot take the process down.
/// Returns the names of newly registered apps.
pub async fn scan_apps(server: &Server) -> WrResult<Vec<String>> {
	let mut added = Vec::new();
	let mut entries = tokio::fs::read_dir(&server.web_root).await.map_err(|e| {
		error!("FATAL: cannot read web root {}: {}", server.web_root.display(), e);
		Error::Config(format!("cannot read web root: {}", e))
	})?;

	while let Some(dir_entry) = entries.next_entry().await? {
		if !dir_entry.file_type().await?.is_dir() {
			continue;
		}
		let dir_name = dir_entry.file_name().to_string_lossy().to_string();
		let Ok(name) = AppName::new(&dir_name) else {
			debug!("Skipping directory '{}': not a valid app name", dir_name);
			continue;
		};
		if server.registry.contains(name.as_str()) {
			continue;
		}
		if !dir_entry.path().join("box/app.json").is_file() {
			continue;
		}

		match init_app(&server.web_root, &name, &server.perm_store, &server.db_factory).await {
			Ok(entry) => {
				server.registry.insert(entry.clone());
				spawn_dev_server(&entry).await;
				if let Err(e) = script::run_startup_scripts(server, &entry).await {
					error!("Startup scripts of app '{}' failed: {}", name, e);
				}
				added.push(name.as_str().to_string());
			}
			Err(e) => {
				error!("Skipping app '{}': {}", name, e);
			}
		}
	}

	if !added.is_empty() {
		let mut names = added.clone();
		names.sort();
		info!("Registered {} app(s): {}", names.len(), names.join(", "));
	}
	Ok(added)
}

/// Waits for a termination signal, then reaps every dev-server child.
pub async fn shutdown_on_signal(server: Server) {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			warn!("Failed to listen for ctrl-c: {}", e);
		}
	};

	#[cfg(unix)]
	{
		let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
		{
			Ok(term) => term,
			Err(e) => {
				warn!("Failed to listen for SIGTERM: {}", e);
				ctrl_c.await;
				reap_children(&server).await;
				return;
			}
		};
		tokio::select! {
			() = ctrl_c => {}
			_ = term.recv() => {}
		}
	}
	#[cfg(not(unix))]
	ctrl_c.await;

	info!("Shutdown signal received");
	reap_children(&server).await;
	std::process::exit(0);
}

async fn reap_children(server: &Server) {
	for entry in server.registry.snapshot() {
		entry.kill_dev_child().await;
	}
}

// vim: ts=4
