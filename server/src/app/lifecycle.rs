//! App lifecycle operations: install, upgrade, rollback, delete, reload.
//!
//! Every mutating operation runs under a per-app lock (a second operation
//! on the same app is rejected with Conflict) and, for registered apps,
//! the maintenance flag — the dispatcher answers 503 for the whole
//! duration. Failures clear the flag and surface; partial on-disk state
//! is logged.

use std::{path::PathBuf, sync::Arc};

use crate::app::{init_app, package, AppEntry};
use crate::bootstrap;
use crate::core::utils::random_id;
use crate::prelude::*;
use crate::script;
use crate::server_state::ServerState;

use crate::app::package::UpgradePlan;

struct OpGuard<'s> {
	server: &'s ServerState,
	name: Box<str>,
}

impl Drop for OpGuard<'_> {
	fn drop(&mut self) {
		self.server.lifecycle_locks.lock().remove(&self.name);
	}
}

fn acquire<'s>(server: &'s ServerState, name: &str) -> WrResult<OpGuard<'s>> {
	let mut locks = server.lifecycle_locks.lock();
	if !locks.insert(name.into()) {
		return Err(Error::Conflict(format!(
			"a lifecycle operation is already running on app '{}'",
			name
		)));
	}
	Ok(OpGuard { server, name: name.into() })
}

/// Registers a freshly initialised app: dev server (development SPAs) and
/// startup scripts.
async fn start_app(server: &Server, entry: &Arc<AppEntry>) -> WrResult<()> {
	bootstrap::spawn_dev_server(entry).await;
	script::run_startup_scripts(server, entry).await
}

/// Extracts and registers an app from package bytes. Assumes the
/// operation lock is held and the name is free.
async fn install_locked(
	server: &Server,
	name: &AppName,
	package_bytes: Vec<u8>,
	perms: &[String],
) -> WrResult<Arc<AppEntry>> {
	let app_dir = server.web_root.join(name.as_str());
	if tokio::fs::try_exists(&app_dir).await.unwrap_or(false) {
		return Err(Error::Conflict(format!(
			"directory for app '{}' already exists",
			name
		)));
	}

	let dest = app_dir.clone();
	let extraction =
		tokio::task::spawn_blocking(move || package::extract(&package_bytes, &dest)).await?;
	if let Err(e) = extraction {
		warn!("Install of '{}' failed during extraction: {}", name, e);
		let _ = tokio::fs::remove_dir_all(&app_dir).await;
		return Err(e);
	}

	server.perm_store.set(name.as_str(), perms).await?;

	match init_app(&server.web_root, name, &server.perm_store, &server.db_factory).await {
		Ok(entry) => {
			server.registry.insert(entry.clone());
			if let Err(e) = start_app(server, &entry).await {
				warn!("Install of '{}' failed during startup: {}", name, e);
				delete_locked(server, &entry).await?;
				return Err(e);
			}
			Ok(entry)
		}
		Err(e) => {
			warn!("Install of '{}' failed during registration: {}", name, e);
			let _ = tokio::fs::remove_dir_all(&app_dir).await;
			let _ = server.perm_store.remove(name.as_str()).await;
			Err(e)
		}
	}
}

/// Installs a new app from a `.gin` package.
pub async fn install(
	server: &Server,
	name: &str,
	package_bytes: &[u8],
	perms: &[String],
) -> WrResult<()> {
	let app_name = AppName::new(name)?;
	let _guard = acquire(server, name)?;

	if server.registry.contains(name) {
		return Err(Error::Conflict(format!("app '{}' is already installed", name)));
	}

	install_locked(server, &app_name, package_bytes.to_vec(), perms).await?;
	info!("Installed app '{}'", name);
	Ok(())
}

/// Tears down a registered app. Assumes the operation lock is held and
/// the maintenance flag is set (or the entry is being discarded anyway).
async fn delete_locked(server: &Server, entry: &Arc<AppEntry>) -> WrResult<()> {
	entry.kill_dev_child().await;
	entry.close_db_pools().await;
	server.perm_store.remove(entry.name.as_str()).await?;

	// Final safety check before rm -rf: the resolved app directory must
	// live under the web root.
	let app_dir = server.web_root.join(entry.name.as_str());
	if !crate::core::paths::is_contained(&app_dir, &server.web_root) {
		return Err(Error::PathTraversal(app_dir.display().to_string()));
	}
	if tokio::fs::try_exists(&app_dir).await.unwrap_or(false) {
		tokio::fs::remove_dir_all(&app_dir).await?;
	}

	server.registry.remove(entry.name.as_str());
	server.script_host.purge_app(&entry.box_root);
	server.cache.clear(&format!("static:{}", entry.web_root.display())).await?;
	Ok(())
}

/// Deletes an app and all of its runtime state.
pub async fn delete(server: &Server, name: &str) -> WrResult<()> {
	let _guard = acquire(server, name)?;
	let entry = server
		.registry
		.get(name)
		.ok_or_else(|| Error::Conflict(format!("app '{}' is not installed", name)))?;

	if !entry.enter_maintenance() {
		return Err(Error::Conflict(format!("app '{}' is in maintenance", name)));
	}

	let res = delete_locked(server, &entry).await;
	if let Err(ref e) = res {
		warn!("Delete of '{}' failed: {}", name, e);
		entry.clear_maintenance();
	} else {
		info!("Deleted app '{}'", name);
	}
	res
}

async fn upgrade_locked(
	server: &Server,
	entry: &Arc<AppEntry>,
	package_bytes: Vec<u8>,
	perms: &[String],
	backup: bool,
) -> WrResult<UpgradePlan> {
	let name = entry.name.clone();
	let live_root: PathBuf = server.web_root.join(name.as_str());

	if backup {
		let backup_dir = server.backups_dir.join(name.as_str());
		tokio::fs::create_dir_all(&backup_dir).await?;
		let file = backup_dir.join(package::backup_file_name(name.as_str(), &entry.config.version));
		let src = live_root.clone();
		let bytes = tokio::task::spawn_blocking(move || package::pack_dir(&src)).await??;
		tokio::fs::write(&file, bytes).await?;
		info!("Wrote backup {}", file.display());
	}

	let plan = {
		let live = live_root.clone();
		let version = entry.config.version.clone();
		let pkg = package_bytes.clone();
		tokio::task::spawn_blocking(move || package::derive_plan(&live, &version, &pkg)).await??
	};

	// Park preserved files outside the app directory for the swap
	let stash = server.temp_dir.join(format!("{}-upgrade-{}", name, random_id()));
	for rel in &plan.files.preserved {
		let src = live_root.join(rel);
		let dst = stash.join(rel);
		if let Some(parent) = dst.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::copy(&src, &dst).await?;
	}

	let res: WrResult<()> = async {
		delete_locked(server, entry).await?;
		install_locked(server, &name, package_bytes, perms).await?;

		for rel in &plan.files.preserved {
			let src = stash.join(rel);
			let dst = live_root.join(rel);
			if let Some(parent) = dst.parent() {
				tokio::fs::create_dir_all(parent).await?;
			}
			tokio::fs::copy(&src, &dst).await?;
		}
		Ok(())
	}
	.await;

	let _ = tokio::fs::remove_dir_all(&stash).await;
	res?;

	info!(
		"Upgraded app '{}' {} -> {} ({} preserved, {} added, {} overwritten, {} deleted)",
		name,
		plan.from_version,
		plan.to_version,
		plan.files.preserved.len(),
		plan.files.added.len(),
		plan.files.overwritten.len(),
		plan.files.deleted.len()
	);
	Ok(plan)
}

/// Upgrades an app in place, preserving the files named by the package's
/// `.gup` manifest.
pub async fn upgrade(
	server: &Server,
	name: &str,
	package_bytes: Vec<u8>,
	perms: &[String],
	backup: bool,
) -> WrResult<UpgradePlan> {
	let _guard = acquire(server, name)?;
	let entry = server.registry.get(name).ok_or(Error::AppNotFound)?;
	if !entry.enter_maintenance() {
		return Err(Error::Conflict(format!("app '{}' is in maintenance", name)));
	}

	let res = upgrade_locked(server, &entry, package_bytes, perms, backup).await;
	if res.is_err() {
		entry.clear_maintenance();
	}
	res
}

/// Restores the newest backup, deleting it after a successful restore.
pub async fn rollback(server: &Server, name: &str, perms: &[String]) -> WrResult<UpgradePlan> {
	let _guard = acquire(server, name)?;
	let entry = server.registry.get(name).ok_or(Error::AppNotFound)?;

	let backup_path = package::latest_backup(&server.backups_dir, name)?;
	let package_bytes = tokio::fs::read(&backup_path).await?;

	if !entry.enter_maintenance() {
		return Err(Error::Conflict(format!("app '{}' is in maintenance", name)));
	}

	let res = upgrade_locked(server, &entry, package_bytes, perms, false).await;
	match res {
		Ok(plan) => {
			tokio::fs::remove_file(&backup_path).await?;
			info!("Rolled back app '{}' using {}", name, backup_path.display());
			Ok(plan)
		}
		Err(e) => {
			entry.clear_maintenance();
			Err(e)
		}
	}
}

fn backup_path_for(server: &ServerState, name: &str, which: &str) -> WrResult<PathBuf> {
	if which == "latest" {
		package::latest_backup(&server.backups_dir, name)
	} else {
		if which.contains('/') || which.contains('\\') || !which.ends_with(".gin") {
			return Err(Error::Validation(format!("invalid backup name: '{}'", which)));
		}
		let path = server.backups_dir.join(name).join(which);
		if path.is_file() {
			Ok(path)
		} else {
			Err(Error::NotFound(format!("backup '{}'", which)))
		}
	}
}

/// Installs an app from one of its backups (`latest` or a file name).
pub async fn install_from_backup(
	server: &Server,
	name: &str,
	which: &str,
	perms: &[String],
) -> WrResult<()> {
	let app_name = AppName::new(name)?;
	let _guard = acquire(server, name)?;

	if server.registry.contains(name) {
		return Err(Error::Conflict(format!("app '{}' is already installed", name)));
	}

	let path = backup_path_for(server, name, which)?;
	let package_bytes = tokio::fs::read(&path).await?;
	install_locked(server, &app_name, package_bytes, perms).await?;
	info!("Installed app '{}' from backup {}", name, path.display());
	Ok(())
}

async fn reload_locked(server: &Server, old: &Arc<AppEntry>) -> WrResult<()> {
	old.kill_dev_child().await;
	old.close_db_pools().await;

	server.script_host.purge_app(&old.box_root);
	server.cache.clear(&format!("static:{}", old.web_root.display())).await?;

	let entry = init_app(&server.web_root, &old.name, &server.perm_store, &server.db_factory).await?;
	server.registry.insert(entry.clone());
	start_app(server, &entry).await
}

/// Re-reads config, permissions and routes of an app from disk and swaps
/// in a fresh registry entry.
pub async fn reload(server: &Server, name: &str) -> WrResult<()> {
	let _guard = acquire(server, name)?;
	let old = server.registry.get(name).ok_or(Error::AppNotFound)?;
	if !old.enter_maintenance() {
		return Err(Error::Conflict(format!("app '{}' is in maintenance", name)));
	}

	let res = reload_locked(server, &old).await;
	old.clear_maintenance();
	match res {
		Ok(()) => {
			info!("Reloaded app '{}'", name);
			Ok(())
		}
		Err(e) => {
			warn!("Reload of '{}' failed: {}", name, e);
			Err(e)
		}
	}
}

/// Rewrites an app's permission record, then reloads it so the grants
/// take effect.
pub async fn set_permissions(server: &Server, name: &str, perms: &[String]) -> WrResult<()> {
	if !server.registry.contains(name) {
		return Err(Error::AppNotFound);
	}
	server.perm_store.set(name, perms).await?;
	reload(server, name).await
}

/// Computes the upgrade plan for a package without applying it.
pub async fn upgrade_plan(
	server: &Server,
	name: &str,
	package_bytes: &[u8],
) -> WrResult<UpgradePlan> {
	let entry = server.registry.get(name).ok_or(Error::AppNotFound)?;
	let live = server.web_root.join(name);
	let version = entry.config.version.clone();
	let pkg = package_bytes.to_vec();
	tokio::task::spawn_blocking(move || package::derive_plan(&live, &version, &pkg)).await?
}

/// Reads permission manifest and version out of a backup without
/// unpacking it.
pub async fn analyze_backup(
	server: &Server,
	name: &str,
	which: &str,
) -> WrResult<serde_json::Value> {
	let path = backup_path_for(server, name, which)?;
	let bytes = tokio::fs::read(&path).await?;
	let info = tokio::task::spawn_blocking(move || package::analyze(&bytes)).await??;

	Ok(serde_json::json!({
		"permissions": info.permissions.map(|p| serde_json::to_value(p).unwrap_or_default()),
		"version": info.config.map(|c| c.version),
	}))
}

// vim: ts=4
