//! Lifecycle manager tests: install, upgrade with preserved files,
//! rollback, delete and the conflict gates.

mod common;

use common::{test_server, write_file};
use tempfile::TempDir;

use warren::app::{lifecycle, package};
use warren::error::Error;

/// Builds `.gin` bytes for a small app tree.
fn build_package(version: &str, with_data: bool, preserve_data: bool) -> Vec<u8> {
	let dir = TempDir::new().expect("tempdir");
	let root = dir.path().join("blog");
	write_file(&root, "index.html", &format!("<html>blog {}</html>", version));
	write_file(
		&root,
		"box/app.json",
		&format!(r#"{{"version": "{}", "description": "a blog"}}"#, version),
	);
	write_file(&root, "box/api/posts.rhai", "fn handle(g) { g.response.send(\"posts\"); }");
	if with_data {
		write_file(&root, "box/data/posts.db", "DATA-V1");
	}
	if preserve_data {
		write_file(&root, "box/.gup", r#"{"preserve": ["box/data/**"]}"#);
	}
	package::pack_dir(&root).expect("pack")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn install_registers_and_extracts() {
	let ts = test_server(serde_json::json!({})).await;
	let pkg = build_package("1.0.0", true, false);

	lifecycle::install(&ts.server, "blog", &pkg, &["fs".into()]).await.expect("install");

	let entry = ts.server.registry.get("blog").expect("registered");
	assert_eq!(entry.config.version, "1.0.0");
	assert!(ts.web_root().join("blog/index.html").is_file());
	assert!(ts.web_root().join("blog/box/data/posts.db").is_file());

	// permissions were persisted
	let granted = ts.server.perm_store.granted_for("blog").await.expect("granted");
	assert_eq!(granted.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn install_conflicts_on_existing_app() {
	let ts = test_server(serde_json::json!({})).await;
	let pkg = build_package("1.0.0", false, false);

	lifecycle::install(&ts.server, "blog", &pkg, &[]).await.expect("install");
	let res = lifecycle::install(&ts.server, "blog", &pkg, &[]).await;
	assert!(matches!(res, Err(Error::Conflict(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn install_rejects_invalid_names() {
	let ts = test_server(serde_json::json!({})).await;
	let pkg = build_package("1.0.0", false, false);
	let res = lifecycle::install(&ts.server, "../evil", &pkg, &[]).await;
	assert!(matches!(res, Err(Error::Validation(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upgrade_preserves_data_and_writes_backup() {
	let ts = test_server(serde_json::json!({})).await;
	lifecycle::install(&ts.server, "blog", &build_package("1.0.0", true, false), &[])
		.await
		.expect("install v1");

	// v2 carries no data files but preserves box/data/**
	let v2 = build_package("2.0.0", false, true);
	let plan = lifecycle::upgrade(&ts.server, "blog", v2, &[], true).await.expect("upgrade");

	assert_eq!(plan.from_version, "1.0.0");
	assert_eq!(plan.to_version, "2.0.0");
	assert!(plan.files.preserved.contains(&"box/data/posts.db".to_string()));

	let entry = ts.server.registry.get("blog").expect("registered");
	assert_eq!(entry.config.version, "2.0.0");
	assert!(!entry.is_in_maintenance());

	// preserved bytes survived the swap
	let data = std::fs::read_to_string(ts.web_root().join("blog/box/data/posts.db"))
		.expect("preserved file");
	assert_eq!(data, "DATA-V1");

	// a v1 backup exists under backups/blog/
	let backups = package::list_backups(&ts.server.backups_dir, "blog").expect("backups");
	assert_eq!(backups.len(), 1);
	assert!(backups[0].starts_with("blog_v1.0.0_"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rollback_restores_newest_backup_and_deletes_it() {
	let ts = test_server(serde_json::json!({})).await;
	lifecycle::install(&ts.server, "blog", &build_package("1.0.0", true, false), &[])
		.await
		.expect("install v1");
	lifecycle::upgrade(&ts.server, "blog", build_package("2.0.0", false, true), &[], true)
		.await
		.expect("upgrade");

	lifecycle::rollback(&ts.server, "blog", &[]).await.expect("rollback");

	let entry = ts.server.registry.get("blog").expect("registered");
	assert_eq!(entry.config.version, "1.0.0");
	assert_eq!(
		std::fs::read_to_string(ts.web_root().join("blog/index.html")).expect("index"),
		"<html>blog 1.0.0</html>"
	);

	// the consumed backup is gone
	let backups = package::list_backups(&ts.server.backups_dir, "blog").expect("backups");
	assert!(backups.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_removes_everything() {
	let ts = test_server(serde_json::json!({})).await;
	lifecycle::install(&ts.server, "blog", &build_package("1.0.0", true, false), &["fs".into()])
		.await
		.expect("install");

	lifecycle::delete(&ts.server, "blog").await.expect("delete");

	assert!(ts.server.registry.get("blog").is_none());
	assert!(!ts.web_root().join("blog").exists());
	assert!(ts.server.perm_store.granted_for("blog").await.expect("granted").is_empty());

	// deleting again is a conflict
	let res = lifecycle::delete(&ts.server, "blog").await;
	assert!(matches!(res, Err(Error::Conflict(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_picks_up_config_changes() {
	let ts = test_server(serde_json::json!({})).await;
	lifecycle::install(&ts.server, "blog", &build_package("1.0.0", false, false), &[])
		.await
		.expect("install");

	write_file(
		ts.web_root(),
		"blog/box/app.json",
		r#"{"version": "1.1.0", "description": "edited"}"#,
	);
	lifecycle::reload(&ts.server, "blog").await.expect("reload");

	let entry = ts.server.registry.get("blog").expect("registered");
	assert_eq!(entry.config.version, "1.1.0");
	assert!(!entry.is_in_maintenance());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn set_permissions_drops_invalid_keys_and_reloads() {
	let ts = test_server(serde_json::json!({})).await;
	lifecycle::install(&ts.server, "blog", &build_package("1.0.0", false, false), &[])
		.await
		.expect("install");

	lifecycle::set_permissions(
		&ts.server,
		"blog",
		&["fs".into(), "db".into(), "fs".into(), "root".into()],
	)
	.await
	.expect("set permissions");

	let entry = ts.server.registry.get("blog").expect("registered");
	assert_eq!(entry.permissions.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn analyze_backup_reads_manifests() {
	let ts = test_server(serde_json::json!({})).await;
	let dir = TempDir::new().expect("tempdir");
	let root = dir.path().join("blog");
	write_file(&root, "box/app.json", r#"{"version": "3.1.0"}"#);
	write_file(
		&root,
		"box/pmft.json",
		r#"{"permissions": {"mandatory": ["fs", "db"], "optional": []}}"#,
	);
	let pkg = package::pack_dir(&root).expect("pack");

	let backup_dir = ts.server.backups_dir.join("blog");
	std::fs::create_dir_all(&backup_dir).expect("mkdir");
	std::fs::write(backup_dir.join("blog_v3.1.0_2026-05-01T00-00-00-000Z.gin"), pkg)
		.expect("write backup");

	let info = lifecycle::analyze_backup(&ts.server, "blog", "latest").await.expect("analyze");
	assert_eq!(info["version"], serde_json::json!("3.1.0"));
	assert_eq!(
		info["permissions"]["permissions"]["mandatory"],
		serde_json::json!(["fs", "db"])
	);
}

// vim: ts=4
