//! SQLite adapter query and lifecycle tests

use std::path::Path;
use tempfile::TempDir;

use warren::db_adapter::{DbAdapterFactory, DbConnConfig};
use warren_db_adapter_sqlite::DbAdapterSqliteFactory;

fn config(name: &str, file: Option<&str>) -> DbConnConfig {
	DbConnConfig {
		name: name.to_string(),
		dialect: "sqlite".to_string(),
		connection: match file {
			Some(file) => serde_json::json!({ "file": file }),
			None => serde_json::Value::Null,
		},
	}
}

#[tokio::test]
async fn execute_and_query_round_trip() {
	let dir = TempDir::new().expect("tempdir");
	let factory = DbAdapterSqliteFactory::new();
	let pool = factory
		.open("blog", dir.path(), &config("main", Some("data/main.db")))
		.await
		.expect("open pool");

	pool.execute("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, score REAL)", &[])
		.await
		.expect("create table");

	let affected = pool
		.execute(
			"INSERT INTO posts (title, score) VALUES (?, ?)",
			&[serde_json::json!("hello"), serde_json::json!(4.5)],
		)
		.await
		.expect("insert");
	assert_eq!(affected, 1);

	let rows = pool
		.query("SELECT id, title, score FROM posts WHERE title = ?", &[serde_json::json!("hello")])
		.await
		.expect("select");
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0]["id"], serde_json::json!(1));
	assert_eq!(rows[0]["title"], serde_json::json!("hello"));
	assert_eq!(rows[0]["score"], serde_json::json!(4.5));

	// the database file landed where configured, under the box root
	assert!(dir.path().join("data/main.db").exists());
	pool.close().await;
}

#[tokio::test]
async fn null_params_and_null_columns() {
	let dir = TempDir::new().expect("tempdir");
	let factory = DbAdapterSqliteFactory::new();
	let pool = factory.open("blog", dir.path(), &config("aux", None)).await.expect("open pool");

	pool.execute("CREATE TABLE t (a TEXT)", &[]).await.expect("create");
	pool.execute("INSERT INTO t (a) VALUES (?)", &[serde_json::Value::Null])
		.await
		.expect("insert null");

	let rows = pool.query("SELECT a FROM t", &[]).await.expect("select");
	assert_eq!(rows[0]["a"], serde_json::Value::Null);
	pool.close().await;
}

#[tokio::test]
async fn wrong_dialect_is_rejected() {
	let dir = TempDir::new().expect("tempdir");
	let factory = DbAdapterSqliteFactory::new();
	let mut cfg = config("main", None);
	cfg.dialect = "postgres".to_string();
	assert!(factory.open("blog", dir.path(), &cfg).await.is_err());
}

#[tokio::test]
async fn escaping_database_file_is_rejected() {
	let dir = TempDir::new().expect("tempdir");
	let factory = DbAdapterSqliteFactory::new();
	let cfg = config("main", Some("../../outside.db"));
	assert!(factory.open("blog", dir.path(), &cfg).await.is_err());
	assert!(!Path::new(&dir.path().join("../../outside.db")).exists());
}

// vim: ts=4
