//! Reference server binary: loads the process configuration, wires the
//! bundled adapters and runs the engine. Exits non-zero on any fatal
//! startup failure (missing web root, port in use, unreadable TLS
//! material).

use std::sync::Arc;

use tracing::{error, warn};

use warren::core::config::ServerConfig;
use warren_cache_adapter_redis::RedisCacheAdapter;
use warren_db_adapter_sqlite::DbAdapterSqliteFactory;

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.init();

	let config_path = std::env::args().nth(1).unwrap_or_else(|| "./server.json".to_string());
	let config = match ServerConfig::load(std::path::Path::new(&config_path)).await {
		Ok(config) => config,
		Err(e) => {
			error!("FATAL: {}", e);
			std::process::exit(1);
		}
	};

	let mut builder = warren::Builder::new();
	builder.config_path(&config_path);
	builder.db_factory(Arc::new(DbAdapterSqliteFactory::new()));

	// Remote cache backends are connected up front; a failed connection
	// is a warning and the engine falls back to in-memory.
	if config.cache.provider == "redis" {
		match RedisCacheAdapter::connect(
			config.cache.host.as_deref().unwrap_or("127.0.0.1"),
			config.cache.port.unwrap_or(6379),
			config.cache.password.as_deref(),
			config.cache.database.unwrap_or(0),
		)
		.await
		{
			Ok(adapter) => {
				builder.remote_cache(Arc::new(adapter));
			}
			Err(e) => {
				warn!("Redis cache backend unavailable: {}", e);
			}
		}
	}
	builder.config(config);

	if let Err(e) = builder.run().await {
		error!("FATAL: {}", e);
		std::process::exit(1);
	}
}

// vim: ts=4
