//! Redis-backed cache adapter.
//!
//! Speaks plain GET / SET-with-TTL / DEL, and implements prefix clearing
//! with cursor-based SCAN in bounded batches so a large namespace never
//! turns into one long blocking server call.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use warren::cache_adapter::CacheAdapter;
use warren::error::{Error, WrResult};

/// Keys fetched per SCAN round trip.
const SCAN_BATCH: usize = 200;

/// How long a connection attempt may take before the engine falls back
/// to the in-memory backend.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn backend_err(err: &redis::RedisError) -> Error {
	Error::Backend(format!("redis: {}", err))
}

/// Escapes glob metacharacters so a key prefix matches literally in
/// `SCAN MATCH`.
fn escape_match_pattern(prefix: &str) -> String {
	let mut out = String::with_capacity(prefix.len() + 1);
	for c in prefix.chars() {
		if matches!(c, '*' | '?' | '[' | ']' | '\\') {
			out.push('\\');
		}
		out.push(c);
	}
	out.push('*');
	out
}

#[derive(Clone)]
pub struct RedisCacheAdapter {
	conn: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCacheAdapter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RedisCacheAdapter").finish()
	}
}

impl RedisCacheAdapter {
	pub async fn connect(
		host: &str,
		port: u16,
		password: Option<&str>,
		database: u32,
	) -> WrResult<Self> {
		let url = match password {
			Some(password) => format!("redis://:{}@{}:{}/{}", password, host, port, database),
			None => format!("redis://{}:{}/{}", host, port, database),
		};
		let client = redis::Client::open(url).map_err(|e| backend_err(&e))?;

		let conn = tokio::time::timeout(CONNECT_TIMEOUT, redis::aio::ConnectionManager::new(client))
			.await
			.map_err(|_| Error::Timeout)?
			.map_err(|e| backend_err(&e))?;

		Ok(RedisCacheAdapter { conn })
	}
}

#[async_trait]
impl CacheAdapter for RedisCacheAdapter {
	fn name(&self) -> &'static str {
		"redis"
	}

	async fn get(&self, key: &str) -> WrResult<Option<String>> {
		let mut conn = self.conn.clone();
		conn.get(key).await.map_err(|e| backend_err(&e))
	}

	async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> WrResult<()> {
		let mut conn = self.conn.clone();
		match ttl {
			Some(secs) => conn.set_ex(key, value, secs).await.map_err(|e| backend_err(&e)),
			None => conn.set(key, value).await.map_err(|e| backend_err(&e)),
		}
	}

	async fn del(&self, key: &str) -> WrResult<()> {
		let mut conn = self.conn.clone();
		conn.del::<_, ()>(key).await.map_err(|e| backend_err(&e))
	}

	async fn clear(&self, prefix: &str) -> WrResult<()> {
		let pattern = escape_match_pattern(prefix);
		let mut conn = self.conn.clone();
		let mut cursor: u64 = 0;
		let mut removed: usize = 0;

		loop {
			let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
				.arg(cursor)
				.arg("MATCH")
				.arg(&pattern)
				.arg("COUNT")
				.arg(SCAN_BATCH)
				.query_async(&mut conn)
				.await
				.map_err(|e| backend_err(&e))?;

			if !keys.is_empty() {
				removed += keys.len();
				conn.del::<_, ()>(keys).await.map_err(|e| backend_err(&e))?;
			}

			cursor = next;
			if cursor == 0 {
				break;
			}
		}

		debug!("Cleared {} key(s) with prefix '{}'", removed, prefix);
		Ok(())
	}
}


// vim: ts=4
