//! In-process cache backend. The fallback backend and the default one.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::cache_adapter::CacheAdapter;
use crate::prelude::*;

#[derive(Debug, Default)]
pub struct MemoryCacheAdapter {
	entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCacheAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	fn expired(deadline: Option<Instant>) -> bool {
		deadline.is_some_and(|d| Instant::now() >= d)
	}
}

#[async_trait]
impl CacheAdapter for MemoryCacheAdapter {
	fn name(&self) -> &'static str {
		"memory"
	}

	async fn get(&self, key: &str) -> WrResult<Option<String>> {
		{
			let entries = self.entries.read();
			match entries.get(key) {
				None => return Ok(None),
				Some((value, deadline)) if !Self::expired(*deadline) => {
					return Ok(Some(value.clone()));
				}
				Some(_) => {} // expired, fall through to remove
			}
		}
		self.entries.write().remove(key);
		Ok(None)
	}

	async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> WrResult<()> {
		let deadline = ttl.map(|secs| Instant::now() + Duration::from_secs(secs));
		self.entries.write().insert(key.to_string(), (value.to_string(), deadline));
		Ok(())
	}

	async fn del(&self, key: &str) -> WrResult<()> {
		self.entries.write().remove(key);
		Ok(())
	}

	async fn clear(&self, prefix: &str) -> WrResult<()> {
		self.entries.write().retain(|k, _| !k.starts_with(prefix));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn set_get_del() {
		let cache = MemoryCacheAdapter::new();
		cache.set("a", "1", None).await.unwrap();
		assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("1"));
		cache.del("a").await.unwrap();
		assert_eq!(cache.get("a").await.unwrap(), None);
	}

	#[tokio::test]
	async fn zero_ttl_expires_immediately() {
		let cache = MemoryCacheAdapter::new();
		cache.set("a", "1", Some(0)).await.unwrap();
		assert_eq!(cache.get("a").await.unwrap(), None);
	}

	#[tokio::test]
	async fn clear_removes_only_prefix() {
		let cache = MemoryCacheAdapter::new();
		cache.set("app1:x", "1", None).await.unwrap();
		cache.set("app1:y", "2", None).await.unwrap();
		cache.set("app2:x", "3", None).await.unwrap();
		cache.clear("app1:").await.unwrap();
		assert_eq!(cache.get("app1:x").await.unwrap(), None);
		assert_eq!(cache.get("app1:y").await.unwrap(), None);
		assert_eq!(cache.get("app2:x").await.unwrap().as_deref(), Some("3"));
	}
}

// vim: ts=4
