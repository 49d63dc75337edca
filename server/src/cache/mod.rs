//! Two-tier cache service: a backend-agnostic service layer speaking JSON
//! values, plus a per-app facade that namespaces every key.

pub mod memory;

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::cache_adapter::CacheAdapter;
use crate::prelude::*;

pub use memory::MemoryCacheAdapter;

#[derive(Clone, Debug)]
pub struct CacheService {
	backend: Arc<dyn CacheAdapter>,
	default_ttl: u64,
}

impl CacheService {
	/// Wraps an already-initialised backend. Remote backends that fail to
	/// initialise are handled by the caller (warn + fall back to
	/// [`MemoryCacheAdapter`], which cannot fail).
	pub fn new(backend: Arc<dyn CacheAdapter>, default_ttl: u64) -> Self {
		info!("Cache service using '{}' backend (default ttl {}s)", backend.name(), default_ttl);
		CacheService { backend, default_ttl }
	}

	pub fn backend_name(&self) -> &'static str {
		self.backend.name()
	}

	pub fn default_ttl(&self) -> u64 {
		self.default_ttl
	}

	pub async fn get_value(&self, key: &str) -> WrResult<Option<serde_json::Value>> {
		match self.backend.get(key).await? {
			Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
			None => Ok(None),
		}
	}

	pub async fn get<T: DeserializeOwned>(&self, key: &str) -> WrResult<Option<T>> {
		match self.backend.get(key).await? {
			Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
			None => Ok(None),
		}
	}

	pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<u64>) -> WrResult<()> {
		let raw = serde_json::to_string(value)?;
		self.backend.set(key, &raw, ttl).await
	}

	pub async fn del(&self, key: &str) -> WrResult<()> {
		self.backend.del(key).await
	}

	pub async fn clear(&self, prefix: &str) -> WrResult<()> {
		self.backend.clear(prefix).await
	}

	/// The per-app view: every key is silently prefixed with `<app>:`.
	pub fn for_app(&self, app_name: &str) -> AppCache {
		AppCache { service: self.clone(), prefix: format!("{}:", app_name) }
	}
}

/// Per-app cache facade. Apps cannot read or evict entries outside their
/// own `<appName>:` namespace.
#[derive(Clone, Debug)]
pub struct AppCache {
	service: CacheService,
	prefix: String,
}

impl AppCache {
	fn key(&self, key: &str) -> String {
		format!("{}{}", self.prefix, key)
	}

	pub async fn get(&self, key: &str) -> WrResult<Option<serde_json::Value>> {
		self.service.get_value(&self.key(key)).await
	}

	pub async fn set(&self, key: &str, value: &serde_json::Value, ttl: Option<u64>) -> WrResult<()> {
		self.service.set(&self.key(key), value, ttl).await
	}

	pub async fn del(&self, key: &str) -> WrResult<()> {
		self.service.del(&self.key(key)).await
	}

	/// Evicts the whole namespace of this app, and nothing else.
	pub async fn clear(&self) -> WrResult<()> {
		self.service.clear(&self.prefix).await
	}
}

/// Stored form of a cached static asset.
#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct StaticEntry {
	pub content_type: String,
	pub content_b64: String,
}

/// Key for a static asset cache entry.
pub fn static_key(abs_path: &std::path::Path) -> String {
	format!("static:{}", abs_path.display())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn service() -> CacheService {
		CacheService::new(Arc::new(MemoryCacheAdapter::new()), 60)
	}

	#[tokio::test]
	async fn values_round_trip_as_json() {
		let svc = service();
		let value = serde_json::json!({"n": 1, "list": ["a", "b"]});
		svc.set("k", &value, None).await.unwrap();
		assert_eq!(svc.get_value("k").await.unwrap(), Some(value));
	}

	#[tokio::test]
	async fn app_facade_prefixes_every_key() {
		let svc = service();
		let blog = svc.for_app("blog");
		blog.set("session", &serde_json::json!("s1"), None).await.unwrap();

		// visible under the namespaced key only
		assert!(svc.get_value("blog:session").await.unwrap().is_some());
		assert!(svc.get_value("session").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn app_facades_are_isolated() {
		let svc = service();
		let blog = svc.for_app("blog");
		let wiki = svc.for_app("wiki");

		blog.set("x", &serde_json::json!(1), None).await.unwrap();
		wiki.set("x", &serde_json::json!(2), None).await.unwrap();

		assert_eq!(blog.get("x").await.unwrap(), Some(serde_json::json!(1)));
		assert_eq!(wiki.get("x").await.unwrap(), Some(serde_json::json!(2)));

		blog.clear().await.unwrap();
		assert_eq!(blog.get("x").await.unwrap(), None);
		assert_eq!(wiki.get("x").await.unwrap(), Some(serde_json::json!(2)));
	}
}

// vim: ts=4
