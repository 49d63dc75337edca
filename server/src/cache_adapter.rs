//! Cache adapter interface
//!
//! Backends store opaque string values (the service serialises values as
//! JSON before they reach an adapter, so semantics are backend-agnostic).

use async_trait::async_trait;

use crate::prelude::*;

#[async_trait]
pub trait CacheAdapter: Send + Sync + std::fmt::Debug {
	/// Human-readable backend name for logs ("memory", "redis").
	fn name(&self) -> &'static str;

	async fn get(&self, key: &str) -> WrResult<Option<String>>;

	/// `ttl` of `None` stores the entry without expiry.
	async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> WrResult<()>;

	async fn del(&self, key: &str) -> WrResult<()>;

	/// Removes every key starting with `prefix`.
	async fn clear(&self, prefix: &str) -> WrResult<()>;
}

// vim: ts=4
