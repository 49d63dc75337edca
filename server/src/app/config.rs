//! App configuration (`box/app.json`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db_adapter::DbConnConfig;
use crate::prelude::*;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum AppType {
	#[default]
	#[serde(rename = "MPA")]
	Mpa,
	#[serde(rename = "SPA")]
	Spa,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
	Development,
	#[default]
	Production,
}

fn default_build_path() -> String {
	"dist".into()
}

fn default_fallback_file() -> String {
	"index.html".into()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SpaConfig {
	/// Dev-mode proxy target, e.g. `http://localhost:5173`.
	#[serde(default)]
	pub dev_url: Option<String>,
	/// Command spawning the dev build server, split on whitespace.
	#[serde(default)]
	pub dev_command: Option<String>,
	#[serde(default = "default_build_path")]
	pub build_path: String,
	#[serde(default = "default_fallback_file")]
	pub fallback_file: String,
}

impl Default for SpaConfig {
	fn default() -> Self {
		SpaConfig {
			dev_url: None,
			dev_command: None,
			build_path: default_build_path(),
			fallback_file: default_fallback_file(),
		}
	}
}

fn default_true() -> bool {
	true
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CachePolicy {
	/// Send client `Cache-Control` headers for static assets.
	#[serde(default = "default_true")]
	pub client: bool,
	/// Keep static assets and compiled scripts in the server cache.
	#[serde(default = "default_true")]
	pub server: bool,
	/// URL regexes excluded from client caching.
	#[serde(default)]
	pub no_client_cache_regex: Vec<String>,
	/// URL regexes excluded from server caching.
	#[serde(default)]
	pub no_server_cache_regex: Vec<String>,
}

impl Default for CachePolicy {
	fn default() -> Self {
		CachePolicy {
			client: true,
			server: true,
			no_client_cache_regex: Vec::new(),
			no_server_cache_regex: Vec::new(),
		}
	}
}

fn default_log_level() -> String {
	"info".into()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppLogging {
	#[serde(default = "default_log_level")]
	pub level: String,
}

impl Default for AppLogging {
	fn default() -> Self {
		AppLogging { level: default_log_level() }
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RouteConfig {
	#[serde(default = "default_route_method")]
	pub method: String,
	pub path: String,
	/// Script path relative to the box root.
	pub script: String,
}

fn default_route_method() -> String {
	"ALL".into()
}

fn default_version() -> String {
	"0.0.0".into()
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AppConfig {
	/// Display name; the app's identity is its directory name.
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default = "default_version")]
	pub version: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(rename = "type", default)]
	pub app_type: AppType,
	#[serde(default)]
	pub spa: Option<SpaConfig>,
	#[serde(default)]
	pub default_include: Vec<String>,
	#[serde(default)]
	pub env: HashMap<String, String>,
	#[serde(default)]
	pub jwt_secret: Option<String>,
	/// Extra host builtin modules this app may import, on top of the
	/// server-wide `box.allowed_modules` list.
	#[serde(default)]
	pub allowed_modules: Vec<String>,
	#[serde(default)]
	pub cache_policy: CachePolicy,
	#[serde(default)]
	pub logging: AppLogging,
	#[serde(default)]
	pub mode: AppMode,
	#[serde(default)]
	pub startup_scripts: Vec<String>,
	#[serde(default)]
	pub databases: Vec<DbConnConfig>,
	#[serde(default)]
	pub routes: Vec<RouteConfig>,
}

/// Key-wise merge of `overlay` into `base`: nested objects are merged
/// recursively, everything else (arrays included) is replaced.
pub fn deep_merge(base: &mut serde_json::Value, overlay: serde_json::Value) {
	match (base, overlay) {
		(serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
			for (key, value) in overlay_map {
				match base_map.get_mut(&key) {
					Some(slot) if slot.is_object() && value.is_object() => {
						deep_merge(slot, value);
					}
					_ => {
						base_map.insert(key, value);
					}
				}
			}
		}
		(base, overlay) => *base = overlay,
	}
}

impl AppConfig {
	/// Parses a user `app.json`, merged over the engine defaults key-wise.
	pub fn from_json(json: &str) -> WrResult<Self> {
		let user: serde_json::Value = serde_json::from_str(json)
			.map_err(|e| Error::Validation(format!("invalid app.json: {}", e)))?;
		let mut merged = serde_json::to_value(AppConfig::default())?;
		deep_merge(&mut merged, user);
		serde_json::from_value(merged)
			.map_err(|e| Error::Validation(format!("invalid app.json: {}", e)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn minimal_config_parses_with_defaults() {
		let cfg = AppConfig::from_json(r#"{"version": "1.2.0"}"#).unwrap();
		assert_eq!(cfg.version, "1.2.0");
		assert_eq!(cfg.app_type, AppType::Mpa);
		assert_eq!(cfg.mode, AppMode::Production);
		assert!(cfg.cache_policy.client && cfg.cache_policy.server);
	}

	#[test]
	fn nested_objects_merge_keywise() {
		let cfg = AppConfig::from_json(
			r#"{"cache_policy": {"client": false}, "logging": {"level": "debug"}}"#,
		)
		.unwrap();
		assert!(!cfg.cache_policy.client);
		assert!(cfg.cache_policy.server); // default survives partial override
		assert_eq!(cfg.logging.level, "debug");
	}

	#[test]
	fn spa_config_with_defaults() {
		let cfg = AppConfig::from_json(
			r#"{"type": "SPA", "spa": {"dev_url": "http://localhost:5173"}}"#,
		)
		.unwrap();
		assert_eq!(cfg.app_type, AppType::Spa);
		let spa = cfg.spa.unwrap();
		assert_eq!(spa.build_path, "dist");
		assert_eq!(spa.fallback_file, "index.html");
	}

	#[test]
	fn routes_and_databases_parse() {
		let cfg = AppConfig::from_json(
			r#"{
				"routes": [{"method": "GET", "path": "/api/posts/:id", "script": "api/post.rhai"}],
				"databases": [{"name": "main", "dialect": "sqlite"}]
			}"#,
		)
		.unwrap();
		assert_eq!(cfg.routes.len(), 1);
		assert_eq!(cfg.routes[0].method, "GET");
		assert_eq!(cfg.databases[0].name, "main");
	}

	#[test]
	fn deep_merge_replaces_scalars_and_arrays() {
		let mut base = serde_json::json!({"a": {"x": 1, "y": 2}, "list": [1, 2]});
		deep_merge(&mut base, serde_json::json!({"a": {"y": 3}, "list": [9]}));
		assert_eq!(base, serde_json::json!({"a": {"x": 1, "y": 3}, "list": [9]}));
	}
}

// vim: ts=4
