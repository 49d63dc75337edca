//! Server configuration (process root `server.json`).

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::utils::parse_size;
use crate::prelude::*;

fn default_true() -> bool {
	true
}

fn default_http_port() -> u16 {
	7070
}

fn default_https_port() -> u16 {
	7443
}

fn default_environment() -> String {
	"production".into()
}

fn default_web_root() -> PathBuf {
	PathBuf::from("./web")
}

fn default_max_body_size() -> String {
	"25mb".into()
}

fn default_log_level() -> String {
	"info".into()
}

fn default_cache_provider() -> String {
	"memory".into()
}

fn default_cache_ttl() -> u64 {
	3600
}

#[derive(Clone, Debug, Deserialize)]
pub struct HttpListener {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_http_port")]
	pub port: u16,
}

impl Default for HttpListener {
	fn default() -> Self {
		HttpListener { enabled: true, port: default_http_port() }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct HttpsListener {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_https_port")]
	pub port: u16,
	#[serde(default)]
	pub key_file: Option<PathBuf>,
	#[serde(default)]
	pub cert_file: Option<PathBuf>,
}

impl Default for HttpsListener {
	fn default() -> Self {
		HttpsListener {
			enabled: false,
			port: default_https_port(),
			key_file: None,
			cert_file: None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerSection {
	#[serde(default)]
	pub http: HttpListener,
	#[serde(default)]
	pub https: HttpsListener,
	#[serde(default = "default_environment")]
	pub environment: String,
}

impl Default for ServerSection {
	fn default() -> Self {
		ServerSection {
			http: HttpListener::default(),
			https: HttpsListener::default(),
			environment: default_environment(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct ContentEncoding {
	#[serde(default = "default_true")]
	pub enabled: bool,
}

impl Default for ContentEncoding {
	fn default() -> Self {
		ContentEncoding { enabled: true }
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LogRotation {
	#[serde(default)]
	pub period_days: Option<u32>,
	#[serde(default)]
	pub max_size_mb: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingSection {
	#[serde(default = "default_log_level")]
	pub level: String,
	#[serde(default)]
	pub rotation: LogRotation,
}

impl Default for LoggingSection {
	fn default() -> Self {
		LoggingSection { level: default_log_level(), rotation: LogRotation::default() }
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BoxSection {
	/// Extra host builtin modules exposed to every app.
	#[serde(default)]
	pub allowed_modules: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheSection {
	#[serde(default = "default_cache_provider")]
	pub provider: String,
	/// Default TTL in seconds for service-level entries (static cache).
	#[serde(default = "default_cache_ttl")]
	pub ttl: u64,
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub password: Option<String>,
	#[serde(default)]
	pub database: Option<u32>,
}

impl Default for CacheSection {
	fn default() -> Self {
		CacheSection {
			provider: default_cache_provider(),
			ttl: default_cache_ttl(),
			host: None,
			port: None,
			password: None,
			database: None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
	#[serde(default)]
	pub server: ServerSection,
	#[serde(default = "default_web_root")]
	pub web_root: PathBuf,
	#[serde(default)]
	pub content_encoding: ContentEncoding,
	#[serde(default = "default_max_body_size")]
	pub max_body_size: String,
	#[serde(default)]
	pub logging: LoggingSection,
	#[serde(rename = "box", default)]
	pub box_settings: BoxSection,
	#[serde(default)]
	pub default_app: Option<String>,
	#[serde(default)]
	pub privileged_apps: Vec<String>,
	#[serde(default)]
	pub cache: CacheSection,
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfig {
			server: ServerSection::default(),
			web_root: default_web_root(),
			content_encoding: ContentEncoding::default(),
			max_body_size: default_max_body_size(),
			logging: LoggingSection::default(),
			box_settings: BoxSection::default(),
			default_app: None,
			privileged_apps: Vec::new(),
			cache: CacheSection::default(),
		}
	}
}

impl ServerConfig {
	pub fn from_json(json: &str) -> WrResult<Self> {
		let config: ServerConfig = serde_json::from_str(json)
			.map_err(|e| Error::Config(format!("invalid server configuration: {}", e)))?;
		config.validate()?;
		Ok(config)
	}

	pub async fn load(path: &Path) -> WrResult<Self> {
		match tokio::fs::read_to_string(path).await {
			Ok(json) => Self::from_json(&json),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				info!("No server configuration at {}, using defaults", path.display());
				Ok(ServerConfig::default())
			}
			Err(e) => Err(Error::Config(format!("cannot read {}: {}", path.display(), e))),
		}
	}

	fn validate(&self) -> WrResult<()> {
		self.max_body_size()?;
		if self.server.https.enabled
			&& (self.server.https.key_file.is_none() || self.server.https.cert_file.is_none())
		{
			return Err(Error::Config("https enabled without key_file/cert_file".into()));
		}
		Ok(())
	}

	pub fn max_body_size(&self) -> WrResult<u64> {
		parse_size(&self.max_body_size)
	}

	pub fn is_development(&self) -> bool {
		self.server.environment == "development"
	}

	pub fn is_privileged(&self, app_name: &str) -> bool {
		self.privileged_apps.iter().any(|a| a == app_name)
	}
}


// vim: ts=4
