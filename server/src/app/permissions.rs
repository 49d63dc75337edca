//! Persisted permission records (`settings/permissions.json`).
//!
//! The file is the source of truth for capability checks at script-load
//! time: `appName → { granted: [permission-key] }`.

use serde::{Deserialize, Serialize};
use std::{
	collections::{BTreeMap, HashSet},
	path::{Path, PathBuf},
	str::FromStr,
};

use crate::prelude::*;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PermissionRecord {
	#[serde(default)]
	pub granted: Vec<String>,
}

#[derive(Debug)]
pub struct PermissionStore {
	path: PathBuf,
}

impl PermissionStore {
	pub fn new(settings_dir: &Path) -> Self {
		PermissionStore { path: settings_dir.join("permissions.json") }
	}

	async fn read_all(&self) -> WrResult<BTreeMap<String, PermissionRecord>> {
		match tokio::fs::read_to_string(&self.path).await {
			Ok(json) => Ok(serde_json::from_str(&json)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
			Err(e) => Err(e.into()),
		}
	}

	async fn write_all(&self, records: &BTreeMap<String, PermissionRecord>) -> WrResult<()> {
		let json = serde_json::to_string_pretty(records)?;
		tokio::fs::write(&self.path, json).await?;
		Ok(())
	}

	/// Granted permissions of one app. Unknown keys in the record are
	/// dropped with a warning, duplicates collapse via the set.
	pub async fn granted_for(&self, app_name: &str) -> WrResult<HashSet<Permission>> {
		let records = self.read_all().await?;
		let mut granted = HashSet::new();
		if let Some(record) = records.get(app_name) {
			for key in &record.granted {
				match Permission::from_str(key) {
					Ok(p) => {
						granted.insert(p);
					}
					Err(_) => warn!("Dropping invalid permission '{}' for app '{}'", key, app_name),
				}
			}
		}
		Ok(granted)
	}

	/// Rewrites the record of one app. Invalid keys are dropped,
	/// duplicates collapsed; returns what was actually persisted.
	pub async fn set(&self, app_name: &str, keys: &[String]) -> WrResult<HashSet<Permission>> {
		let mut granted = HashSet::new();
		for key in keys {
			match Permission::from_str(key) {
				Ok(p) => {
					granted.insert(p);
				}
				Err(_) => warn!("Dropping invalid permission '{}' for app '{}'", key, app_name),
			}
		}

		let mut records = self.read_all().await?;
		let mut list: Vec<String> = granted.iter().map(|p| p.as_str().to_string()).collect();
		list.sort();
		records.insert(app_name.to_string(), PermissionRecord { granted: list });
		self.write_all(&records).await?;
		Ok(granted)
	}

	pub async fn remove(&self, app_name: &str) -> WrResult<()> {
		let mut records = self.read_all().await?;
		if records.remove(app_name).is_some() {
			self.write_all(&records).await?;
		}
		Ok(())
	}
}


// vim: ts=4
