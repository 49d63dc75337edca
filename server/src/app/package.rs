//! App package (`.gin`) handling: pack, extract, analyze, upgrade plans
//! and on-disk backups. A package is a ZIP of one app's directory tree
//! with `/`-normalized entry names.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::{
	collections::HashSet,
	io::{Cursor, Read, Write},
	path::{Path, PathBuf},
};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::app::config::AppConfig;
use crate::prelude::*;

/// `box/.gup` — upgrade manifest: globs naming files whose contents must
/// survive an upgrade.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UpgradeManifest {
	#[serde(default)]
	pub preserve: Vec<String>,
}

/// `box/.gpkg` — packaging manifest.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PackagingManifest {
	#[serde(default)]
	pub include: Vec<String>,
	#[serde(default)]
	pub exclude: Vec<String>,
}

/// `box/pmft.json` — permission manifest.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PermissionManifest {
	#[serde(default)]
	pub permissions: PermissionSets,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PermissionSets {
	#[serde(default)]
	pub mandatory: Vec<String>,
	#[serde(default)]
	pub optional: Vec<String>,
}

/// Metadata extracted from a package without unpacking it.
#[derive(Debug, Default)]
pub struct PackageInfo {
	pub config: Option<AppConfig>,
	pub permissions: Option<PermissionManifest>,
	pub upgrade: Option<UpgradeManifest>,
}

fn build_globset(patterns: &[String]) -> WrResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		builder.add(Glob::new(pattern)?);
	}
	Ok(builder.build()?)
}

/// All regular files under `root`, as sorted `/`-separated relative paths.
pub fn walk_tree(root: &Path) -> WrResult<Vec<String>> {
	fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> WrResult<()> {
		for entry in std::fs::read_dir(dir)? {
			let entry = entry?;
			let path = entry.path();
			if entry.file_type()?.is_dir() {
				walk(root, &path, out)?;
			} else {
				let rel = path
					.strip_prefix(root)
					.map_err(|_| Error::Internal("walk escaped root".into()))?;
				out.push(rel.to_string_lossy().replace('\\', "/"));
			}
		}
		Ok(())
	}

	let mut files = Vec::new();
	walk(root, root, &mut files)?;
	files.sort();
	Ok(files)
}

/// Packs an app directory into `.gin` bytes, honouring the tree's
/// `box/.gpkg` include/exclude globs (empty include list = everything).
pub fn pack_dir(src_dir: &Path) -> WrResult<Vec<u8>> {
	let manifest: PackagingManifest = match std::fs::read_to_string(src_dir.join("box/.gpkg")) {
		Ok(json) => serde_json::from_str(&json)?,
		Err(_) => PackagingManifest::default(),
	};
	let include = build_globset(&manifest.include)?;
	let exclude = build_globset(&manifest.exclude)?;

	let mut buf = Cursor::new(Vec::new());
	let mut writer = ZipWriter::new(&mut buf);
	let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

	for rel in walk_tree(src_dir)? {
		if !manifest.include.is_empty() && !include.is_match(&rel) {
			continue;
		}
		if exclude.is_match(&rel) {
			continue;
		}
		writer.start_file(rel.as_str(), options)?;
		let data = std::fs::read(src_dir.join(&rel))?;
		writer.write_all(&data)?;
	}
	writer.finish()?;
	Ok(buf.into_inner())
}

/// Sorted list of file entries inside a package.
pub fn list_files(package: &[u8]) -> WrResult<Vec<String>> {
	let mut archive = ZipArchive::new(Cursor::new(package))?;
	let mut files = Vec::new();
	for i in 0..archive.len() {
		let entry = archive.by_index(i)?;
		if !entry.is_dir() {
			files.push(entry.name().replace('\\', "/"));
		}
	}
	files.sort();
	Ok(files)
}

/// Extracts a package into `dest`, validating every entry against path
/// traversal. A single unsafe entry aborts the whole extraction.
pub fn extract(package: &[u8], dest: &Path) -> WrResult<()> {
	let mut archive = ZipArchive::new(Cursor::new(package))?;

	// Validate all entry names before touching the filesystem
	for i in 0..archive.len() {
		let entry = archive.by_index(i)?;
		if entry.enclosed_name().is_none() {
			return Err(Error::Validation(format!(
				"package entry escapes destination: '{}'",
				entry.name()
			)));
		}
	}

	std::fs::create_dir_all(dest)?;
	for i in 0..archive.len() {
		let mut entry = archive.by_index(i)?;
		let Some(rel) = entry.enclosed_name() else {
			return Err(Error::Validation(format!(
				"package entry escapes destination: '{}'",
				entry.name()
			)));
		};
		let target = dest.join(rel);
		if entry.is_dir() {
			std::fs::create_dir_all(&target)?;
			continue;
		}
		if let Some(parent) = target.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let mut data = Vec::with_capacity(entry.size() as usize);
		entry.read_to_end(&mut data)?;
		std::fs::write(&target, data)?;
	}
	Ok(())
}

fn read_entry_json<T: serde::de::DeserializeOwned>(
	archive: &mut ZipArchive<Cursor<&[u8]>>,
	name: &str,
) -> WrResult<Option<T>> {
	match archive.by_name(name) {
		Ok(mut entry) => {
			let mut json = String::new();
			entry.read_to_string(&mut json)?;
			Ok(Some(serde_json::from_str(&json)?))
		}
		Err(zip::result::ZipError::FileNotFound) => Ok(None),
		Err(e) => Err(e.into()),
	}
}

/// Reads the recognised manifests out of a package without unpacking it.
pub fn analyze(package: &[u8]) -> WrResult<PackageInfo> {
	let mut archive = ZipArchive::new(Cursor::new(package))?;
	let config = match read_entry_json::<serde_json::Value>(&mut archive, "box/app.json")? {
		Some(value) => Some(AppConfig::from_json(&value.to_string())?),
		None => None,
	};
	let permissions = read_entry_json(&mut archive, "box/pmft.json")?;
	let upgrade = read_entry_json(&mut archive, "box/.gup")?;
	Ok(PackageInfo { config, permissions, upgrade })
}

// Upgrade plans //
//***************//

#[derive(Clone, Debug, Serialize)]
pub struct PlanFiles {
	pub preserved: Vec<String>,
	pub added: Vec<String>,
	pub overwritten: Vec<String>,
	pub deleted: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpgradePlan {
	pub action: String,
	pub from_version: String,
	pub to_version: String,
	pub files: PlanFiles,
}

/// Derives the effect of installing `package` over the live tree at
/// `live_root`, honouring the package's `.gup` preserve globs.
pub fn derive_plan(
	live_root: &Path,
	from_version: &str,
	package: &[u8],
) -> WrResult<UpgradePlan> {
	let info = analyze(package)?;
	let to_version =
		info.config.as_ref().map_or_else(|| "0.0.0".to_string(), |c| c.version.clone());
	let preserve_set = build_globset(&info.upgrade.unwrap_or_default().preserve)?;

	let live = walk_tree(live_root)?;
	let pkg = list_files(package)?;
	let live_set: HashSet<&str> = live.iter().map(String::as_str).collect();
	let pkg_set: HashSet<&str> = pkg.iter().map(String::as_str).collect();

	let preserved: Vec<String> =
		live.iter().filter(|f| preserve_set.is_match(f.as_str())).cloned().collect();
	let preserved_set: HashSet<&str> = preserved.iter().map(String::as_str).collect();

	let added: Vec<String> =
		pkg.iter().filter(|f| !live_set.contains(f.as_str())).cloned().collect();
	let overwritten: Vec<String> = pkg
		.iter()
		.filter(|f| live_set.contains(f.as_str()) && !preserved_set.contains(f.as_str()))
		.cloned()
		.collect();
	let deleted: Vec<String> = live
		.iter()
		.filter(|f| !pkg_set.contains(f.as_str()) && !preserved_set.contains(f.as_str()))
		.cloned()
		.collect();

	Ok(UpgradePlan {
		action: "upgrade".into(),
		from_version: from_version.to_string(),
		to_version,
		files: PlanFiles { preserved, added, overwritten, deleted },
	})
}

// Backups //
//*********//

/// `<app>_v<version>_<ISO8601 with ':' and '.' replaced by '-'>.gin`
pub fn backup_file_name(app: &str, version: &str) -> String {
	let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
	format!("{}_v{}_{}.gin", app, version, stamp.replace([':', '.'], "-"))
}

/// Backups of one app, sorted lexicographically (newest last).
pub fn list_backups(backups_dir: &Path, app: &str) -> WrResult<Vec<String>> {
	let dir = backups_dir.join(app);
	let mut names = Vec::new();
	let entries = match std::fs::read_dir(&dir) {
		Ok(entries) => entries,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
		Err(e) => return Err(e.into()),
	};
	for entry in entries {
		let entry = entry?;
		let name = entry.file_name().to_string_lossy().to_string();
		if name.ends_with(".gin") {
			names.push(name);
		}
	}
	names.sort();
	Ok(names)
}

/// Path of the newest backup of an app, or NotFound.
pub fn latest_backup(backups_dir: &Path, app: &str) -> WrResult<PathBuf> {
	let names = list_backups(backups_dir, app)?;
	names
		.last()
		.map(|name| backups_dir.join(app).join(name))
		.ok_or_else(|| Error::NotFound(format!("backup for app '{}'", app)))
}


// vim: ts=4
