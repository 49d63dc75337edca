//! Sandboxed module resolver.
//!
//! Import names are resolved through a fixed rule chain over the loader
//! configuration; the decision logic is a pure function so the rules are
//! testable without an engine. Every failure carries the attempted name
//! and surfaces to the calling script.

use std::{
	collections::{HashMap, HashSet},
	path::{Path, PathBuf},
	sync::Arc,
};

use crate::core::paths;
use crate::prelude::*;

use super::{compile_cached, ArtifactCache};

/// Capability modules gated by per-app permission grants.
pub const PROTECTED_MODULES: [&str; 8] =
	["cache", "db", "fs", "httpclient", "pdf", "zip", "image", "platform"];

/// Core internals importable only by privileged apps.
pub const PRIVILEGED_MODULES: [&str; 5] =
	["context", "cachesvc", "paths", "bootstrap", "platform"];

/// Host builtins every app may import without configuration.
pub const DEFAULT_BUILTINS: [&str; 2] = ["utils", "encoding"];

const SCRIPT_EXT: &str = "rhai";

#[derive(Clone, Debug)]
pub struct LoaderConfig {
	pub app_name: Box<str>,
	pub box_root: Box<Path>,
	pub global_modules_root: Box<Path>,
	/// Server-wide plus per-app allowed host builtins.
	pub allowed_builtins: Vec<String>,
	pub privileged: bool,
	pub permissions: HashSet<Permission>,
}

/// Outcome of the rule chain for one import name.
#[derive(Debug, Eq, PartialEq)]
pub enum Resolution {
	/// A host capability module (fs, db, platform, ...).
	Capability(&'static str),
	/// A host builtin module (utils, encoding, ...).
	Builtin(Box<str>),
	/// A script file under the app's box root, loaded recursively.
	File(PathBuf),
	/// A shared library script under the global modules root.
	GlobalModule(PathBuf),
}

fn with_default_ext(path: PathBuf) -> PathBuf {
	if path.extension().is_none() {
		path.with_extension(SCRIPT_EXT)
	} else {
		path
	}
}

fn capability_key(name: &str) -> Option<&'static str> {
	PROTECTED_MODULES.iter().chain(PRIVILEGED_MODULES.iter()).find(|m| **m == name).copied()
}

/// The resolver rule chain, evaluated in order on an import name.
pub fn resolve_name(
	name: &str,
	caller_dir: &Path,
	cfg: &LoaderConfig,
	exists: &dyn Fn(&Path) -> bool,
) -> WrResult<Resolution> {
	// 1. Protected set: permission gate
	let protected = PROTECTED_MODULES.contains(&name);
	if protected {
		let granted = cfg
			.permissions
			.iter()
			.any(|p| p.as_str() == name);
		if !granted {
			return Err(Error::PermissionDenied(cfg.app_name.clone(), name.into()));
		}
	}

	// 2. Privileged-only set
	if PRIVILEGED_MODULES.contains(&name) {
		if !cfg.privileged {
			return Err(Error::PermissionDenied(cfg.app_name.clone(), name.into()));
		}
		return Ok(Resolution::Capability(capability_key(name).unwrap_or("context")));
	}
	if protected {
		return Ok(Resolution::Capability(capability_key(name).unwrap_or("fs")));
	}

	// 3. Relative import: caller-dir based, contained in the box root
	if name.starts_with("./") || name.starts_with("../") {
		let path = with_default_ext(paths::normalize(&caller_dir.join(name)));
		if !paths::is_contained(&path, &cfg.box_root) {
			return Err(Error::PathTraversal(name.to_string()));
		}
		return Ok(Resolution::File(path));
	}

	// 4. Shared library module under the global modules root
	let global = with_default_ext(cfg.global_modules_root.join(name));
	if paths::is_contained(&global, &cfg.global_modules_root) && exists(&global) {
		return Ok(Resolution::GlobalModule(global));
	}

	// 5. Host builtins: server-wide defaults or the allowed list
	if DEFAULT_BUILTINS.contains(&name) || cfg.allowed_builtins.iter().any(|m| m == name) {
		return Ok(Resolution::Builtin(name.into()));
	}

	// 6. Box-root relative script
	let boxed = with_default_ext(paths::normalize(&cfg.box_root.join(name)));
	if paths::is_contained(&boxed, &cfg.box_root) && exists(&boxed) {
		return Ok(Resolution::File(boxed));
	}

	Err(Error::NotFound(format!(
		"module not allowed or not found: '{}' (app '{}')",
		name, cfg.app_name
	)))
}

/// The rhai-facing resolver: wraps [`resolve_name`] and materialises the
/// resolution as a module, recursing through the engine for script files.
pub struct SandboxResolver {
	cfg: LoaderConfig,
	capabilities: HashMap<&'static str, rhai::Shared<rhai::Module>>,
	builtins: HashMap<Box<str>, rhai::Shared<rhai::Module>>,
	artifacts: Arc<ArtifactCache>,
	use_cache: bool,
}

impl SandboxResolver {
	pub fn new(
		cfg: LoaderConfig,
		capabilities: HashMap<&'static str, rhai::Shared<rhai::Module>>,
		artifacts: Arc<ArtifactCache>,
		use_cache: bool,
	) -> Self {
		let mut builtins: HashMap<Box<str>, rhai::Shared<rhai::Module>> = HashMap::new();
		for name in DEFAULT_BUILTINS.iter().map(|n| (*n).to_string()).chain(cfg.allowed_builtins.clone()) {
			if let Some(module) = super::modules::builtins::builtin_module(&name) {
				builtins.insert(name.into(), module);
			}
		}
		SandboxResolver { cfg, capabilities, builtins, artifacts, use_cache }
	}

	fn load_script_module(
		&self,
		engine: &rhai::Engine,
		path: &Path,
	) -> Result<rhai::Shared<rhai::Module>, Box<rhai::EvalAltResult>> {
		let ast = compile_cached(engine, &self.artifacts, path, self.use_cache)
			.map_err(|e| runtime_err(&e.to_string()))?;
		let module = rhai::Module::eval_ast_as_new(rhai::Scope::new(), &ast, engine)?;
		Ok(rhai::Shared::new(module))
	}
}

fn runtime_err(msg: &str) -> Box<rhai::EvalAltResult> {
	Box::new(rhai::EvalAltResult::ErrorRuntime(
		rhai::Dynamic::from(msg.to_string()),
		rhai::Position::NONE,
	))
}

impl rhai::ModuleResolver for SandboxResolver {
	fn resolve(
		&self,
		engine: &rhai::Engine,
		source: Option<&str>,
		path: &str,
		pos: rhai::Position,
	) -> Result<rhai::Shared<rhai::Module>, Box<rhai::EvalAltResult>> {
		let caller_dir = source
			.map(Path::new)
			.and_then(Path::parent)
			.map_or_else(|| self.cfg.box_root.to_path_buf(), Path::to_path_buf);

		let exists = |p: &Path| p.is_file();
		match resolve_name(path, &caller_dir, &self.cfg, &exists) {
			Ok(Resolution::Capability(key)) => self
				.capabilities
				.get(key)
				.cloned()
				.ok_or_else(|| runtime_err(&format!("capability module '{}' unavailable", key))),
			Ok(Resolution::Builtin(name)) => self
				.builtins
				.get(&name)
				.cloned()
				.ok_or_else(|| {
					Box::new(rhai::EvalAltResult::ErrorModuleNotFound(name.to_string(), pos))
				}),
			Ok(Resolution::File(file) | Resolution::GlobalModule(file)) => {
				self.load_script_module(engine, &file)
			}
			Err(Error::NotFound(msg)) => {
				Err(Box::new(rhai::EvalAltResult::ErrorModuleNotFound(msg, pos)))
			}
			Err(e) => Err(runtime_err(&e.to_string())),
		}
	}
}


// vim: ts=4
