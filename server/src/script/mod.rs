//! Sandboxed script execution.
//!
//! Scripts are rhai modules living under an app's box root. Route scripts
//! and default includes define `fn handle(g)`; startup scripts are plain
//! scripts evaluated top to bottom. Execution happens on the worker pool
//! so the async reactor never blocks; capability modules bridge back into
//! async adapters through a captured runtime handle.

pub mod globals;
pub mod modules;
pub mod resolver;

use parking_lot::RwLock;
use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::Arc,
};

use crate::app::AppEntry;
use crate::core::context::RequestCtx;
use crate::core::worker::{Priority, WorkerPool};
use crate::prelude::*;

use globals::{build_g, ResponseState, ScriptResponse};
use resolver::{LoaderConfig, SandboxResolver};

/// Process-global cache of compiled script artifacts, keyed by absolute
/// path. Purged on reload or delete of the owning app, and bypassed (with
/// eviction) when caching is disabled for a request.
#[derive(Debug, Default)]
pub struct ArtifactCache {
	entries: RwLock<HashMap<PathBuf, Arc<rhai::AST>>>,
}

impl ArtifactCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, path: &Path) -> Option<Arc<rhai::AST>> {
		self.entries.read().get(path).cloned()
	}

	pub fn insert(&self, path: PathBuf, ast: Arc<rhai::AST>) {
		self.entries.write().insert(path, ast);
	}

	pub fn remove(&self, path: &Path) {
		self.entries.write().remove(path);
	}

	/// Evicts every artifact whose path starts with `prefix` (an app's
	/// box root).
	pub fn purge_prefix(&self, prefix: &Path) {
		self.entries.write().retain(|path, _| !path.starts_with(prefix));
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

/// Reads, compiles and caches a script, tagging the AST with its source
/// path so imports resolve relative to it. With caching disabled the
/// entry is also evicted, per the artifact cache contract.
pub fn compile_cached(
	engine: &rhai::Engine,
	artifacts: &ArtifactCache,
	path: &Path,
	use_cache: bool,
) -> WrResult<Arc<rhai::AST>> {
	if use_cache {
		if let Some(ast) = artifacts.get(path) {
			return Ok(ast);
		}
	} else {
		artifacts.remove(path);
	}

	let source = std::fs::read_to_string(path)
		.map_err(|e| Error::Script(format!("cannot read script '{}': {}", path.display(), e)))?;
	let mut ast = engine
		.compile(&source)
		.map_err(|e| Error::Script(format!("{}: {}", path.display(), e)))?;
	ast.set_source(path.to_string_lossy().as_ref());
	let ast = Arc::new(ast);

	if use_cache {
		artifacts.insert(path.to_path_buf(), ast.clone());
	}
	Ok(ast)
}

#[derive(Debug)]
pub struct ScriptHost {
	pub artifacts: Arc<ArtifactCache>,
	worker: Arc<WorkerPool>,
	runtime: tokio::runtime::Handle,
}

impl ScriptHost {
	pub fn new(worker: Arc<WorkerPool>, runtime: tokio::runtime::Handle) -> Self {
		ScriptHost { artifacts: Arc::new(ArtifactCache::new()), worker, runtime }
	}

	/// Drops every cached artifact belonging to an app.
	pub fn purge_app(&self, box_root: &Path) {
		self.artifacts.purge_prefix(box_root);
	}

	/// Builds a fully wired engine for one request: sandbox resolver,
	/// capability modules for the app's grants, script-facing types and
	/// print/debug hooks routed into the app logger.
	fn build_engine(
		&self,
		server: &Server,
		ctx: &Arc<RequestCtx>,
		use_cache: bool,
	) -> rhai::Engine {
		let mut engine = rhai::Engine::new();
		engine.set_max_call_levels(64);

		globals::register_types(&mut engine);

		let print_logger = ctx.logger.clone();
		engine.on_print(move |text| print_logger.info(text));
		let debug_logger = ctx.logger.clone();
		engine.on_debug(move |text, _source, _pos| debug_logger.debug(text));

		let cfg = LoaderConfig {
			app_name: ctx.app.name.as_str().into(),
			box_root: ctx.app.box_root.clone(),
			global_modules_root: server.modules_dir.clone(),
			allowed_builtins: server
				.config
				.box_settings
				.allowed_modules
				.iter()
				.chain(ctx.app.config.allowed_modules.iter())
				.cloned()
				.collect(),
			privileged: ctx.privileged,
			permissions: ctx.app.permissions.clone(),
		};
		let capabilities = modules::build_capabilities(server, ctx, &self.runtime);
		let resolver =
			SandboxResolver::new(cfg, capabilities, self.artifacts.clone(), use_cache);
		engine.set_module_resolver(resolver);

		engine
	}

	fn exec_handlers(
		&self,
		server: &Server,
		ctx: &Arc<RequestCtx>,
		scripts: &[PathBuf],
		use_cache: bool,
	) -> WrResult<ResponseState> {
		let engine = self.build_engine(server, ctx, use_cache);
		let response = ScriptResponse::new(ctx.logger.clone());
		let g = build_g(ctx, response.clone());

		for script in scripts {
			let ast = compile_cached(&engine, &self.artifacts, script, use_cache)?;
			let mut scope = rhai::Scope::new();
			let result: Result<rhai::Dynamic, _> =
				engine.call_fn(&mut scope, &ast, "handle", (g.clone(),));

			if let Err(e) = result {
				let msg = format!("{}: {}", script.display(), e);
				ctx.logger.error(&msg);
				// A failure after the response completed cannot undo what
				// went on the wire; only an open response becomes a 500.
				if response.is_completed() {
					break;
				}
				return Err(Error::Script(msg));
			}

			// A default include may complete the response; stop there.
			if response.is_completed() {
				break;
			}
		}

		Ok(response.snapshot())
	}

	/// Runs the default-include chain followed by the main route script
	/// and returns the response the scripts produced.
	pub async fn run_request(
		&self,
		server: Server,
		ctx: Arc<RequestCtx>,
		scripts: Vec<PathBuf>,
		use_cache: bool,
	) -> WrResult<ResponseState> {
		let artifacts = self.artifacts.clone();
		let worker = self.worker.clone();
		let runtime = self.runtime.clone();
		let host = ScriptHost { artifacts, worker: worker.clone(), runtime };

		worker
			.spawn(Priority::High, move || {
				host.exec_handlers(&server, &ctx, &scripts, use_cache)
			})
			.await?
	}

	/// Evaluates one startup script top to bottom (no `handle` entry).
	pub async fn run_startup_script(
		&self,
		server: Server,
		ctx: Arc<RequestCtx>,
		script: PathBuf,
	) -> WrResult<()> {
		let artifacts = self.artifacts.clone();
		let worker = self.worker.clone();
		let runtime = self.runtime.clone();
		let host = ScriptHost { artifacts, worker: worker.clone(), runtime };

		worker
			.spawn(Priority::Medium, move || -> WrResult<()> {
				let engine = host.build_engine(&server, &ctx, true);
				let ast = compile_cached(&engine, &host.artifacts, &script, true)?;
				engine
					.eval_ast::<rhai::Dynamic>(&ast)
					.map_err(|e| Error::Script(format!("{}: {}", script.display(), e)))?;
				Ok(())
			})
			.await?
	}
}

/// Runs every configured startup script of an app, in declared order.
pub async fn run_startup_scripts(server: &Server, app: &Arc<AppEntry>) -> WrResult<()> {
	for script in &app.config.startup_scripts {
		let path = crate::core::paths::normalize(&app.box_root.join(script));
		if !path.starts_with(app.box_root.as_ref()) {
			return Err(Error::PathTraversal(script.clone()));
		}
		info!("Running startup script '{}' of app '{}'", script, app.name);
		let ctx = Arc::new(RequestCtx::startup(
			app.clone(),
			server.registry.clone(),
			server.config.is_privileged(app.name.as_str()),
			path.clone(),
			server.max_body_size,
		));
		server.script_host.run_startup_script(server.clone(), ctx, path).await?;
	}
	Ok(())
}


// vim: ts=4
