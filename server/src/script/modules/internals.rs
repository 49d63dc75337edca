//! Privileged-only engine internals: introspection namespaces for the
//! admin app. Not gated by permission grants, only by privilege.

use std::{str::FromStr, sync::Arc};

use crate::core::{context::RequestCtx, paths};
use crate::prelude::*;

use super::script_err;

/// `context` — the active request context, from the inside.
pub fn context_module(ctx: &Arc<RequestCtx>) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let c = ctx.clone();
	module.set_native_fn("app_name", move || Ok(c.app.name.as_str().to_string()));

	let c = ctx.clone();
	module.set_native_fn("script_path", move || {
		Ok(c.script_path.to_string_lossy().to_string())
	});

	let c = ctx.clone();
	module.set_native_fn("method", move || Ok(c.method.to_string()));

	let c = ctx.clone();
	module.set_native_fn("max_body_size", move || Ok(c.max_body_size as i64));

	module.build_index();
	rhai::Shared::new(module)
}

/// `cachesvc` — the service layer under the per-app facades.
pub fn cachesvc_module(server: &Server, rt: &tokio::runtime::Handle) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let s = server.clone();
	module.set_native_fn("backend", move || Ok(s.cache.backend_name().to_string()));

	let s = server.clone();
	module.set_native_fn("default_ttl", move || Ok(s.cache.default_ttl() as i64));

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn("clear_prefix", move |prefix: &str| {
		handle.block_on(s.cache.clear(prefix)).map_err(script_err)?;
		Ok(())
	});

	module.build_index();
	rhai::Shared::new(module)
}

/// `paths` — resolver internals: resolve against any registered app.
pub fn paths_module(ctx: &Arc<RequestCtx>) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let c = ctx.clone();
	module.set_native_fn("resolve", move |app: &str, scope: &str, path: &str| {
		let entry = c.registry.get(app).ok_or_else(|| script_err(Error::AppNotFound))?;
		let scope = Scope::from_str(scope).map_err(script_err)?;
		let resolved = paths::resolve(
			scope,
			path,
			entry.name.as_str(),
			&entry.web_root,
			&entry.box_root,
			&entry.box_root,
		)
		.map_err(script_err)?;
		Ok(resolved.to_string_lossy().to_string())
	});

	module.build_index();
	rhai::Shared::new(module)
}

/// `bootstrap` — startup orchestrator introspection and rescan.
pub fn bootstrap_module(server: &Server, rt: &tokio::runtime::Handle) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let s = server.clone();
	module.set_native_fn("app_names", move || {
		Ok(s.registry.names().iter().map(|n| rhai::Dynamic::from(n.to_string())).collect::<rhai::Array>())
	});

	let s = server.clone();
	module.set_native_fn("artifact_count", move || Ok(s.script_host.artifacts.len() as i64));

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn("rescan", move || {
		let added = handle.block_on(crate::bootstrap::scan_apps(&s)).map_err(script_err)?;
		Ok(added.into_iter().map(rhai::Dynamic::from).collect::<rhai::Array>())
	});

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
