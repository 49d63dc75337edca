//! Host capability modules exposed to scripts through the sandbox
//! resolver. Each module is built per request with the request context
//! captured in its closures; async adapter calls block on the captured
//! runtime handle (scripts execute on worker threads, off the reactor).

pub mod builtins;
pub mod cache;
pub mod db;
pub mod fs;
pub mod httpclient;
pub mod image;
pub mod internals;
pub mod pdf;
pub mod platform;
pub mod zip;

use std::{collections::HashMap, path::PathBuf, str::FromStr, sync::Arc};

use crate::core::{context::RequestCtx, paths};
use crate::prelude::*;

pub(crate) fn script_err(err: Error) -> Box<rhai::EvalAltResult> {
	Box::new(rhai::EvalAltResult::ErrorRuntime(
		rhai::Dynamic::from(err.to_string()),
		rhai::Position::NONE,
	))
}

/// Resolves a `(scope, path)` pair of a capability call against the
/// active app; traversal attempts surface as script errors.
pub(crate) fn resolve_scoped(
	ctx: &RequestCtx,
	scope: &str,
	user_path: &str,
) -> Result<PathBuf, Box<rhai::EvalAltResult>> {
	let scope = Scope::from_str(scope).map_err(script_err)?;
	paths::resolve(
		scope,
		user_path,
		ctx.app.name.as_str(),
		&ctx.app.web_root,
		&ctx.app.box_root,
		&ctx.script_dir,
	)
	.map_err(script_err)
}

/// Builds the capability modules this request's app may import: one per
/// granted permission, plus the privileged internals where applicable.
pub fn build_capabilities(
	server: &Server,
	ctx: &Arc<RequestCtx>,
	rt: &tokio::runtime::Handle,
) -> HashMap<&'static str, rhai::Shared<rhai::Module>> {
	let mut caps: HashMap<&'static str, rhai::Shared<rhai::Module>> = HashMap::new();

	for permission in &ctx.app.permissions {
		match permission {
			Permission::Fs => {
				caps.insert("fs", fs::module(ctx));
			}
			Permission::Cache => {
				caps.insert("cache", cache::module(server, ctx, rt));
			}
			Permission::Db => {
				caps.insert("db", db::module(ctx, rt));
			}
			Permission::HttpClient => {
				caps.insert("httpclient", httpclient::module(server, rt));
			}
			Permission::Image => {
				caps.insert("image", image::module(ctx));
			}
			Permission::Pdf => {
				caps.insert("pdf", pdf::module(ctx));
			}
			Permission::Zip => {
				caps.insert("zip", zip::module(ctx));
			}
			Permission::Platform => {
				if ctx.privileged {
					caps.insert("platform", platform::module(server, rt));
				}
			}
		}
	}

	if ctx.privileged {
		caps.insert("context", internals::context_module(ctx));
		caps.insert("cachesvc", internals::cachesvc_module(server, rt));
		caps.insert("paths", internals::paths_module(ctx));
		caps.insert("bootstrap", internals::bootstrap_module(server, rt));
	}

	caps
}

// vim: ts=4
