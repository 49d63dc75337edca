//! Request-scoped context propagation.
//!
//! One [`RequestCtx`] is created per dispatched request and made
//! observable to everything downstream of the dispatcher through a
//! task-local cell: `run()` scopes a value over a future, `current()`
//! reads it anywhere below, and nested `run()` calls shadow the outer
//! value for their duration. Script capability modules execute on worker
//! threads outside the tokio task and capture the `Arc<RequestCtx>`
//! explicitly instead.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use crate::app::{logger::AppLogger, AppEntry, AppRegistry};
use crate::prelude::*;

/// Everything a request (or startup-script run) carries with it.
#[derive(Debug)]
pub struct RequestCtx {
	pub app: Arc<AppEntry>,
	pub registry: Arc<AppRegistry>,
	/// Whether the target app is listed in `privileged_apps`.
	pub privileged: bool,

	pub method: Box<str>,
	pub path: Box<str>,
	pub full_url: Box<str>,
	pub headers: HashMap<String, String>,
	pub cookies: HashMap<String, String>,
	pub query: HashMap<String, serde_json::Value>,
	pub params: HashMap<String, String>,
	pub body: BodyValue,
	pub max_body_size: u64,

	pub script_path: PathBuf,
	pub script_dir: PathBuf,
	pub logger: AppLogger,
}

impl RequestCtx {
	/// A synthetic context for startup scripts, which run outside any
	/// HTTP request but still use the capability modules.
	pub fn startup(
		app: Arc<AppEntry>,
		registry: Arc<AppRegistry>,
		privileged: bool,
		script_path: PathBuf,
		max_body_size: u64,
	) -> Self {
		let script_dir = script_path.parent().map(PathBuf::from).unwrap_or_default();
		let logger = app.logger.clone();
		RequestCtx {
			app,
			registry,
			privileged,
			method: "STARTUP".into(),
			path: "".into(),
			full_url: "".into(),
			headers: HashMap::new(),
			cookies: HashMap::new(),
			query: HashMap::new(),
			params: HashMap::new(),
			body: BodyValue::Null,
			max_body_size,
			script_path,
			script_dir,
			logger,
		}
	}
}

tokio::task_local! {
	static CURRENT: Arc<RequestCtx>;
}

/// Runs `fut` with `ctx` observable via [`current`] everywhere downstream,
/// across await points. Nested calls shadow the outer value.
pub async fn run<F>(ctx: Arc<RequestCtx>, fut: F) -> F::Output
where
	F: std::future::Future,
{
	CURRENT.scope(ctx, fut).await
}

/// The active request context, if any.
pub fn try_current() -> Option<Arc<RequestCtx>> {
	CURRENT.try_with(Arc::clone).ok()
}

/// The active request context; an internal error outside a request.
pub fn current() -> WrResult<Arc<RequestCtx>> {
	try_current().ok_or_else(|| Error::Internal("no active request context".into()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::app::test_support::make_test_app;

	#[tokio::test]
	async fn value_is_visible_across_awaits() {
		let (app, registry) = make_test_app("demo");
		let ctx = Arc::new(RequestCtx::startup(app, registry, false, PathBuf::new(), 0));
		run(ctx, async {
			tokio::task::yield_now().await;
			assert_eq!(current().unwrap().app.name.as_ref(), "demo");
		})
		.await;
	}

	#[tokio::test]
	async fn nested_run_shadows_and_restores() {
		let (outer_app, registry) = make_test_app("outer");
		let (inner_app, _) = make_test_app("inner");
		let outer =
			Arc::new(RequestCtx::startup(outer_app, registry.clone(), false, PathBuf::new(), 0));
		let inner = Arc::new(RequestCtx::startup(inner_app, registry, false, PathBuf::new(), 0));

		run(outer, async move {
			assert_eq!(current().unwrap().app.name.as_ref(), "outer");
			run(inner, async {
				assert_eq!(current().unwrap().app.name.as_ref(), "inner");
			})
			.await;
			assert_eq!(current().unwrap().app.name.as_ref(), "outer");
		})
		.await;
	}

	#[test]
	fn no_context_outside_run() {
		assert!(try_current().is_none());
	}
}

// vim: ts=4
