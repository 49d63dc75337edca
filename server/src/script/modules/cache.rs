//! `cache` capability module: the per-app cache facade.

use std::sync::Arc;

use crate::core::context::RequestCtx;
use crate::prelude::*;

use super::script_err;

fn to_json(value: &rhai::Dynamic) -> Result<serde_json::Value, Box<rhai::EvalAltResult>> {
	rhai::serde::from_dynamic(value)
		.map_err(|e| script_err(Error::Validation(format!("value not serialisable: {}", e))))
}

fn from_json(value: Option<serde_json::Value>) -> rhai::Dynamic {
	match value {
		Some(v) => rhai::serde::to_dynamic(&v).unwrap_or(rhai::Dynamic::UNIT),
		None => rhai::Dynamic::UNIT,
	}
}

pub fn module(
	server: &Server,
	ctx: &Arc<RequestCtx>,
	rt: &tokio::runtime::Handle,
) -> rhai::Shared<rhai::Module> {
	let cache = server.cache.for_app(ctx.app.name.as_str());
	let mut module = rhai::Module::new();

	let c = cache.clone();
	let handle = rt.clone();
	module.set_native_fn("get", move |key: &str| {
		let value = handle.block_on(c.get(key)).map_err(script_err)?;
		Ok(from_json(value))
	});

	let c = cache.clone();
	let handle = rt.clone();
	module.set_native_fn("set", move |key: &str, value: rhai::Dynamic| {
		let json = to_json(&value)?;
		handle.block_on(c.set(key, &json, None)).map_err(script_err)?;
		Ok(())
	});

	let c = cache.clone();
	let handle = rt.clone();
	module.set_native_fn("set", move |key: &str, value: rhai::Dynamic, ttl: i64| {
		let json = to_json(&value)?;
		let ttl = u64::try_from(ttl).ok();
		handle.block_on(c.set(key, &json, ttl)).map_err(script_err)?;
		Ok(())
	});

	let c = cache.clone();
	let handle = rt.clone();
	module.set_native_fn("del", move |key: &str| {
		handle.block_on(c.del(key)).map_err(script_err)?;
		Ok(())
	});

	let c = cache;
	let handle = rt.clone();
	module.set_native_fn("clear", move || {
		handle.block_on(c.clear()).map_err(script_err)?;
		Ok(())
	});

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
