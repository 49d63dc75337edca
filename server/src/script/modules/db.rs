//! `db` capability module: queries against the app's logical databases.

use std::sync::Arc;

use crate::core::context::RequestCtx;
use crate::prelude::*;

use super::script_err;

fn params_to_json(params: &rhai::Array) -> Result<Vec<serde_json::Value>, Box<rhai::EvalAltResult>> {
	params
		.iter()
		.map(|p| {
			rhai::serde::from_dynamic(p).map_err(|e| {
				script_err(Error::Validation(format!("parameter not serialisable: {}", e)))
			})
		})
		.collect()
}

fn rows_to_dynamic(rows: Vec<serde_json::Value>) -> rhai::Array {
	rows.iter().map(|row| rhai::serde::to_dynamic(row).unwrap_or(rhai::Dynamic::UNIT)).collect()
}

pub fn module(ctx: &Arc<RequestCtx>, rt: &tokio::runtime::Handle) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let c = ctx.clone();
	let handle = rt.clone();
	module.set_native_fn("query", move |name: &str, sql: &str| {
		let pool = c.app.db_pool(name).map_err(script_err)?;
		let rows = handle.block_on(pool.query(sql, &[])).map_err(script_err)?;
		Ok(rows_to_dynamic(rows))
	});

	let c = ctx.clone();
	let handle = rt.clone();
	module.set_native_fn("query", move |name: &str, sql: &str, params: rhai::Array| {
		let pool = c.app.db_pool(name).map_err(script_err)?;
		let params = params_to_json(&params)?;
		let rows = handle.block_on(pool.query(sql, &params)).map_err(script_err)?;
		Ok(rows_to_dynamic(rows))
	});

	let c = ctx.clone();
	let handle = rt.clone();
	module.set_native_fn("execute", move |name: &str, sql: &str| {
		let pool = c.app.db_pool(name).map_err(script_err)?;
		let affected = handle.block_on(pool.execute(sql, &[])).map_err(script_err)?;
		Ok(affected as i64)
	});

	let c = ctx.clone();
	let handle = rt.clone();
	module.set_native_fn("execute", move |name: &str, sql: &str, params: rhai::Array| {
		let pool = c.app.db_pool(name).map_err(script_err)?;
		let params = params_to_json(&params)?;
		let affected = handle.block_on(pool.execute(sql, &params)).map_err(script_err)?;
		Ok(affected as i64)
	});

	let c = ctx.clone();
	module.set_native_fn("dialect", move |name: &str| {
		let pool = c.app.db_pool(name).map_err(script_err)?;
		Ok(pool.dialect().to_string())
	});

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
