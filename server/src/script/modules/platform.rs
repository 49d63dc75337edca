//! `platform` capability module: app lifecycle management. Requires both
//! the `platform` grant and privileged status — the admin app's toolbox.

use crate::app::{lifecycle, package::UpgradePlan};
use crate::prelude::*;

use super::script_err;

fn string_vec(list: &rhai::Array) -> Vec<String> {
	list.iter().map(ToString::to_string).collect()
}

fn plan_map(plan: &UpgradePlan) -> Result<rhai::Dynamic, Box<rhai::EvalAltResult>> {
	let value = serde_json::to_value(plan).map_err(|e| script_err(Error::from(e)))?;
	rhai::serde::to_dynamic(&value).map_err(|e| script_err(Error::Script(e.to_string())))
}

pub fn module(server: &Server, rt: &tokio::runtime::Handle) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn(
		"install",
		move |name: &str, package: rhai::Blob, perms: rhai::Array| {
			handle
				.block_on(lifecycle::install(&s, name, &package, &string_vec(&perms)))
				.map_err(script_err)?;
			Ok(())
		},
	);

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn(
		"upgrade",
		move |name: &str, package: rhai::Blob, perms: rhai::Array, backup: bool| {
			let plan = handle
				.block_on(lifecycle::upgrade(&s, name, package.to_vec(), &string_vec(&perms), backup))
				.map_err(script_err)?;
			plan_map(&plan)
		},
	);

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn("upgrade_plan", move |name: &str, package: rhai::Blob| {
		let plan =
			handle.block_on(lifecycle::upgrade_plan(&s, name, &package)).map_err(script_err)?;
		plan_map(&plan)
	});

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn("rollback", move |name: &str, perms: rhai::Array| {
		let plan = handle
			.block_on(lifecycle::rollback(&s, name, &string_vec(&perms)))
			.map_err(script_err)?;
		plan_map(&plan)
	});

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn(
		"install_from_backup",
		move |name: &str, which: &str, perms: rhai::Array| {
			handle
				.block_on(lifecycle::install_from_backup(&s, name, which, &string_vec(&perms)))
				.map_err(script_err)?;
			Ok(())
		},
	);

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn("delete", move |name: &str| {
		handle.block_on(lifecycle::delete(&s, name)).map_err(script_err)?;
		Ok(())
	});

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn("reload", move |name: &str| {
		handle.block_on(lifecycle::reload(&s, name)).map_err(script_err)?;
		Ok(())
	});

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn("set_permissions", move |name: &str, perms: rhai::Array| {
		handle
			.block_on(lifecycle::set_permissions(&s, name, &string_vec(&perms)))
			.map_err(script_err)?;
		Ok(())
	});

	let s = server.clone();
	module.set_native_fn("list_backups", move |name: &str| {
		let backups =
			crate::app::package::list_backups(&s.backups_dir, name).map_err(script_err)?;
		Ok(backups.into_iter().map(rhai::Dynamic::from).collect::<rhai::Array>())
	});

	let s = server.clone();
	let handle = rt.clone();
	module.set_native_fn("analyze_backup", move |name: &str, which: &str| {
		let info =
			handle.block_on(lifecycle::analyze_backup(&s, name, which)).map_err(script_err)?;
		rhai::serde::to_dynamic(&info).map_err(|e| script_err(Error::Script(e.to_string())))
	});

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
