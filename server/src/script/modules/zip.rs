//! `zip` capability module: pack/unpack confined to the app roots.
//! Extraction goes through the package machinery, so entry names are
//! validated against traversal the same way installs are.

use std::sync::Arc;

use crate::app::package;
use crate::core::context::RequestCtx;
use crate::error::Error;

use super::{resolve_scoped, script_err};

pub fn module(ctx: &Arc<RequestCtx>) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let c = ctx.clone();
	module.set_native_fn(
		"pack",
		move |src_scope: &str, src_dir: &str, dst_scope: &str, dst_file: &str| {
			let src = resolve_scoped(&c, src_scope, src_dir)?;
			let dst = resolve_scoped(&c, dst_scope, dst_file)?;
			let bytes = package::pack_dir(&src).map_err(script_err)?;
			if let Some(parent) = dst.parent() {
				std::fs::create_dir_all(parent).map_err(|e| script_err(Error::from(e)))?;
			}
			std::fs::write(&dst, bytes).map_err(|e| script_err(Error::from(e)))?;
			Ok(())
		},
	);

	let c = ctx.clone();
	module.set_native_fn(
		"unpack",
		move |src_scope: &str, src_file: &str, dst_scope: &str, dst_dir: &str| {
			let src = resolve_scoped(&c, src_scope, src_file)?;
			let dst = resolve_scoped(&c, dst_scope, dst_dir)?;
			let bytes = std::fs::read(&src).map_err(|e| script_err(Error::from(e)))?;
			package::extract(&bytes, &dst).map_err(script_err)?;
			Ok(())
		},
	);

	let c = ctx.clone();
	module.set_native_fn("list", move |scope: &str, file: &str| {
		let path = resolve_scoped(&c, scope, file)?;
		let bytes = std::fs::read(&path).map_err(|e| script_err(Error::from(e)))?;
		let files = package::list_files(&bytes).map_err(script_err)?;
		Ok(files.into_iter().map(rhai::Dynamic::from).collect::<rhai::Array>())
	});

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
