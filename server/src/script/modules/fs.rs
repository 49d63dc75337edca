//! `fs` capability module: file I/O confined to the app's BOX/WEB roots.

use std::sync::Arc;

use crate::core::context::RequestCtx;

use super::{resolve_scoped, script_err};
use crate::error::Error;

pub fn module(ctx: &Arc<RequestCtx>) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let c = ctx.clone();
	module.set_native_fn("read_text", move |scope: &str, path: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		std::fs::read_to_string(&path).map_err(|e| script_err(Error::from(e)))
	});

	let c = ctx.clone();
	module.set_native_fn("read", move |scope: &str, path: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		std::fs::read(&path)
			.map(rhai::Dynamic::from_blob)
			.map_err(|e| script_err(Error::from(e)))
	});

	let c = ctx.clone();
	module.set_native_fn("write_text", move |scope: &str, path: &str, text: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| script_err(Error::from(e)))?;
		}
		std::fs::write(&path, text).map_err(|e| script_err(Error::from(e)))?;
		Ok(())
	});

	let c = ctx.clone();
	module.set_native_fn("write", move |scope: &str, path: &str, data: rhai::Blob| {
		let path = resolve_scoped(&c, scope, path)?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| script_err(Error::from(e)))?;
		}
		std::fs::write(&path, data).map_err(|e| script_err(Error::from(e)))?;
		Ok(())
	});

	let c = ctx.clone();
	module.set_native_fn("exists", move |scope: &str, path: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		Ok(path.exists())
	});

	let c = ctx.clone();
	module.set_native_fn("list", move |scope: &str, path: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		let mut names = rhai::Array::new();
		let entries = std::fs::read_dir(&path).map_err(|e| script_err(Error::from(e)))?;
		for entry in entries {
			let entry = entry.map_err(|e| script_err(Error::from(e)))?;
			names.push(entry.file_name().to_string_lossy().to_string().into());
		}
		Ok(names)
	});

	let c = ctx.clone();
	module.set_native_fn("mkdirs", move |scope: &str, path: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		std::fs::create_dir_all(&path).map_err(|e| script_err(Error::from(e)))?;
		Ok(())
	});

	let c = ctx.clone();
	module.set_native_fn("remove", move |scope: &str, path: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		let res = if path.is_dir() {
			std::fs::remove_dir_all(&path)
		} else {
			std::fs::remove_file(&path)
		};
		res.map_err(|e| script_err(Error::from(e)))?;
		Ok(())
	});

	let c = ctx.clone();
	module.set_native_fn(
		"copy",
		move |src_scope: &str, src: &str, dst_scope: &str, dst: &str| {
			let src = resolve_scoped(&c, src_scope, src)?;
			let dst = resolve_scoped(&c, dst_scope, dst)?;
			if let Some(parent) = dst.parent() {
				std::fs::create_dir_all(parent).map_err(|e| script_err(Error::from(e)))?;
			}
			std::fs::copy(&src, &dst).map_err(|e| script_err(Error::from(e)))?;
			Ok(())
		},
	);

	let c = ctx.clone();
	module.set_native_fn(
		"move_file",
		move |src_scope: &str, src: &str, dst_scope: &str, dst: &str| {
			let src = resolve_scoped(&c, src_scope, src)?;
			let dst = resolve_scoped(&c, dst_scope, dst)?;
			if let Some(parent) = dst.parent() {
				std::fs::create_dir_all(parent).map_err(|e| script_err(Error::from(e)))?;
			}
			std::fs::rename(&src, &dst).map_err(|e| script_err(Error::from(e)))?;
			Ok(())
		},
	);

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
