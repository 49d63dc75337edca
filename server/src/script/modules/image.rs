//! `image` capability module: resize and convert inside the app roots.

use std::sync::Arc;

use crate::core::context::RequestCtx;
use crate::error::Error;

use super::{resolve_scoped, script_err};

pub fn module(ctx: &Arc<RequestCtx>) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let c = ctx.clone();
	module.set_native_fn(
		"resize",
		move |src_scope: &str, src: &str, dst_scope: &str, dst: &str, w: i64, h: i64| {
			let src = resolve_scoped(&c, src_scope, src)?;
			let dst = resolve_scoped(&c, dst_scope, dst)?;
			let (w, h) = (
				u32::try_from(w).map_err(|_| {
					script_err(Error::Validation(format!("invalid width: {}", w)))
				})?,
				u32::try_from(h).map_err(|_| {
					script_err(Error::Validation(format!("invalid height: {}", h)))
				})?,
			);
			if let Some(parent) = dst.parent() {
				std::fs::create_dir_all(parent).map_err(|e| script_err(Error::from(e)))?;
			}
			let img = image::open(&src).map_err(|e| script_err(Error::from(e)))?;
			let resized = img.resize(w, h, image::imageops::FilterType::Lanczos3);
			resized.save(&dst).map_err(|e| script_err(Error::from(e)))?;
			Ok(())
		},
	);

	let c = ctx.clone();
	module.set_native_fn(
		"thumbnail",
		move |src_scope: &str, src: &str, dst_scope: &str, dst: &str, size: i64| {
			let src = resolve_scoped(&c, src_scope, src)?;
			let dst = resolve_scoped(&c, dst_scope, dst)?;
			let size = u32::try_from(size).map_err(|_| {
				script_err(Error::Validation(format!("invalid size: {}", size)))
			})?;
			if let Some(parent) = dst.parent() {
				std::fs::create_dir_all(parent).map_err(|e| script_err(Error::from(e)))?;
			}
			let img = image::open(&src).map_err(|e| script_err(Error::from(e)))?;
			img.thumbnail(size, size).save(&dst).map_err(|e| script_err(Error::from(e)))?;
			Ok(())
		},
	);

	let c = ctx.clone();
	module.set_native_fn("dimensions", move |scope: &str, path: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		let (w, h) =
			image::image_dimensions(&path).map_err(|e| script_err(Error::from(e)))?;
		let mut map = rhai::Map::new();
		map.insert("width".into(), rhai::Dynamic::from(i64::from(w)));
		map.insert("height".into(), rhai::Dynamic::from(i64::from(h)));
		Ok(map)
	});

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
