//! `pdf` capability module.
//!
//! Uses external poppler tools, matching the engine's media pipeline:
//! - pdfinfo for page count extraction
//! - pdftoppm for first-page thumbnail generation

use std::{process::Command, sync::Arc};

use crate::core::context::RequestCtx;
use crate::error::Error;

use super::{resolve_scoped, script_err};

fn page_count(input: &std::path::Path) -> Result<i64, Box<rhai::EvalAltResult>> {
	let path = input
		.to_str()
		.ok_or_else(|| script_err(Error::Validation("invalid path".into())))?;
	let output = Command::new("pdfinfo")
		.arg(path)
		.output()
		.map_err(|e| script_err(Error::Backend(format!("pdfinfo failed: {}", e))))?;

	if !output.status.success() {
		let stderr = String::from_utf8_lossy(&output.stderr);
		return Err(script_err(Error::Backend(format!("pdfinfo failed: {}", stderr))));
	}

	let stdout = String::from_utf8_lossy(&output.stdout);
	let pages = stdout
		.lines()
		.find(|line| line.starts_with("Pages:"))
		.and_then(|line| line.split_whitespace().nth(1))
		.and_then(|s| s.parse().ok())
		.unwrap_or(1);
	Ok(pages)
}

fn first_page_png(
	input: &std::path::Path,
	output: &std::path::Path,
	dpi: u32,
) -> Result<(), Box<rhai::EvalAltResult>> {
	let output_base = output
		.with_extension("")
		.to_str()
		.ok_or_else(|| script_err(Error::Validation("invalid output path".into())))?
		.to_string();
	let input = input
		.to_str()
		.ok_or_else(|| script_err(Error::Validation("invalid path".into())))?;

	let status = Command::new("pdftoppm")
		.args(["-png", "-f", "1", "-l", "1", "-r", &dpi.to_string(), input, &output_base])
		.status()
		.map_err(|e| script_err(Error::Backend(format!("pdftoppm failed: {}", e))))?;
	if !status.success() {
		return Err(script_err(Error::Backend("pdftoppm failed".into())));
	}

	// pdftoppm writes <base>-1.png for the first page
	let produced = std::path::PathBuf::from(format!("{}-1.png", output_base));
	std::fs::rename(&produced, output).map_err(|e| script_err(Error::from(e)))?;
	Ok(())
}

pub fn module(ctx: &Arc<RequestCtx>) -> rhai::Shared<rhai::Module> {
	let mut module = rhai::Module::new();

	let c = ctx.clone();
	module.set_native_fn("page_count", move |scope: &str, path: &str| {
		let path = resolve_scoped(&c, scope, path)?;
		page_count(&path)
	});

	let c = ctx.clone();
	module.set_native_fn(
		"thumbnail",
		move |src_scope: &str, src: &str, dst_scope: &str, dst: &str, dpi: i64| {
			let src = resolve_scoped(&c, src_scope, src)?;
			let dst = resolve_scoped(&c, dst_scope, dst)?;
			let dpi = u32::try_from(dpi)
				.map_err(|_| script_err(Error::Validation(format!("invalid dpi: {}", dpi))))?;
			if let Some(parent) = dst.parent() {
				std::fs::create_dir_all(parent).map_err(|e| script_err(Error::from(e)))?;
			}
			first_page_png(&src, &dst, dpi)
		},
	);

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
