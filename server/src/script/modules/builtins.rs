//! Host builtin modules: small utility namespaces every app may import
//! (or that the server/app config explicitly allows).

use base64::Engine as _;

use crate::core::utils::random_id;

fn runtime_err(msg: String) -> Box<rhai::EvalAltResult> {
	Box::new(rhai::EvalAltResult::ErrorRuntime(rhai::Dynamic::from(msg), rhai::Position::NONE))
}

fn utils_module() -> rhai::Module {
	let mut module = rhai::Module::new();
	module.set_native_fn("random_id", || Ok(random_id()));
	module.set_native_fn("now_iso", || {
		Ok(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
	});
	module.set_native_fn("now_millis", || Ok(chrono::Utc::now().timestamp_millis()));
	module
}

fn encoding_module() -> rhai::Module {
	let mut module = rhai::Module::new();
	module.set_native_fn("base64_encode", |data: rhai::Blob| {
		Ok(base64::engine::general_purpose::STANDARD.encode(data))
	});
	module.set_native_fn("base64_decode", |text: &str| {
		base64::engine::general_purpose::STANDARD
			.decode(text)
			.map(rhai::Dynamic::from_blob)
			.map_err(|e| runtime_err(format!("invalid base64: {}", e)))
	});
	module.set_native_fn("hex_encode", |data: rhai::Blob| {
		Ok(data.iter().map(|b| format!("{:02x}", b)).collect::<String>())
	});
	module.set_native_fn("utf8", |data: rhai::Blob| {
		String::from_utf8(data).map_err(|e| runtime_err(format!("invalid utf-8: {}", e)))
	});
	module.set_native_fn("bytes", |text: &str| {
		Ok(rhai::Dynamic::from_blob(text.as_bytes().to_vec()))
	});
	module
}

fn datetime_module() -> rhai::Module {
	let mut module = rhai::Module::new();
	module.set_native_fn("timestamp", || Ok(chrono::Utc::now().timestamp()));
	module.set_native_fn("format", |ts: i64, fmt: &str| {
		chrono::DateTime::from_timestamp(ts, 0)
			.map(|dt| dt.format(fmt).to_string())
			.ok_or_else(|| runtime_err(format!("invalid timestamp: {}", ts)))
	});
	module
}

/// Materialises a builtin module by name, if the engine ships one.
pub fn builtin_module(name: &str) -> Option<rhai::Shared<rhai::Module>> {
	let mut module = match name {
		"utils" => utils_module(),
		"encoding" => encoding_module(),
		"datetime" => datetime_module(),
		_ => return None,
	};
	module.build_index();
	Some(rhai::Shared::new(module))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_builtins_materialise() {
		assert!(builtin_module("utils").is_some());
		assert!(builtin_module("encoding").is_some());
		assert!(builtin_module("datetime").is_some());
		assert!(builtin_module("sudo").is_none());
	}
}

// vim: ts=4
