//! `httpclient` capability module: outbound requests with a timeout.

use crate::core::http_client::FetchedResponse;
use crate::prelude::*;

use super::script_err;

fn response_map(res: FetchedResponse) -> rhai::Map {
	let mut map = rhai::Map::new();
	map.insert("status".into(), rhai::Dynamic::from(i64::from(res.status)));

	let mut headers = rhai::Map::new();
	for (name, value) in res.headers {
		headers.insert(name.to_ascii_lowercase().into(), value.into());
	}
	map.insert("headers".into(), rhai::Dynamic::from_map(headers));

	map.insert("body".into(), String::from_utf8_lossy(&res.body).to_string().into());
	map.insert("bytes".into(), rhai::Dynamic::from_blob(res.body.to_vec()));
	map
}

fn header_pairs(headers: &rhai::Map) -> Vec<(String, String)> {
	headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn body_bytes(body: &rhai::Dynamic) -> Result<Vec<u8>, Box<rhai::EvalAltResult>> {
	if body.is_string() {
		Ok(body.clone().into_string().unwrap_or_default().into_bytes())
	} else if body.is_blob() {
		Ok(body.clone().into_blob().unwrap_or_default())
	} else {
		let value: serde_json::Value = rhai::serde::from_dynamic(body)
			.map_err(|e| script_err(Error::Validation(format!("body not serialisable: {}", e))))?;
		Ok(value.to_string().into_bytes())
	}
}

pub fn module(server: &Server, rt: &tokio::runtime::Handle) -> rhai::Shared<rhai::Module> {
	let client = server.http_client.clone();
	let mut module = rhai::Module::new();

	let c = client.clone();
	let handle = rt.clone();
	module.set_native_fn("get", move |url: &str| {
		let res = handle.block_on(c.get(url, &[])).map_err(script_err)?;
		Ok(response_map(res))
	});

	let c = client.clone();
	let handle = rt.clone();
	module.set_native_fn("get", move |url: &str, headers: rhai::Map| {
		let res = handle.block_on(c.get(url, &header_pairs(&headers))).map_err(script_err)?;
		Ok(response_map(res))
	});

	let c = client.clone();
	let handle = rt.clone();
	module.set_native_fn("post", move |url: &str, body: rhai::Dynamic| {
		let content_type = if body.is_string() { "text/plain" } else { "application/json" };
		let bytes = body_bytes(&body)?;
		let res = handle
			.block_on(c.post(url, bytes.into(), content_type, &[]))
			.map_err(script_err)?;
		Ok(response_map(res))
	});

	let c = client;
	let handle = rt.clone();
	module.set_native_fn(
		"post",
		move |url: &str, body: rhai::Dynamic, content_type: &str| {
			let bytes = body_bytes(&body)?;
			let res = handle
				.block_on(c.post(url, bytes.into(), content_type, &[]))
				.map_err(script_err)?;
			Ok(response_map(res))
		},
	);

	module.build_index();
	rhai::Shared::new(module)
}

// vim: ts=4
