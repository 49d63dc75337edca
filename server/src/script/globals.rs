//! The `g` object — the script-visible request/response surface.

use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

use crate::app::logger::AppLogger;
use crate::core::context::RequestCtx;
use crate::prelude::*;

/// Body of a script-produced response.
#[derive(Clone, Debug, Default)]
pub enum ResponseBody {
	#[default]
	Empty,
	Text(String),
	Bytes(Vec<u8>),
	/// Pre-serialized JSON document.
	Json(String),
}

/// What the scripts built up; the dispatcher turns this into the wire
/// response.
#[derive(Clone, Debug)]
pub struct ResponseState {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	/// Complete `Set-Cookie` values accumulated by the script.
	pub cookies: Vec<String>,
	pub content_type: Option<String>,
	pub body: ResponseBody,
	/// Set by the first `send`; later sends are ignored with a warning.
	pub completed: bool,
}

impl Default for ResponseState {
	fn default() -> Self {
		ResponseState {
			status: 200,
			headers: Vec::new(),
			cookies: Vec::new(),
			content_type: None,
			body: ResponseBody::Empty,
			completed: false,
		}
	}
}

/// The `g.response` handle handed to scripts. Clones share one state, so
/// a default include and the main script observe each other's `send`.
#[derive(Clone, Debug)]
pub struct ScriptResponse {
	state: Arc<Mutex<ResponseState>>,
	logger: AppLogger,
}

impl ScriptResponse {
	pub fn new(logger: AppLogger) -> Self {
		ScriptResponse { state: Arc::new(Mutex::new(ResponseState::default())), logger }
	}

	pub fn is_completed(&self) -> bool {
		self.state.lock().completed
	}

	pub fn snapshot(&self) -> ResponseState {
		self.state.lock().clone()
	}

	fn apply_send(&self, data: rhai::Dynamic, status: Option<u16>, content_type: Option<String>) {
		let mut state = self.state.lock();
		if state.completed {
			self.logger.warn("response already completed, ignoring send()");
			return;
		}

		if data.is_unit() {
			state.body = ResponseBody::Empty;
		} else if data.is_string() {
			state.body = ResponseBody::Text(data.into_string().unwrap_or_default());
			if state.content_type.is_none() {
				state.content_type = Some("text/html; charset=utf-8".into());
			}
		} else if data.is_blob() {
			state.body = ResponseBody::Bytes(data.into_blob().unwrap_or_default());
			if state.content_type.is_none() {
				state.content_type = Some("application/octet-stream".into());
			}
		} else {
			match rhai::serde::from_dynamic::<serde_json::Value>(&data) {
				Ok(value) => {
					state.body = ResponseBody::Json(value.to_string());
					state.content_type = Some("application/json; charset=utf-8".into());
				}
				Err(e) => {
					self.logger.warn(&format!("send(): value not serialisable: {}", e));
					state.body = ResponseBody::Text(data.to_string());
				}
			}
		}

		if let Some(status) = status {
			state.status = status;
		}
		if let Some(ct) = content_type {
			state.content_type = Some(ct);
		}
		state.completed = true;
	}
}

// rhai-facing wrappers (method calls need a `&mut` receiver)

fn response_send(res: &mut ScriptResponse, data: rhai::Dynamic) {
	res.apply_send(data, None, None);
}

fn response_send_status(res: &mut ScriptResponse, data: rhai::Dynamic, status: i64) {
	res.apply_send(data, u16::try_from(status).ok(), None);
}

fn response_send_full(res: &mut ScriptResponse, data: rhai::Dynamic, status: i64, ct: &str) {
	res.apply_send(data, u16::try_from(status).ok(), Some(ct.to_string()));
}

fn response_status(res: &mut ScriptResponse, status: i64) {
	if let Ok(status) = u16::try_from(status) {
		res.state.lock().status = status;
	}
}

fn response_header(res: &mut ScriptResponse, name: &str, value: &str) {
	res.state.lock().headers.push((name.to_string(), value.to_string()));
}

fn response_cookie(res: &mut ScriptResponse, name: &str, value: &str) {
	res.state.lock().cookies.push(format!("{}={}; Path=/", name, value));
}

fn response_cookie_attrs(res: &mut ScriptResponse, name: &str, value: &str, attrs: &str) {
	res.state.lock().cookies.push(format!("{}={}; {}", name, value, attrs));
}

fn response_is_completed(res: &mut ScriptResponse) -> bool {
	res.is_completed()
}

fn log_error(logger: &mut AppLogger, msg: &str) {
	logger.error(msg);
}

fn log_warn(logger: &mut AppLogger, msg: &str) {
	logger.warn(msg);
}

fn log_info(logger: &mut AppLogger, msg: &str) {
	logger.info(msg);
}

fn log_debug(logger: &mut AppLogger, msg: &str) {
	logger.debug(msg);
}

/// Registers the script-facing host types on an engine.
pub fn register_types(engine: &mut rhai::Engine) {
	engine
		.register_type_with_name::<ScriptResponse>("Response")
		.register_fn("send", response_send)
		.register_fn("send", response_send_status)
		.register_fn("send", response_send_full)
		.register_fn("status", response_status)
		.register_fn("header", response_header)
		.register_fn("cookie", response_cookie)
		.register_fn("cookie", response_cookie_attrs)
		.register_fn("is_completed", response_is_completed);

	engine
		.register_type_with_name::<AppLogger>("Logger")
		.register_fn("error", log_error)
		.register_fn("warn", log_warn)
		.register_fn("info", log_info)
		.register_fn("debug", log_debug);
}

fn string_map(map: &HashMap<String, String>) -> rhai::Map {
	map.iter().map(|(k, v)| (k.as_str().into(), v.clone().into())).collect()
}

fn json_dynamic(value: &serde_json::Value) -> rhai::Dynamic {
	rhai::serde::to_dynamic(value).unwrap_or(rhai::Dynamic::UNIT)
}

fn body_dynamic(body: &BodyValue) -> rhai::Dynamic {
	match body {
		BodyValue::Null => rhai::Dynamic::UNIT,
		BodyValue::Text(text) => text.clone().into(),
		BodyValue::Bytes(bytes) => rhai::Dynamic::from_blob(bytes.clone()),
		BodyValue::Map(value) => json_dynamic(value),
		BodyValue::Multipart { fields, files } => {
			let mut map = rhai::Map::new();
			if let serde_json::Value::Object(fields) = fields {
				for (k, v) in fields {
					map.insert(k.as_str().into(), json_dynamic(v));
				}
			}
			let mut file_map = rhai::Map::new();
			for file in files {
				let mut entry = rhai::Map::new();
				entry.insert("name".into(), file.name.clone().into());
				entry.insert("type".into(), file.content_type.clone().into());
				entry.insert("size".into(), rhai::Dynamic::from(file.data.len() as i64));
				entry.insert("data".into(), rhai::Dynamic::from_blob(file.data.clone()));
				file_map.insert(file.field.as_str().into(), rhai::Dynamic::from_map(entry));
			}
			map.insert("files".into(), rhai::Dynamic::from_map(file_map));
			rhai::Dynamic::from_map(map)
		}
		BodyValue::Oversize => {
			let mut map = rhai::Map::new();
			map.insert("error".into(), "Payload size exceeded".into());
			rhai::Dynamic::from_map(map)
		}
	}
}

/// Builds the `g` map for one request from its context.
pub fn build_g(ctx: &Arc<RequestCtx>, response: ScriptResponse) -> rhai::Dynamic {
	let mut g = rhai::Map::new();

	let mut app = rhai::Map::new();
	app.insert("name".into(), ctx.app.name.as_str().into());
	app.insert("version".into(), ctx.app.config.version.clone().into());
	app.insert(
		"description".into(),
		ctx.app.config.description.clone().unwrap_or_default().into(),
	);
	app.insert(
		"env".into(),
		rhai::Dynamic::from_map(string_map(&ctx.app.config.env)),
	);
	g.insert("app".into(), rhai::Dynamic::from_map(app));

	g.insert("log".into(), rhai::Dynamic::from(ctx.logger.clone()));

	let mut request = rhai::Map::new();
	request.insert("method".into(), ctx.method.to_string().into());
	request.insert("path".into(), ctx.path.to_string().into());
	request.insert("url".into(), ctx.full_url.to_string().into());
	request.insert("headers".into(), rhai::Dynamic::from_map(string_map(&ctx.headers)));
	request.insert("cookies".into(), rhai::Dynamic::from_map(string_map(&ctx.cookies)));
	let query: rhai::Map =
		ctx.query.iter().map(|(k, v)| (k.as_str().into(), json_dynamic(v))).collect();
	request.insert("query".into(), rhai::Dynamic::from_map(query));
	request.insert("params".into(), rhai::Dynamic::from_map(string_map(&ctx.params)));
	request.insert("body".into(), body_dynamic(&ctx.body));
	g.insert("request".into(), rhai::Dynamic::from_map(request));

	g.insert("response".into(), rhai::Dynamic::from(response));

	// Privileged apps see the whole registry; others only themselves.
	if ctx.privileged {
		let names: rhai::Array =
			ctx.registry.names().iter().map(|n| n.to_string().into()).collect();
		g.insert("app_names".into(), names.into());

		let mut apps = rhai::Map::new();
		for entry in ctx.registry.snapshot() {
			let mut info = rhai::Map::new();
			info.insert("name".into(), entry.name.as_str().into());
			info.insert("version".into(), entry.config.version.clone().into());
			info.insert(
				"description".into(),
				entry.config.description.clone().unwrap_or_default().into(),
			);
			info.insert("maintenance".into(), entry.is_in_maintenance().into());
			apps.insert(entry.name.as_str().into(), rhai::Dynamic::from_map(info));
		}
		g.insert("apps".into(), rhai::Dynamic::from_map(apps));
	}

	rhai::Dynamic::from_map(g)
}


// vim: ts=4
