//! Request dispatcher: URL → app → route → script/static decisioning.

pub mod body;
pub mod static_files;

use axum::{
	body::Body,
	extract::{Request, State},
	http::{header, HeaderMap, Method, StatusCode, Uri},
	response::{IntoResponse, Response},
	Router,
};
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Instant};
use tower_http::compression::CompressionLayer;

use crate::app::{config::AppType, routes, AppEntry};
use crate::core::{context, context::RequestCtx, paths};
use crate::prelude::*;
use crate::script::globals::{ResponseBody, ResponseState};

/// Builds the engine's public router: everything funnels through the
/// dispatcher, with gzip negotiation layered on when enabled.
pub fn router(server: Server) -> Router {
	let content_encoding = server.config.content_encoding.enabled;
	let router = Router::new().fallback(dispatch).with_state(server);
	if content_encoding {
		router.layer(CompressionLayer::new())
	} else {
		router
	}
}

async fn dispatch(State(server): State<Server>, req: Request<Body>) -> Response {
	let start = Instant::now();
	let method = req.method().clone();
	let path = req.uri().path().to_string();
	info!("REQ {} {}", method, path);

	let result = handle(&server, req).await;
	let elapsed = start.elapsed().as_millis();
	match result {
		Ok(response) => {
			let status = response.status();
			if status.is_client_error() || status.is_server_error() {
				warn!("RES {} {} {} tm:{}ms", status.as_u16(), method, path, elapsed);
			} else {
				info!("RES {} {} {} tm:{}ms", status.as_u16(), method, path, elapsed);
			}
			response
		}
		Err(e) => {
			warn!("RES error {} {} tm:{}ms: {}", method, path, elapsed, e);
			e.into_response()
		}
	}
}

fn first_segment(path: &str) -> Option<&str> {
	path.trim_start_matches('/').split('/').next().filter(|s| !s.is_empty())
}

/// SPA inference: when the first path segment names no app, the Referer
/// may identify the owning SPA (its assets are requested root-relative).
/// Advisory only, and never applied to non-SPA apps.
fn infer_spa_app(server: &Server, headers: &HeaderMap) -> Option<Arc<AppEntry>> {
	let referer = headers.get(header::REFERER)?.to_str().ok()?;
	let path = match referer.find("://") {
		Some(idx) => referer[idx + 3..].find('/').map(|p| &referer[idx + 3 + p..])?,
		None => referer,
	};
	let name = first_segment(path)?;
	let app = server.registry.get(name)?;
	if app.config.app_type == AppType::Spa {
		debug!("Adopted SPA app '{}' from Referer", app.name);
		Some(app)
	} else {
		None
	}
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
	headers
		.iter()
		.filter_map(|(name, value)| {
			value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
		})
		.collect()
}

fn cookie_map(headers: &HeaderMap) -> HashMap<String, String> {
	let mut cookies = HashMap::new();
	if let Some(raw) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
		for pair in raw.split(';') {
			if let Some((name, value)) = pair.trim().split_once('=') {
				cookies.insert(name.trim().to_string(), value.trim().to_string());
			}
		}
	}
	cookies
}

fn query_map(query: Option<&str>) -> HashMap<String, serde_json::Value> {
	let mut map: HashMap<String, serde_json::Value> = HashMap::new();
	let Some(query) = query else { return map };
	for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
		let value = serde_json::Value::String(value.into_owned());
		match map.get_mut(key.as_ref()) {
			Some(serde_json::Value::Array(list)) => list.push(value),
			Some(existing) => {
				let first = existing.take();
				*existing = serde_json::Value::Array(vec![first, value]);
			}
			None => {
				map.insert(key.into_owned(), value);
			}
		}
	}
	map
}

/// Resolves a box-relative script reference from config, refusing
/// anything that leaves the box root.
fn box_script(app: &AppEntry, rel: &str) -> WrResult<PathBuf> {
	let path = paths::normalize(&app.box_root.join(rel));
	if path.starts_with(app.box_root.as_ref()) {
		Ok(path)
	} else {
		Err(Error::PathTraversal(rel.to_string()))
	}
}

fn build_response(state: ResponseState) -> WrResult<Response> {
	let mut builder = Response::builder()
		.status(StatusCode::from_u16(state.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));

	if let Some(ct) = &state.content_type {
		builder = builder.header(header::CONTENT_TYPE, ct);
	}
	for (name, value) in &state.headers {
		builder = builder.header(name, value);
	}
	for cookie in &state.cookies {
		builder = builder.header(header::SET_COOKIE, cookie);
	}

	let response = match state.body {
		ResponseBody::Empty => builder.body(Body::empty())?,
		ResponseBody::Text(text) => builder.body(Body::from(text))?,
		ResponseBody::Json(json) => builder.body(Body::from(json))?,
		ResponseBody::Bytes(bytes) => builder
			.header(header::CONTENT_LENGTH, bytes.len())
			.body(Body::from(bytes))?,
	};
	Ok(response)
}

async fn handle(server: &Server, req: Request<Body>) -> WrResult<Response> {
	let (parts, req_body) = req.into_parts();
	let uri: &Uri = &parts.uri;
	let method: &Method = &parts.method;
	let headers = &parts.headers;
	let query = uri.query();

	// `/` rewrites to the default app, query preserved
	let raw_path = uri.path().to_string();
	let path = if raw_path == "/" {
		match &server.config.default_app {
			Some(default_app) => format!("/{}/", default_app),
			None => return Err(Error::AppNotFound),
		}
	} else {
		raw_path.clone()
	};

	// First path segment names the app; Referer may rescue SPA assets
	let (app, rest) = match first_segment(&path).and_then(|name| {
		server.registry.get(name).map(|app| {
			let rest = path[1 + name.len()..].to_string();
			(app, rest)
		})
	}) {
		Some(found) => found,
		None => match infer_spa_app(server, headers) {
			Some(app) => (app, path.clone()),
			None => return Err(Error::AppNotFound),
		},
	};

	if app.is_in_maintenance() {
		return Err(Error::Maintenance);
	}

	// The box is private, always
	if first_segment(&rest) == Some("box") {
		return Err(Error::AccessDenied);
	}

	// Route selection: manifest routes when the app declares any,
	// otherwise the implicit file-based mapping for extensionless URLs
	let mut params: HashMap<String, String> = HashMap::new();
	let mut script: Option<PathBuf> = None;
	if !app.routes.is_empty() {
		if let Some((route, captured)) = routes::select(&app.routes, method.as_str(), &rest) {
			params = captured;
			script = Some(box_script(&app, &route.script)?);
		}
	} else if app.config.app_type == AppType::Mpa {
		let trimmed = rest.trim_matches('/');
		let has_extension = trimmed.rsplit('/').next().is_some_and(|seg| seg.contains('.'));
		if !trimmed.is_empty() && !has_extension {
			let candidate = box_script(&app, &format!("{}.rhai", trimmed))?;
			if candidate.is_file() {
				script = Some(candidate);
			}
		}
	}

	let privileged = server.config.is_privileged(app.name.as_str());

	match script {
		Some(script_path) => {
			let use_cache = app.config.cache_policy.server
				&& !app.no_server_cache.iter().any(|re| re.is_match(&path));

			let body =
				body::parse_body(method, headers, req_body, server.max_body_size, &app.logger)
					.await?;

			let host = headers
				.get(header::HOST)
				.and_then(|v| v.to_str().ok())
				.unwrap_or("localhost");
			let full_url = match query {
				Some(query) => format!("http://{}{}?{}", host, raw_path, query),
				None => format!("http://{}{}", host, raw_path),
			};

			let script_dir = script_path.parent().map(PathBuf::from).unwrap_or_default();
			let ctx = Arc::new(RequestCtx {
				app: app.clone(),
				registry: server.registry.clone(),
				privileged,
				method: method.as_str().into(),
				path: path.clone().into(),
				full_url: full_url.into(),
				headers: header_map(headers),
				cookies: cookie_map(headers),
				query: query_map(query),
				params,
				body,
				max_body_size: server.max_body_size,
				script_path: script_path.clone(),
				script_dir,
				logger: app.logger.clone(),
			});

			// Default includes run before the main script, in declared
			// order; any of them may complete the response.
			let mut scripts = Vec::with_capacity(app.config.default_include.len() + 1);
			for include in &app.config.default_include {
				scripts.push(box_script(&app, include)?);
			}
			scripts.push(script_path);

			let server2 = server.clone();
			let ctx2 = ctx.clone();
			let state = context::run(ctx, async move {
				server2.script_host.run_request(server2.clone(), ctx2, scripts, use_cache).await
			})
			.await?;

			build_response(state)
		}
		None => {
			let ctx = Arc::new(RequestCtx {
				app: app.clone(),
				registry: server.registry.clone(),
				privileged,
				method: method.as_str().into(),
				path: path.clone().into(),
				full_url: path.clone().into(),
				headers: header_map(headers),
				cookies: cookie_map(headers),
				query: query_map(query),
				params,
				body: BodyValue::Null,
				max_body_size: server.max_body_size,
				script_path: PathBuf::new(),
				script_dir: app.box_root.to_path_buf(),
				logger: app.logger.clone(),
			});

			let server2 = server.clone();
			let app2 = app.clone();
			let method2 = method.as_str().to_string();
			let path2 = path.clone();
			let rest2 = rest.clone();
			let query2 = query.map(ToString::to_string);
			context::run(ctx, async move {
				if app2.config.app_type == AppType::Spa {
					static_files::serve_spa(
						&server2,
						&app2,
						&rest2,
						&path2,
						&method2,
						query2.as_deref(),
					)
					.await
				} else {
					static_files::serve_static(&server2, &app2, &rest2, &path2, query2.as_deref())
						.await
				}
			})
			.await
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_segment_extraction() {
		assert_eq!(first_segment("/glade/api/x"), Some("glade"));
		assert_eq!(first_segment("/glade"), Some("glade"));
		assert_eq!(first_segment("/"), None);
		assert_eq!(first_segment(""), None);
	}

	#[test]
	fn cookies_parse_into_a_map() {
		let mut headers = HeaderMap::new();
		headers.insert(header::COOKIE, "sid=abc; theme=dark".parse().unwrap());
		let cookies = cookie_map(&headers);
		assert_eq!(cookies.get("sid").map(String::as_str), Some("abc"));
		assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
	}

	#[test]
	fn query_repeated_keys_become_arrays() {
		let map = query_map(Some("a=1&a=2&b=x"));
		assert_eq!(map["a"], serde_json::json!(["1", "2"]));
		assert_eq!(map["b"], serde_json::json!("x"));
	}

	#[test]
	fn response_state_builds_wire_response() {
		let mut state = ResponseState::default();
		state.status = 201;
		state.content_type = Some("application/json".into());
		state.body = ResponseBody::Json(r#"{"ok":true}"#.into());
		state.cookies.push("sid=abc; Path=/".into());

		let response = build_response(state).unwrap();
		assert_eq!(response.status(), StatusCode::CREATED);
		assert_eq!(
			response.headers().get(header::CONTENT_TYPE).unwrap(),
			"application/json"
		);
		assert_eq!(response.headers().get(header::SET_COOKIE).unwrap(), "sid=abc; Path=/");
	}
}

// vim: ts=4
