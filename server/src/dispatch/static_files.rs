//! Static asset serving: cache-policy aware file responses, directory
//! index redirects and the SPA serve path (dev proxy / build dir /
//! fallback).

use axum::{
	body::Body,
	http::{header, StatusCode},
	response::Response,
};
use base64::Engine as _;
use std::{path::Path, sync::Arc};

use crate::app::{config::AppMode, AppEntry};
use crate::cache::{static_key, StaticEntry};
use crate::core::paths;
use crate::prelude::*;

const CLIENT_CACHE_CONTROL: &str = "public, max-age=3600";

fn file_response(content_type: &str, bytes: Vec<u8>, cache_control: &str) -> WrResult<Response> {
	Ok(Response::builder()
		.status(StatusCode::OK)
		.header(header::CONTENT_TYPE, content_type)
		.header(header::CACHE_CONTROL, cache_control)
		.header(header::CONTENT_LENGTH, bytes.len())
		.body(Body::from(bytes))?)
}

fn redirect(location: String) -> WrResult<Response> {
	Ok(Response::builder()
		.status(StatusCode::MOVED_PERMANENTLY)
		.header(header::LOCATION, location)
		.body(Body::empty())?)
}

fn matches_any(regexes: &[regex::Regex], path: &str) -> bool {
	regexes.iter().any(|re| re.is_match(path))
}

/// `Cache-Control` value for a static response under the app's policy.
fn client_cache_value(app: &AppEntry, request_path: &str) -> &'static str {
	if app.config.cache_policy.client && !matches_any(&app.no_client_cache, request_path) {
		CLIENT_CACHE_CONTROL
	} else {
		"no-store"
	}
}

async fn read_file(path: &Path) -> WrResult<Vec<u8>> {
	match tokio::fs::read(path).await {
		Ok(bytes) => Ok(bytes),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			Err(Error::NotFound(format!("file '{}'", path.display())))
		}
		Err(e) => Err(e.into()),
	}
}

/// Serves a file through the static asset cache when the app's server
/// cache policy allows it.
async fn serve_file(
	server: &Server,
	app: &AppEntry,
	target: &Path,
	request_path: &str,
) -> WrResult<Response> {
	let cacheable =
		app.config.cache_policy.server && !matches_any(&app.no_server_cache, request_path);
	let cache_control = client_cache_value(app, request_path);

	if cacheable {
		let key = static_key(target);
		if let Some(entry) = server.cache.get::<StaticEntry>(&key).await? {
			let bytes = base64::engine::general_purpose::STANDARD
				.decode(&entry.content_b64)
				.map_err(|e| Error::Backend(format!("corrupt static cache entry: {}", e)))?;
			debug!("Static cache hit: {}", target.display());
			return file_response(&entry.content_type, bytes, cache_control);
		}
	}

	let bytes = read_file(target).await?;
	let content_type = mime_guess::from_path(target).first_or_octet_stream().to_string();

	if cacheable {
		let entry = StaticEntry {
			content_type: content_type.clone(),
			content_b64: base64::engine::general_purpose::STANDARD.encode(&bytes),
		};
		let ttl = server.cache.default_ttl();
		server.cache.set(&static_key(target), &entry, Some(ttl)).await?;
	}

	file_response(&content_type, bytes, cache_control)
}

/// Serves a static path of an MPA app: directory redirects, cache policy,
/// 404 for missing files.
pub async fn serve_static(
	server: &Server,
	app: &Arc<AppEntry>,
	rel_path: &str,
	request_path: &str,
	query: Option<&str>,
) -> WrResult<Response> {
	let rel = rel_path.trim_start_matches('/');
	let target = paths::normalize(&app.web_root.join(rel));
	if !target.starts_with(app.web_root.as_ref()) {
		return Err(Error::PathTraversal(rel_path.to_string()));
	}

	if target.is_dir() {
		if target.join("index.html").is_file() {
			let mut location =
				format!("{}/index.html", request_path.trim_end_matches('/'));
			if let Some(query) = query {
				location = format!("{}?{}", location, query);
			}
			return redirect(location);
		}
		return Err(Error::NotFound(format!("file '{}'", target.display())));
	}

	serve_file(server, app, &target, request_path).await
}

/// Serves a SPA app path: dev proxy in development, the build directory
/// file when it exists, otherwise the fallback file uncached.
pub async fn serve_spa(
	server: &Server,
	app: &Arc<AppEntry>,
	rel_path: &str,
	request_path: &str,
	method: &str,
	query: Option<&str>,
) -> WrResult<Response> {
	let spa = app.config.spa.clone().unwrap_or_default();

	if app.config.mode == AppMode::Development {
		if let Some(dev_url) = &spa.dev_url {
			let path_and_query = match query {
				Some(query) => format!("{}?{}", rel_path, query),
				None => rel_path.to_string(),
			};
			let res = server
				.http_client
				.proxy(dev_url, method, &path_and_query, None, hyper::body::Bytes::new())
				.await?;
			let mut builder = Response::builder().status(res.status);
			for (name, value) in &res.headers {
				// hop-by-hop headers do not survive the proxy
				if name.eq_ignore_ascii_case("transfer-encoding")
					|| name.eq_ignore_ascii_case("connection")
				{
					continue;
				}
				builder = builder.header(name, value);
			}
			return Ok(builder.body(Body::from(res.body))?);
		}
	}

	let build_root = paths::normalize(&app.web_root.join(&spa.build_path));
	let rel = rel_path.trim_start_matches('/');
	let target = paths::normalize(&build_root.join(rel));
	if !target.starts_with(&build_root) {
		return Err(Error::PathTraversal(rel_path.to_string()));
	}

	if target.is_file() {
		return serve_file(server, app, &target, request_path).await;
	}

	// Client-side routing: anything unknown gets the fallback, never
	// cached so new deployments take effect immediately.
	let fallback = build_root.join(&spa.fallback_file);
	let bytes = read_file(&fallback).await?;
	let content_type =
		mime_guess::from_path(&fallback).first_or_octet_stream().to_string();
	file_response(&content_type, bytes, "no-store")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn client_cache_respects_deny_regex() {
		let (mut app, _) = crate::app::test_support::make_test_app_parts("demo");
		app.config.cache_policy.client = true;
		app.no_client_cache = vec![regex::Regex::new("^/demo/api/").unwrap()];
		assert_eq!(client_cache_value(&app, "/demo/css/site.css"), CLIENT_CACHE_CONTROL);
		assert_eq!(client_cache_value(&app, "/demo/api/data"), "no-store");

		app.config.cache_policy.client = false;
		assert_eq!(client_cache_value(&app, "/demo/css/site.css"), "no-store");
	}
}

// vim: ts=4
