//! Request body middleware: size-capped streaming read and content-type
//! driven parsing into the script-visible body value.

use axum::{
	body::Body,
	extract::{FromRequest, Multipart},
	http::{self, header, HeaderMap, Method},
};
use futures::StreamExt;

use crate::app::logger::AppLogger;
use crate::prelude::*;

/// Whether a request carries a body worth reading.
pub fn expects_body(method: &Method, headers: &HeaderMap) -> bool {
	if method == Method::GET {
		return false;
	}
	if !headers.contains_key(header::CONTENT_TYPE) {
		return false;
	}
	if let Some(len) = headers.get(header::CONTENT_LENGTH).and_then(|v| v.to_str().ok()) {
		if len.trim() == "0" {
			return false;
		}
	}
	true
}

/// Streams the body, accumulating at most `cap` bytes. Past the cap the
/// stream keeps draining (the connection stays usable) but accumulation
/// stops; `None` signals the overflow.
pub async fn read_limited(body: Body, cap: u64) -> WrResult<Option<Vec<u8>>> {
	let mut stream = body.into_data_stream();
	let mut buf: Vec<u8> = Vec::new();
	let mut total: u64 = 0;
	let mut oversize = false;

	while let Some(chunk) = stream.next().await {
		let chunk = chunk.map_err(|e| Error::Backend(format!("body read error: {}", e)))?;
		total += chunk.len() as u64;
		if oversize {
			continue;
		}
		if total > cap {
			oversize = true;
			buf.clear();
			continue;
		}
		buf.extend_from_slice(&chunk);
	}

	if oversize {
		Ok(None)
	} else {
		Ok(Some(buf))
	}
}

fn parse_urlencoded(bytes: &[u8]) -> serde_json::Value {
	let mut map = serde_json::Map::new();
	for (key, value) in url::form_urlencoded::parse(bytes) {
		let key = key.into_owned();
		let value = serde_json::Value::String(value.into_owned());
		match map.get_mut(&key) {
			// repeated keys collect into an array
			Some(serde_json::Value::Array(list)) => list.push(value),
			Some(existing) => {
				let first = existing.take();
				*existing = serde_json::Value::Array(vec![first, value]);
			}
			None => {
				map.insert(key, value);
			}
		}
	}
	serde_json::Value::Object(map)
}

async fn parse_multipart(
	headers: &HeaderMap,
	bytes: Vec<u8>,
	logger: &AppLogger,
) -> WrResult<BodyValue> {
	// Rebuild a request around the buffered bytes so the multipart
	// decoder sees the original boundary header.
	let mut builder = http::Request::builder().method(Method::POST).uri("/");
	if let Some(ct) = headers.get(header::CONTENT_TYPE) {
		builder = builder.header(header::CONTENT_TYPE, ct);
	}
	let req = builder.body(Body::from(bytes))?;

	let mut multipart = Multipart::from_request(req, &())
		.await
		.map_err(|e| Error::Validation(format!("invalid multipart body: {}", e)))?;

	let mut fields = serde_json::Map::new();
	let mut files = Vec::new();

	loop {
		let field = match multipart.next_field().await {
			Ok(Some(field)) => field,
			Ok(None) => break,
			Err(e) => {
				logger.warn(&format!("multipart parse error: {}", e));
				break;
			}
		};
		let field_name = field.name().unwrap_or_default().to_string();
		if let Some(file_name) = field.file_name().map(ToString::to_string) {
			let content_type = field
				.content_type()
				.unwrap_or("application/octet-stream")
				.to_string();
			let data = field
				.bytes()
				.await
				.map_err(|e| Error::Validation(format!("multipart read error: {}", e)))?;
			files.push(FilePart {
				field: field_name,
				name: file_name,
				content_type,
				data: data.to_vec(),
			});
		} else {
			let text = field
				.text()
				.await
				.map_err(|e| Error::Validation(format!("multipart read error: {}", e)))?;
			fields.insert(field_name, serde_json::Value::String(text));
		}
	}

	Ok(BodyValue::Multipart { fields: serde_json::Value::Object(fields), files })
}

/// Reads and parses a request body according to its content type,
/// enforcing the configured size cap.
pub async fn parse_body(
	method: &Method,
	headers: &HeaderMap,
	body: Body,
	cap: u64,
	logger: &AppLogger,
) -> WrResult<BodyValue> {
	if !expects_body(method, headers) {
		return Ok(BodyValue::Null);
	}

	let Some(bytes) = read_limited(body, cap).await? else {
		logger.warn(&format!("request body exceeded the {} byte cap, dropping payload", cap));
		return Ok(BodyValue::Oversize);
	};

	let content_type = headers
		.get(header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.unwrap_or_default()
		.to_ascii_lowercase();

	if content_type.starts_with("application/json") {
		match serde_json::from_slice(&bytes) {
			Ok(value) => Ok(BodyValue::Map(value)),
			Err(e) => {
				logger.warn(&format!("invalid JSON body, passing raw text: {}", e));
				Ok(BodyValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
			}
		}
	} else if content_type.starts_with("application/x-www-form-urlencoded") {
		Ok(BodyValue::Map(parse_urlencoded(&bytes)))
	} else if content_type.starts_with("multipart/form-data") {
		match parse_multipart(headers, bytes.clone(), logger).await {
			Ok(body) => Ok(body),
			Err(e) => {
				logger.warn(&format!("multipart parse failed, passing raw text: {}", e));
				Ok(BodyValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
			}
		}
	} else if content_type.starts_with("text/")
		|| content_type.contains("xml")
		|| content_type.contains("javascript")
	{
		Ok(BodyValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
	} else {
		match String::from_utf8(bytes) {
			Ok(text) => Ok(BodyValue::Text(text)),
			Err(e) => Ok(BodyValue::Bytes(e.into_bytes())),
		}
	}
}


// vim: ts=4
