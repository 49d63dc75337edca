//! Error handling subsystem. Implements a custom Error type.

use axum::{
	body::Body,
	http::{header, StatusCode},
	response::IntoResponse,
};

use crate::prelude::*;

pub type WrResult<T> = std::result::Result<T, Error>;

/// Static HTML body served while an app is under maintenance.
pub const MAINTENANCE_HTML: &str = "<!DOCTYPE html>\n<html><head><title>Maintenance</title></head>\
<body><h1>503 &mdash; Temporarily unavailable</h1>\
<p>This app is undergoing maintenance. Please try again shortly.</p></body></html>\n";

#[derive(Debug)]
pub enum Error {
	// Core lookup failures
	AppNotFound,
	NotFound(String), // file, route, backup, logical database

	// Access control
	AccessDenied,                        // /<app>/box/... or equivalent
	PermissionDenied(Box<str>, Box<str>), // (app, module): capability not granted
	PathTraversal(String),               // resolver caught an escape attempt

	// Input validation and constraints
	Validation(String),
	PayloadTooLarge,
	Conflict(String),

	// Lifecycle
	Maintenance,

	// Subsystems
	Backend(String), // cache / db adapter failure
	Script(String),  // script compilation or evaluation failure
	Config(String),
	Timeout,
	Parse,

	// Unexpected
	Internal(String),
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		if err.kind() == std::io::ErrorKind::NotFound {
			Self::NotFound(err.to_string())
		} else {
			warn!("io error: {}", err);
			Self::Io(err)
		}
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::AppNotFound => write!(f, "app not found"),
			Error::NotFound(what) => write!(f, "not found: {}", what),
			Error::AccessDenied => write!(f, "access denied"),
			Error::PermissionDenied(app, module) => {
				write!(f, "app '{}' has no permission for module '{}'", app, module)
			}
			Error::PathTraversal(path) => write!(f, "path traversal attempt: {}", path),
			Error::Validation(msg) => write!(f, "validation failed: {}", msg),
			Error::PayloadTooLarge => write!(f, "payload size exceeded"),
			Error::Conflict(msg) => write!(f, "conflict: {}", msg),
			Error::Maintenance => write!(f, "app is in maintenance"),
			Error::Backend(msg) => write!(f, "backend failure: {}", msg),
			Error::Script(msg) => write!(f, "script failure: {}", msg),
			Error::Config(msg) => write!(f, "configuration error: {}", msg),
			Error::Timeout => write!(f, "operation timed out"),
			Error::Parse => write!(f, "parse error"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

fn plain(status: StatusCode, body: String) -> axum::response::Response {
	axum::response::Response::builder()
		.status(status)
		.header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
		.body(Body::from(body))
		.unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		match self {
			Error::AppNotFound => plain(StatusCode::NOT_FOUND, "APP_NOT_FOUND".into()),
			Error::NotFound(_) => plain(StatusCode::NOT_FOUND, "FILE_NOT_FOUND".into()),
			Error::AccessDenied
			| Error::PermissionDenied(..)
			| Error::PathTraversal(_) => plain(StatusCode::FORBIDDEN, "ACCESS_DENIED".into()),
			Error::Maintenance => axum::response::Response::builder()
				.status(StatusCode::SERVICE_UNAVAILABLE)
				.header(header::CONTENT_TYPE, "text/html; charset=utf-8")
				.body(Body::from(MAINTENANCE_HTML))
				.unwrap_or_else(|_| StatusCode::SERVICE_UNAVAILABLE.into_response()),
			other => plain(
				StatusCode::INTERNAL_SERVER_ERROR,
				format!("INTERNAL_SERVER_ERROR - {}", other),
			),
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(_err: serde_json::Error) -> Self {
		warn!("json error: {}", _err);
		Error::Parse
	}
}

impl From<axum::http::Error> for Error {
	fn from(_err: axum::http::Error) -> Self {
		warn!("http error: {}", _err);
		Error::Internal("response build error".into())
	}
}

impl From<axum::http::header::ToStrError> for Error {
	fn from(_err: axum::http::header::ToStrError) -> Self {
		warn!("header to str error: {}", _err);
		Error::Parse
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(_err: tokio::task::JoinError) -> Self {
		warn!("tokio join error: {}", _err);
		Error::Internal("task execution failed".into())
	}
}

impl From<hyper::Error> for Error {
	fn from(_err: hyper::Error) -> Self {
		warn!("hyper error: {}", _err);
		Error::Backend("HTTP client error".into())
	}
}

impl From<hyper_util::client::legacy::Error> for Error {
	fn from(_err: hyper_util::client::legacy::Error) -> Self {
		warn!("hyper error: {}", _err);
		Error::Backend("HTTP client error".into())
	}
}

impl From<zip::result::ZipError> for Error {
	fn from(err: zip::result::ZipError) -> Self {
		warn!("zip error: {}", err);
		Error::Validation(format!("malformed package: {}", err))
	}
}

impl From<image::error::ImageError> for Error {
	fn from(_err: image::error::ImageError) -> Self {
		warn!("image error: {:?}", _err);
		Error::Backend("image processing failed".into())
	}
}

impl From<globset::Error> for Error {
	fn from(err: globset::Error) -> Self {
		Error::Validation(format!("invalid glob pattern: {}", err))
	}
}

impl From<regex::Error> for Error {
	fn from(err: regex::Error) -> Self {
		Error::Config(format!("invalid regular expression: {}", err))
	}
}

impl From<Box<rhai::EvalAltResult>> for Error {
	fn from(err: Box<rhai::EvalAltResult>) -> Self {
		Error::Script(err.to_string())
	}
}

impl From<rhai::ParseError> for Error {
	fn from(err: rhai::ParseError) -> Self {
		Error::Script(format!("parse error: {}", err))
	}
}

// vim: ts=4
