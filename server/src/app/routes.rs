//! Route table compilation and matching.
//!
//! Patterns are compiled once at registration time. Matching walks the
//! table in declaration order; the first `(method, pattern)` hit wins —
//! there is no longest-prefix tiebreak.

use std::collections::HashMap;

use crate::app::config::RouteConfig;
use crate::prelude::*;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Seg {
	/// Literal path segment.
	Lit(Box<str>),
	/// `:name` — captures one segment.
	Param(Box<str>),
	/// `*name` — captures the (possibly empty) remainder. Terminal.
	Wild(Box<str>),
}

#[derive(Clone, Debug)]
pub struct CompiledRoute {
	pub method: Box<str>,
	pub segs: Box<[Seg]>,
	pub script: Box<str>,
}

pub fn compile(routes: &[RouteConfig]) -> WrResult<Box<[CompiledRoute]>> {
	routes
		.iter()
		.map(|route| {
			let segs: Vec<Seg> = route
				.path
				.split('/')
				.filter(|s| !s.is_empty())
				.map(|seg| {
					if let Some(name) = seg.strip_prefix(':') {
						Seg::Param(name.into())
					} else if let Some(name) = seg.strip_prefix('*') {
						Seg::Wild(name.into())
					} else {
						Seg::Lit(seg.into())
					}
				})
				.collect();

			if let Some(pos) = segs.iter().position(|s| matches!(s, Seg::Wild(_))) {
				if pos + 1 != segs.len() {
					return Err(Error::Validation(format!(
						"wildcard must be the last segment in route '{}'",
						route.path
					)));
				}
			}

			Ok(CompiledRoute {
				method: route.method.to_ascii_uppercase().into(),
				segs: segs.into(),
				script: route.script.clone().into(),
			})
		})
		.collect()
}

impl CompiledRoute {
	fn method_matches(&self, method: &str) -> bool {
		self.method.as_ref() == "ALL" || self.method.as_ref() == method
	}

	fn pattern_matches(&self, segs: &[&str]) -> Option<HashMap<String, String>> {
		let mut params = HashMap::new();
		let mut idx = 0;

		for pat in &self.segs {
			match pat {
				Seg::Lit(lit) => {
					if segs.get(idx).is_none_or(|s| *s != lit.as_ref()) {
						return None;
					}
					idx += 1;
				}
				Seg::Param(name) => {
					let seg = segs.get(idx)?;
					params.insert(name.to_string(), (*seg).to_string());
					idx += 1;
				}
				Seg::Wild(name) => {
					params.insert(name.to_string(), segs[idx..].join("/"));
					return Some(params);
				}
			}
		}

		if idx == segs.len() {
			Some(params)
		} else {
			None
		}
	}
}

/// First matching route in declaration order, with its captured params.
/// `path` is the URL remainder after the app segment.
pub fn select<'r>(
	routes: &'r [CompiledRoute],
	method: &str,
	path: &str,
) -> Option<(&'r CompiledRoute, HashMap<String, String>)> {
	let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
	routes.iter().find_map(|route| {
		if !route.method_matches(method) {
			return None;
		}
		route.pattern_matches(&segs).map(|params| (route, params))
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn table(defs: &[(&str, &str, &str)]) -> Box<[CompiledRoute]> {
		let routes: Vec<RouteConfig> = defs
			.iter()
			.map(|(m, p, s)| RouteConfig {
				method: (*m).to_string(),
				path: (*p).to_string(),
				script: (*s).to_string(),
			})
			.collect();
		compile(&routes).unwrap()
	}

	#[test]
	fn params_are_captured() {
		let routes = table(&[("GET", "/api/posts/:id", "api/post.rhai")]);
		let (route, params) = select(&routes, "GET", "/api/posts/42").unwrap();
		assert_eq!(route.script.as_ref(), "api/post.rhai");
		assert_eq!(params.get("id").map(String::as_str), Some("42"));
	}

	#[test]
	fn declaration_order_wins() {
		let routes = table(&[
			("GET", "/api/:kind", "first.rhai"),
			("GET", "/api/posts", "second.rhai"),
		]);
		let (route, _) = select(&routes, "GET", "/api/posts").unwrap();
		assert_eq!(route.script.as_ref(), "first.rhai");
	}

	#[test]
	fn all_matches_any_method() {
		let routes = table(&[("ALL", "/hook", "hook.rhai")]);
		assert!(select(&routes, "GET", "/hook").is_some());
		assert!(select(&routes, "POST", "/hook").is_some());
	}

	#[test]
	fn method_mismatch_skips_route() {
		let routes = table(&[
			("POST", "/submit", "post.rhai"),
			("GET", "/submit", "get.rhai"),
		]);
		let (route, _) = select(&routes, "GET", "/submit").unwrap();
		assert_eq!(route.script.as_ref(), "get.rhai");
		assert!(select(&routes, "DELETE", "/submit").is_none());
	}

	#[test]
	fn wildcard_captures_remainder() {
		let routes = table(&[("GET", "/files/*rest", "files.rhai")]);
		let (_, params) = select(&routes, "GET", "/files/a/b/c.txt").unwrap();
		assert_eq!(params.get("rest").map(String::as_str), Some("a/b/c.txt"));
		let (_, params) = select(&routes, "GET", "/files").unwrap();
		assert_eq!(params.get("rest").map(String::as_str), Some(""));
	}

	#[test]
	fn wildcard_must_be_terminal() {
		let routes = vec![RouteConfig {
			method: "GET".into(),
			path: "/files/*rest/meta".into(),
			script: "x.rhai".into(),
		}];
		assert!(compile(&routes).is_err());
	}

	#[test]
	fn partial_prefix_does_not_match() {
		let routes = table(&[("GET", "/api/posts", "p.rhai")]);
		assert!(select(&routes, "GET", "/api").is_none());
		assert!(select(&routes, "GET", "/api/posts/extra").is_none());
	}
}

// vim: ts=4
