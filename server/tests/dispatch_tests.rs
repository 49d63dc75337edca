//! Dispatcher tests: routing, box privacy, script execution, permission
//! failures, maintenance gating and the send-once contract.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{test_server, write_file};
use tower::ServiceExt;

async fn body_string(response: axum::response::Response) -> String {
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
	String::from_utf8_lossy(&bytes).into_owned()
}

fn get(path: &str) -> Request<Body> {
	Request::builder().uri(path).body(Body::empty()).expect("request")
}

/// A small MPA app with manifest routes and a default include.
fn write_demo_app(web_root: &std::path::Path) {
	write_file(
		web_root,
		"demo/box/app.json",
		r#"{
			"version": "1.0.0",
			"default_include": ["mw/access_log.rhai"],
			"routes": [
				{"method": "GET", "path": "/api/hello/:name", "script": "api/hello.rhai"},
				{"method": "ALL", "path": "/api/echo", "script": "api/echo.rhai"},
				{"method": "GET", "path": "/api/guarded", "script": "api/guarded.rhai"},
				{"method": "GET", "path": "/api/double", "script": "api/double.rhai"},
				{"method": "GET", "path": "/api/needs_db", "script": "api/needs_db.rhai"}
			]
		}"#,
	);
	write_file(
		web_root,
		"demo/box/mw/access_log.rhai",
		r#"fn handle(g) { g.log.debug(`${g.request.method} ${g.request.path}`); }"#,
	);
	write_file(
		web_root,
		"demo/box/api/hello.rhai",
		r#"fn handle(g) { g.response.send(`hello ${g.request.params.name}`, 200, "text/plain"); }"#,
	);
	write_file(
		web_root,
		"demo/box/api/echo.rhai",
		r#"fn handle(g) { g.response.send(#{ "body": g.request.body, "method": g.request.method }); }"#,
	);
	write_file(
		web_root,
		"demo/box/mw/deny.rhai",
		r#"fn handle(g) { g.response.send("blocked", 401, "text/plain"); }"#,
	);
	write_file(
		web_root,
		"demo/box/api/guarded.rhai",
		r#"fn handle(g) { g.response.send("should not run"); }"#,
	);
	write_file(
		web_root,
		"demo/box/api/double.rhai",
		r#"fn handle(g) {
			g.response.send("first", 201, "text/plain");
			g.response.send("second", 500, "text/plain");
		}"#,
	);
	write_file(
		web_root,
		"demo/box/api/needs_db.rhai",
		"import \"db\" as db;\nfn handle(g) { g.response.send(\"never\"); }",
	);
	write_file(web_root, "demo/box/secret.txt", "keep out");
	write_file(web_root, "demo/index.html", "<html>demo</html>");
	write_file(web_root, "demo/css/site.css", "body { margin: 0 }");

	// a routeless app exercising the file-based mapping
	write_file(web_root, "site/box/app.json", r#"{"version": "1.0.0"}"#);
	write_file(
		web_root,
		"site/box/pages/about.rhai",
		r#"fn handle(g) { g.response.send("<html>about</html>"); }"#,
	);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_app_is_404() {
	let ts = test_server(serde_json::json!({})).await;
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/nope/whatever")).await.expect("response");
	assert_eq!(res.status(), StatusCode::NOT_FOUND);
	assert_eq!(body_string(res).await, "APP_NOT_FOUND");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn root_rewrites_to_default_app_preserving_query() {
	let ts = test_server(serde_json::json!({"default_app": "demo"})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	// `/` becomes `/demo/`; the app root is a directory with index.html,
	// so the dispatcher answers with the canonical redirect.
	let res = router.oneshot(get("/?x=1")).await.expect("response");
	assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
	assert_eq!(
		res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
		Some("/demo/index.html?x=1")
	);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn box_paths_are_private() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/demo/box/secret.txt")).await.expect("response");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);
	assert_eq!(body_string(res).await, "ACCESS_DENIED");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manifest_route_captures_params() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/demo/api/hello/ada")).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
	assert_eq!(body_string(res).await, "hello ada");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_based_route_serves_extensionless_urls() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/site/pages/about")).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
	assert_eq!(body_string(res).await, "<html>about</html>");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn static_files_are_served_with_content_type() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/demo/css/site.css")).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
	let ct = res.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).expect("ct");
	assert!(ct.starts_with("text/css"));
	assert_eq!(body_string(res).await, "body { margin: 0 }");

	// a second hit is served from the static cache with the same bytes
	let router = warren::dispatch::router(ts.server.clone());
	let res = router.oneshot(get("/demo/css/site.css")).await.expect("response");
	assert_eq!(body_string(res).await, "body { margin: 0 }");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_static_file_is_404() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/demo/css/missing.css")).await.expect("response");
	assert_eq!(res.status(), StatusCode::NOT_FOUND);
	assert_eq!(body_string(res).await, "FILE_NOT_FOUND");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn json_body_reaches_the_script() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let req = Request::builder()
		.method("POST")
		.uri("/demo/api/echo")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(r#"{"n": 7}"#))
		.expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
	let value: serde_json::Value =
		serde_json::from_str(&body_string(res).await).expect("json");
	assert_eq!(value["method"], serde_json::json!("POST"));
	assert_eq!(value["body"]["n"], serde_json::json!(7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversize_body_yields_error_sentinel() {
	let ts = test_server(serde_json::json!({})).await; // 1kb cap
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let payload = format!(r#"{{"data": "{}"}}"#, "x".repeat(2048));
	let req = Request::builder()
		.method("POST")
		.uri("/demo/api/echo")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(payload))
		.expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
	let value: serde_json::Value =
		serde_json::from_str(&body_string(res).await).expect("json");
	assert_eq!(value["body"]["error"], serde_json::json!("Payload size exceeded"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ungranted_module_import_names_app_and_module() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/demo/api/needs_db")).await.expect("response");
	assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
	let body = body_string(res).await;
	assert!(body.starts_with("INTERNAL_SERVER_ERROR"));
	assert!(body.contains("demo"));
	assert!(body.contains("db"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_is_effectively_once_on_the_wire() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/demo/api/double")).await.expect("response");
	assert_eq!(res.status(), StatusCode::CREATED);
	assert_eq!(body_string(res).await, "first");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completing_include_short_circuits_the_main_script() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	// swap the include chain to one that completes the response
	write_file(
		ts.web_root(),
		"demo/box/app.json",
		r#"{
			"version": "1.0.0",
			"default_include": ["mw/deny.rhai"],
			"routes": [{"method": "GET", "path": "/api/guarded", "script": "api/guarded.rhai"}]
		}"#,
	);
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/demo/api/guarded")).await.expect("response");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(body_string(res).await, "blocked");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn maintenance_answers_503() {
	let ts = test_server(serde_json::json!({})).await;
	write_demo_app(ts.web_root());
	ts.scan().await;
	let entry = ts.server.registry.get("demo").expect("registered");
	assert!(entry.enter_maintenance());

	let router = warren::dispatch::router(ts.server.clone());
	let res = router.oneshot(get("/demo/api/hello/ada")).await.expect("response");
	assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
	let ct = res.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).expect("ct");
	assert!(ct.starts_with("text/html"));

	entry.clear_maintenance();
	let router = warren::dispatch::router(ts.server.clone());
	let res = router.oneshot(get("/demo/api/hello/ada")).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn referer_rescues_spa_asset_requests() {
	let ts = test_server(serde_json::json!({})).await;
	write_file(
		ts.web_root(),
		"panel/box/app.json",
		r#"{"version": "1.0.0", "type": "SPA", "spa": {"build_path": "dist"}}"#,
	);
	write_file(ts.web_root(), "panel/dist/index.html", "<html>panel</html>");
	write_file(ts.web_root(), "panel/dist/assets/app.js", "console.log(1)");
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	// asset requested root-relative, owner identified via Referer
	let req = Request::builder()
		.uri("/assets/app.js")
		.header(header::REFERER, "http://localhost:7070/panel/")
		.body(Body::empty())
		.expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
	assert_eq!(body_string(res).await, "console.log(1)");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spa_fallback_is_uncached() {
	let ts = test_server(serde_json::json!({})).await;
	write_file(
		ts.web_root(),
		"panel/box/app.json",
		r#"{"version": "1.0.0", "type": "SPA", "spa": {"build_path": "dist"}}"#,
	);
	write_file(ts.web_root(), "panel/dist/index.html", "<html>panel</html>");
	ts.scan().await;
	let router = warren::dispatch::router(ts.server.clone());

	let res = router.oneshot(get("/panel/some/client/route")).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
	assert_eq!(
		res.headers().get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok()),
		Some("no-store")
	);
	assert_eq!(body_string(res).await, "<html>panel</html>");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cache_module_round_trips_for_granted_app() {
	let ts = test_server(serde_json::json!({})).await;
	write_file(
		ts.web_root(),
		"store/box/app.json",
		r#"{
			"version": "1.0.0",
			"routes": [
				{"method": "GET", "path": "/put", "script": "put.rhai"},
				{"method": "GET", "path": "/get", "script": "get.rhai"}
			]
		}"#,
	);
	write_file(
		ts.web_root(),
		"store/box/put.rhai",
		"import \"cache\" as cache;\nfn handle(g) { cache::set(\"k\", #{ \"n\": 41 }); g.response.send(\"ok\", 200, \"text/plain\"); }",
	);
	write_file(
		ts.web_root(),
		"store/box/get.rhai",
		"import \"cache\" as cache;\nfn handle(g) { g.response.send(cache::get(\"k\")); }",
	);
	ts.scan().await;
	ts.server.perm_store.set("store", &["cache".into()]).await.expect("perms");
	warren::app::lifecycle::reload(&ts.server, "store").await.expect("reload");

	let router = warren::dispatch::router(ts.server.clone());
	let res = router.oneshot(get("/store/put")).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);

	let router = warren::dispatch::router(ts.server.clone());
	let res = router.oneshot(get("/store/get")).await.expect("response");
	let value: serde_json::Value =
		serde_json::from_str(&body_string(res).await).expect("json");
	assert_eq!(value["n"], serde_json::json!(41));

	// the entry landed under the app's namespace, nowhere else
	let namespaced =
		ts.server.cache.get_value("store:k").await.expect("cache").expect("entry");
	assert_eq!(namespaced["n"], serde_json::json!(41));
	assert!(ts.server.cache.get_value("k").await.expect("cache").is_none());
}

// vim: ts=4
