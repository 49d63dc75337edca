//! Outbound HTTP client shared by the httpclient capability module and
//! the SPA dev-server proxy.

use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::{body::Body, body::Bytes, Method};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tokio::time::timeout;

use crate::prelude::*;

/// Default outbound request timeout (10 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn to_boxed<B>(body: B) -> BoxBody<Bytes, Error>
where
	B: Body<Data = Bytes> + Send + Sync + 'static,
	B::Error: Send + 'static,
{
	body.map_err(|_err| Error::Backend("body stream error".into())).boxed()
}

/// A completed outbound response.
#[derive(Debug)]
pub struct FetchedResponse {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	pub body: Bytes,
}

#[derive(Clone, Debug)]
pub struct HttpClient {
	client: Client<HttpsConnector<HttpConnector>, BoxBody<Bytes, Error>>,
}

impl HttpClient {
	pub fn new() -> WrResult<Self> {
		let connector = HttpsConnectorBuilder::new()
			.with_native_roots()
			.map_err(|_| Error::Config("no native root CA certificates found".into()))?
			.https_or_http()
			.enable_http1()
			.build();

		Ok(HttpClient { client: Client::builder(TokioExecutor::new()).build(connector) })
	}

	async fn timed_request(
		&self,
		req: hyper::Request<BoxBody<Bytes, Error>>,
	) -> WrResult<hyper::Response<hyper::body::Incoming>> {
		timeout(REQUEST_TIMEOUT, self.client.request(req))
			.await
			.map_err(|_| Error::Timeout)?
			.map_err(Error::from)
	}

	async fn collect_body(body: hyper::body::Incoming) -> WrResult<Bytes> {
		timeout(REQUEST_TIMEOUT, body.collect())
			.await
			.map_err(|_| Error::Timeout)?
			.map_err(|_| Error::Backend("body collection error".into()))
			.map(http_body_util::Collected::to_bytes)
	}

	async fn execute(
		&self,
		req: hyper::Request<BoxBody<Bytes, Error>>,
	) -> WrResult<FetchedResponse> {
		let res = self.timed_request(req).await?;
		let status = res.status().as_u16();
		let headers = res
			.headers()
			.iter()
			.filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
			.collect();
		let body = Self::collect_body(res.into_body()).await?;
		Ok(FetchedResponse { status, headers, body })
	}

	pub async fn get(&self, url: &str, headers: &[(String, String)]) -> WrResult<FetchedResponse> {
		let mut req = hyper::Request::builder().method(Method::GET).uri(url);
		for (k, v) in headers {
			req = req.header(k, v);
		}
		self.execute(req.body(to_boxed(Empty::new()))?).await
	}

	pub async fn post(
		&self,
		url: &str,
		body: Bytes,
		content_type: &str,
		headers: &[(String, String)],
	) -> WrResult<FetchedResponse> {
		let mut req = hyper::Request::builder()
			.method(Method::POST)
			.uri(url)
			.header(hyper::header::CONTENT_TYPE, content_type);
		for (k, v) in headers {
			req = req.header(k, v);
		}
		self.execute(req.body(to_boxed(Full::new(body)))?).await
	}

	/// Forwards a request to a SPA dev server, preserving method, path,
	/// query string and body. Used by the dispatcher in development mode.
	pub async fn proxy(
		&self,
		base_url: &str,
		method: &str,
		path_and_query: &str,
		content_type: Option<&str>,
		body: Bytes,
	) -> WrResult<FetchedResponse> {
		let url = format!("{}{}", base_url.trim_end_matches('/'), path_and_query);
		let method = Method::from_bytes(method.as_bytes()).map_err(|_| Error::Parse)?;
		let mut req = hyper::Request::builder().method(method).uri(&url);
		if let Some(ct) = content_type {
			req = req.header(hyper::header::CONTENT_TYPE, ct);
		}
		self.execute(req.body(to_boxed(Full::new(body)))?).await
	}
}

// vim: ts=4
