// Webserver implementation

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;

use crate::prelude::*;

pub type ServeHandle = tokio::task::JoinHandle<Result<(), std::io::Error>>;

/// Binds the plain HTTP listener. A port already in use is a fatal
/// diagnostic; the caller exits non-zero.
pub async fn bind_http(port: u16, router: Router) -> WrResult<ServeHandle> {
	let addr = SocketAddr::from(([0, 0, 0, 0], port));
	let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
		error!("FATAL: cannot bind HTTP port {}: {}", port, e);
		Error::Config(format!("cannot bind HTTP port {}: {}", port, e))
	})?;
	info!("Listening on HTTP {}", addr);
	Ok(tokio::spawn(async move { axum::serve(listener, router).await }))
}

/// Binds the TLS listener. Unreadable key/cert material is fatal.
pub async fn bind_https(
	port: u16,
	cert_file: &std::path::Path,
	key_file: &std::path::Path,
	router: Router,
) -> WrResult<ServeHandle> {
	let tls = RustlsConfig::from_pem_file(cert_file, key_file).await.map_err(|e| {
		error!(
			"FATAL: cannot read TLS material ({}, {}): {}",
			cert_file.display(),
			key_file.display(),
			e
		);
		Error::Config(format!("cannot read TLS material: {}", e))
	})?;

	let addr = SocketAddr::from(([0, 0, 0, 0], port));
	info!("Listening on HTTPS {}", addr);
	Ok(tokio::spawn(async move {
		axum_server::bind_rustls(addr, tls).serve(router.into_make_service()).await
	}))
}

// vim: ts=4
