//! Engine core: configuration, request context, path resolution, worker
//! pool and listeners.

pub mod config;
pub mod context;
pub mod http_client;
pub mod paths;
pub mod utils;
pub mod webserver;
pub mod worker;

// vim: ts=4
