//! Per-app logger handles.
//!
//! Each app gets a dedicated handle carrying its own level filter; events
//! are emitted through the process-wide `tracing` subscriber with the app
//! name attached, so formatting and rotation stay a subscriber concern.

use crate::prelude::*;

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
	Error,
	Warn,
	Info,
	Debug,
}

impl LogLevel {
	pub fn parse(s: &str) -> LogLevel {
		match s.to_ascii_lowercase().as_str() {
			"error" => LogLevel::Error,
			"warn" | "warning" => LogLevel::Warn,
			"debug" | "trace" => LogLevel::Debug,
			_ => LogLevel::Info,
		}
	}
}

#[derive(Clone, Debug)]
pub struct AppLogger {
	app: Box<str>,
	level: LogLevel,
}

impl AppLogger {
	pub fn new(app: &str, level: &str) -> Self {
		AppLogger { app: app.into(), level: LogLevel::parse(level) }
	}

	pub fn enabled(&self, level: LogLevel) -> bool {
		level <= self.level
	}

	pub fn error(&self, msg: &str) {
		if self.enabled(LogLevel::Error) {
			error!(app = %self.app, "{}", msg);
		}
	}

	pub fn warn(&self, msg: &str) {
		if self.enabled(LogLevel::Warn) {
			warn!(app = %self.app, "{}", msg);
		}
	}

	pub fn info(&self, msg: &str) {
		if self.enabled(LogLevel::Info) {
			info!(app = %self.app, "{}", msg);
		}
	}

	pub fn debug(&self, msg: &str) {
		if self.enabled(LogLevel::Debug) {
			debug!(app = %self.app, "{}", msg);
		}
	}
}


// vim: ts=4
