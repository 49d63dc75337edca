//! Common types used throughout the warren engine.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, WrResult};

// AppName //
//*********//

/// A validated app name. Doubles as the URL prefix and the on-disk
/// directory name, so the character set is strictly limited.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AppName(Box<str>);

impl AppName {
	pub fn new(name: &str) -> WrResult<Self> {
		if name.is_empty()
			|| !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
		{
			return Err(Error::Validation(format!("invalid app name: '{}'", name)));
		}
		Ok(AppName(name.into()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for AppName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl AsRef<str> for AppName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Serialize for AppName {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for AppName {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		AppName::new(&s).map_err(serde::de::Error::custom)
	}
}

// Permission //
//************//

/// The closed set of capability permissions an app can be granted.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Permission {
	Cache,
	Db,
	Fs,
	HttpClient,
	Pdf,
	Zip,
	Image,
	Platform,
}

impl Permission {
	pub const ALL: [Permission; 8] = [
		Permission::Cache,
		Permission::Db,
		Permission::Fs,
		Permission::HttpClient,
		Permission::Pdf,
		Permission::Zip,
		Permission::Image,
		Permission::Platform,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Permission::Cache => "cache",
			Permission::Db => "db",
			Permission::Fs => "fs",
			Permission::HttpClient => "httpclient",
			Permission::Pdf => "pdf",
			Permission::Zip => "zip",
			Permission::Image => "image",
			Permission::Platform => "platform",
		}
	}
}

impl std::str::FromStr for Permission {
	type Err = Error;

	fn from_str(s: &str) -> WrResult<Self> {
		match s {
			"cache" => Ok(Permission::Cache),
			"db" => Ok(Permission::Db),
			"fs" => Ok(Permission::Fs),
			"httpclient" => Ok(Permission::HttpClient),
			"pdf" => Ok(Permission::Pdf),
			"zip" => Ok(Permission::Zip),
			"image" => Ok(Permission::Image),
			"platform" => Ok(Permission::Platform),
			other => Err(Error::Validation(format!("invalid permission key: '{}'", other))),
		}
	}
}

impl std::fmt::Display for Permission {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl Serialize for Permission {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

// Scope //
//*******//

/// The two per-app filesystem roots user paths resolve against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
	/// Private scripts and data (`<webRoot>/<app>/box`). Never served.
	Box,
	/// Public assets (`<webRoot>/<app>`).
	Web,
}

impl std::str::FromStr for Scope {
	type Err = Error;

	fn from_str(s: &str) -> WrResult<Self> {
		match s.to_ascii_uppercase().as_str() {
			"BOX" => Ok(Scope::Box),
			"WEB" => Ok(Scope::Web),
			other => Err(Error::Validation(format!("invalid scope: '{}'", other))),
		}
	}
}

// BodyValue //
//***********//

/// One uploaded file of a multipart body.
#[derive(Clone, Debug)]
pub struct FilePart {
	/// Form field name.
	pub field: String,
	/// Client-supplied file name.
	pub name: String,
	pub content_type: String,
	pub data: Vec<u8>,
}

/// Parsed request body, tagged by how the middleware interpreted it.
#[derive(Clone, Debug)]
pub enum BodyValue {
	/// No body was sent (GET, no content-type, or zero length).
	Null,
	/// Raw text, or the fallback when structured parsing failed.
	Text(String),
	/// Raw bytes for unrecognised binary payloads.
	Bytes(Vec<u8>),
	/// Structured data: JSON document or urlencoded form.
	Map(serde_json::Value),
	/// Multipart form: plain fields plus uploaded files.
	Multipart { fields: serde_json::Value, files: Vec<FilePart> },
	/// The body exceeded the configured size cap and was drained unread.
	Oversize,
}

impl BodyValue {
	pub fn is_null(&self) -> bool {
		matches!(self, BodyValue::Null)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn app_name_accepts_word_chars() {
		assert!(AppName::new("glade").is_ok());
		assert!(AppName::new("my-app_2").is_ok());
	}

	#[test]
	fn app_name_rejects_separators() {
		assert!(AppName::new("").is_err());
		assert!(AppName::new("a/b").is_err());
		assert!(AppName::new("..").is_err());
		assert!(AppName::new("spaced name").is_err());
	}

	#[test]
	fn permission_round_trip() {
		for p in Permission::ALL {
			assert_eq!(Permission::from_str(p.as_str()).unwrap(), p);
		}
		assert!(Permission::from_str("root").is_err());
	}
}

// vim: ts=4
