pub use crate::error::{Error, WrResult};
pub use crate::server_state::{Server, ServerState};
pub use crate::types::{AppName, BodyValue, FilePart, Permission, Scope};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
