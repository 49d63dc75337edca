//! Path resolver. Maps user-supplied paths onto per-app BOX/WEB roots and
//! rejects anything that escapes them.

use std::path::{Component, Path, PathBuf};

use crate::prelude::*;

/// Lexically normalizes a path: drops `.` segments and resolves `..`
/// against preceding segments without touching the filesystem. `..`
/// segments that would climb above the root are dropped (the containment
/// check afterwards catches any escape).
pub fn normalize(path: &Path) -> PathBuf {
	let mut out = PathBuf::new();
	for comp in path.components() {
		match comp {
			Component::CurDir => {}
			Component::ParentDir => {
				out.pop();
			}
			other => out.push(other),
		}
	}
	out
}

/// True when `path` is `root` or a descendant of it, compared lexically.
pub fn is_contained(path: &Path, root: &Path) -> bool {
	normalize(path).starts_with(normalize(root))
}

/// Resolves `user_path` inside the given scope of an app.
///
/// Absolute paths (`/x`) are scope-root relative; a leading segment equal
/// to the app name is stripped so `/myApp/x` and `/x` resolve identically.
/// Relative paths resolve against the directory of the currently executing
/// script; for the WEB scope the script directory has its box prefix
/// rewritten to the public side first.
pub fn resolve(
	scope: Scope,
	user_path: &str,
	app_name: &str,
	web_root: &Path,
	box_root: &Path,
	script_dir: &Path,
) -> WrResult<PathBuf> {
	let scope_root = match scope {
		Scope::Box => box_root,
		Scope::Web => web_root,
	};

	let joined = if let Some(rooted) = user_path.strip_prefix('/') {
		let rooted = rooted
			.strip_prefix(app_name)
			.and_then(|rest| rest.strip_prefix('/').or(if rest.is_empty() { Some("") } else { None }))
			.unwrap_or(rooted);
		scope_root.join(rooted)
	} else {
		let base = match scope {
			Scope::Box => script_dir.to_path_buf(),
			Scope::Web => match script_dir.strip_prefix(box_root) {
				Ok(rest) => web_root.join(rest),
				Err(_) => web_root.to_path_buf(),
			},
		};
		base.join(user_path)
	};

	let resolved = normalize(&joined);
	if resolved.starts_with(normalize(scope_root)) {
		Ok(resolved)
	} else {
		Err(Error::PathTraversal(user_path.to_string()))
	}
}


// vim: ts=4
