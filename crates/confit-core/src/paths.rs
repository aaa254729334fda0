//! Path classification helpers shared by the policy and injection hooks.

use std::path::{Component, Path, PathBuf};
use url::Url;

/// Extensions recognized as loadable scripts.
pub const SCRIPT_EXTENSIONS: [&str; 8] = ["js", "mjs", "cjs", "ts", "mts", "cts", "jsx", "tsx"];

/// Whether a path carries a recognized script extension.
#[must_use]
pub fn is_script_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

/// Whether a specifier points into a dependency directory: an interior
/// `node_modules` path segment, separated on both sides.
#[must_use]
pub fn in_node_modules(specifier: &str) -> bool {
    let segments: Vec<&str> = specifier.split(['/', '\\']).collect();
    segments.len() >= 3 && segments[1..segments.len() - 1].contains(&"node_modules")
}

/// Whether a specifier is written as a filesystem location (relative-path
/// marker or absolute path) rather than a bare package name.
#[must_use]
pub fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with('.') || Path::new(specifier).is_absolute()
}

/// Resolve `.` and `..` components lexically, without touching the
/// filesystem. Resolution must not require the target to exist yet.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `file://` URL for an absolute path; `None` for relative paths.
#[must_use]
pub fn file_url(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}
