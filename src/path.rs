use std::path::{Path, PathBuf};

use normalize_path::NormalizePath;

/// Whether the host filesystem is treated as case-insensitive.
///
/// macOS and Windows default to case-insensitive volumes; everywhere else a
/// case difference means a different directory.
pub const CASE_INSENSITIVE_FS: bool = cfg!(any(target_os = "macos", windows));

/// Canonicalize a path when it exists, otherwise normalize it lexically.
///
/// Uses `dunce` so Windows paths never come back in verbatim (`\\?\`) form,
/// which git cannot consume. Stale worktree pointers name directories that
/// may be gone, hence the lexical fallback.
pub fn canonicalize_or_normalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.normalize())
}

/// Resolve `target` against `base` when relative, collapsing `.` and `..`.
pub fn resolve_relative(base: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        target.normalize()
    } else {
        base.join(target).normalize()
    }
}

/// Comparison key for a path on this platform.
///
/// Separators are unified to `/`, trailing separators dropped, and the
/// result lowercased on case-insensitive filesystems.
pub fn comparison_key(path: &Path) -> String {
    let normalized = path.normalize();
    let mut key = normalized.to_string_lossy().replace('\\', "/");
    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }
    if CASE_INSENSITIVE_FS {
        key = key.to_lowercase();
    }
    key
}

/// Platform-normalized equality for single path segments (directory names).
pub fn segments_equal(a: &str, b: &str) -> bool {
    if CASE_INSENSITIVE_FS {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

/// Last path segment as a string, if any.
pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Format a filesystem path for user-facing output.
///
/// Replaces the home directory prefix with `~`. Paths outside home are
/// returned unchanged.
pub fn format_path_for_display(path: &Path) -> String {
    if let Some(home) = home::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        if stripped.as_os_str().is_empty() {
            return "~".to_string();
        }

        let mut display_path = PathBuf::from("~");
        display_path.push(stripped);
        return display_path.display().to_string();
    }

    path.display().to_string()
}
