//! POSIX shell helpers for building command lines run inside the scope.

use std::path::Path;

/// Escape a string for safe interpolation into a POSIX shell command.
///
/// Wraps in single quotes and escapes internal `'` with `'\''`.
///
/// # Examples
///
/// ```
/// use vtysh_fuzz::domain::shell;
///
/// assert_eq!(shell::escape("router bgp 1"), "'router bgp 1'");
/// assert_eq!(shell::escape("it's"), "'it'\\''s'");
/// ```
#[must_use]
pub fn escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// [`escape`] for filesystem paths
#[must_use]
pub fn escape_path(path: &Path) -> String {
    escape(&path.to_string_lossy())
}
