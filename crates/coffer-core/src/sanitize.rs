//! Logical-path validation and object-key sanitization.
//!
//! A *logical path* is the caller-facing path of a file within an entity
//! (`"docs/readme.md"`). An *object key segment* is a piece of the opaque
//! locator used inside the object store; segments must stay within a
//! conservative character set so keys survive every backend.

use crate::error::AppError;
use crate::result::AppResult;

/// Maximum accepted length of a logical path, in bytes.
pub const MAX_PATH_BYTES: usize = 1024;

/// Validate a logical file path.
///
/// Rejects empty and absolute paths, traversal segments (`.` / `..`),
/// backslashes, control characters, empty segments, and paths longer than
/// [`MAX_PATH_BYTES`].
pub fn validate_logical_path(path: &str) -> AppResult<()> {
    if path.is_empty() {
        return Err(AppError::validation("File path cannot be empty"));
    }
    if path.len() > MAX_PATH_BYTES {
        return Err(AppError::validation(format!(
            "File path exceeds {MAX_PATH_BYTES} bytes"
        )));
    }
    if path.starts_with('/') {
        return Err(AppError::validation("File path must be relative"));
    }
    if path.contains('\\') {
        return Err(AppError::validation(
            "File path must use '/' as the separator",
        ));
    }
    if path.chars().any(|c| c.is_control()) {
        return Err(AppError::validation(
            "File path contains control characters",
        ));
    }
    for segment in path.split('/') {
        match segment {
            "" => {
                return Err(AppError::validation(
                    "File path contains an empty segment",
                ));
            }
            "." | ".." => {
                return Err(AppError::validation(
                    "File path contains a traversal segment",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Sanitize a single object-key segment.
///
/// Keeps ASCII alphanumerics plus `.`, `-` and `_`; everything else maps
/// to `_`. An empty input becomes `"_"`.
pub fn sanitize_key_segment(segment: &str) -> String {
    if segment.is_empty() {
        return "_".to_string();
    }
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitize a logical path for use inside an object key, preserving the
/// `/` hierarchy but sanitizing every segment.
pub fn sanitize_key_path(path: &str) -> String {
    path.split('/')
        .map(sanitize_key_segment)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_normal_paths() {
        for path in ["a.txt", "docs/readme.md", "deep/nested/dir/file.bin"] {
            assert!(validate_logical_path(path).is_ok(), "rejected {path}");
        }
    }

    #[test]
    fn test_rejects_bad_paths() {
        for path in [
            "",
            "/etc/passwd",
            "../secret",
            "a/../b",
            "a/./b",
            "a//b",
            "dir\\file",
            "bad\u{0}name",
        ] {
            assert!(validate_logical_path(path).is_err(), "accepted {path:?}");
        }
    }

    #[test]
    fn test_rejects_overlong_path() {
        let long = "a/".repeat(600);
        assert!(validate_logical_path(&long).is_err());
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_key_segment("report v2.pdf"), "report_v2.pdf");
        assert_eq!(sanitize_key_segment("über"), "_ber");
        assert_eq!(sanitize_key_segment(""), "_");
    }

    #[test]
    fn test_sanitize_path_keeps_hierarchy() {
        assert_eq!(sanitize_key_path("docs/q3 report.pdf"), "docs/q3_report.pdf");
    }
}
