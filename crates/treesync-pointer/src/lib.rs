//! Slash-delimited node paths for legacy flat patches.
//!
//! A flat patch addresses a tree node by a root-relative path such as
//! `/players/7/name`. Literal `~` and `/` inside a step are written as `~0`
//! and `~1` respectively.
//!
//! # Example
//!
//! ```
//! use treesync_pointer::parse_path;
//!
//! let path = parse_path("/players/a~1b").unwrap();
//! assert_eq!(path, vec!["players".to_string(), "a/b".to_string()]);
//! assert!(parse_path("players").is_err());
//! ```

use thiserror::Error;

/// A single path step, always held unescaped.
pub type PathStep = String;

/// A root-relative node path.
pub type Path = Vec<PathStep>;

/// Longest path string a flat op may carry, in bytes.
pub const MAX_PATH_BYTES: usize = 4096;

/// Deepest node a flat op may address. Replay walks one container per step.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PointerError {
    #[error("PATH_NOT_ABSOLUTE")]
    NotAbsolute,
    #[error("PATH_TOO_LONG: {0} bytes")]
    TooLong(usize),
    #[error("PATH_TOO_DEEP: {0} steps")]
    TooDeep(usize),
    #[error("INVALID_ESCAPE: {0}")]
    InvalidEscape(String),
}

/// Unescapes one path step.
///
/// ```
/// use treesync_pointer::unescape_step;
///
/// assert_eq!(unescape_step("a~0b").unwrap(), "a~b");
/// assert_eq!(unescape_step("c~1d").unwrap(), "c/d");
/// assert!(unescape_step("bad~2").is_err());
/// ```
pub fn unescape_step(step: &str) -> Result<PathStep, PointerError> {
    if !step.contains('~') {
        return Ok(step.to_string());
    }
    let mut out = String::with_capacity(step.len());
    let mut chars = step.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(PointerError::InvalidEscape(step.to_string())),
        }
    }
    Ok(out)
}

/// Parses a path string into unescaped steps. The empty string is the root.
///
/// Paths must start with `/` and stay within [`MAX_PATH_BYTES`] and
/// [`MAX_DEPTH`].
pub fn parse_path(path: &str) -> Result<Path, PointerError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(PointerError::NotAbsolute);
    };
    if path.len() > MAX_PATH_BYTES {
        return Err(PointerError::TooLong(path.len()));
    }
    let depth = rest.matches('/').count() + 1;
    if depth > MAX_DEPTH {
        return Err(PointerError::TooDeep(depth));
    }
    rest.split('/').map(unescape_step).collect()
}

/// Returns true if `step` is a canonical non-negative list index.
///
/// ```
/// use treesync_pointer::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("42"));
/// assert!(!is_valid_index("007"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index("1.5"));
/// ```
pub fn is_valid_index(step: &str) -> bool {
    let bytes = step.as_bytes();
    if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == b'0') {
        return false;
    }
    bytes.iter().all(u8::is_ascii_digit)
}

/// Parses a canonical list index.
pub fn parse_index(step: &str) -> Option<usize> {
    if is_valid_index(step) {
        step.parse().ok()
    } else {
        None
    }
}
