use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub const SEPARATOR: char = '/';
pub const ROOT: &str = "/";

#[cfg(windows)]
const INVALID_PATH_CHARS: &[char] = &[
    '"', '<', '>', '|', '\0', '\u{1}', '\u{2}', '\u{3}', '\u{4}', '\u{5}', '\u{6}', '\u{7}',
    '\u{8}', '\t', '\n', '\u{b}', '\u{c}', '\r', '\u{e}', '\u{f}', '\u{10}', '\u{11}', '\u{12}',
    '\u{13}', '\u{14}', '\u{15}', '\u{16}', '\u{17}', '\u{18}', '\u{19}', '\u{1a}', '\u{1b}',
    '\u{1c}', '\u{1d}', '\u{1e}', '\u{1f}',
];

#[cfg(not(windows))]
const INVALID_PATH_CHARS: &[char] = &['\0'];

/// Characters the local platform refuses in paths.
pub fn invalid_path_chars() -> &'static [char] {
    INVALID_PATH_CHARS
}

/// Rejects paths holding characters the local platform disallows.
///
/// The remote server may well accept them; this is a local guard only.
pub fn validate_path(path: &str, cancel: Option<&CancellationToken>) -> Result<()> {
    for c in INVALID_PATH_CHARS {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }

        if path.contains(*c) {
            return Err(Error::InvalidPathChar(*c));
        }
    }

    Ok(())
}

/// Strips trailing separators, keeping the root intact.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() && path.starts_with(SEPARATOR) {
        ROOT
    } else {
        trimmed
    }
}

pub fn extract_lowest_path_item(path: &str) -> String {
    path.split(SEPARATOR)
        .filter(|item| !item.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Parent of `path`, or `None` when it has no parent segment.
pub fn parent_path(path: &str) -> Option<String> {
    let path = normalize_path(path);
    if path == ROOT {
        return None;
    }

    match path.rfind(SEPARATOR)? {
        0 => Some(ROOT.to_string()),
        index => Some(normalize_path(&path[..index]).to_string()),
    }
}

/// Resolves `.` and `..` segments of an absolute path, as a server would.
pub fn resolve_dots(path: &str) -> String {
    let mut segments: Vec<&str> = vec![];
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => (),
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    format!("{ROOT}{}", segments.join(ROOT))
}

pub fn join_path(base: &str, name: &str) -> String {
    let name = name.trim_start_matches(SEPARATOR);
    if base.ends_with(SEPARATOR) {
        format!("{base}{name}")
    } else {
        format!("{base}{SEPARATOR}{name}")
    }
}
