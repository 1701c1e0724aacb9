//! Path rules shared by every backend
//!
//! Backends address objects by a key made of a configured root prefix and a
//! caller-supplied relative path. Keys never start or end with a separator,
//! and relative paths cannot climb above the root with `..`.

/// Key separator used by every backend
pub const SEPARATOR: char = '/';

/// Trim leading and trailing separators from a configured root prefix
pub fn clean_prefix(prefix: &str) -> String {
    prefix.trim_matches(SEPARATOR).to_string()
}

/// Clean a relative path
///
/// Repeated separators collapse, `.` segments are dropped and `..` removes the
/// previous segment without ever escaping the root. The result has no leading
/// or trailing separator; an empty result means the root itself.
pub fn clean(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Join a root prefix and a relative path into an absolute key
pub fn normalize(root_prefix: &str, relative_path: &str) -> String {
    let root = clean(root_prefix);
    let relative = clean(relative_path);
    match (root.is_empty(), relative.is_empty()) {
        (true, _) => relative,
        (false, true) => root,
        (false, false) => format!("{root}{SEPARATOR}{relative}"),
    }
}

/// Strip the root prefix back off an absolute key
///
/// With an empty root the key is returned unchanged. A key that equals the
/// root maps to the empty path; a key outside the root is returned as is.
pub fn relativize(root_prefix: &str, absolute_key: &str) -> String {
    let root = root_prefix.trim_end_matches(SEPARATOR);
    if root.is_empty() {
        return absolute_key.to_string();
    }
    if absolute_key == root {
        return String::new();
    }
    absolute_key
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .unwrap_or(absolute_key)
        .to_string()
}

/// Whether a relativized path is a direct member of the listed level
pub fn is_valid_leaf(relative_path: &str) -> bool {
    !relative_path.is_empty() && !relative_path.contains(SEPARATOR)
}

/// Key prefix used to list the children of `key` (`"key/"`, or `""` for the root)
pub fn directory_prefix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{key}{SEPARATOR}")
    }
}

/// Last segment of a path
pub fn file_name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}
