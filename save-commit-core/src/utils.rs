use std::path::{Component, Path, PathBuf};

/// truncate to at most `max_chars` characters, ending with "..." when cut
///
/// counts chars rather than bytes so emoji never split
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str("...");
    truncated
}

/// first `max_chars` characters of `text`, and whether anything was cut
pub fn take_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_pos, _)) => (text[..byte_pos].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// lowercase kebab-case scope token
pub fn normalize_scope(scope: &str) -> String {
    scope
        .to_lowercase()
        .replace(['_', ' ', '.'], "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

/// absolute, canonical form of `path` when it exists, lexically cleaned otherwise
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// `path` relative to `base` with forward slashes, or the full path when
/// it lies outside `base`
pub fn relative_slash_path(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// deterministic index into a pool of `len` entries derived from `key`
pub fn stable_index(key: &str, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    // fnv-1a, stable across runs and platforms unlike DefaultHasher
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % len as u64) as usize
}
