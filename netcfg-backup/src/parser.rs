//! Device identity extraction from configuration dumps.

/// Characters that are replaced in identities used as path components.
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Return the hostname declared in a configuration dump.
///
/// The first line whose first token is `hostname` (any case) and which has a
/// second token wins. Lines starting with `!` or `#` are comments.
pub fn extract_hostname(config: &str) -> Option<&str> {
    config
        .lines()
        .map(str::trim_start)
        .filter(|line| !line.starts_with('!') && !line.starts_with('#'))
        .find_map(|line| {
            let mut tokens = line.split_whitespace();
            match (tokens.next(), tokens.next()) {
                (Some(keyword), Some(name)) if keyword.eq_ignore_ascii_case("hostname") => {
                    Some(name)
                }
                _ => None,
            }
        })
}

/// Make an identity safe to use as a single path component.
pub fn sanitize_identity(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ';')
        .map(|c| if RESERVED_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    // "." and ".." would address the backup root or its parent
    if cleaned.chars().all(|c| c == '.') {
        return "_".repeat(cleaned.len().max(1));
    }
    // the repository metadata directory, on case-insensitive filesystems too
    if cleaned.eq_ignore_ascii_case(".git") {
        return "_git".to_string();
    }
    cleaned
}

/// Identity for a device: its declared hostname, else its address.
pub fn device_identity(config: &str, address: &str) -> String {
    let raw = extract_hostname(config).unwrap_or_else(|| address.trim());
    sanitize_identity(raw)
}
