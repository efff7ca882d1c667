//! Base-name allocation.
//!
//! Every item in a synchronized directory owns a file stem ("base name") that
//! no other item in the same directory uses. Names come from the item itself,
//! are made filesystem-safe, and get a numeric suffix on collision.

use std::collections::HashSet;

use crate::sync::format::FormatResolver;

/// Name given to items that have none.
pub const DEFAULT_BASE_NAME: &str = "item_0000";

/// Highest numeric suffix tried before giving up.
pub const MAX_NAME_COUNTER: u32 = 99_999;

/// Make a name safe to use as a file stem.
///
/// Path separators and a leading dot become `_`, line breaks are dropped.
#[must_use]
pub fn sanitize_base_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .enumerate()
        .map(|(i, c)| match c {
            '/' | '\\' => '_',
            '.' if i == 0 => '_',
            _ => c,
        })
        .collect();

    if sanitized.is_empty() {
        DEFAULT_BASE_NAME.to_string()
    } else {
        sanitized
    }
}

/// Sanitize `name` and make it unique among `used`.
///
/// The accepted name is added to `used`. On collision a counter is put
/// between the stem and the extension: an existing trailing number is
/// incremented keeping its width (`file007` → `file008`), otherwise `-1`,
/// `-2`, ... is appended (`file.txt` → `file-1.txt`).
///
/// Returns `None` if the counter reaches [`MAX_NAME_COUNTER`].
#[must_use]
pub fn make_unique(
    name: &str,
    used: &mut HashSet<String>,
    resolver: &FormatResolver,
) -> Option<String> {
    let name = sanitize_base_name(name);

    if !used.contains(&name) {
        used.insert(name.clone());
        return Some(name);
    }

    let (mut stem, mut ext) = split_extension(&name, resolver);
    if stem.ends_with('.') {
        stem.pop();
        ext.insert(0, '.');
    }

    let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (prefix, mut counter, width) = if digits > 0 {
        let split = stem.len() - digits;
        let counter = stem[split..].parse::<u32>().unwrap_or(0);
        (stem[..split].to_string(), counter, digits)
    } else {
        (format!("{stem}-"), 0, 0)
    };

    loop {
        if counter >= MAX_NAME_COUNTER {
            return None;
        }
        counter += 1;
        let candidate = format!("{prefix}{counter:0width$}{ext}");
        if !used.contains(&candidate) {
            used.insert(candidate.clone());
            return Some(candidate);
        }
    }
}

/// Split a name into stem and extension (user override suffix, else last dot).
fn split_extension(name: &str, resolver: &FormatResolver) -> (String, String) {
    let ext = match resolver.user_format_for(name) {
        Some((_, ext)) => ext,
        None => name.rfind('.').map_or("", |i| &name[i..]),
    };
    let stem = &name[..name.len() - ext.len()];
    (stem.to_string(), ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::format::FileFormat;

    fn unique(name: &str, used: &[&str]) -> Option<String> {
        let mut used: HashSet<String> = used.iter().map(ToString::to_string).collect();
        make_unique(name, &mut used, &FormatResolver::default())
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_base_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_base_name(".hidden.txt"), "_hidden.txt");
        assert_eq!(sanitize_base_name("line\r\nbreak"), "linebreak");
        assert_eq!(sanitize_base_name(""), DEFAULT_BASE_NAME);
        assert_eq!(sanitize_base_name("\n"), DEFAULT_BASE_NAME);
    }

    #[test]
    fn test_unused_name_accepted() {
        let mut used = HashSet::new();
        let name = make_unique("note", &mut used, &FormatResolver::default());
        assert_eq!(name.as_deref(), Some("note"));
        assert!(used.contains("note"));
    }

    #[test]
    fn test_dash_inserted_without_digits() {
        assert_eq!(unique("note", &["note"]).as_deref(), Some("note-1"));
        assert_eq!(unique("note", &["note", "note-1"]).as_deref(), Some("note-2"));
    }

    #[test]
    fn test_width_preserved() {
        assert_eq!(unique("file007", &["file007"]).as_deref(), Some("file008"));
        assert_eq!(unique("file9", &["file9"]).as_deref(), Some("file10"));
    }

    #[test]
    fn test_default_name_counts_up() {
        assert_eq!(unique("", &[DEFAULT_BASE_NAME]).as_deref(), Some("item_0001"));
    }

    #[test]
    fn test_suffix_before_extension() {
        assert_eq!(unique("report.pdf", &["report.pdf"]).as_deref(), Some("report-1.pdf"));
        assert_eq!(unique("name.", &["name."]).as_deref(), Some("name-1."));
    }

    #[test]
    fn test_suffix_before_user_extension() {
        let resolver = FormatResolver::new(vec![FileFormat::new([".tar.gz"], "application/gzip")]);
        let mut used: HashSet<String> = ["backup.tar.gz".to_string()].into_iter().collect();
        assert_eq!(
            make_unique("backup.tar.gz", &mut used, &resolver).as_deref(),
            Some("backup-1.tar.gz")
        );
    }

    #[test]
    fn test_exhausted() {
        assert_eq!(unique("x99999", &["x99999"]), None);
        assert_eq!(unique("x99998", &["x99998"]).as_deref(), Some("x99999"));
    }

    #[test]
    fn test_sanitized_name_checked_for_collision() {
        assert_eq!(unique("a/b", &["a_b"]).as_deref(), Some("a_b-1"));
    }
}
