//! Slug conventions shared by the catalog and the projector.
//!
//! Wiki pages are addressed by slugs with an optional section-number prefix:
//! `1-overview`, `2.1-installation`, `4.1.3-backend-api`. This module parses
//! that prefix, turns titles into slugs, and normalizes page paths so they
//! can be used safely as virtual file paths.
//!
//! ## Display Titles
//!
//! Dashes in the name portion become spaces, matching how the wiki renders
//! its own sidebar when a page carries no explicit title:
//! - `1-overview` → "overview"
//! - `2.1-getting-started` → "getting started"

/// Result of parsing a slug like `2.1-getting-started`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSlug {
    /// Section number components (`[2, 1]` for `2.1-...`). Empty if unnumbered.
    pub section: Vec<u32>,
    /// Raw name after the prefix, dashes preserved. Empty if number-only.
    /// For unnumbered slugs this is the full input.
    pub name: String,
    /// Name with dashes converted to spaces.
    pub display_title: String,
}

impl ParsedSlug {
    pub fn is_numbered(&self) -> bool {
        !self.section.is_empty()
    }

    /// Section number of the enclosing page (`[2]` for `[2, 1]`).
    pub fn parent_section(&self) -> Option<&[u32]> {
        match self.section.len() {
            0 | 1 => None,
            n => Some(&self.section[..n - 1]),
        }
    }
}

/// Parse the last segment of a page path following the `N(.N)*-name` convention.
///
/// - `"2.1-getting-started"` → section=[2, 1], name="getting-started"
/// - `"1-overview"` → section=[1], name="overview"
/// - `"3"` / `"3-"` → section=[3], name=""
/// - `"overview"` → section=[], name="overview"
/// - `"owner/repo/1-overview"` → parsed from `1-overview`
pub fn parse_slug(path: &str) -> ParsedSlug {
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (prefix, rest) = match segment.find('-') {
        Some(dash) => (&segment[..dash], Some(&segment[dash + 1..])),
        None => (segment, None),
    };

    if let Some(section) = parse_section_number(prefix) {
        let name = rest.unwrap_or("").to_string();
        return ParsedSlug {
            section,
            display_title: name.replace('-', " "),
            name,
        };
    }

    ParsedSlug {
        section: Vec::new(),
        name: segment.to_string(),
        display_title: segment.replace('-', " "),
    }
}

fn parse_section_number(prefix: &str) -> Option<Vec<u32>> {
    if prefix.is_empty() {
        return None;
    }
    prefix
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse::<u32>().ok()
            }
        })
        .collect()
}

/// Turn a page title into a slug.
///
/// Lowercases, drops anything that is not a word character, whitespace or
/// dash, and collapses runs of separators into one dash. A leading section
/// number (`1.2 Setup`, `3. Usage`) is kept as the slug prefix so that the
/// result still follows the numbered convention.
pub fn slugify(title: &str) -> String {
    let trimmed = title.trim();
    let number_len = trimmed
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    let number = trimmed[..number_len].trim_end_matches('.');
    let rest = &trimmed[number_len..];

    let body = slug_body(if number.is_empty() { trimmed } else { rest });
    match (number.is_empty(), body.is_empty()) {
        (true, _) => body,
        (false, true) => number.to_string(),
        (false, false) => format!("{number}-{body}"),
    }
}

fn slug_body(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug
}

/// Normalize a page path for use as a virtual file path.
///
/// Strips surrounding slashes, drops empty and `.` segments. Returns `None`
/// for paths that are empty after normalization or that try to climb out
/// with `..`.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.trim().split(['/', '\\']) {
        match segment.trim() {
            "" | "." => continue,
            ".." => return None,
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_top_level_slug() {
        let p = parse_slug("1-overview");
        assert_eq!(p.section, vec![1]);
        assert_eq!(p.name, "overview");
        assert_eq!(p.display_title, "overview");
        assert!(p.parent_section().is_none());
    }

    #[test]
    fn numbered_subsection_slug() {
        let p = parse_slug("2.1-getting-started");
        assert_eq!(p.section, vec![2, 1]);
        assert_eq!(p.name, "getting-started");
        assert_eq!(p.display_title, "getting started");
        assert_eq!(p.parent_section(), Some(&[2][..]));
    }

    #[test]
    fn deep_section_parent() {
        let p = parse_slug("4.1.3-api");
        assert_eq!(p.parent_section(), Some(&[4, 1][..]));
    }

    #[test]
    fn number_only_slug() {
        let p = parse_slug("3");
        assert_eq!(p.section, vec![3]);
        assert_eq!(p.name, "");
        let p = parse_slug("3-");
        assert_eq!(p.section, vec![3]);
        assert_eq!(p.display_title, "");
    }

    #[test]
    fn unnumbered_slug_keeps_full_name() {
        let p = parse_slug("release-notes");
        assert!(!p.is_numbered());
        assert_eq!(p.name, "release-notes");
        assert_eq!(p.display_title, "release notes");
    }

    #[test]
    fn malformed_section_numbers_are_unnumbered() {
        assert!(!parse_slug("1..2-x").is_numbered());
        assert!(!parse_slug(".1-x").is_numbered());
        assert!(!parse_slug("v1-x").is_numbered());
    }

    #[test]
    fn slug_parsed_from_last_segment() {
        let p = parse_slug("owner/repo/1.2-setup");
        assert_eq!(p.section, vec![1, 2]);
        assert_eq!(p.name, "setup");
    }

    #[test]
    fn slugify_plain_title() {
        assert_eq!(slugify("System Architecture"), "system-architecture");
        assert_eq!(slugify("  API & SDK  "), "api-sdk");
        assert_eq!(slugify("snake_case -- name"), "snake-case-name");
    }

    #[test]
    fn slugify_keeps_section_prefix() {
        assert_eq!(slugify("1.2 Setup Guide"), "1.2-setup-guide");
        assert_eq!(slugify("3. Usage"), "3-usage");
        assert_eq!(slugify("7"), "7");
    }

    #[test]
    fn slugify_keeps_unicode_letters() {
        assert_eq!(slugify("概述 Overview"), "概述-overview");
    }

    #[test]
    fn normalize_strips_slashes_and_dots() {
        assert_eq!(normalize_path("/a/./b/"), Some("a/b".to_string()));
        assert_eq!(normalize_path("intro"), Some("intro".to_string()));
        assert_eq!(normalize_path("a\\b"), Some("a/b".to_string()));
    }

    #[test]
    fn normalize_rejects_parent_segments_and_empty() {
        assert_eq!(normalize_path("../etc/passwd"), None);
        assert_eq!(normalize_path("a/../b"), None);
        assert_eq!(normalize_path("//"), None);
        assert_eq!(normalize_path(""), None);
    }
}
