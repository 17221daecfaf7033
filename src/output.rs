//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Every entity (page, navigation node, language tree) is shown by its
//! semantic identity first: positional index and title. Paths, sizes and
//! previews follow as indented context lines.
//!
//! # Output Format
//!
//! ## Extract
//!
//! ```text
//! Pages
//! 001 Overview
//!     Path: 1-overview
//!     Content: 2140 bytes
//!     Preview: This document introduces the runtime...
//! 002 Installation
//!     Path: 2.1-installation
//!     Parent: 2-getting-started
//!     Order: 1
//!     Content: (empty)
//! ```
//!
//! ## Navigation
//!
//! ```text
//! Navigation
//! 001 Overview
//! 002 Getting Started
//!     001 Installation
//! ```
//!
//! ## Build
//!
//! ```text
//! Languages
//! 001 English (en, default) → en/README.md
//!     Sidebar → en/_sidebar.md
//!     Pages: 12
//! 002 中文 (zh-cn) → zh-cn/README.md
//!     Sidebar → zh-cn/_sidebar.md
//!     Pages: 12
//!
//! Entry → index.html
//! Generated 2 languages, 24 page files, 31 files
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::catalog::Catalog;
use crate::materialize::disk_path;
use crate::project::{FileKind, SiteManifest};
use crate::types::{NavNode, Warning};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format an entity header: positional index + title, with optional detail.
///
/// ```text
/// 001 English (en, default)
/// 002 Installation
/// ```
fn entity_header(index: usize, title: &str, detail: Option<&str>) -> String {
    match detail {
        Some(d) => format!("{} {} ({})", format_index(index), title, d),
        None => format!("{} {}", format_index(index), title),
    }
}

/// Strip HTML tags from a string (simple angle-bracket stripping).
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

/// Collapse whitespace and truncate to `max` characters, appending `...`.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}

/// On-disk name of a virtual file, for display.
fn shown_path(virtual_path: &str, kind: FileKind) -> String {
    disk_path(virtual_path, kind)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| virtual_path.to_string())
}

// ============================================================================
// Extract
// ============================================================================

/// Format the catalog as an inventory of pages.
pub fn format_extract_output(catalog: &Catalog) -> Vec<String> {
    let mut lines = vec!["Pages".to_string()];
    for (i, page) in catalog.pages().iter().enumerate() {
        lines.push(entity_header(i + 1, &page.title, None));
        lines.push(format!("{}Path: {}", indent(1), page.path));
        if let Some(parent) = &page.parent_path {
            lines.push(format!("{}Parent: {}", indent(1), parent));
        }
        if let Some(order) = &page.order_hint {
            lines.push(format!("{}Order: {}", indent(1), order));
        }
        if page.has_content() {
            lines.push(format!("{}Content: {} bytes", indent(1), page.raw_content.len()));
            let text = preview(&strip_html_tags(&page.raw_content), 60);
            if !text.is_empty() {
                lines.push(format!("{}Preview: {}", indent(1), text));
            }
        } else {
            lines.push(format!("{}Content: (empty)", indent(1)));
        }
    }
    lines
}

pub fn print_extract_output(catalog: &Catalog) {
    for line in format_extract_output(catalog) {
        println!("{}", line);
    }
}

// ============================================================================
// Navigation
// ============================================================================

/// Format the navigation forest with per-level positional indices.
pub fn format_navigation(roots: &[NavNode]) -> Vec<String> {
    let mut lines = vec!["Navigation".to_string()];
    walk_nav(roots, 0, &mut lines);
    lines
}

fn walk_nav(nodes: &[NavNode], depth: usize, lines: &mut Vec<String>) {
    for (i, node) in nodes.iter().enumerate() {
        lines.push(format!("{}{}", indent(depth), entity_header(i + 1, &node.title, None)));
        walk_nav(&node.children, depth + 1, lines);
    }
}

pub fn print_navigation(roots: &[NavNode]) {
    for line in format_navigation(roots) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format the language trees and root files of a projected site.
pub fn format_build_output(manifest: &SiteManifest) -> Vec<String> {
    let mut lines = vec!["Languages".to_string()];

    for (i, language) in manifest.languages.iter().enumerate() {
        let detail = if language.default {
            format!("{}, default", language.code)
        } else {
            language.code.clone()
        };
        lines.push(format!(
            "{} \u{2192} {}",
            entity_header(i + 1, &language.name, Some(&detail)),
            shown_path(&language.readme, FileKind::Markdown)
        ));
        lines.push(format!(
            "{}Sidebar \u{2192} {}",
            indent(1),
            shown_path(&language.sidebar, FileKind::Markdown)
        ));
        lines.push(format!("{}Pages: {}", indent(1), language.page_files().count()));
    }

    lines.push(String::new());
    lines.push(format!(
        "Entry \u{2192} {}",
        shown_path(&manifest.root.entry, FileKind::Html)
    ));
    if !manifest.aliases.is_empty() {
        lines.push("Aliases".to_string());
        for (pattern, target) in &manifest.aliases {
            lines.push(format!("{}{} \u{2192} {}", indent(1), pattern, target));
        }
    }
    lines.push(format!(
        "Generated {} languages, {} page files, {} files",
        manifest.languages.len(),
        manifest.page_files().count(),
        manifest.files().count()
    ));
    lines
}

pub fn print_build_output(manifest: &SiteManifest) {
    for line in format_build_output(manifest) {
        println!("{}", line);
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Format accumulated warnings, one per line.
pub fn format_warnings(warnings: &[Warning]) -> Vec<String> {
    if warnings.is_empty() {
        return vec!["No warnings".to_string()];
    }
    let mut lines = vec![format!("Warnings ({})", warnings.len())];
    lines.extend(warnings.iter().map(|w| format!("{}{}", indent(1), w)));
    lines
}

pub fn print_warnings(warnings: &[Warning]) {
    for line in format_warnings(warnings) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
