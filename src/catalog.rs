//! Page catalog assembly.
//!
//! Stage 2 of the pipeline. Consumes the record field groups of every
//! crawled blob, in crawl order, and folds them into a deduplicated catalog
//! keyed by page path.
//!
//! ## Lifecycle
//!
//! A [`CatalogBuilder`] is created per build, fed through `add_*` calls and
//! consumed by [`CatalogBuilder::finish`], which returns the immutable
//! [`Catalog`] together with the warnings collected on the way. There is no
//! shared catalog state outside the builder.
//!
//! ## Record Fields
//!
//! | Page field    | Accepted keys                        |
//! |---------------|--------------------------------------|
//! | `path`        | `path`, `slug`                       |
//! | `title`       | `title`                              |
//! | `order_hint`  | `order_hint`, `order`                |
//! | `parent_path` | `parent_path`, `parent`              |
//! | `raw_content` | `raw_content`, `content`, `body`     |
//!
//! A record without a path gets one slugified from its title. A record
//! without a title takes the first level-1 heading of its content, else the
//! display title of its slug. Objects carrying none of these keys are not
//! pages and are skipped with a [`Warning::MalformedRecord`].
//!
//! ## Duplicates
//!
//! The first occurrence of a path fixes its catalog position. A later
//! occurrence with content always replaces an earlier one without; a later
//! empty occurrence never replaces anything. When both have content the
//! [`DuplicatePolicy`] decides. Every decision is reported as a
//! [`Warning::DuplicatePage`].
//!
//! ## Markdown Fragments
//!
//! Fragment records (see [`crate::extract`]) are pieces of one page's
//! document. A fragment whose path is already held by a fragment is not a
//! duplicate: its text is appended, newline separated, and repeats of the
//! page's `# Title` line are dropped.

use crate::extract::{Extraction, FieldValue, RecordFields, markdown_title, title_line};
use crate::naming::{normalize_path, parse_slug, slugify};
use crate::types::{DuplicateResolution, OrderHint, PageRecord, Warning};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

const PATH_KEYS: &[&str] = &["path", "slug"];
const TITLE_KEYS: &[&str] = &["title"];
const ORDER_KEYS: &[&str] = &["order_hint", "order"];
const PARENT_KEYS: &[&str] = &["parent_path", "parent"];
const CONTENT_KEYS: &[&str] = &["raw_content", "content", "body"];

/// Tie-break when two occurrences of a path both carry content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the earlier occurrence.
    #[default]
    First,
    /// Keep the later occurrence (in the earlier one's position).
    Last,
    /// Append the later content to the earlier one, newline separated.
    Concat,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    pub duplicates: DuplicatePolicy,
    /// Fill absent order/parent fields from `N.M-` section-number slugs.
    pub infer_from_slugs: bool,
}

/// Deduplicated pages in order of first appearance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pages: Vec<PageRecord>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    pub fn get(&self, path: &str) -> Option<&PageRecord> {
        self.index.get(path).map(|&i| &self.pages[i])
    }

    /// Discovery index of `path`.
    pub fn position(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Finished catalog plus the warnings raised while building it.
#[derive(Debug, Clone, Default)]
pub struct CatalogBuild {
    pub catalog: Catalog,
    pub warnings: Vec<Warning>,
}

/// Single-writer accumulator for the catalog.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    options: CatalogOptions,
    catalog: Catalog,
    /// Paths whose current entry was built from markdown fragments.
    fragments: HashSet<String>,
    warnings: Vec<Warning>,
}

impl CatalogBuilder {
    pub fn new(options: CatalogOptions) -> Self {
        Self {
            options,
            catalog: Catalog::default(),
            fragments: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    /// Add every record of one blob's extraction, keeping its warnings.
    pub fn add_extraction(&mut self, source: &str, extraction: Extraction) {
        self.warnings.extend(extraction.warnings);
        for record in &extraction.records {
            self.add_fields(source, record);
        }
    }

    /// Convert one field group into a page and add it.
    pub fn add_fields(&mut self, source: &str, fields: &RecordFields) {
        match page_from_fields(fields) {
            Ok(page) if fields.fragment => self.add_fragment(page),
            Ok(page) => self.add_record(page),
            Err(reason) => {
                debug!(source, offset = fields.offset, %reason, "record skipped");
                self.warn(Warning::MalformedRecord {
                    source: source.to_string(),
                    offset: fields.offset,
                    reason,
                });
            }
        }
    }

    /// Add a page, applying the duplicate policy.
    pub fn add_record(&mut self, page: PageRecord) {
        let Some(&i) = self.catalog.index.get(&page.path) else {
            self.catalog.index.insert(page.path.clone(), self.catalog.pages.len());
            self.catalog.pages.push(page);
            return;
        };

        let existing = &mut self.catalog.pages[i];
        let resolution = match (existing.has_content(), page.has_content()) {
            (false, true) => {
                *existing = page;
                DuplicateResolution::ReplacedEmpty
            }
            (true, false) => DuplicateResolution::KeptFirst,
            (_, _) => match self.options.duplicates {
                DuplicatePolicy::First => DuplicateResolution::KeptFirst,
                DuplicatePolicy::Last => {
                    *existing = page;
                    DuplicateResolution::KeptLast
                }
                DuplicatePolicy::Concat => {
                    if page.has_content() {
                        existing.raw_content.push('\n');
                        existing.raw_content.push_str(&page.raw_content);
                    }
                    existing.order_hint = existing.order_hint.take().or(page.order_hint);
                    existing.parent_path = existing.parent_path.take().or(page.parent_path);
                    DuplicateResolution::Concatenated
                }
            },
        };
        let path = self.catalog.pages[i].path.clone();
        self.warn(Warning::DuplicatePage { path, resolution });
    }

    /// Add one markdown fragment of a page.
    pub fn add_fragment(&mut self, page: PageRecord) {
        let path = page.path.clone();
        match self.catalog.index.get(&path) {
            Some(&i) if self.fragments.contains(&path) => {
                let existing = &mut self.catalog.pages[i];
                existing.raw_content = merge_fragments(&existing.raw_content, &page.raw_content);
                debug!(%path, "merged page fragment");
            }
            Some(&i) => {
                let replaces = !self.catalog.pages[i].has_content() && page.has_content();
                self.add_record(page);
                if replaces {
                    self.fragments.insert(path);
                }
            }
            None => {
                self.fragments.insert(path);
                self.add_record(page);
            }
        }
    }

    /// Finalize the catalog.
    pub fn finish(mut self) -> CatalogBuild {
        if self.options.infer_from_slugs {
            infer_from_slugs(&mut self.catalog.pages);
        }
        info!(
            pages = self.catalog.len(),
            warnings = self.warnings.len(),
            "catalog built"
        );
        CatalogBuild {
            catalog: self.catalog,
            warnings: self.warnings,
        }
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }
}

/// Build a page from a decoded field group, or explain why it is not one.
pub fn page_from_fields(fields: &RecordFields) -> Result<PageRecord, String> {
    let known = [PATH_KEYS, TITLE_KEYS, ORDER_KEYS, PARENT_KEYS, CONTENT_KEYS];
    if !known.iter().any(|keys| fields.get(keys).is_some()) {
        return Err("no page fields".into());
    }

    let title = fields
        .text(TITLE_KEYS)
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let raw_content = fields.text(CONTENT_KEYS).unwrap_or_default().to_string();

    let path = match fields.text(PATH_KEYS).map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => normalize_path(raw).ok_or_else(|| format!("unusable path '{raw}'"))?,
        None => {
            let slug = title.map(slugify).unwrap_or_default();
            if slug.is_empty() {
                return Err("neither path nor title".into());
            }
            slug
        }
    };

    let title = match title {
        Some(t) => t.to_string(),
        None => first_heading(&raw_content).unwrap_or_else(|| fallback_title(&path)),
    };

    let order_hint = match fields.get(ORDER_KEYS) {
        Some(FieldValue::Number(n) | FieldValue::Str(n)) => OrderHint::parse(n),
        _ => None,
    };

    let parent_path = fields
        .text(PARENT_KEYS)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| normalize_path(p).unwrap_or_else(|| p.to_string()));

    Ok(PageRecord {
        path,
        title,
        order_hint,
        parent_path,
        raw_content,
    })
}

/// Text of the first level-1 heading in a markdown document.
pub fn first_heading(markdown: &str) -> Option<String> {
    let mut inside = false;
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => inside = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                let heading = text.trim();
                if !heading.is_empty() {
                    return Some(heading.to_string());
                }
                inside = false;
                text.clear();
            }
            Event::Text(t) | Event::Code(t) if inside => text.push_str(&t),
            _ => {}
        }
    }
    None
}

/// Append `next` to `existing`, dropping repeats of the `# Title` line of
/// `existing` outside code fences.
pub fn merge_fragments(existing: &str, next: &str) -> String {
    let title = markdown_title(existing);
    let mut lines: Vec<&str> = existing.lines().collect();
    let mut fenced = false;
    for line in next.lines() {
        if line.trim_start().starts_with("```") {
            fenced = !fenced;
        } else if !fenced && title.is_some() && title_line(line) == title {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

fn fallback_title(path: &str) -> String {
    let display = parse_slug(path).display_title;
    if display.trim().is_empty() {
        path.to_string()
    } else {
        display
    }
}

/// Fill absent order hints and parents from section-number slugs.
///
/// `2.1-install` gets order 1 and, if a page with section `2` exists, that
/// page as parent. Existing values are never overwritten.
fn infer_from_slugs(pages: &mut [PageRecord]) {
    let mut by_section: HashMap<Vec<u32>, String> = HashMap::new();
    for page in pages.iter() {
        let parsed = parse_slug(&page.path);
        if parsed.is_numbered() {
            by_section.entry(parsed.section).or_insert_with(|| page.path.clone());
        }
    }

    for page in pages.iter_mut() {
        let parsed = parse_slug(&page.path);
        let Some(&last) = parsed.section.last() else {
            continue;
        };
        if page.order_hint.is_none() {
            page.order_hint = Some(OrderHint::Number(i64::from(last)));
        }
        if page.parent_path.is_none()
            && let Some(parent) = parsed.parent_section().and_then(|s| by_section.get(s))
            && *parent != page.path
        {
            debug!(path = %page.path, %parent, "parent inferred from slug");
            page.parent_path = Some(parent.clone());
        }
    }
}
