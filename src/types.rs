//! Shared types passed between pipeline stages.
//!
//! These are serialized into `catalog.json` by the CLI and must stay stable
//! across extract → catalog → navigation → project.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One documentation page recovered from a raw blob.
///
/// Optional fields are explicit: a missing `order_hint` means "fall back to
/// discovery order", a missing `parent_path` means "root level".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Slug identifying the page within the source site, stable across languages.
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_hint: Option<OrderHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    /// Opaque markup or pre-converted text. Copied verbatim into every language tree.
    #[serde(default)]
    pub raw_content: String,
}

impl PageRecord {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            order_hint: None,
            parent_path: None,
            raw_content: String::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_path = Some(parent.into());
        self
    }

    pub fn with_order(mut self, hint: OrderHint) -> Self {
        self.order_hint = Some(hint);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.raw_content = content.into();
        self
    }

    pub fn has_content(&self) -> bool {
        !self.raw_content.trim().is_empty()
    }
}

/// Sibling ordering hint.
///
/// Numeric hints sort before textual ones; within a kind the natural order
/// applies. The derived `Ord` relies on that variant order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderHint {
    Number(i64),
    Text(String),
}

impl OrderHint {
    /// Interpret a scalar token: integers become `Number`, anything else `Text`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        Some(match token.parse::<i64>() {
            Ok(n) => OrderHint::Number(n),
            Err(_) => OrderHint::Text(token.to_string()),
        })
    }
}

impl fmt::Display for OrderHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderHint::Number(n) => write!(f, "{n}"),
            OrderHint::Text(t) => f.write_str(t),
        }
    }
}

/// Navigation forest node. Refers to its page by `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavNode {
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavNode>,
}

impl NavNode {
    /// Total number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NavNode::count).sum::<usize>()
    }

    /// Number of levels in this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(NavNode::depth).max().unwrap_or(0)
    }
}

/// How a duplicate `path` was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateResolution {
    /// The earlier occurrence was kept, the later one dropped.
    KeptFirst,
    /// The earlier occurrence had no content; the later one replaced it.
    ReplacedEmpty,
    /// The later occurrence replaced the earlier one.
    KeptLast,
    /// Contents of both occurrences were joined.
    Concatenated,
}

/// Non-fatal condition recorded while building the site.
///
/// Warnings never abort the pipeline; they travel alongside the output of
/// the stage that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A record span was still open when the input ended.
    MalformedSpan { source: String, offset: usize },
    /// A balanced span decoded to something that is not a usable page.
    MalformedRecord {
        source: String,
        offset: usize,
        reason: String,
    },
    DuplicatePage {
        path: String,
        resolution: DuplicateResolution,
    },
    /// `parent_path` names a page that does not exist; promoted to root.
    OrphanReference { path: String, parent: String },
    /// Following `parent_path` leads back to the page; promoted to root.
    CyclicReference { path: String, parent: String },
    /// The page sat below the navigation depth limit; attached to `parent`.
    DepthLimit { path: String, parent: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MalformedSpan { source, offset } => {
                write!(f, "{source}@{offset}: unterminated record span discarded")
            }
            Warning::MalformedRecord {
                source,
                offset,
                reason,
            } => write!(f, "{source}@{offset}: record skipped: {reason}"),
            Warning::DuplicatePage { path, resolution } => {
                let how = match resolution {
                    DuplicateResolution::KeptFirst => "kept first occurrence",
                    DuplicateResolution::ReplacedEmpty => "replaced empty occurrence",
                    DuplicateResolution::KeptLast => "kept last occurrence",
                    DuplicateResolution::Concatenated => "concatenated contents",
                };
                write!(f, "duplicate page '{path}': {how}")
            }
            Warning::OrphanReference { path, parent } => write!(
                f,
                "page '{path}' references missing parent '{parent}', promoted to root"
            ),
            Warning::CyclicReference { path, parent } => write!(
                f,
                "page '{path}' has cyclic parent '{parent}', promoted to root"
            ),
            Warning::DepthLimit { path, parent } => write!(
                f,
                "page '{path}' nested too deep, attached under '{parent}'"
            ),
        }
    }
}
