//! Shared test utilities for the wikifold test suite.
//!
//! Provides catalog builders, lookup helpers and navigation shape assertions.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let catalog = catalog_of(vec![
//!     PageRecord::new("setup", "Setup"),
//!     PageRecord::new("install", "Install").with_parent("setup"),
//! ]);
//! let nav = compose(&catalog);
//!
//! assert_nav_shape(&nav.roots, &["setup/[install]"]);
//! ```

use crate::catalog::{Catalog, CatalogBuilder, CatalogOptions};
use crate::project::{SiteManifest, VirtualFile};
use crate::types::{NavNode, PageRecord};

// =========================================================================
// Catalog setup
// =========================================================================

/// Build a catalog from records with default options, ignoring warnings.
pub fn catalog_of(records: Vec<PageRecord>) -> Catalog {
    let mut builder = CatalogBuilder::new(CatalogOptions::default());
    for record in records {
        builder.add_record(record);
    }
    builder.finish().catalog
}

// =========================================================================
// Manifest lookups: panics with a clear message on miss
// =========================================================================

/// Find a virtual file by path anywhere in the site. Panics if not found.
pub fn find_file<'a>(site: &'a SiteManifest, path: &str) -> &'a VirtualFile {
    site.file(path).unwrap_or_else(|| {
        let paths: Vec<&str> = site.files().map(|(p, _)| p).collect();
        panic!("file '{path}' not found. Available: {paths:?}")
    })
}

// =========================================================================
// Navigation helpers
// =========================================================================

/// Render a node as `path` or `path/[child, child/[...]]`.
pub fn nav_shape(node: &NavNode) -> String {
    if node.children.is_empty() {
        node.path.clone()
    } else {
        let children: Vec<String> = node.children.iter().map(nav_shape).collect();
        format!("{}/[{}]", node.path, children.join(", "))
    }
}

/// Assert that the navigation forest matches an expected shape.
///
/// ```rust
/// assert_nav_shape(&nav.roots, &["a/[b/[c, d]]", "e"]);
/// ```
pub fn assert_nav_shape(roots: &[NavNode], expected: &[&str]) {
    let actual: Vec<String> = roots.iter().map(nav_shape).collect();
    assert_eq!(actual, expected, "navigation shape mismatch");
}
