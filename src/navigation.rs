//! Navigation tree composition.
//!
//! Stage 3 of the pipeline. Turns the flat catalog into an ordered forest of
//! [`NavNode`]s by following each page's `parent_path`.
//!
//! ## Ordering
//!
//! Siblings sort by `order_hint`: numeric hints first (ascending), then
//! textual hints (lexicographic), then pages without a hint. Ties keep
//! catalog discovery order.
//!
//! ## Broken Hierarchies
//!
//! Pages are never dropped. A page whose parent does not exist becomes a
//! root with a [`Warning::OrphanReference`]. A page whose parent chain leads
//! back to itself becomes a root with a [`Warning::CyclicReference`]; cycles
//! are broken at their earliest-discovered member.
//!
//! ## Depth Limit
//!
//! The forest is at most [`MAX_NAV_DEPTH`] levels deep. A page that would
//! sit deeper is attached to the nearest ancestor that leaves it on the
//! last allowed level, with a [`Warning::DepthLimit`]. Rendering walks the
//! tree recursively, so the limit also bounds stack use.

use crate::catalog::Catalog;
use crate::types::{NavNode, PageRecord, Warning};
use std::cmp::Ordering;
use tracing::{info, warn};

/// Maximum number of levels in the navigation forest.
pub const MAX_NAV_DEPTH: usize = 16;

/// Navigation forest plus the warnings raised while composing it.
#[derive(Debug, Clone, Default)]
pub struct Navigation {
    pub roots: Vec<NavNode>,
    pub warnings: Vec<Warning>,
}

impl Navigation {
    /// Total number of nodes in the forest.
    pub fn count(&self) -> usize {
        self.roots.iter().map(NavNode::count).sum()
    }
}

/// Compose the navigation forest for `catalog`.
pub fn compose(catalog: &Catalog) -> Navigation {
    let pages = catalog.pages();
    let mut warnings = Vec::new();

    let mut parents: Vec<Option<usize>> = pages
        .iter()
        .map(|page| {
            let parent = page.parent_path.as_deref()?;
            match catalog.position(parent) {
                Some(p) if pages[p].path == page.path => {
                    push_warning(&mut warnings, Warning::CyclicReference {
                        path: page.path.clone(),
                        parent: parent.to_string(),
                    });
                    None
                }
                Some(p) => Some(p),
                None => {
                    push_warning(&mut warnings, Warning::OrphanReference {
                        path: page.path.clone(),
                        parent: parent.to_string(),
                    });
                    None
                }
            }
        })
        .collect();

    break_cycles(pages, &mut parents, &mut warnings);
    cap_depth(pages, &mut parents, &mut warnings);

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); pages.len()];
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    let by_hint = |a: &usize, b: &usize| sibling_order(&pages[*a], *a, &pages[*b], *b);
    roots.sort_by(by_hint);
    for list in &mut children {
        list.sort_by(by_hint);
    }

    let roots: Vec<NavNode> = roots
        .into_iter()
        .map(|i| build_node(pages, &children, i))
        .collect();

    info!(
        roots = roots.len(),
        depth = roots.iter().map(NavNode::depth).max().unwrap_or(0),
        warnings = warnings.len(),
        "navigation composed"
    );
    Navigation { roots, warnings }
}

/// Promote the earliest member of every parent cycle to root.
fn break_cycles(pages: &[PageRecord], parents: &mut [Option<usize>], warnings: &mut Vec<Warning>) {
    const NEW: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![NEW; parents.len()];
    let mut path: Vec<usize> = Vec::new();
    for start in 0..parents.len() {
        let mut current = Some(start);
        while let Some(node) = current {
            match state[node] {
                DONE => break,
                ON_PATH => {
                    let cycle_at = path.iter().position(|&n| n == node).unwrap_or(0);
                    if let Some(&first) = path[cycle_at..].iter().min() {
                        push_warning(warnings, Warning::CyclicReference {
                            path: pages[first].path.clone(),
                            parent: pages[parents[first].unwrap_or(first)].path.clone(),
                        });
                        parents[first] = None;
                    }
                    break;
                }
                _ => {
                    state[node] = ON_PATH;
                    path.push(node);
                    current = parents[node];
                }
            }
        }
        for node in path.drain(..) {
            state[node] = DONE;
        }
    }
}

/// Distance of every page from its root. `parents` must be acyclic.
fn depths(parents: &[Option<usize>]) -> Vec<usize> {
    let mut depth: Vec<Option<usize>> = vec![None; parents.len()];
    let mut chain = Vec::new();
    for start in 0..parents.len() {
        let mut node = start;
        while depth[node].is_none() {
            chain.push(node);
            match parents[node] {
                Some(p) => node = p,
                None => break,
            }
        }
        while let Some(n) = chain.pop() {
            depth[n] = Some(parents[n].and_then(|p| depth[p]).map_or(0, |d| d + 1));
        }
    }
    depth.into_iter().map(Option::unwrap_or_default).collect()
}

/// Reattach pages below [`MAX_NAV_DEPTH`] to an ancestor on the last level.
fn cap_depth(pages: &[PageRecord], parents: &mut [Option<usize>], warnings: &mut Vec<Warning>) {
    let original = depths(parents);
    if original.iter().all(|&d| d < MAX_NAV_DEPTH) {
        return;
    }

    let mut by_depth: Vec<usize> = (0..parents.len()).collect();
    by_depth.sort_by_key(|&i| original[i]);

    let mut depth = vec![0; parents.len()];
    for i in by_depth {
        let Some(p) = parents[i] else { continue };
        if depth[p] + 1 >= MAX_NAV_DEPTH {
            parents[i] = parents[p];
            push_warning(warnings, Warning::DepthLimit {
                path: pages[i].path.clone(),
                parent: parents[i].map_or_else(String::new, |a| pages[a].path.clone()),
            });
        }
        depth[i] = parents[i].map_or(0, |a| depth[a] + 1);
    }
}

fn sibling_order(a: &PageRecord, a_index: usize, b: &PageRecord, b_index: usize) -> Ordering {
    a.order_hint
        .is_none()
        .cmp(&b.order_hint.is_none())
        .then_with(|| a.order_hint.cmp(&b.order_hint))
        .then(a_index.cmp(&b_index))
}

fn build_node(pages: &[PageRecord], children: &[Vec<usize>], index: usize) -> NavNode {
    let page = &pages[index];
    NavNode {
        path: page.path.clone(),
        title: page.title.clone(),
        children: children[index]
            .iter()
            .map(|&child| build_node(pages, children, child))
            .collect(),
    }
}

fn push_warning(warnings: &mut Vec<Warning>, warning: Warning) {
    warn!("{warning}");
    warnings.push(warning);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{assert_nav_shape, catalog_of};
    use crate::types::OrderHint;

    #[test]
    fn builds_forest_from_parents() {
        let catalog = catalog_of(vec![
            PageRecord::new("overview", "Overview"),
            PageRecord::new("install", "Install").with_parent("setup"),
            PageRecord::new("setup", "Setup"),
        ]);
        let nav = compose(&catalog);
        assert_nav_shape(&nav.roots, &["overview", "setup/[install]"]);
        assert!(nav.warnings.is_empty());
        assert_eq!(nav.count(), 3);
    }

    #[test]
    fn siblings_sort_by_numeric_hint() {
        let catalog = catalog_of(vec![
            PageRecord::new("c", "C").with_order(OrderHint::Number(10)),
            PageRecord::new("a", "A").with_order(OrderHint::Number(2)),
            PageRecord::new("b", "B").with_order(OrderHint::Number(-1)),
        ]);
        assert_nav_shape(&compose(&catalog).roots, &["b", "a", "c"]);
    }

    #[test]
    fn numbers_then_text_then_unhinted() {
        let catalog = catalog_of(vec![
            PageRecord::new("plain-1", "P1"),
            PageRecord::new("text-b", "TB").with_order(OrderHint::Text("b".into())),
            PageRecord::new("num", "N").with_order(OrderHint::Number(5)),
            PageRecord::new("plain-2", "P2"),
            PageRecord::new("text-a", "TA").with_order(OrderHint::Text("a".into())),
        ]);
        assert_nav_shape(
            &compose(&catalog).roots,
            &["num", "text-a", "text-b", "plain-1", "plain-2"],
        );
    }

    #[test]
    fn equal_hints_keep_discovery_order() {
        let catalog = catalog_of(vec![
            PageRecord::new("x", "X").with_order(OrderHint::Number(1)),
            PageRecord::new("y", "Y").with_order(OrderHint::Number(1)),
            PageRecord::new("z", "Z").with_order(OrderHint::Number(1)),
        ]);
        assert_nav_shape(&compose(&catalog).roots, &["x", "y", "z"]);
    }

    #[test]
    fn orphan_is_promoted_to_root_with_warning() {
        let catalog = catalog_of(vec![
            PageRecord::new("a", "A"),
            PageRecord::new("lost", "Lost").with_parent("missing"),
        ]);
        let nav = compose(&catalog);
        assert_nav_shape(&nav.roots, &["a", "lost"]);
        assert_eq!(
            nav.warnings,
            vec![Warning::OrphanReference {
                path: "lost".into(),
                parent: "missing".into()
            }]
        );
    }

    #[test]
    fn self_parent_is_promoted() {
        let catalog = catalog_of(vec![PageRecord::new("a", "A").with_parent("a")]);
        let nav = compose(&catalog);
        assert_nav_shape(&nav.roots, &["a"]);
        assert!(matches!(nav.warnings[0], Warning::CyclicReference { .. }));
    }

    #[test]
    fn cycle_is_broken_at_first_discovered_member() {
        let catalog = catalog_of(vec![
            PageRecord::new("a", "A").with_parent("c"),
            PageRecord::new("b", "B").with_parent("a"),
            PageRecord::new("c", "C").with_parent("b"),
            PageRecord::new("d", "D").with_parent("b"),
        ]);
        let nav = compose(&catalog);
        assert_nav_shape(&nav.roots, &["a/[b/[c, d]]"]);
        assert_eq!(
            nav.warnings,
            vec![Warning::CyclicReference {
                path: "a".into(),
                parent: "c".into()
            }]
        );
        assert_eq!(nav.count(), 4);
    }

    #[test]
    fn tail_into_later_cycle_is_kept() {
        let catalog = catalog_of(vec![
            PageRecord::new("leaf", "Leaf").with_parent("x"),
            PageRecord::new("x", "X").with_parent("y"),
            PageRecord::new("y", "Y").with_parent("x"),
        ]);
        let nav = compose(&catalog);
        assert_nav_shape(&nav.roots, &["x/[leaf, y]"]);
        assert_eq!(nav.count(), 3);
    }

    #[test]
    fn deep_chain_is_capped_at_depth_limit() {
        let pages: Vec<PageRecord> = (0..40)
            .map(|i| {
                let page = PageRecord::new(format!("p{i}"), format!("P{i}"));
                if i == 0 { page } else { page.with_parent(format!("p{}", i - 1)) }
            })
            .collect();
        let nav = compose(&catalog_of(pages));

        assert_eq!(nav.count(), 40);
        assert_eq!(nav.roots.len(), 1);
        assert_eq!(nav.roots[0].depth(), MAX_NAV_DEPTH);
        assert_eq!(nav.warnings.len(), 40 - MAX_NAV_DEPTH);
        assert_eq!(
            nav.warnings[0],
            Warning::DepthLimit {
                path: format!("p{MAX_NAV_DEPTH}"),
                parent: format!("p{}", MAX_NAV_DEPTH - 2),
            }
        );
    }

    #[test]
    fn chain_at_depth_limit_is_untouched() {
        let pages: Vec<PageRecord> = (0..MAX_NAV_DEPTH)
            .map(|i| {
                let page = PageRecord::new(format!("p{i}"), format!("P{i}"));
                if i == 0 { page } else { page.with_parent(format!("p{}", i - 1)) }
            })
            .collect();
        let nav = compose(&catalog_of(pages));
        assert_eq!(nav.roots[0].depth(), MAX_NAV_DEPTH);
        assert!(nav.warnings.is_empty());
    }

    #[test]
    fn very_long_chain_composes() {
        let n = 20_000;
        let pages: Vec<PageRecord> = (0..n)
            .map(|i| {
                let page = PageRecord::new(format!("p{i}"), format!("P{i}"));
                // Listed child-first so parents are discovered last.
                if i == n - 1 { page } else { page.with_parent(format!("p{}", i + 1)) }
            })
            .collect();
        let nav = compose(&catalog_of(pages));
        assert_eq!(nav.count(), n);
        assert!(nav.roots[0].depth() <= MAX_NAV_DEPTH);
        assert!(nav.warnings.iter().all(|w| matches!(w, Warning::DepthLimit { .. })));
    }

    #[test]
    fn empty_catalog_gives_empty_forest() {
        let nav = compose(&Catalog::default());
        assert!(nav.roots.is_empty());
        assert!(nav.warnings.is_empty());
    }
}
