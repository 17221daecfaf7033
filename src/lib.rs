//! # wikifold
//!
//! Turns a crawl of a DeepWiki-style documentation site into a static,
//! multilingual docsify site. The crawled pages carry their content as
//! structured records embedded in script payloads; wikifold recovers those
//! records, arranges them into a navigation tree and projects the result
//! into one file tree per configured language.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! ```text
//! 1. Extract    raw blobs   →  field records   (bracket-balanced span scan)
//! 2. Catalog    records     →  page catalog    (typed, deduplicated)
//! 3. Navigate   catalog     →  nav forest      (parent links, sibling order)
//! 4. Project    catalog+nav →  site manifest   (per-language virtual files)
//! ```
//!
//! Every stage is a pure function over in-memory values. Disk access lives at
//! the edges: [`source`] reads the raw blobs and [`materialize`] writes the
//! manifest. Problems in the input never abort a run; each stage reports them
//! as [`types::Warning`]s and keeps going.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`extract`] | Stage 1: scans text for balanced `{...}` spans and decodes their fields |
//! | [`catalog`] | Stage 2: builds typed page records and resolves duplicates |
//! | [`navigation`] | Stage 3: composes the navigation forest from parent links |
//! | [`project`] | Stage 4: renders READMEs, sidebars, pages and the docsify entry page |
//! | [`pipeline`] | Runs all four stages, extraction in parallel |
//! | [`config`] | `wikifold.toml` loading, validation and the language list |
//! | [`types`] | Shared types: `PageRecord`, `NavNode`, `Warning` |
//! | [`naming`] | `N.M-name` slug convention and path normalization |
//! | [`source`] | Reads the raw blob directory |
//! | [`materialize`] | Writes a site manifest to disk |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Span Scanning Over Full Parsing
//!
//! Crawled pages are not JSON documents. Records sit inside JavaScript
//! string payloads, interleaved with markup, and are often cut off at the
//! end of a chunk. The extractor tracks bracket depth and string state
//! character by character, so one truncated record costs a warning and
//! nothing else.
//!
//! ## Virtual Files
//!
//! Projection produces paths and contents, not files. This keeps the
//! projection deterministic and testable without a filesystem, and lets
//! `check` fingerprint a build without writing it.

pub mod catalog;
pub mod config;
pub mod extract;
pub mod materialize;
pub mod naming;
pub mod navigation;
pub mod output;
pub mod pipeline;
pub mod project;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
