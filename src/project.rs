//! Multilingual site projection.
//!
//! Stage 4 of the pipeline. Turns the catalog and navigation forest into a
//! [`SiteManifest`]: every file of the static site as an in-memory virtual
//! file, keyed by a virtual path without extension. Nothing touches disk
//! here; [`crate::materialize`] does that.
//!
//! ## Layout
//!
//! ```text
//! index                    # Entry page (HTML): language menu + router config
//! _sidebar                 # Root navigation: one link per language README
//! .nojekyll                # Marker so static hosts serve `_`-prefixed files
//! en/README                # Language root document
//! en/_sidebar              # Language navigation
//! en/pages/<path>          # One file per catalog page
//! zh-cn/README
//! zh-cn/_sidebar
//! zh-cn/pages/<path>
//! ```
//!
//! ## Link Rule
//!
//! Every link written into a language tree carries that language's prefix
//! in full (`zh-cn/pages/<path>`, `zh-cn/README`). The router resolves links
//! from the site root, so a bare `pages/<path>` would land in whichever
//! tree happened to be served, and an unprefixed sidebar would 404 once
//! several languages share one root.
//!
//! ## Aliases
//!
//! The alias table maps route patterns to fully prefixed virtual paths:
//! - always `<code>/.*/_sidebar` → `<code>/_sidebar`, so nested routes load
//!   their language sidebar,
//! - with `bare_aliases`, `pages/<path>` → `<default>/pages/<path>` for every
//!   page, so unprefixed links still resolve to the default language.

use crate::catalog::Catalog;
use crate::config::{ConfigError, Language, SiteConfig, validate_languages};
use crate::types::NavNode;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

const DOCSIFY_THEME: &str = "//cdn.jsdelivr.net/npm/docsify@4/lib/themes/vue.css";
const DOCSIFY_SCRIPT: &str = "//cdn.jsdelivr.net/npm/docsify@4";

const ENTRY_CSS: &str = r#"
.language-menu { position: fixed; top: 1rem; right: 1rem; z-index: 1000; }
.language-menu a { margin-left: 0.75rem; text-decoration: none; }
.markdown-section { max-width: 800px; }
"#;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("catalog is empty: no page survived extraction, refusing to build an empty site")]
    EmptyCatalog,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// How a virtual file is written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Markdown,
    Html,
    /// Written as-is, no extension added.
    Verbatim,
}

impl FileKind {
    pub fn extension(self) -> Option<&'static str> {
        match self {
            FileKind::Markdown => Some("md"),
            FileKind::Html => Some("html"),
            FileKind::Verbatim => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualFile {
    pub kind: FileKind,
    pub content: String,
}

impl VirtualFile {
    fn markdown(content: String) -> Self {
        Self {
            kind: FileKind::Markdown,
            content,
        }
    }
}

/// Files of one language tree.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageManifest {
    pub code: String,
    pub name: String,
    pub default: bool,
    /// Virtual path of the root entry document.
    pub readme: String,
    /// Virtual path of the navigation document.
    pub sidebar: String,
    /// All files of the tree, README and sidebar included.
    pub files: BTreeMap<String, VirtualFile>,
}

impl LanguageManifest {
    fn pages_prefix(&self) -> String {
        format!("{}/pages/", self.code)
    }

    /// Per-page files, in virtual path order.
    pub fn page_files(&self) -> impl Iterator<Item = (&str, &VirtualFile)> {
        let prefix = self.pages_prefix();
        self.files
            .iter()
            .filter(move |(path, _)| path.starts_with(&prefix))
            .map(|(path, file)| (path.as_str(), file))
    }

    pub fn readme_file(&self) -> Option<&VirtualFile> {
        self.files.get(&self.readme)
    }

    pub fn sidebar_file(&self) -> Option<&VirtualFile> {
        self.files.get(&self.sidebar)
    }
}

/// Files shared by all languages.
#[derive(Debug, Clone, Serialize)]
pub struct RootManifest {
    /// Virtual path of the language-selecting entry page.
    pub entry: String,
    /// Virtual path of the root navigation document.
    pub sidebar: String,
    pub files: BTreeMap<String, VirtualFile>,
}

/// The complete static site, ready to be materialized.
#[derive(Debug, Clone, Serialize)]
pub struct SiteManifest {
    pub output_root: String,
    pub site_name: String,
    pub dynamic_rendering: bool,
    pub default_language: String,
    pub languages: Vec<LanguageManifest>,
    pub root: RootManifest,
    /// Route pattern → fully prefixed virtual path.
    pub aliases: BTreeMap<String, String>,
}

impl SiteManifest {
    /// Every file of the site: root files first, then each language in
    /// configured order. Paths never repeat.
    pub fn files(&self) -> impl Iterator<Item = (&str, &VirtualFile)> {
        self.root
            .files
            .iter()
            .chain(self.languages.iter().flat_map(|l| l.files.iter()))
            .map(|(path, file)| (path.as_str(), file))
    }

    /// Page files of every language.
    pub fn page_files(&self) -> impl Iterator<Item = (&str, &VirtualFile)> {
        self.languages.iter().flat_map(LanguageManifest::page_files)
    }

    pub fn language(&self, code: &str) -> Option<&LanguageManifest> {
        self.languages.iter().find(|l| l.code == code)
    }

    pub fn file(&self, path: &str) -> Option<&VirtualFile> {
        self.root
            .files
            .get(path)
            .or_else(|| self.languages.iter().find_map(|l| l.files.get(path)))
    }

    /// SHA-256 over all (path, kind, content) triples in [`Self::files`] order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, file) in self.files() {
            hasher.update(path.as_bytes());
            hasher.update(b"\0");
            hasher.update(file.kind.extension().unwrap_or("").as_bytes());
            hasher.update(b"\0");
            hasher.update(file.content.as_bytes());
            hasher.update(b"\0");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Site-level settings for projection.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub output_root: String,
    pub site_name: String,
    pub source_url: Option<String>,
    pub dynamic_rendering: bool,
    pub languages: Vec<Language>,
    pub bare_aliases: bool,
}

impl ProjectOptions {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            output_root: config.output_root.clone(),
            site_name: config.site_name.clone(),
            source_url: config.source_url().map(str::to_string),
            dynamic_rendering: config.dynamic_rendering,
            languages: config.languages.clone(),
            bare_aliases: config.routing.bare_aliases,
        }
    }
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self::from_config(&SiteConfig::default())
    }
}

/// Project the catalog and its navigation forest into a site manifest.
///
/// Fails on an invalid language list, then on an empty catalog.
pub fn project(
    catalog: &Catalog,
    roots: &[NavNode],
    options: &ProjectOptions,
) -> Result<SiteManifest, ProjectError> {
    let default = validate_languages(&options.languages)?;
    if catalog.is_empty() {
        return Err(ProjectError::EmptyCatalog);
    }

    let languages: Vec<LanguageManifest> = options
        .languages
        .iter()
        .map(|language| project_language(catalog, roots, language, options))
        .collect();

    let mut aliases = BTreeMap::new();
    for language in &options.languages {
        aliases.insert(
            format!("{}/.*/_sidebar", language.code),
            format!("{}/_sidebar", language.code),
        );
    }
    if options.bare_aliases {
        for page in catalog.pages() {
            aliases.insert(
                format!("pages/{}", escape_pattern(&page.path)),
                page_route(&default.code, &page.path),
            );
        }
    }

    let root = project_root(options, default, &aliases);

    info!(
        languages = languages.len(),
        pages = catalog.len(),
        aliases = aliases.len(),
        "site projected"
    );
    Ok(SiteManifest {
        output_root: options.output_root.clone(),
        site_name: options.site_name.clone(),
        dynamic_rendering: options.dynamic_rendering,
        default_language: default.code.clone(),
        languages,
        root,
        aliases,
    })
}

fn project_language(
    catalog: &Catalog,
    roots: &[NavNode],
    language: &Language,
    options: &ProjectOptions,
) -> LanguageManifest {
    let code = &language.code;
    let readme = format!("{code}/README");
    let sidebar = format!("{code}/_sidebar");

    let mut files = BTreeMap::new();
    files.insert(
        readme.clone(),
        VirtualFile::markdown(render_readme(catalog, roots, language, options)),
    );
    files.insert(
        sidebar.clone(),
        VirtualFile::markdown(render_sidebar(roots, code)),
    );
    for page in catalog.pages() {
        files.insert(
            page_route(code, &page.path),
            VirtualFile::markdown(page.raw_content.clone()),
        );
    }

    debug!(language = %code, files = files.len(), "language tree projected");
    LanguageManifest {
        code: code.clone(),
        name: language.display_name().to_string(),
        default: language.default,
        readme,
        sidebar,
        files,
    }
}

fn project_root(
    options: &ProjectOptions,
    default: &Language,
    aliases: &BTreeMap<String, String>,
) -> RootManifest {
    let entry = "index".to_string();
    let sidebar = "_sidebar".to_string();

    let mut files = BTreeMap::new();
    files.insert(
        entry.clone(),
        VirtualFile {
            kind: FileKind::Html,
            content: render_entry(options, default, aliases).into_string(),
        },
    );
    files.insert(
        sidebar.clone(),
        VirtualFile::markdown(render_root_sidebar(&options.languages)),
    );
    files.insert(
        ".nojekyll".to_string(),
        VirtualFile {
            kind: FileKind::Verbatim,
            content: String::new(),
        },
    );

    RootManifest {
        entry,
        sidebar,
        files,
    }
}

/// Virtual path of `path` inside the `code` language tree.
pub fn page_route(code: &str, path: &str) -> String {
    format!("{code}/pages/{path}")
}

// ============================================================================
// Markdown documents
// ============================================================================

fn render_readme(
    catalog: &Catalog,
    roots: &[NavNode],
    language: &Language,
    options: &ProjectOptions,
) -> String {
    let code = &language.code;
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", options.site_name));
    out.push_str(&format!("> {}\n\n", language.display_name()));
    out.push_str(&format!(
        "This documentation contains **{}** pages.\n",
        catalog.len()
    ));

    if !roots.is_empty() {
        out.push_str("\n## Sections\n\n");
        for node in roots {
            out.push_str(&format!(
                "* {}\n",
                markdown_link(&node.title, &page_route(code, &node.path))
            ));
        }
    }

    if let Some(url) = &options.source_url {
        out.push_str(&format!("\nSource: `{url}`\n"));
    }
    out
}

fn render_sidebar(roots: &[NavNode], code: &str) -> String {
    let mut out = format!("* {}\n\n", markdown_link("Home", &format!("{code}/README")));
    for node in roots {
        render_sidebar_node(&mut out, node, code, 0);
    }
    out
}

fn render_sidebar_node(out: &mut String, node: &NavNode, code: &str, depth: usize) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!(
        "* {}\n",
        markdown_link(&node.title, &page_route(code, &node.path))
    ));
    for child in &node.children {
        render_sidebar_node(out, child, code, depth + 1);
    }
}

fn render_root_sidebar(languages: &[Language]) -> String {
    languages
        .iter()
        .map(|l| {
            format!(
                "* {}\n",
                markdown_link(l.display_name(), &format!("{}/README", l.code))
            )
        })
        .collect()
}

/// `[text](target)` with the text escaped and the target wrapped in angle
/// brackets when it contains spaces or parentheses.
pub fn markdown_link(text: &str, target: &str) -> String {
    let mut label = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '\\') {
            label.push('\\');
        }
        label.push(if c == '\n' { ' ' } else { c });
    }
    if target.contains([' ', '(', ')']) {
        format!("[{label}](<{target}>)")
    } else {
        format!("[{label}]({target})")
    }
}

// ============================================================================
// Entry page
// ============================================================================

fn render_entry(
    options: &ProjectOptions,
    default: &Language,
    aliases: &BTreeMap<String, String>,
) -> Markup {
    let config = docsify_config(options, default, aliases).to_string().replace("</", "<\\/");
    html! {
        (DOCTYPE)
        html lang=(default.code) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (options.site_name) }
                link rel="stylesheet" href=(DOCSIFY_THEME);
                style { (PreEscaped(ENTRY_CSS)) }
            }
            body {
                nav.language-menu {
                    @for language in &options.languages {
                        a href={ "#/" (language.code) "/README" } hreflang=(language.code) {
                            (language.display_name())
                        }
                    }
                }
                div #app { "Loading..." }
                script { (PreEscaped(format!("window.$docsify = {config};"))) }
                script src=(DOCSIFY_SCRIPT) {}
            }
        }
    }
}

/// Router configuration embedded in the entry page.
fn docsify_config(
    options: &ProjectOptions,
    default: &Language,
    aliases: &BTreeMap<String, String>,
) -> Value {
    let alias: Map<String, Value> = aliases
        .iter()
        .map(|(pattern, target)| {
            let (pattern, target) = if target.ends_with("_sidebar") {
                (format!("/{pattern}.md"), format!("/{target}.md"))
            } else {
                (format!("/{pattern}"), format!("/{target}"))
            };
            (pattern, Value::String(target))
        })
        .collect();

    let mut name_link: Map<String, Value> = options
        .languages
        .iter()
        .map(|l| {
            (
                format!("/{}/", l.code),
                Value::String(format!("#/{}/README", l.code)),
            )
        })
        .collect();
    name_link.insert("/".into(), Value::String(format!("#/{}/README", default.code)));

    json!({
        "name": options.site_name,
        "homepage": format!("{}/README.md", default.code),
        "loadSidebar": "_sidebar.md",
        "relativePath": false,
        "subMaxLevel": 3,
        "auto2top": true,
        "nameLink": name_link,
        "alias": alias,
    })
}

/// Escape regular-expression metacharacters in a literal route segment.
fn escape_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
