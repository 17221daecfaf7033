//! Site configuration module.
//!
//! Handles loading, validating, and merging `wikifold.toml`. The user file
//! is sparse: it is merged key-by-key over the stock defaults, then
//! deserialized and validated as a whole.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_root = "docs"          # Directory the site is written to
//! site_name = "Documentation"   # Shown in READMEs and the entry page
//! source_url = ""               # Crawled site, shown in READMEs when set
//! dynamic_rendering = false     # Informational: pages were rendered upstream
//!
//! [[languages]]                 # Replaces the whole default list when given
//! code = "en"
//! name = "English"
//! default = true
//!
//! [catalog]
//! duplicates = "first"          # "first" | "last" | "concat"
//! infer_from_slugs = false      # Order/parent from `2.1-name` slugs
//!
//! [extract]
//! flight_marker = "self.__next_f.push("
//! markdown_fragments = true     # `# Title` chunks become page fragments
//!
//! [routing]
//! bare_aliases = false          # Alias `pages/<path>` to the default language
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::catalog::{CatalogOptions, DuplicatePolicy};
use crate::extract::{DEFAULT_FLIGHT_MARKER, Extractor};
use crate::naming::normalize_path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("no languages configured")]
    NoLanguages,
    #[error("no default language: mark exactly one language with `default = true`")]
    NoDefaultLanguage,
    #[error("more than one default language: {}", .codes.join(", "))]
    MultipleDefaultLanguages { codes: Vec<String> },
    #[error("language '{0}' is configured more than once")]
    DuplicateLanguage(String),
    #[error("invalid language code '{0}': use letters, digits, '-' or '_'")]
    InvalidLanguageCode(String),
}

/// Site configuration loaded from `wikifold.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Name of the directory the site is written to.
    pub output_root: String,
    pub site_name: String,
    /// URL of the crawled site. Empty means not shown.
    pub source_url: String,
    /// Whether pages were fetched with script rendering. Informational only.
    pub dynamic_rendering: bool,
    pub languages: Vec<Language>,
    pub catalog: CatalogConfig,
    pub extract: ExtractConfig,
    pub routing: RoutingConfig,
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            output_root: "docs".to_string(),
            site_name: "Documentation".to_string(),
            source_url: String::new(),
            dynamic_rendering: false,
            languages: vec![Language::new("en", "English").as_default()],
            catalog: CatalogConfig::default(),
            extract: ExtractConfig::default(),
            routing: RoutingConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if normalize_path(&self.output_root).is_none() {
            return Err(ConfigError::Validation(format!(
                "output_root '{}' must be a relative directory name",
                self.output_root
            )));
        }
        if self.site_name.trim().is_empty() {
            return Err(ConfigError::Validation("site_name must not be empty".into()));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        validate_languages(&self.languages)?;
        Ok(())
    }

    pub fn source_url(&self) -> Option<&str> {
        Some(self.source_url.trim()).filter(|url| !url.is_empty())
    }
}

/// One output language. Every language gets a full copy of the site skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Language {
    /// Directory prefix and route segment (`en`, `zh-cn`).
    pub code: String,
    /// Display name. Falls back to the code.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default: bool,
}

impl Language {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.code
        } else {
            &self.name
        }
    }
}

/// Check the language list and return the default language.
///
/// Codes must be unique, non-empty, and made of letters, digits, `-` or `_`
/// so they are safe as a directory prefix. Exactly one language is default.
pub fn validate_languages(languages: &[Language]) -> Result<&Language, ConfigError> {
    if languages.is_empty() {
        return Err(ConfigError::NoLanguages);
    }

    let mut seen = HashSet::new();
    for language in languages {
        let code = language.code.as_str();
        let valid = !code.is_empty()
            && code
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ConfigError::InvalidLanguageCode(code.to_string()));
        }
        if !seen.insert(code) {
            return Err(ConfigError::DuplicateLanguage(code.to_string()));
        }
    }

    let defaults: Vec<&Language> = languages.iter().filter(|l| l.default).collect();
    match defaults.as_slice() {
        [] => Err(ConfigError::NoDefaultLanguage),
        [default] => Ok(*default),
        many => Err(ConfigError::MultipleDefaultLanguages {
            codes: many.iter().map(|l| l.code.clone()).collect(),
        }),
    }
}

/// Catalog assembly settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Tie-break when two occurrences of a page both have content.
    pub duplicates: DuplicatePolicy,
    /// Derive order and parent from `2.1-name` slugs when absent.
    pub infer_from_slugs: bool,
}

impl CatalogConfig {
    pub fn options(&self) -> CatalogOptions {
        CatalogOptions {
            duplicates: self.duplicates,
            infer_from_slugs: self.infer_from_slugs,
        }
    }
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Call prefix of streamed payload chunks. Empty disables unwrapping.
    pub flight_marker: String,
    /// Turn markdown chunks with a `# Title` line into page fragments.
    pub markdown_fragments: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            flight_marker: DEFAULT_FLIGHT_MARKER.to_string(),
            markdown_fragments: true,
        }
    }
}

impl ExtractConfig {
    pub fn extractor(&self) -> Extractor {
        Extractor::with_flight_marker(&self.flight_marker)
            .with_markdown_fragments(self.markdown_fragments)
    }
}

/// Routing settings for the entry page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    /// Alias unprefixed `pages/<path>` routes to the default language.
    pub bare_aliases: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel extraction workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Stock defaults as a TOML value, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely. Arrays
///   included: a user `[[languages]]` list replaces the default list.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults if it is missing.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

pub fn stock_config_toml() -> &'static str {
    r##"# wikifold Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory the static site is written to.
output_root = "docs"

# Site name shown in language READMEs and the entry page title.
site_name = "Documentation"

# URL of the crawled documentation site. Shown in READMEs when set.
source_url = ""

# Whether pages were fetched with script rendering upstream.
# Informational only; does not change the output.
dynamic_rendering = false

# ---------------------------------------------------------------------------
# Languages
# ---------------------------------------------------------------------------
# Each language gets its own copy of the site under <code>/.
# Exactly one language must be the default. Listing languages here replaces
# the default list entirely.
[[languages]]
code = "en"
name = "English"
default = true

# [[languages]]
# code = "zh-cn"
# name = "中文"

# ---------------------------------------------------------------------------
# Catalog
# ---------------------------------------------------------------------------
[catalog]
# Which occurrence wins when the same page path is seen twice and both
# have content: "first", "last", or "concat" (join contents).
# An occurrence with content always replaces one without.
duplicates = "first"

# Derive sibling order and parent from section-number slugs such as
# "2.1-installation" when a record does not carry them.
infer_from_slugs = false

# ---------------------------------------------------------------------------
# Extraction
# ---------------------------------------------------------------------------
[extract]
# Call prefix of streamed payload chunks inside page scripts.
# Set to "" to scan the raw page text only.
flight_marker = "self.__next_f.push("

# Treat chunks that hold a markdown document with a "# Title" line as page
# fragments: the title names the page, fragments of one page are merged.
markdown_fragments = true

# ---------------------------------------------------------------------------
# Routing
# ---------------------------------------------------------------------------
[routing]
# Add aliases so unprefixed pages/<path> routes resolve to the default
# language.
bare_aliases = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel extraction workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.output_root, "docs");
        assert_eq!(config.languages, vec![Language::new("en", "English").as_default()]);
        assert_eq!(config.catalog.duplicates, DuplicatePolicy::First);
        assert_eq!(config.extract.flight_marker, DEFAULT_FLIGHT_MARKER);
        assert!(config.extract.markdown_fragments);
        assert!(!config.routing.bare_aliases);
        assert!(config.source_url().is_none());
    }

    #[test]
    fn default_config_is_valid() {
        SiteConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let config: SiteConfig = toml::from_str(
            r#"
site_name = "Tokio Internals"

[catalog]
duplicates = "concat"
"#,
        )
        .unwrap();
        assert_eq!(config.site_name, "Tokio Internals");
        assert_eq!(config.catalog.duplicates, DuplicatePolicy::Concat);
        assert!(!config.catalog.infer_from_slugs);
        assert_eq!(config.output_root, "docs");
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("outptu_root = \"x\"");
        assert!(result.is_err());
        let result: Result<SiteConfig, _> = toml::from_str("[routing]\nbare = true");
        assert!(result.is_err());
    }

    #[test]
    fn language_name_falls_back_to_code() {
        let language: Language = toml::from_str("code = \"fr\"").unwrap();
        assert_eq!(language.display_name(), "fr");
        assert!(!language.default);
    }

    // =========================================================================
    // Language validation
    // =========================================================================

    #[test]
    fn validate_languages_returns_default() {
        let languages = vec![
            Language::new("en", "English").as_default(),
            Language::new("zh-cn", "中文"),
        ];
        assert_eq!(validate_languages(&languages).unwrap().code, "en");
    }

    #[test]
    fn validate_languages_rejects_empty_list() {
        assert!(matches!(validate_languages(&[]), Err(ConfigError::NoLanguages)));
    }

    #[test]
    fn validate_languages_requires_one_default() {
        let none = vec![Language::new("en", "English"), Language::new("de", "Deutsch")];
        assert!(matches!(
            validate_languages(&none),
            Err(ConfigError::NoDefaultLanguage)
        ));

        let two = vec![
            Language::new("en", "English").as_default(),
            Language::new("de", "Deutsch").as_default(),
        ];
        match validate_languages(&two) {
            Err(ConfigError::MultipleDefaultLanguages { codes }) => {
                assert_eq!(codes, vec!["en", "de"]);
            }
            other => panic!("expected MultipleDefaultLanguages, got {other:?}"),
        }
    }

    #[test]
    fn validate_languages_rejects_bad_codes() {
        for code in ["", "en/us", "..", "a b"] {
            let languages = vec![Language::new(code, "X").as_default()];
            assert!(
                matches!(
                    validate_languages(&languages),
                    Err(ConfigError::InvalidLanguageCode(_))
                ),
                "code {code:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_languages_rejects_duplicates() {
        let languages = vec![
            Language::new("en", "English").as_default(),
            Language::new("en", "English again"),
        ];
        assert!(matches!(
            validate_languages(&languages),
            Err(ConfigError::DuplicateLanguage(code)) if code == "en"
        ));
    }

    #[test]
    fn validate_rejects_escaping_output_root() {
        let config = SiteConfig {
            output_root: "../site".into(),
            ..SiteConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let config = SiteConfig {
            processing: ProcessingConfig {
                max_processes: Some(0),
            },
            ..SiteConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn catalog_config_maps_to_options() {
        let config = CatalogConfig {
            duplicates: DuplicatePolicy::Last,
            infer_from_slugs: true,
        };
        let options = config.options();
        assert_eq!(options.duplicates, DuplicatePolicy::Last);
        assert!(options.infer_from_slugs);
    }

    // =========================================================================
    // Threads
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // Merging and loading
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[catalog]
duplicates = "first"
infer_from_slugs = false
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[catalog]\ninfer_from_slugs = true").unwrap();
        let merged = merge_toml(base, overlay);
        let catalog = merged.get("catalog").unwrap();
        assert_eq!(catalog.get("duplicates").unwrap().as_str(), Some("first"));
        assert_eq!(catalog.get("infer_from_slugs").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_replaces_language_list() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[[languages]]
code = "zh-cn"
name = "中文"
default = true
"#,
        )
        .unwrap();
        let config = resolve_config(base, Some(overlay)).unwrap();
        assert_eq!(config.languages.len(), 1);
        assert_eq!(config.languages[0].code, "zh-cn");
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("wikifold.toml")).unwrap();
        assert_eq!(config.output_root, "docs");
        assert_eq!(config.languages.len(), 1);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wikifold.toml");
        fs::write(
            &path,
            r#"
output_root = "site"
source_url = "https://deepwiki.com/tokio-rs/tokio"

[[languages]]
code = "en"
name = "English"
default = true

[[languages]]
code = "zh-cn"
name = "中文"

[routing]
bare_aliases = true
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.output_root, "site");
        assert_eq!(config.source_url(), Some("https://deepwiki.com/tokio-rs/tokio"));
        assert_eq!(config.languages.len(), 2);
        assert!(config.routing.bare_aliases);
        assert_eq!(config.site_name, "Documentation");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wikifold.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_runs_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wikifold.toml");
        fs::write(
            &path,
            r#"
[[languages]]
code = "en"
name = "English"
"#,
        )
        .unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::NoDefaultLanguage)
        ));
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.output_root, defaults.output_root);
        assert_eq!(config.site_name, defaults.site_name);
        assert_eq!(config.languages, defaults.languages);
        assert_eq!(config.catalog.duplicates, defaults.catalog.duplicates);
        assert_eq!(config.extract.flight_marker, defaults.extract.flight_marker);
        assert!(config.extract.markdown_fragments);
        assert_eq!(config.processing.max_processes, None);
        config.validate().unwrap();
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[[languages]]", "[catalog]", "[extract]", "[routing]", "[processing]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }
}
