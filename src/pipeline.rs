//! End-to-end driver: raw blobs → extraction → catalog → navigation → site.
//!
//! Extraction of independent blobs runs in parallel on the rayon pool and is
//! collected back in source order, so the single-threaded catalog build
//! sees records in the same order on every run regardless of scheduling.
//! Warnings from all stages are accumulated in stage order.

use crate::catalog::{Catalog, CatalogBuild, CatalogBuilder};
use crate::config::{ConfigError, SiteConfig};
use crate::extract::{Extraction, Extractor};
use crate::navigation::{self, Navigation};
use crate::project::{ProjectError, ProjectOptions, SiteManifest, project};
use crate::source::RawPage;
use crate::types::{NavNode, Warning};
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// Projection failed; carries the warnings collected before it.
    #[error("{error}")]
    Project {
        #[source]
        error: ProjectError,
        warnings: Vec<Warning>,
    },
}

impl PipelineError {
    /// Warnings collected before the failure, if any.
    pub fn warnings(&self) -> &[Warning] {
        match self {
            PipelineError::Project { warnings, .. } => warnings,
            PipelineError::Config(_) => &[],
        }
    }
}

/// Everything a full run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    pub catalog: Catalog,
    pub navigation: Vec<NavNode>,
    pub manifest: SiteManifest,
    pub warnings: Vec<Warning>,
}

/// Extract every blob in parallel. Results keep the order of `sources`.
pub fn extract_all(sources: &[RawPage], extractor: &Extractor) -> Vec<Extraction> {
    sources
        .par_iter()
        .map(|page| extractor.extract(&page.slug, &page.text))
        .collect()
}

/// Extract all blobs and fold the records into a catalog.
pub fn build_catalog(sources: &[RawPage], config: &SiteConfig) -> CatalogBuild {
    let extractions = extract_all(sources, &config.extract.extractor());
    let mut builder = CatalogBuilder::new(config.catalog.options());
    for (page, extraction) in sources.iter().zip(extractions) {
        builder.add_extraction(&page.slug, extraction);
    }
    builder.finish()
}

/// Run the whole pipeline over in-memory sources.
pub fn run(sources: &[RawPage], config: &SiteConfig) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    info!(sources = sources.len(), "pipeline started");

    let CatalogBuild {
        catalog,
        mut warnings,
    } = build_catalog(sources, config);

    let Navigation {
        roots,
        warnings: nav_warnings,
    } = navigation::compose(&catalog);
    warnings.extend(nav_warnings);

    let manifest = match project(&catalog, &roots, &ProjectOptions::from_config(config)) {
        Ok(manifest) => manifest,
        Err(error) => return Err(PipelineError::Project { error, warnings }),
    };

    info!(
        pages = catalog.len(),
        files = manifest.files().count(),
        warnings = warnings.len(),
        "pipeline finished"
    );
    Ok(PipelineOutput {
        catalog,
        navigation: roots,
        manifest,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(records: &[(&str, &str)]) -> String {
        let mut out = String::from("<html><script>");
        for (path, content) in records {
            out.push_str(&format!(
                r#"push({{"path":"{path}","title":"{path}","content":"{content}"}});"#
            ));
        }
        out.push_str("</script></html>");
        out
    }

    #[test]
    fn extraction_keeps_source_order() {
        let sources: Vec<RawPage> = (0..50)
            .map(|i| RawPage::new(format!("p{i:02}"), blob(&[(&format!("page-{i:02}"), "x")])))
            .collect();
        let extractions = extract_all(&sources, &Extractor::raw_only());
        for (i, extraction) in extractions.iter().enumerate() {
            let path = extraction.records[0].text(&["path"]).unwrap();
            assert_eq!(path, format!("page-{i:02}"));
        }
    }

    #[test]
    fn run_accumulates_warnings_in_stage_order() {
        let sources = vec![
            RawPage::new("a", r#"{"path":"child","parent":"ghost","content":"c"} {"path":"x""#),
            RawPage::new("b", blob(&[("child", "again")])),
        ];
        let output = run(&sources, &SiteConfig::default()).unwrap();
        let kinds: Vec<&str> = output
            .warnings
            .iter()
            .map(|w| match w {
                Warning::MalformedSpan { .. } => "span",
                Warning::DuplicatePage { .. } => "duplicate",
                Warning::OrphanReference { .. } => "orphan",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["span", "duplicate", "orphan"]);
        assert_eq!(output.navigation.len(), 1);
    }

    #[test]
    fn empty_catalog_keeps_warnings() {
        let sources = vec![RawPage::new("a", r#"<p>nothing</p> {"path":"cut"#)];
        let err = run(&sources, &SiteConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Project {
                error: ProjectError::EmptyCatalog,
                ..
            }
        ));
        assert_eq!(err.warnings().len(), 1);
    }

    #[test]
    fn invalid_config_is_rejected_before_extraction() {
        let config = SiteConfig {
            languages: vec![],
            ..SiteConfig::default()
        };
        let err = run(&[], &config).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::NoLanguages)));
    }
}
