use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wikifold::{config, materialize, output, pipeline, source};

#[derive(Parser)]
#[command(name = "wikifold")]
#[command(about = "Fold crawled wiki pages into a multilingual docsify site")]
#[command(long_about = "\
Fold crawled wiki pages into a multilingual docsify site

The source directory holds one raw blob per crawled page. Page records are
recovered from the embedded data, deduplicated, arranged into a navigation
tree and written out once per configured language.

Source structure:

  raw/
  ├── 1-overview.html              # One crawled page (any of html, htm, txt, js, json)
  ├── 2-getting-started.html
  ├── 2.1-installation.html        # Section numbers order the navigation
  └── api/
      └── 3-reference.html

Output structure:

  docs/
  ├── index.html                   # docsify entry page
  ├── _sidebar.md                  # Language selector
  ├── .nojekyll
  ├── en/
  │   ├── README.md                # Language home
  │   ├── _sidebar.md              # Navigation tree
  │   └── pages/1-overview.md
  └── zh-cn/
      └── ...

Run 'wikifold gen-config' to generate a documented wikifold.toml.")]
#[command(version)]
struct Cli {
    /// Directory of crawled page blobs
    #[arg(long, default_value = "raw", global = true)]
    source: PathBuf,

    /// Config file (stock defaults are used if it does not exist)
    #[arg(long, default_value = "wikifold.toml", global = true)]
    config: PathBuf,

    /// Directory for intermediate files (catalog.json)
    #[arg(long, default_value = ".wikifold-temp", global = true)]
    temp_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract page records into a catalog
    Extract,
    /// Run the full pipeline and write the site
    Build {
        /// Output directory (defaults to output_root from the config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the full pipeline without writing anything
    Check,
    /// Print a stock wikifold.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Extract => {
            let site_config = config::load_config(&cli.config)?;
            init_thread_pool(&site_config.processing);
            let sources = source::read_sources(&cli.source)?;
            let build = pipeline::build_catalog(&sources, &site_config);

            std::fs::create_dir_all(&cli.temp_dir)?;
            let catalog_path = cli.temp_dir.join("catalog.json");
            let json = serde_json::to_string_pretty(&build.catalog)?;
            std::fs::write(&catalog_path, json)?;

            output::print_extract_output(&build.catalog);
            output::print_warnings(&build.warnings);
        }
        Command::Build { output: out } => {
            let site_config = config::load_config(&cli.config)?;
            init_thread_pool(&site_config.processing);

            println!("==> Stage 1: Reading {}", cli.source.display());
            let sources = source::read_sources(&cli.source)?;

            println!("==> Stage 2: Extracting and projecting {} blobs", sources.len());
            let result = pipeline::run(&sources, &site_config)?;
            output::print_navigation(&result.navigation);
            output::print_warnings(&result.warnings);

            let dest = out.unwrap_or_else(|| PathBuf::from(&result.manifest.output_root));
            println!("==> Stage 3: Writing site \u{2192} {}", dest.display());
            materialize::write_site(&result.manifest, &dest)?;
            output::print_build_output(&result.manifest);

            println!("==> Build complete: {}", dest.display());
        }
        Command::Check => {
            let site_config = config::load_config(&cli.config)?;
            init_thread_pool(&site_config.processing);
            println!("==> Checking {}", cli.source.display());
            let sources = source::read_sources(&cli.source)?;
            let result = pipeline::run(&sources, &site_config)?;
            output::print_navigation(&result.navigation);
            output::print_warnings(&result.warnings);
            println!("Fingerprint: {}", result.manifest.fingerprint());
            println!("==> Sources are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
