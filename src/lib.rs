//! wprdc: cached, self-refreshing tables from CKAN open-data catalogs.
//!
//! A [`Dataset`] names one resource of a catalog package (for example the
//! `"2011 Crash Data"` resource of a crash-data package on the Western
//! Pennsylvania Regional Data Center), loads it as a [`Table`], and can keep a
//! local cache file and a background refresh task in step with the catalog.
//!
//! # Modules
//!
//! - [`catalog`]: CKAN `package_show` resolution and resource download
//! - [`table`]: In-memory table and CSV reading/writing
//! - [`cache`]: Cache file format
//! - [`dataset`]: The dataset handle, its loading policy and refresh task
//! - [`inspect`]: Snapshot summaries for the CLI
//! - [`error`]: Error types

pub mod cache;
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod inspect;
pub mod table;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

pub use catalog::{CatalogClient, CatalogConfig, Resource};
pub use dataset::{Dataset, DatasetOptions, RefreshOutcome, Snapshot};
pub use error::DatasetError;
pub use table::Table;

/// The wprdc CLI application.
#[derive(Parser)]
#[command(name = "wprdc")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the CKAN catalog.
    #[arg(long, global = true, env = "WPRDC_CATALOG_URL", default_value = catalog::DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Timeout in seconds for catalog requests and for starting a download.
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List the resources of a catalog package.
    Resources(ResourcesArgs),
    /// Load a resource and report on it.
    Fetch(FetchArgs),
    /// Keep a resource loaded and refresh it when the catalog changes.
    Watch(WatchArgs),
    /// Report on a cache file without contacting the catalog.
    InspectCache(InspectCacheArgs),
}

#[derive(clap::Args)]
struct ResourcesArgs {
    /// Package name, as in https://data.wprdc.org/dataset/<name>.
    name: String,
}

/// Arguments shared by commands that open a dataset.
#[derive(clap::Args)]
struct OpenArgs {
    /// Package name, as in https://data.wprdc.org/dataset/<name>.
    name: String,

    /// Resource name within the package, e.g. '2011 Crash Data'.
    sub_package: String,

    /// Read and write a local cache file.
    #[arg(long)]
    cache: bool,

    /// Ignore an existing cache file and fetch from the catalog.
    #[arg(long, requires = "cache")]
    force_load: bool,

    /// Directory for cache files.
    #[arg(long, requires = "cache")]
    cache_dir: Option<PathBuf>,
}

#[derive(clap::Args)]
struct FetchArgs {
    #[command(flatten)]
    open: OpenArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct WatchArgs {
    #[command(flatten)]
    open: OpenArgs,

    /// Seconds between catalog checks.
    #[arg(long)]
    refresh: u64,
}

#[derive(clap::Args)]
struct InspectCacheArgs {
    /// Cache file to inspect.
    path: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// Run the wprdc CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), DatasetError> {
    let cli = Cli::parse();

    let config = CatalogConfig {
        base_url: cli.catalog_url,
        timeout: Duration::from_secs(cli.timeout),
        ..CatalogConfig::default()
    };

    match cli.command {
        Some(Commands::Resources(args)) => run_resources(&config, args),
        Some(Commands::Fetch(args)) => run_fetch(&config, args),
        Some(Commands::Watch(args)) => run_watch(&config, args),
        Some(Commands::InspectCache(args)) => run_inspect_cache(args),
        None => {
            println!("wprdc {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Cached, self-refreshing tables from CKAN open-data catalogs.");
            println!();
            println!("Run 'wprdc --help' for usage information.");
            Ok(())
        }
    }
}

fn run_resources(config: &CatalogConfig, args: ResourcesArgs) -> Result<(), DatasetError> {
    let client = CatalogClient::new(config)?;
    let resources = client.package_resources(&args.name)?;

    for resource in &resources {
        println!(
            "{:<40} {:<8} {}",
            resource.name,
            resource.format,
            resource.last_modified.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn open_dataset(
    config: &CatalogConfig,
    args: OpenArgs,
    refresh: Duration,
) -> Result<Dataset, DatasetError> {
    let client = CatalogClient::new(config)?;
    let options = DatasetOptions {
        refresh,
        cache: args.cache,
        force_load: args.force_load,
        cache_dir: args.cache_dir,
    };
    Dataset::open_with(client, args.name, args.sub_package, options)
}

fn run_fetch(config: &CatalogConfig, args: FetchArgs) -> Result<(), DatasetError> {
    let dataset = open_dataset(config, args.open, Duration::ZERO)?;
    let snapshot = dataset.snapshot();
    let source = format!("{} / {}", dataset.name(), dataset.sub_package());
    print_snapshot(&snapshot, source, args.output)
}

fn run_watch(config: &CatalogConfig, args: WatchArgs) -> Result<(), DatasetError> {
    if args.refresh == 0 {
        return Err(DatasetError::InvalidArgument(
            "--refresh must be at least 1 second".to_string(),
        ));
    }

    let interval = Duration::from_secs(args.refresh);
    let dataset = open_dataset(config, args.open, interval)?;

    let mut current = dataset.snapshot();
    info!(
        rows = current.table.len(),
        last_updated = %current.last_updated,
        "watching {} / {}",
        dataset.name(),
        dataset.sub_package()
    );

    loop {
        std::thread::sleep(interval.min(Duration::from_secs(1)));
        let latest = dataset.snapshot();
        if !Arc::ptr_eq(&current, &latest) {
            info!(
                rows = latest.table.len(),
                last_updated = %latest.last_updated,
                "new snapshot"
            );
            current = latest;
        }
    }
}

fn run_inspect_cache(args: InspectCacheArgs) -> Result<(), DatasetError> {
    let snapshot = cache::read_cache(&args.path)?;
    print_snapshot(&snapshot, args.path.display().to_string(), args.output)
}

fn print_snapshot(
    snapshot: &Snapshot,
    source: String,
    output: OutputFormat,
) -> Result<(), DatasetError> {
    match output {
        OutputFormat::Csv => {
            print!("{}", table::to_csv_string(&snapshot.table)?);
        }
        OutputFormat::Json => {
            let report =
                inspect::inspect_snapshot(snapshot, source, &inspect::InspectOptions::default());
            let json =
                serde_json::to_string_pretty(&report).map_err(DatasetError::ReportSerialize)?;
            println!("{json}");
        }
        OutputFormat::Text => {
            let report =
                inspect::inspect_snapshot(snapshot, source, &inspect::InspectOptions::default());
            print!("{report}");
        }
    }
    Ok(())
}
