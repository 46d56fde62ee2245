//! Precinct ingestion orchestrator - runs populate and export pipelines

use anyhow::{Context, Result};
use precinct_geo::ingestion::geocode::{GeocoderSettings, GoogleGeocoder, GOOGLE_GEOCODING_ENDPOINT};
use precinct_geo::ingestion::{
    enrich, fetch, parse, write, ExportStats, PopulateStats, PrecinctTable, TableSchema,
};
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PREVIEW_ROWS: usize = 10;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG from it reaches the filter
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(false)
        .init();

    info!("Starting precinct ingestion pipeline");

    // Load configuration from environment
    let config = Config::from_env()?;
    info!("Configuration loaded");

    // Stages from command line args, default is the export run
    let args: Vec<String> = env::args().skip(1).collect();
    let stages = parse_stages(&args)?;

    for stage in stages {
        match stage {
            Stage::Populate => {
                let stats = run_populate(&config).await?;
                info!("✓ populate completed: {}", stats);
            }
            Stage::Export => {
                let stats = run_export(&config).await?;
                info!("✓ export completed: {}", stats);
            }
        }
    }

    info!("Precinct ingestion pipeline complete");

    Ok(())
}

/// RUST_LOG as currently set, `info` otherwise
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Populate,
    Export,
}

/// Validate every stage name before running any of them
fn parse_stages(args: &[String]) -> Result<Vec<Stage>> {
    if args.is_empty() {
        return Ok(vec![Stage::Export]);
    }

    args.iter()
        .map(|arg| match arg.as_str() {
            "populate" => Ok(Stage::Populate),
            "export" => Ok(Stage::Export),
            other => Err(anyhow::anyhow!(
                "Unknown stage: {} (expected populate or export)",
                other
            )),
        })
        .collect()
}

async fn extract(config: &Config) -> Result<PrecinctTable> {
    let schema = match &config.schema_path {
        Some(path) => fetch::load_schema(path).await?,
        None => TableSchema::default(),
    };

    let input = config.input_html.as_str();
    let raw_data = if input.starts_with("http://") || input.starts_with("https://") {
        fetch::fetch_html(input).await
    } else {
        fetch::load_html(Path::new(input)).await
    }
    .with_context(|| format!("Failed to read {}", input))?;
    let table = parse::parse_precinct_table(raw_data, &schema).await?;

    info!("✓ Parsed {} precincts", table.records.len());
    write::log_preview(&table.records, PREVIEW_ROWS);

    Ok(table)
}

/// Geocode every precinct address and rebuild the cache
async fn run_populate(config: &Config) -> Result<PopulateStats> {
    info!("=== Geocode Populate Pipeline ===");

    let api_key = config
        .api_key
        .clone()
        .context("GOOGLE_GEOCODING_API_KEY must be set for populate")?;

    let mut settings = GeocoderSettings::new(api_key);
    settings.endpoint = config.geocoding_endpoint.clone();
    settings.region = config.geocoding_region.clone();
    let geocoder = GoogleGeocoder::new(settings)?;

    // Step 1: Extract
    info!("Step 1/2: Parsing table...");
    let table = extract(config).await?;

    // Step 2: Query geocoder and write cache
    info!("Step 2/2: Geocoding addresses...");
    let stats = enrich::resolve_and_cache(
        &table.records,
        &geocoder,
        &config.locality_suffix,
        &config.cache_path,
    )
    .await?;
    info!("✓ Cache written to {:?}", config.cache_path);

    Ok(stats)
}

/// Join cached coordinates and write the CSV
async fn run_export(config: &Config) -> Result<ExportStats> {
    info!("=== Export Pipeline ===");

    // Step 1: Extract
    info!("Step 1/3: Parsing table...");
    let table = extract(config).await?;

    // Step 2: Join
    info!("Step 2/3: Joining cached coordinates...");
    let records = enrich::join_from_cache(table.records, &config.cache_path, &config.locality_suffix)
        .with_context(|| format!("Geocode join against {:?} failed", config.cache_path))?;
    write::log_preview(&records, PREVIEW_ROWS);
    let table = PrecinctTable { records, ..table };

    // Step 3: Write CSV
    info!("Step 3/3: Writing CSV...");
    let stats = write::export_csv(&config.output_csv, &table)?;
    info!("✓ Write complete");

    Ok(stats)
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
struct Config {
    /// Path or http(s) URL
    input_html: String,
    cache_path: PathBuf,
    output_csv: PathBuf,
    locality_suffix: String,
    schema_path: Option<PathBuf>,
    api_key: Option<String>,
    geocoding_endpoint: String,
    geocoding_region: Option<String>,
}

impl Config {
    fn from_env() -> Result<Self> {
        let config = Config {
            input_html: env::var("INPUT_HTML")
                .unwrap_or_else(|_| "./data/wahlen17.html".to_string()),

            cache_path: env::var("GEOCODE_CACHE")
                .unwrap_or_else(|_| "data/geocode-results.json".to_string())
                .into(),

            output_csv: env::var("OUTPUT_CSV")
                .unwrap_or_else(|_| "wahlen17_hn_geo.csv".to_string())
                .into(),

            locality_suffix: env::var("LOCALITY_SUFFIX").unwrap_or_else(|_| "Heilbronn".to_string()),

            schema_path: env::var("TABLE_SCHEMA").ok().map(PathBuf::from),

            api_key: env::var("GOOGLE_GEOCODING_API_KEY").ok(),

            geocoding_endpoint: env::var("GEOCODING_ENDPOINT")
                .unwrap_or_else(|_| GOOGLE_GEOCODING_ENDPOINT.to_string()),

            geocoding_region: env::var("GEOCODING_REGION").ok(),
        };

        if config.locality_suffix.trim().is_empty() {
            anyhow::bail!("LOCALITY_SUFFIX must not be empty");
        }

        Ok(config)
    }
}
