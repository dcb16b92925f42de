#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the tax-sale extraction tool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tax_sale_geocoder::nominatim::NominatimClient;
use tax_sale_geocoder::service_registry::nominatim_service;
use tax_sale_ingest::adapters::{HttpFetcher, NominatimGeocoder};
use tax_sale_ingest::enabled_municipalities;
use tax_sale_ingest::models::PipelineSettings;
use tax_sale_ingest::pipeline::{PipelineContext, default_chain, document_text, extract_records, run_all};
use tax_sale_ingest::store::InMemoryStore;
use tax_sale_scraper::RawDocument;
use tax_sale_scraper::acquire::{DocumentAcquirer, HeaderProfile};
use tax_sale_source::ConfigProvider;
use tax_sale_source::parsing::sale_meta::enrich;
use tax_sale_source::registry::EmbeddedConfigProvider;

#[derive(Parser)]
#[command(name = "tax_sale_ingest", about = "Municipal tax-sale extraction tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured municipalities
    Municipalities,
    /// Extract listings and persist them into the record store
    Run {
        /// Comma-separated list of municipality IDs to run (overrides
        /// `TAX_SALE_MUNICIPALITIES` env var)
        #[arg(long)]
        municipalities: Option<String>,
        /// JSON snapshot file backing the record store
        #[arg(long, default_value = "tax_sale_records.json")]
        store: PathBuf,
        /// JSON file with pipeline settings; missing fields take defaults
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Skip geocoding
        #[arg(long)]
        no_geocode: bool,
    },
    /// Parse a local PDF or HTML file and print the records as JSON
    Parse {
        /// Path to the document
        file: PathBuf,
        /// Municipality whose rules to apply (e.g., "`victoria_county`")
        #[arg(long)]
        municipality: String,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Result<PipelineSettings, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(PipelineSettings::default());
    };
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let provider = EmbeddedConfigProvider::from_env()?;

    match cli.command {
        Commands::Municipalities => {
            println!("{:<20} {:<16} NAME", "ID", "FORMAT");
            println!("{}", "-".repeat(70));
            for m in provider.all() {
                println!("{:<20} {:<16} {}", m.id, m.format.name(), m.name);
            }
        }
        Commands::Run {
            municipalities,
            store,
            settings,
            no_geocode,
        } => {
            let mut settings = load_settings(settings.as_ref())?;
            if no_geocode {
                settings.geocode = false;
            }

            let definitions = enabled_municipalities(&provider, municipalities);
            if definitions.is_empty() {
                return Ok(());
            }
            log::info!(
                "Running {} municipality(ies): {}",
                definitions.len(),
                definitions
                    .iter()
                    .map(|d| d.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let store = Arc::new(InMemoryStore::open(&store)?);
            let fetcher = HttpFetcher::new(
                DocumentAcquirer::new(settings.fetch_timeout())?,
                HeaderProfile::browser(),
            );

            let geocoder = if settings.geocode {
                let service = nominatim_service()?;
                settings.geocode_interval_ms = settings.geocode_interval_ms.max(service.rate_limit_ms);
                Some(NominatimGeocoder::new(
                    NominatimClient::new(&service)?,
                    settings.geocode_region_suffix.clone(),
                ))
            } else {
                None
            };

            let mut ctx = PipelineContext::new(Arc::new(fetcher), store.clone(), settings);
            if let Some(geocoder) = geocoder {
                ctx = ctx.with_geocoder(Arc::new(geocoder));
            }

            let start = Instant::now();
            let results = run_all(&ctx, &definitions).await;
            store.save().await?;

            println!(
                "{:<20} {:>6} {:>6} {:>9} {:>8} {:>8} {:>9} {:>9}  STRATEGY",
                "MUNICIPALITY", "FOUND", "DUPES", "INACTIVE", "EXPIRED", "SKIPPED", "GEOCODED", "PERSISTED"
            );
            let mut failed = 0;
            for (id, result) in &results {
                match result {
                    Ok(run) => {
                        let c = &run.counts;
                        println!(
                            "{:<20} {:>6} {:>6} {:>9} {:>8} {:>8} {:>9} {:>9}  {}",
                            id,
                            c.found,
                            c.deduplicated,
                            c.reconciled_inactive,
                            c.expired,
                            c.skipped_candidates,
                            c.geocoded,
                            c.persisted,
                            run.strategies.join(",")
                        );
                        if run.warning_count() > 0 {
                            log::warn!("{id}: {} warning(s)", run.warning_count());
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        println!("{id:<20} FAILED: {e}");
                    }
                }
            }

            log::info!(
                "Run complete: {} succeeded, {failed} failed, took {:.1}s",
                results.len() - failed,
                start.elapsed().as_secs_f64()
            );
        }
        Commands::Parse { file, municipality } => {
            let definition = provider.municipality(&municipality)?;
            let bytes = std::fs::read(&file)?;
            let document = RawDocument::from_bytes(&file.display().to_string(), None, bytes);
            let content = document_text(&document);
            let sale = enrich(None, document.filename(), content.as_deref());

            let extraction = extract_records(&default_chain(), &document, definition, sale, Utc::now())?;
            log::info!(
                "{} record(s) via {}, {} candidate(s) skipped",
                extraction.records.len(),
                extraction.strategy,
                extraction.skipped
            );
            for d in &extraction.diagnostics {
                log::warn!(
                    "{}: {}",
                    d.assessment_number.as_deref().unwrap_or("-"),
                    d.message
                );
            }
            println!("{}", serde_json::to_string_pretty(&extraction.records)?);
        }
    }

    Ok(())
}
