//! Extraction run orchestration.
//!
//! One run takes a municipality from its listing page to persisted
//! records: discover documents, fetch them, extract candidates through
//! the strategy chain, parse, deduplicate, reconcile, geocode, upsert.
//! Runs for different municipalities share nothing but the context, so
//! [`run_all`] drives them concurrently.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tax_sale_ingest_models::{Diagnostic, ExtractionRunResult, PipelineSettings, RunCounts};
use tax_sale_property_models::PropertyRecord;
use tax_sale_scraper::chain::StrategyChain;
use tax_sale_scraper::html_table::HtmlTableStrategy;
use tax_sale_scraper::html_text::HtmlTextStrategy;
use tax_sale_scraper::links::{discover_document_links, page_text};
use tax_sale_scraper::{ChainError, DocumentKind, RawDocument};
use tax_sale_source::municipality::MunicipalityDefinition;
use tax_sale_source::parsing::sale_meta::{SaleMetadata, enrich};
use tax_sale_source::parsing::{build_record, parse_candidate};
use tokio::sync::Mutex;

use crate::RunError;
use crate::adapters::{DocumentFetcher, GeocodingAdapter, PersistenceAdapter};
use crate::dedupe::dedupe;
use crate::reconcile::{expire_batch, reconcile};
use crate::retry::fetch_with_retry;

/// The full strategy chain: PDF strategies first, then HTML.
#[must_use]
pub fn default_chain() -> StrategyChain {
    StrategyChain::new()
        .with_all(tax_sale_pdf::pdf_strategies())
        .with(Box::new(HtmlTableStrategy))
        .with(Box::new(HtmlTextStrategy))
}

/// Collaborators and settings shared by every run.
pub struct PipelineContext {
    /// Document source.
    pub fetcher: Arc<dyn DocumentFetcher>,
    /// Record store.
    pub persistence: Arc<dyn PersistenceAdapter>,
    /// Geocoder, if geocoding is available.
    pub geocoder: Option<Arc<dyn GeocodingAdapter>>,
    /// Extraction strategies in priority order.
    pub chain: StrategyChain,
    /// Run settings.
    pub settings: PipelineSettings,
    last_geocode: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("chain", &self.chain)
            .field("settings", &self.settings)
            .field("geocoder", &self.geocoder.is_some())
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    /// Creates a context with the default chain and no geocoder.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        persistence: Arc<dyn PersistenceAdapter>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            persistence,
            geocoder: None,
            chain: default_chain(),
            settings,
            last_geocode: Mutex::new(None),
        }
    }

    /// Sets the geocoder.
    #[must_use]
    pub fn with_geocoder(mut self, geocoder: Arc<dyn GeocodingAdapter>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Replaces the strategy chain.
    #[must_use]
    pub fn with_chain(mut self, chain: StrategyChain) -> Self {
        self.chain = chain;
        self
    }

    /// Geocodes one address, waiting out the throttle interval first.
    ///
    /// The interval holds across every run sharing this context.
    async fn geocode_throttled(&self, geocoder: &dyn GeocodingAdapter, address: &str) -> Option<(f64, f64)> {
        let mut last = self.last_geocode.lock().await;
        if let Some(previous) = *last {
            let wait = self.settings.geocode_interval().saturating_sub(previous.elapsed());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
        geocoder.geocode(address).await
    }
}

// ── Single-document extraction ────────────────────────────────────────

/// Records extracted from one document.
#[derive(Debug, Clone)]
pub struct DocumentExtraction {
    /// Strategy that produced the candidates.
    pub strategy: &'static str,
    /// Parsed records, in candidate order.
    pub records: Vec<PropertyRecord>,
    /// Candidates with no assessment number.
    pub skipped: usize,
    /// Field warnings, one diagnostic per warning.
    pub diagnostics: Vec<Diagnostic>,
}

/// Plain text of a document, used for sale metadata.
#[must_use]
pub fn document_text(document: &RawDocument) -> Option<String> {
    match document.kind {
        DocumentKind::Pdf => match tax_sale_pdf::extract_full_text(&document.bytes) {
            Ok(text) => Some(text),
            Err(e) => {
                log::debug!("No text from {}: {e}", document.url);
                None
            }
        },
        DocumentKind::Html => Some(page_text(&document.text())),
        DocumentKind::Unknown => None,
    }
}

/// Runs the chain over one document and parses every candidate.
///
/// # Errors
///
/// Returns [`ChainError::NoExtractionPossible`] if no strategy produced
/// candidates.
pub fn extract_records(
    chain: &StrategyChain,
    document: &RawDocument,
    definition: &MunicipalityDefinition,
    sale: SaleMetadata,
    now: DateTime<Utc>,
) -> Result<DocumentExtraction, ChainError> {
    let rules = definition.rules();
    let output = chain.extract(document, &rules.hints())?;

    let mut extraction = DocumentExtraction {
        strategy: output.strategy,
        records: Vec::with_capacity(output.candidates.len()),
        skipped: 0,
        diagnostics: Vec::new(),
    };

    for candidate in &output.candidates {
        let fields = parse_candidate(candidate, rules);
        let Some(mut record) = build_record(
            fields,
            &definition.id,
            sale,
            rules.default_auction_type,
            now,
        ) else {
            log::debug!(
                "{}: no assessment number in {} row {}",
                definition.id,
                candidate.provenance.strategy,
                candidate.provenance.row
            );
            extraction.skipped += 1;
            continue;
        };

        record.source_url = Some(document.url.clone());
        for warning in &record.warnings {
            extraction
                .diagnostics
                .push(Diagnostic::warning(warning.to_string()).for_record(&record.assessment_number));
        }
        extraction.records.push(record);
    }

    Ok(extraction)
}

// ── Full run ──────────────────────────────────────────────────────────

/// Documents to extract, plus the listing page text if there was one.
struct Acquired {
    listing_text: Option<String>,
    documents: Vec<RawDocument>,
}

async fn acquire_documents(
    ctx: &PipelineContext,
    definition: &MunicipalityDefinition,
) -> Result<Acquired, RunError> {
    let mut urls: Vec<String> = Vec::new();
    let mut listing_text = None;
    let mut listing_fallback = None;

    if let Some(listing_url) = &definition.listing_url {
        let listing = fetch_with_retry(ctx.fetcher.as_ref(), listing_url, &ctx.settings).await?;
        let html = listing.text().into_owned();
        let links = discover_document_links(
            &html,
            &listing.url,
            &definition.rules().document_link_patterns,
            definition.max_documents,
        );
        log::info!(
            "{}: {} document link(s) on {listing_url}",
            definition.id,
            links.len()
        );
        urls.extend(links.into_iter().map(|l| l.url));
        listing_text = Some(page_text(&html));
        listing_fallback = Some(listing);
    }

    for url in &definition.document_urls {
        if !urls.contains(url) {
            urls.push(url.clone());
        }
    }

    let mut documents = Vec::with_capacity(urls.len());
    for url in &urls {
        documents.push(fetch_with_retry(ctx.fetcher.as_ref(), url, &ctx.settings).await?);
    }

    if documents.is_empty()
        && let Some(listing) = listing_fallback
    {
        log::info!(
            "{}: no document links, extracting the listing page itself",
            definition.id
        );
        documents.push(listing);
    }

    Ok(Acquired {
        listing_text,
        documents,
    })
}

/// Runs a full extraction for one municipality.
///
/// # Errors
///
/// Returns [`RunError::Fetch`] if a document cannot be fetched,
/// [`RunError::NoExtractionPossible`] if no document yielded candidates,
/// and [`RunError::Persistence`] if the store fails.
#[allow(clippy::too_many_lines)]
pub async fn run_extraction(
    ctx: &PipelineContext,
    definition: &MunicipalityDefinition,
) -> Result<ExtractionRunResult, RunError> {
    let start = Instant::now();
    let now = Utc::now();
    log::info!("Extracting: {} ({})", definition.name, definition.id);

    let mut counts = RunCounts::default();
    let mut diagnostics = Vec::new();
    let mut strategies = Vec::new();
    let mut records = Vec::new();
    let mut last_chain_error = None;
    let mut failed_documents = 0usize;

    let acquired = acquire_documents(ctx, definition).await?;

    for document in &acquired.documents {
        let content = document_text(document);
        let sale = enrich(
            acquired.listing_text.as_deref(),
            document.filename(),
            content.as_deref(),
        );

        match extract_records(&ctx.chain, document, definition, sale, now) {
            Ok(extraction) => {
                log::info!(
                    "{}: {} record(s) from {} via {}",
                    definition.id,
                    extraction.records.len(),
                    document.url,
                    extraction.strategy
                );
                strategies.push(extraction.strategy.to_owned());
                counts.skipped_candidates += extraction.skipped;
                diagnostics.extend(extraction.diagnostics);
                records.extend(extraction.records);
            }
            Err(e) => {
                log::warn!("{}: {e}", definition.id);
                diagnostics.push(Diagnostic::warning(e.to_string()));
                failed_documents += 1;
                last_chain_error = Some(e);
            }
        }
    }

    if strategies.is_empty() {
        return Err(match last_chain_error {
            Some(e) => RunError::NoExtractionPossible(e),
            None => RunError::NoDocuments(definition.id.clone()),
        });
    }

    counts.found = records.len();
    let (mut records, collisions) = dedupe(records);
    counts.deduplicated = collisions.len();
    for c in &collisions {
        diagnostics.push(
            Diagnostic::info(format!(
                "duplicate row replaced ('{}' -> '{}')",
                c.dropped_address.as_deref().unwrap_or_default(),
                c.kept_address.as_deref().unwrap_or_default()
            ))
            .for_record(&c.assessment_number),
        );
    }

    counts.expired = expire_batch(&mut records, now);

    let fresh: BTreeSet<String> = records.iter().map(|r| r.assessment_number.clone()).collect();
    let complete = failed_documents == 0;
    let report = reconcile(ctx.persistence.as_ref(), &definition.id, &fresh, complete, now).await?;
    counts.reconciled_inactive = report.deactivated.len();
    counts.expired += report
        .expired
        .iter()
        .filter(|aan| !fresh.contains(*aan))
        .count();
    if !complete {
        diagnostics.push(Diagnostic::warning(format!(
            "{failed_documents} document(s) yielded nothing, absent records were left active"
        )));
    } else if report.absent_rule_skipped {
        diagnostics.push(Diagnostic::warning(
            "no records extracted, absent records were left active",
        ));
    }

    if ctx.settings.geocode
        && let Some(geocoder) = &ctx.geocoder
    {
        counts.geocoded = geocode_records(ctx, geocoder.as_ref(), &mut records).await?;
    }

    for record in &records {
        if ctx.persistence.upsert(record.clone()).await? {
            counts.persisted += 1;
        }
    }

    let needs_review = records.iter().filter(|r| r.needs_review()).count();
    let duration = start.elapsed();
    log::info!(
        "Extraction complete for {}: {} found, {} duplicate(s), {} reconciled inactive, \
         {} expired, {} skipped, {} geocoded, {} persisted, {needs_review} need review, took {:.1}s",
        definition.name,
        counts.found,
        counts.deduplicated,
        counts.reconciled_inactive,
        counts.expired,
        counts.skipped_candidates,
        counts.geocoded,
        counts.persisted,
        duration.as_secs_f64()
    );

    Ok(ExtractionRunResult {
        municipality: definition.id.clone(),
        records,
        counts,
        strategies,
        diagnostics,
        duration,
    })
}

/// Fills in coordinates, reusing stored ones before asking the geocoder.
/// Returns how many records the geocoder resolved.
async fn geocode_records(
    ctx: &PipelineContext,
    geocoder: &dyn GeocodingAdapter,
    records: &mut [PropertyRecord],
) -> Result<usize, RunError> {
    let mut geocoded = 0;
    for record in records.iter_mut().filter(|r| r.coordinates().is_none()) {
        if let Some((lat, lon)) = ctx
            .persistence
            .coordinates(&record.municipality, &record.assessment_number)
            .await?
        {
            record.latitude = Some(lat);
            record.longitude = Some(lon);
            continue;
        }
        let Some(address) = record.civic_address.clone() else {
            continue;
        };
        if let Some((lat, lon)) = ctx.geocode_throttled(geocoder, &address).await {
            record.latitude = Some(lat);
            record.longitude = Some(lon);
            geocoded += 1;
        }
    }
    Ok(geocoded)
}

/// Runs every municipality concurrently. One failure never stops the
/// others; results come back in input order.
pub async fn run_all(
    ctx: &PipelineContext,
    definitions: &[MunicipalityDefinition],
) -> Vec<(String, Result<ExtractionRunResult, RunError>)> {
    let runs = definitions.iter().map(|def| async move {
        let result = run_extraction(ctx, def).await;
        if let Err(e) = &result {
            log::error!("Extraction failed for {}: {e}", def.name);
        }
        (def.id.clone(), result)
    });
    futures::future::join_all(runs).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tax_sale_property_models::AuctionType;
    use tax_sale_scraper::FetchError;
    use tax_sale_source::municipality::parse_municipality_toml;

    use super::*;
    use crate::store::InMemoryStore;

    const ROW_A: &str = "<tr><td>00254118</td><td>Donald John Beaton</td>\
        <td>Land/Dwelling, 198 Little Narrows Rd</td><td>85006500</td><td>$2,009.03</td></tr>";
    const ROW_B: &str = "<tr><td>00254126</td><td>Mary MacNeil</td>\
        <td>Land/Dwelling, 45 Water St</td><td>85006518</td><td>$1,200.00</td></tr>";

    fn page(rows: &[&str]) -> String {
        format!(
            "<html><body><h1>Tax Sale</h1><p>The sale will be held October 15, 2099.</p>\
             <table>{}</table></body></html>",
            rows.concat()
        )
    }

    #[derive(Default)]
    struct FakeWeb {
        pages: BTreeMap<String, String>,
    }

    impl FakeWeb {
        fn serve(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_owned(), html.to_owned());
            self
        }
    }

    #[async_trait::async_trait]
    impl DocumentFetcher for FakeWeb {
        async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
            self.pages.get(url).map_or_else(
                || {
                    Err(FetchError::HttpStatus {
                        url: url.to_owned(),
                        code: 404,
                    })
                },
                |html| {
                    Ok(RawDocument::from_bytes(
                        url,
                        Some("text/html".to_owned()),
                        html.as_bytes().to_vec(),
                    ))
                },
            )
        }
    }

    #[derive(Default)]
    struct FakeGeocoder {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl GeocodingAdapter for FakeGeocoder {
        async fn geocode(&self, _address: &str) -> Option<(f64, f64)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some((46.1, -60.7))
        }
    }

    const LISTING: &str = "https://example.com/tax-sale/";

    fn definition() -> MunicipalityDefinition {
        parse_municipality_toml(
            "victoria_county.toml",
            &format!(
                "id = \"victoria_county\"\nname = \"Victoria County\"\nprovince = \"NS\"\n\
                 format = \"victoria_county\"\nlisting_url = \"{LISTING}\"\nmax_documents = 3\n"
            ),
        )
        .unwrap()
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            retry_base_delay_ms: 1,
            geocode_interval_ms: 0,
            ..PipelineSettings::default()
        }
    }

    fn context(web: FakeWeb, store: Arc<InMemoryStore>, geocoder: Arc<FakeGeocoder>) -> PipelineContext {
        PipelineContext::new(Arc::new(web), store, settings()).with_geocoder(geocoder)
    }

    #[tokio::test]
    async fn listing_page_without_links_is_extracted_directly() {
        let store = Arc::new(InMemoryStore::new());
        let geocoder = Arc::new(FakeGeocoder::default());
        let web = FakeWeb::default().serve(LISTING, &page(&[ROW_A, ROW_B]));
        let ctx = context(web, store.clone(), geocoder.clone());

        let result = run_extraction(&ctx, &definition()).await.unwrap();

        assert_eq!(result.strategies, vec!["html_table".to_owned()]);
        assert_eq!(result.counts.found, 2);
        assert_eq!(result.counts.geocoded, 2);
        assert_eq!(result.counts.persisted, 2);
        let record = &result.records[0];
        assert_eq!(record.sale_date, chrono::NaiveDate::from_ymd_opt(2099, 10, 15));
        assert_eq!(record.auction_type, Some(AuctionType::PublicAuction));
        assert_eq!(record.source_url.as_deref(), Some(LISTING));
        assert_eq!(
            store
                .list_active_assessment_numbers("victoria_county")
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn rerun_reconciles_and_reuses_coordinates() {
        let store = Arc::new(InMemoryStore::new());
        let geocoder = Arc::new(FakeGeocoder::default());

        let first = context(
            FakeWeb::default().serve(LISTING, &page(&[ROW_A, ROW_B])),
            store.clone(),
            geocoder.clone(),
        );
        run_extraction(&first, &definition()).await.unwrap();

        let second = context(
            FakeWeb::default().serve(LISTING, &page(&[ROW_A])),
            store.clone(),
            geocoder.clone(),
        );
        let result = run_extraction(&second, &definition()).await.unwrap();

        assert_eq!(result.counts.reconciled_inactive, 1);
        assert_eq!(result.counts.geocoded, 0);
        assert_eq!(result.counts.persisted, 0);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
        let active = store
            .list_active_assessment_numbers("victoria_county")
            .await
            .unwrap();
        assert_eq!(active.into_iter().collect::<Vec<_>>(), vec!["00254118".to_owned()]);
    }

    #[tokio::test]
    async fn follows_document_links() {
        let store = Arc::new(InMemoryStore::new());
        let geocoder = Arc::new(FakeGeocoder::default());
        let listing = "<html><body><a href=\"/files/Tax-Sale-List.pdf\">Tax Sale List</a></body></html>";
        let web = FakeWeb::default()
            .serve(LISTING, listing)
            .serve("https://example.com/files/Tax-Sale-List.pdf", &page(&[ROW_A]));
        let ctx = context(web, store, geocoder);

        let result = run_extraction(&ctx, &definition()).await.unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.records[0].source_url.as_deref(),
            Some("https://example.com/files/Tax-Sale-List.pdf")
        );
    }

    #[tokio::test]
    async fn failed_document_does_not_deactivate_its_records() {
        const DOC_A: &str = "https://example.com/tax-sale-a.html";
        const DOC_B: &str = "https://example.com/tax-sale-b.html";
        let two_docs = parse_municipality_toml(
            "cape_breton.toml",
            &format!(
                "id = \"cape_breton\"\nname = \"Cape Breton\"\nprovince = \"NS\"\n\
                 format = \"victoria_county\"\ndocument_urls = [\"{DOC_A}\", \"{DOC_B}\"]\n"
            ),
        )
        .unwrap();
        let store = Arc::new(InMemoryStore::new());
        let geocoder = Arc::new(FakeGeocoder::default());

        let first = context(
            FakeWeb::default()
                .serve(DOC_A, &page(&[ROW_A]))
                .serve(DOC_B, &page(&[ROW_B])),
            store.clone(),
            geocoder.clone(),
        );
        run_extraction(&first, &two_docs).await.unwrap();

        let second = context(
            FakeWeb::default()
                .serve(DOC_A, &page(&[ROW_A]))
                .serve(DOC_B, "<html><body><p>layout changed</p></body></html>"),
            store.clone(),
            geocoder,
        );
        let result = run_extraction(&second, &two_docs).await.unwrap();

        assert_eq!(result.counts.reconciled_inactive, 0);
        assert!(result.warning_count() >= 2);
        let active = store.list_active_assessment_numbers("cape_breton").await.unwrap();
        assert_eq!(
            active.into_iter().collect::<Vec<_>>(),
            vec!["00254118".to_owned(), "00254126".to_owned()]
        );
    }

    #[tokio::test]
    async fn page_without_records_is_no_extraction_possible() {
        let store = Arc::new(InMemoryStore::new());
        let web = FakeWeb::default().serve(
            LISTING,
            "<html><body><p>There are no properties for sale this year.</p></body></html>",
        );
        let ctx = context(web, store, Arc::new(FakeGeocoder::default()));

        let result = run_extraction(&ctx, &definition()).await;
        assert!(matches!(result, Err(RunError::NoExtractionPossible(_))));
    }

    #[tokio::test]
    async fn one_failing_municipality_does_not_stop_the_batch() {
        let store = Arc::new(InMemoryStore::new());
        let web = FakeWeb::default().serve(LISTING, &page(&[ROW_A]));
        let ctx = context(web, store, Arc::new(FakeGeocoder::default()));

        let missing = parse_municipality_toml(
            "halifax.toml",
            "id = \"halifax\"\nname = \"Halifax\"\nprovince = \"NS\"\nformat = \"halifax\"\n\
             document_urls = [\"https://example.com/missing.pdf\"]\n",
        )
        .unwrap();

        let results = run_all(&ctx, &[missing, definition()]).await;
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].1, Err(RunError::Fetch(_))));
        assert!(results[1].1.is_ok());
    }
}
