//! Batch orchestration: resolve, fetch, extract and normalize each input
//!
//! One item's failure never stops the batch. Every outcome is reported in
//! input order, whether the items ran sequentially or on a worker pool.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::extract::extract_property;
use crate::fetch::{PageSource, RateLimiter};
use crate::input::InputRecord;
use crate::normalize::{normalize, NormalizedRecord};
use crate::property::PropertyRecord;
use crate::resolve::resolve_url;

/// A successfully processed input
#[derive(Debug, Clone)]
pub struct ResolvedProperty {
    pub input: InputRecord,
    pub property: PropertyRecord,
    pub normalized: NormalizedRecord,
}

/// Result of processing one input
#[derive(Debug)]
pub enum ItemOutcome {
    Resolved(ResolvedProperty),
    Failed {
        /// Zero-based position in the input list
        index: usize,
        input: InputRecord,
        error: ScrapeError,
    },
}

impl ItemOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ItemOutcome::Resolved(_))
    }
}

/// Outcomes of a batch run, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
    /// Set when the run stopped early on cancellation
    pub cancelled: bool,
}

impl BatchReport {
    /// Extracted records of the successful items
    pub fn properties(&self) -> impl Iterator<Item = &PropertyRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Resolved(r) => Some(&r.property),
            ItemOutcome::Failed { .. } => None,
        })
    }

    /// Normalized records of the successful items
    pub fn normalized(&self) -> Vec<NormalizedRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ItemOutcome::Resolved(r) => Some(r.normalized.clone()),
                ItemOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &InputRecord, &ScrapeError)> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Failed { index, input, error } => Some((*index, input, error)),
            ItemOutcome::Resolved(_) => None,
        })
    }

    /// Items that were attempted
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn resolved(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_resolved()).count()
    }
}

/// Processes a list of inputs against a page source
pub struct Batch<'a> {
    source: &'a dyn PageSource,
    base_url: String,
    limiter: RateLimiter,
    concurrency: usize,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Batch<'a> {
    pub fn new(source: &'a dyn PageSource, base_url: &str) -> Self {
        Self {
            source,
            base_url: base_url.to_string(),
            limiter: RateLimiter::unlimited(),
            concurrency: 1,
            cancel: None,
        }
    }

    /// Share one limiter across every fetch of the run
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Number of items in flight at once; values below 1 mean 1
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stop starting new items once `flag` is set
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Process every input. Never fails; per-item errors land in the report.
    pub fn run(&self, inputs: &[InputRecord]) -> BatchReport {
        let total = inputs.len();
        info!("Processing {} inputs", total);

        let report = if self.concurrency > 1 && total > 1 {
            self.run_parallel(inputs)
        } else {
            self.run_sequential(inputs)
        };

        info!(
            "Processed {} inputs, resolved {} properties",
            report.processed(),
            report.resolved()
        );
        report
    }

    fn run_sequential(&self, inputs: &[InputRecord]) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, input) in inputs.iter().enumerate() {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            report.outcomes.push(self.process(index, inputs.len(), input));
        }

        report
    }

    fn run_parallel(&self, inputs: &[InputRecord]) -> BatchReport {
        let total = inputs.len();
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency.min(total))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Failed to build worker pool, running sequentially: {}", e);
                return self.run_sequential(inputs);
            }
        };
        debug!(workers = pool.current_num_threads(), "starting worker pool");

        // Indexed collect keeps input order
        let slots: Vec<Option<ItemOutcome>> = pool.install(|| {
            inputs
                .par_iter()
                .enumerate()
                .map(|(index, input)| {
                    if self.is_cancelled() {
                        return None;
                    }
                    Some(self.process(index, total, input))
                })
                .collect()
        });

        let outcomes: Vec<ItemOutcome> = slots.into_iter().flatten().collect();
        BatchReport {
            cancelled: outcomes.len() < total,
            outcomes,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn process(&self, index: usize, total: usize, input: &InputRecord) -> ItemOutcome {
        info!("[{}/{}] {} ({})", index + 1, total, input.value, input.kind);

        match self.resolve_one(input) {
            Ok(resolved) => ItemOutcome::Resolved(resolved),
            Err(error) => {
                warn!(
                    input = %input.value,
                    item = index + 1,
                    total,
                    error = %error,
                    "failed to process input"
                );
                ItemOutcome::Failed {
                    index,
                    input: input.clone(),
                    error,
                }
            }
        }
    }

    fn resolve_one(&self, input: &InputRecord) -> Result<ResolvedProperty> {
        let url = resolve_url(input, &self.base_url);

        self.limiter.acquire();
        let page = self.source.fetch(&url)?;

        if page.url != url {
            debug!(requested = %url, final_url = %page.url, "followed redirect");
        }

        // Records carry the URL that was asked for, not the redirect target
        let property = extract_property(&page.html, input, &url);
        debug!(strategy = ?property.strategy, "extracted property");

        let normalized = normalize(&property.to_raw_map(), &input.raw, &url);
        Ok(ResolvedProperty {
            input: input.clone(),
            property,
            normalized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedPage;
    use crate::input::classify;
    use std::collections::HashMap;

    /// Serves canned markup per URL; anything else is a 404
    struct StubSource {
        pages: HashMap<String, String>,
        cancel_after_first: Option<AtomicBool>,
        /// Requested URL -> URL the page was finally served from
        redirects: HashMap<String, String>,
    }

    impl StubSource {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
                cancel_after_first: None,
                redirects: HashMap::new(),
            }
        }
    }

    impl PageSource for StubSource {
        fn fetch(&self, url: &str) -> Result<FetchedPage> {
            if let Some(flag) = &self.cancel_after_first {
                flag.store(true, Ordering::SeqCst);
            }
            match self.pages.get(url) {
                Some(html) => Ok(FetchedPage {
                    url: self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string()),
                    html: html.clone(),
                }),
                None => Err(ScrapeError::Fetch {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }

    const BASE: &str = "https://www.zillow.com";

    fn page(zpid: u64) -> String {
        format!(
            r#"<script>{{"props": {{"home": {{"zpid": {}, "zestimate": 100000, "bedrooms": 2}}}}}}</script>"#,
            zpid
        )
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let good = page(2);
        let source = StubSource::new(&[("https://www.zillow.com/homedetails/2_zpid/", &good)]);
        let inputs = vec![classify("1").unwrap(), classify("2").unwrap()];

        let report = Batch::new(&source, BASE).run(&inputs);

        assert_eq!(report.processed(), 2);
        assert_eq!(report.resolved(), 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 0);
        assert!(matches!(failures[0].2, ScrapeError::Fetch { status: 404, .. }));

        let normalized = report.normalized();
        assert_eq!(normalized[0].id.as_deref(), Some("2"));
        assert_eq!(normalized[0].source_input, "2");
        assert_eq!(normalized[0].valuation_estimate, Some(100000.0));
    }

    #[test]
    fn test_empty_batch() {
        let source = StubSource::new(&[]);
        let report = Batch::new(&source, BASE).run(&[]);
        assert_eq!(report.processed(), 0);
        assert_eq!(report.resolved(), 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_parallel_keeps_input_order() {
        let pages: Vec<(String, String)> = (1..=8)
            .map(|id| (format!("{}/homedetails/{}_zpid/", BASE, id), page(id)))
            .collect();
        let refs: Vec<(&str, &str)> = pages.iter().map(|(u, h)| (u.as_str(), h.as_str())).collect();
        let source = StubSource::new(&refs);
        let inputs: Vec<_> = (1..=8).map(|id| classify(&id.to_string()).unwrap()).collect();

        let report = Batch::new(&source, BASE).with_concurrency(3).run(&inputs);

        let ids: Vec<_> = report.normalized().into_iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7", "8"]);
    }

    #[test]
    fn test_cancel_stops_new_items() {
        let good = page(1);
        let mut source = StubSource::new(&[("https://www.zillow.com/homedetails/1_zpid/", &good)]);
        source.cancel_after_first = Some(AtomicBool::new(false));
        let inputs = vec![classify("1").unwrap(), classify("2").unwrap(), classify("3").unwrap()];

        let flag = source.cancel_after_first.as_ref().unwrap();
        let report = Batch::new(&source, BASE).with_cancel_flag(flag).run(&inputs);

        assert!(report.cancelled);
        assert_eq!(report.processed(), 1);
        assert_eq!(report.resolved(), 1);
    }

    #[test]
    fn test_parallel_run_honors_cancel() {
        let source = StubSource::new(&[]);
        let inputs: Vec<_> = (1..=4).map(|id| classify(&id.to_string()).unwrap()).collect();
        let flag = AtomicBool::new(true);

        let report = Batch::new(&source, BASE)
            .with_concurrency(2)
            .with_cancel_flag(&flag)
            .run(&inputs);

        assert!(report.cancelled);
        assert_eq!(report.processed(), 0);
    }

    #[test]
    fn test_url_input_keeps_page_url() {
        let url = "https://www.zillow.com/homedetails/9-Elm-Ave/9_zpid/";
        let html = "<html><body><h1>9 Elm Ave</h1><div>4 bd</div></body></html>";
        let source = StubSource::new(&[(url, html)]);

        let report = Batch::new(&source, BASE).run(&[classify(url).unwrap()]);
        let record = &report.normalized()[0];
        assert_eq!(record.url.as_deref(), Some(url));
        assert_eq!(record.address.as_deref(), Some("9 Elm Ave"));
        assert_eq!(record.bedrooms, Some(4.0));
    }

    #[test]
    fn test_redirect_does_not_replace_record_url() {
        let requested = "https://www.zillow.com/homedetails/99_zpid/";
        let html = "<html><body><h1>9 Elm Ave</h1></body></html>";
        let mut source = StubSource::new(&[(requested, html)]);
        source.redirects.insert(
            requested.to_string(),
            "https://www.zillow.com/homedetails/9-Elm-Ave/99_zpid/".to_string(),
        );

        for input in [classify(requested).unwrap(), classify("99").unwrap()] {
            let report = Batch::new(&source, BASE).run(&[input]);
            let resolved = match &report.outcomes[0] {
                ItemOutcome::Resolved(r) => r,
                other => panic!("expected success, got {:?}", other),
            };
            assert_eq!(resolved.property.url, requested);
            assert_eq!(resolved.normalized.url.as_deref(), Some(requested));
        }
    }
}
