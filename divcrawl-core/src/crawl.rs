use divcrawl_scanner::crawler::{DEFAULT_ROOT_PAGE, MAX_LEVEL, ProgressCallback};
use divcrawl_scanner::fetch::{DEFAULT_BASE_URL, DEFAULT_ENCODING, DEFAULT_USER_AGENT};
use divcrawl_scanner::{CrawlOutcome, Crawler, DivisionType, HttpFetcher, RetryEntry, ScanError};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub base_url: Url,
    pub root_page: String,
    pub encoding: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_level: u8,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            root_page: DEFAULT_ROOT_PAGE.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            max_level: MAX_LEVEL,
            show_progress_bars: true,
        }
    }
}

fn progress_bar(enabled: bool) -> Option<Arc<ProgressBar>> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Starting crawl...");
    Some(Arc::new(pb))
}

fn build_crawler(
    options: &CrawlOptions,
    progress_bar: Option<Arc<ProgressBar>>,
) -> Result<Crawler<HttpFetcher>, ScanError> {
    let fetcher = HttpFetcher::with_options(
        options.base_url.as_str(),
        &options.user_agent,
        options.timeout_secs,
        &options.encoding,
    )?;

    let page_callback: ProgressCallback = Arc::new(move |records: usize, queued: usize, link: &str| {
        if let Some(ref pb) = progress_bar {
            pb.set_message(format!("{} records, {} queued | {}", records, queued, link));
        }
    });

    Ok(Crawler::new(fetcher)
        .with_root_page(options.root_page.clone())
        .with_max_level(options.max_level)
        .with_progress_callback(page_callback))
}

/// Execute a crawl with the given options
///
/// Only a failure to load the root page is returned as an error; child page
/// failures end up in the outcome's retry list.
pub async fn execute_crawl(options: CrawlOptions) -> Result<CrawlOutcome, ScanError> {
    let pb = progress_bar(options.show_progress_bars);
    let crawler = build_crawler(&options, pb.clone())?;

    let result = crawler.crawl().await;

    if let Some(ref pb) = pb {
        match &result {
            Ok(outcome) => pb.finish_with_message(format!(
                "Crawl complete! {} records collected",
                outcome.records.len()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }
    result
}

/// Re-run the expansions recorded in a retry list.
pub async fn execute_retry(
    options: CrawlOptions,
    entries: Vec<RetryEntry>,
) -> Result<CrawlOutcome, ScanError> {
    let pb = progress_bar(options.show_progress_bars);
    let crawler = build_crawler(&options, pb.clone())?;

    let outcome = crawler.resume(entries).await;

    if let Some(ref pb) = pb {
        pb.finish_with_message(format!(
            "Retry complete! {} new records",
            outcome.records.len()
        ));
    }
    Ok(outcome)
}

/// Generate a crawl report from an outcome
pub fn generate_crawl_report(outcome: &CrawlOutcome) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Records collected: {}\n", outcome.records.len()));

    for kind in DivisionType::ALL {
        let count = outcome.count_by_type(kind);
        if count > 0 {
            report.push_str(&format!("  {:<10} {}\n", format!("{}:", kind), count));
        }
    }

    let unresolved = outcome.records.iter().filter(|r| r.code.is_none()).count();
    if unresolved > 0 {
        report.push_str(&format!("  Records without code: {}\n", unresolved));
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    if outcome.retries.is_empty() {
        report.push_str("## Retries\n  none, every page was expanded\n");
    } else {
        report.push_str(&format!("## Retries ({})\n", outcome.retries.len()));
        for entry in &outcome.retries {
            let name = entry.node.name.as_deref().unwrap_or("?");
            report.push_str(&format!(
                "  \x1b[33m{:?}\x1b[0m {} ({}) {}\n",
                entry.kind, entry.link, name, entry.error
            ));
        }
    }

    report
}
