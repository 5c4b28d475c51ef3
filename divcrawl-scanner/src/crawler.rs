use crate::error::Result;
use crate::fetch::PageSource;
use crate::parser::PageParser;
use crate::result::{CrawlOutcome, DivisionNode, RetryEntry};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Called with (records so far, queued records, link being expanded).
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;
/// Called with each record as it is finalised.
pub type ResultCallback = Arc<dyn Fn(&DivisionNode) + Send + Sync>;

pub const DEFAULT_ROOT_PAGE: &str = "index.html";
pub const MAX_LEVEL: u8 = 5;

/// Breadth-first scheduler over division pages.
///
/// Records are final as soon as they leave the queue. A child page that fails
/// to fetch or parse becomes a [`RetryEntry`] and the crawl moves on.
pub struct Crawler<S: PageSource> {
    source: S,
    root_page: String,
    max_level: u8,
    progress_callback: Option<ProgressCallback>,
    result_callback: Option<ResultCallback>,
}

impl<S: PageSource> Crawler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            root_page: DEFAULT_ROOT_PAGE.to_string(),
            max_level: MAX_LEVEL,
            progress_callback: None,
            result_callback: None,
        }
    }

    pub fn with_root_page(mut self, root_page: impl Into<String>) -> Self {
        self.root_page = root_page.into();
        self
    }

    /// Records whose level is `>= max_level` are kept but not expanded.
    pub fn with_max_level(mut self, level: u8) -> Self {
        self.max_level = level.clamp(1, MAX_LEVEL);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Crawl from the root page. Failing to load the root page is fatal.
    pub async fn crawl(&self) -> Result<CrawlOutcome> {
        info!("Starting crawl from {}", self.root_page);

        let html = self.source.fetch(&self.root_page).await?;
        let roots = PageParser::root().parse(&html)?;
        info!("Root page lists {} divisions", roots.len());

        let mut outcome = CrawlOutcome::default();
        self.drain(roots.into(), &mut outcome).await;

        info!(
            "Crawl complete. {} records, {} pages to retry",
            outcome.records.len(),
            outcome.retries.len()
        );
        Ok(outcome)
    }

    /// Re-expand previously failed entries in a separate run.
    ///
    /// The entries' own nodes are already in the earlier output, so only the
    /// records found below them are returned.
    pub async fn resume(&self, entries: Vec<RetryEntry>) -> CrawlOutcome {
        info!("Retrying {} failed pages", entries.len());

        let mut outcome = CrawlOutcome::default();
        let mut queue = VecDeque::new();
        for entry in entries {
            let expanded = self.expand(&entry.node, &entry.link, &entry.path).await;
            match expanded {
                Ok(children) => queue.extend(children),
                Err(e) => {
                    warn!("Retry failed for {}: {}", entry.link, e);
                    outcome.retries.push(RetryEntry {
                        kind: e.kind(),
                        error: e.to_string(),
                        ..entry
                    });
                }
            }
        }
        self.drain(queue, &mut outcome).await;

        info!(
            "Retry complete. {} new records, {} pages still failing",
            outcome.records.len(),
            outcome.retries.len()
        );
        outcome
    }

    async fn drain(&self, mut queue: VecDeque<DivisionNode>, outcome: &mut CrawlOutcome) {
        while let Some(record) = queue.pop_front() {
            if let Some(ref callback) = self.result_callback {
                callback(&record);
            }

            // Records without a link have no child page.
            let target = match (record.level < self.max_level, &record.link) {
                (true, Some(link)) => record.child_prefix().map(|prefix| (link.clone(), prefix)),
                _ => None,
            };
            outcome.records.push(record);

            let Some((link, prefix)) = target else {
                continue;
            };
            let record = &outcome.records[outcome.records.len() - 1];

            if let Some(ref callback) = self.progress_callback {
                callback(outcome.records.len(), queue.len(), &link);
            }

            let expanded = self.expand(record, &link, &prefix).await;
            match expanded {
                Ok(children) => {
                    debug!("{} -> {} children", link, children.len());
                    queue.extend(children);
                }
                Err(e) => {
                    warn!("Failed to expand {}: {}", link, e);
                    outcome.retries.push(RetryEntry {
                        link,
                        node: record.clone(),
                        path: prefix,
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Fetch and parse the child page of one record.
    async fn expand(
        &self,
        record: &DivisionNode,
        link: &str,
        prefix: &str,
    ) -> Result<Vec<DivisionNode>> {
        let html = self.source.fetch(link).await?;
        PageParser::new(Some(record), prefix).parse(&html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, ScanError};
    use crate::result::DivisionType;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves pages from memory and remembers what was asked for.
    struct MemorySource {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl MemorySource {
        fn new(pages: &[(&str, String)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(link, html)| (link.to_string(), html.clone()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl PageSource for MemorySource {
        async fn fetch(&self, link: &str) -> Result<String> {
            self.requested.lock().unwrap().push(link.to_string());
            self.pages.get(link).cloned().ok_or_else(|| ScanError::Status {
                url: link.to_string(),
                status: 404,
            })
        }
    }

    fn root_page(cells: &[(&str, &str)]) -> String {
        let tds: String = cells
            .iter()
            .map(|(href, name)| format!(r#"<td><a href="{}">{}<br/></a></td>"#, href, name))
            .collect();
        format!(r#"<table><tr class="provincetr">{}</tr></table>"#, tds)
    }

    fn child_page(kind: &str, rows: &[(&str, &str, Option<&str>)]) -> String {
        let mut html = format!(
            r#"<table><tr class="{}head"><td>统计用区划代码</td><td>名称</td></tr>"#,
            kind
        );
        for (code, name, href) in rows {
            match href {
                Some(href) => html.push_str(&format!(
                    r#"<tr class="{kind}tr"><td><a href="{href}">{code}</a></td><td><a href="{href}">{name}</a></td></tr>"#
                )),
                None => html.push_str(&format!(
                    r#"<tr class="{kind}tr"><td>{code}</td><td>{name}</td></tr>"#
                )),
            }
        }
        html.push_str("</table>");
        html
    }

    fn names(records: &[DivisionNode]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_deref().unwrap_or("")).collect()
    }

    #[tokio::test]
    async fn test_breadth_first_order_and_levels() {
        let source = MemorySource::new(&[
            ("index.html", root_page(&[("11.html", "北京市"), ("12.html", "天津市")])),
            (
                "11.html",
                child_page("city", &[("110100000000", "北京市辖区", Some("11/1101.html"))]),
            ),
            (
                "12.html",
                child_page("city", &[("120100000000", "天津市辖区", None)]),
            ),
            (
                "11/1101.html",
                child_page("county", &[("110101000000", "东城区", None)]),
            ),
        ]);

        let outcome = Crawler::new(source).crawl().await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(
            names(&outcome.records),
            ["北京市", "天津市", "北京市辖区", "天津市辖区", "东城区"]
        );
        for record in &outcome.records {
            assert_eq!(record.kind.level(), record.level);
        }

        let dongcheng = &outcome.records[4];
        assert_eq!(dongcheng.parent_code.as_deref(), Some("110100000000"));
        assert_eq!(dongcheng.kind, DivisionType::County);
    }

    #[tokio::test]
    async fn test_child_failure_is_isolated() {
        let source = MemorySource::new(&[
            (
                "index.html",
                root_page(&[("11.html", "北京市"), ("12.html", "天津市"), ("13.html", "河北省")]),
            ),
            (
                "11.html",
                child_page("city", &[("110100000000", "北京市辖区", None)]),
            ),
            (
                "13.html",
                child_page(
                    "city",
                    &[
                        ("130100000000", "石家庄市", None),
                        ("130200000000", "唐山市", None),
                    ],
                ),
            ),
        ]);

        let outcome = Crawler::new(source).crawl().await.unwrap();

        assert_eq!(
            names(&outcome.records),
            ["北京市", "天津市", "河北省", "北京市辖区", "石家庄市", "唐山市"]
        );
        assert_eq!(outcome.retries.len(), 1);

        let retry = &outcome.retries[0];
        assert_eq!(retry.link, "12.html");
        assert_eq!(retry.node.name.as_deref(), Some("天津市"));
        assert_eq!(retry.path, "");
        assert_eq!(retry.kind, FailureKind::Fetch);
    }

    #[tokio::test]
    async fn test_unparseable_child_page_is_parse_failure() {
        let source = MemorySource::new(&[
            ("index.html", root_page(&[("11.html", "北京市")])),
            ("11.html", "<html><body>请稍后再试</body></html>".to_string()),
        ]);

        let outcome = Crawler::new(source).crawl().await.unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.retries.len(), 1);
        assert_eq!(outcome.retries[0].kind, FailureKind::Parse);
    }

    #[tokio::test]
    async fn test_records_without_links_are_not_fetched() {
        let source = MemorySource::new(&[
            ("index.html", root_page(&[("11.html", "北京市")])),
            (
                "11.html",
                child_page("city", &[("110100000000", "北京市辖区", None)]),
            ),
        ]);

        let crawler = Crawler::new(source);
        let outcome = crawler.crawl().await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.retries.is_empty());
        assert_eq!(crawler.source().requested(), ["index.html", "11.html"]);
    }

    #[tokio::test]
    async fn test_root_failure_is_fatal() {
        let source = MemorySource::new(&[]);
        let result = Crawler::new(source).crawl().await;
        assert!(matches!(result, Err(ScanError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_max_level_stops_expansion() {
        let source = MemorySource::new(&[
            ("index.html", root_page(&[("11.html", "北京市")])),
            (
                "11.html",
                child_page("city", &[("110100000000", "北京市辖区", Some("11/1101.html"))]),
            ),
        ]);

        let crawler = Crawler::new(source).with_max_level(2);
        let outcome = crawler.crawl().await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.retries.is_empty());
        assert_eq!(crawler.source().requested(), ["index.html", "11.html"]);
    }

    #[tokio::test]
    async fn test_callbacks_see_every_record() {
        let source = MemorySource::new(&[
            ("index.html", root_page(&[("11.html", "北京市")])),
            (
                "11.html",
                child_page("city", &[("110100000000", "北京市辖区", None)]),
            ),
        ]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let expanded = Arc::new(Mutex::new(Vec::new()));
        let expanded_clone = expanded.clone();

        let crawler = Crawler::new(source)
            .with_result_callback(Arc::new(move |record: &DivisionNode| {
                seen_clone.lock().unwrap().push(record.name.clone());
            }))
            .with_progress_callback(Arc::new(move |_done: usize, _queued: usize, link: &str| {
                expanded_clone.lock().unwrap().push(link.to_string());
            }));
        crawler.crawl().await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(*expanded.lock().unwrap(), ["11.html"]);
    }

    #[tokio::test]
    async fn test_resume_expands_failed_entries() {
        let mut province = DivisionNode::new(DivisionType::Province, None);
        province.code = Some("12".into());
        province.name = Some("天津市".into());
        province.link = Some("12.html".into());

        let entry = RetryEntry {
            link: "12.html".into(),
            node: province,
            path: String::new(),
            kind: FailureKind::Fetch,
            error: "HTTP 503 for 12.html".into(),
        };
        let missing = RetryEntry {
            link: "13.html".into(),
            ..entry.clone()
        };

        let source = MemorySource::new(&[(
            "12.html",
            child_page("city", &[("120100000000", "天津市辖区", None)]),
        )]);

        let outcome = Crawler::new(source).resume(vec![entry, missing]).await;

        assert_eq!(names(&outcome.records), ["天津市辖区"]);
        assert_eq!(outcome.records[0].parent_code.as_deref(), Some("12"));
        assert_eq!(outcome.retries.len(), 1);
        assert_eq!(outcome.retries[0].link, "13.html");
        assert_eq!(outcome.retries[0].error, "HTTP 404 for 13.html");
    }

    #[tokio::test]
    async fn test_resume_with_out_of_range_level_does_not_overflow() {
        let mut village = DivisionNode::new(DivisionType::Village, None);
        village.level = u8::MAX;
        village.code = Some("110101001001".into());
        village.link = Some("11/01/01/110101001.html".into());

        let entry = RetryEntry {
            link: "11/01/01/110101001.html".into(),
            node: village,
            path: "11/01/01".into(),
            kind: FailureKind::Fetch,
            error: "HTTP 503 for 11/01/01/110101001.html".into(),
        };
        let source = MemorySource::new(&[(
            "11/01/01/110101001.html",
            child_page("village", &[("110101001001", "多福巷社区居委会", None)]),
        )]);

        let outcome = Crawler::new(source).resume(vec![entry]).await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].level, u8::MAX);
        assert!(outcome.retries.is_empty());
    }
}
