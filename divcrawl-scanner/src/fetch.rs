use crate::error::{Result, ScanError};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://www.stats.gov.cn/tjsj/tjbz/tjyqhdmhcxhfdm/2017/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/58.0.3029.96 Safari/537.36";
pub const DEFAULT_ENCODING: &str = "gbk";

/// Anything that can hand the scheduler the decoded text of a page by its link.
pub trait PageSource {
    fn fetch(&self, link: &str) -> impl Future<Output = Result<String>>;
}

/// Fetches pages relative to a fixed base URL over HTTP.
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    encoding: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, DEFAULT_USER_AGENT, 10, DEFAULT_ENCODING)
    }

    pub fn with_options(
        base_url: &str,
        user_agent: &str,
        timeout_secs: u64,
        encoding: &str,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        // Links are relative to the base directory, not its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            base_url,
            encoding: encoding.to_string(),
        })
    }

    /// Absolute URL of a page link.
    pub fn page_url(&self, link: &str) -> Result<Url> {
        self.base_url
            .join(link)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", link, e)))
    }
}

impl PageSource for HttpFetcher {
    async fn fetch(&self, link: &str) -> Result<String> {
        let url = self.page_url(link)?;
        debug!("Fetching {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Declared charset wins; the configured encoding covers pages that omit it.
        Ok(response.text_with_charset(&self.encoding).await?)
    }
}
