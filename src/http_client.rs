use crate::cookies::Cookie;
use crate::error::{DownloadError, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Browser identity used for page image requests.
pub const PAGE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser identity used for episode HTML and API requests.
pub const HTML_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Timeout for episode manifest fetches (ComicDays / Ourfeel).
pub const MANIFEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for page image and viewer API fetches.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the retrying fetcher.
#[derive(Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_attempts: usize,
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: PAGE_TIMEOUT,
            max_attempts: 5,
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// The single network seam of the pipeline. Implemented over reqwest in
/// production and stubbed out in tests.
///
/// The fetcher injects no headers of its own; callers supply user-agent,
/// accept, accept-language and referer. `timeout` overrides the client
/// default for this one request.
pub trait Fetcher {
    fn fetch(
        &self,
        url: &str,
        headers: HeaderMap,
        cookies: &[Cookie],
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Reqwest-backed fetcher with bounded retries.
///
/// Up to `max_attempts` GETs are issued with a fixed `retry_delay` sleep
/// between attempts. A response counts as a success only when the status is
/// 200 and the body reads to EOF; anything else is an attempt failure.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default())
    }

    pub fn with_config(config: FetchConfig) -> Result<Self> {
        let client = ClientBuilder::new().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: HeaderMap,
        cookies: &[Cookie],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                sleep(self.config.retry_delay).await;
            }

            let mut request = self.client.get(url).headers(headers.clone());
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }
            if !cookies.is_empty() {
                request = request.header(header::COOKIE, cookie_header(cookies));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status != reqwest::StatusCode::OK {
                        last_error = format!("status {status}");
                        log::warn!(
                            "GET {} returned {}, attempt {}/{}",
                            url,
                            status,
                            attempt,
                            self.config.max_attempts
                        );
                        continue;
                    }
                    match response.bytes().await {
                        Ok(body) => return Ok(body.to_vec()),
                        Err(e) => {
                            last_error = e.to_string();
                            log::warn!(
                                "GET {} body read failed, attempt {}/{}: {}",
                                url,
                                attempt,
                                self.config.max_attempts,
                                e
                            );
                        }
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                    log::warn!(
                        "GET {} failed, attempt {}/{}: {}",
                        url,
                        attempt,
                        self.config.max_attempts,
                        e
                    );
                }
            }
        }

        Err(DownloadError::Network(format!(
            "{url}: {last_error} (after {} attempts)",
            self.config.max_attempts
        )))
    }
}

fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Headers for episode HTML fetches.
pub fn html_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(HTML_USER_AGENT));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers
}

/// Headers for page image fetches; `referer` is publisher-specific.
pub fn image_headers(referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(PAGE_USER_AGENT));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("image/webp,image/apng,image/*,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    if let Some(referer) = referer {
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(header::REFERER, value);
        }
    }
    headers
}
