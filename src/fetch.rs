use crate::cache::{KeyedCache, MemoryCache};
use crate::config::FetchConfig;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Page source used by the scanner. Any failure yields an empty body.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> String;
}

/// Single-attempt HTTP fetcher with a bounded LRU page cache. `file://`
/// URLs are read from disk.
pub struct HttpFetcher {
    client: Client,
    cache: MemoryCache<String, String>,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid fetch.user_agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            cache: MemoryCache::bounded_lru(config.cache_capacity),
        })
    }

    fn fetch_uncached(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).with_context(|| format!("invalid url {url}"))?;
        match parsed.scheme() {
            "http" | "https" => self.fetch_http(url),
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| anyhow!("file url has no local path: {url}"))?;
                std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read file source {}", path.display()))
            }
            other => bail!("unsupported url scheme {other}"),
        }
    }

    fn fetch_http(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("request to {url} failed with status {status}");
        }
        resp.text()
            .with_context(|| format!("failed to read body from {url}"))
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> String {
        if let Some(body) = self.cache.get(&url.to_string()) {
            debug!(%url, "page cache hit");
            return body;
        }

        match self.fetch_uncached(url) {
            Ok(body) => {
                info!(%url, bytes = body.len(), "fetched page");
                if !body.is_empty() {
                    self.cache.insert(url.to_string(), body.clone());
                }
                body
            }
            Err(err) => {
                warn!(%url, error = %err, "fetch failed; treating page as empty");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_file_urls_and_caches_them() -> Result<()> {
        let dir = tempdir()?;
        let page = dir.path().join("page.html");
        std::fs::write(&page, "<p>2025/11/15 花火大会</p>")?;
        let url = Url::from_file_path(&page)
            .map_err(|_| anyhow!("temp path is not absolute"))?
            .to_string();

        let fetcher = HttpFetcher::new(&FetchConfig::default())?;
        assert_eq!(fetcher.fetch(&url), "<p>2025/11/15 花火大会</p>");

        std::fs::remove_file(&page)?;
        assert_eq!(fetcher.fetch(&url), "<p>2025/11/15 花火大会</p>");
        Ok(())
    }

    #[test]
    fn failures_become_empty_bodies() -> Result<()> {
        let dir = tempdir()?;
        let missing = Url::from_file_path(dir.path().join("missing.html"))
            .map_err(|_| anyhow!("temp path is not absolute"))?
            .to_string();

        let fetcher = HttpFetcher::new(&FetchConfig::default())?;
        assert_eq!(fetcher.fetch(&missing), "");
        assert_eq!(fetcher.fetch("not a url"), "");
        assert_eq!(fetcher.fetch("ftp://example.com/events"), "");
        Ok(())
    }
}
