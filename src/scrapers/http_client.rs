//! Plain HTTP fetching for the static stage of the fetch pipeline.

use std::time::Duration;

use reqwest::Client;

/// Browser-like user agent; some chapter hosts refuse obvious bots.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP client with a fixed per-request timeout and a politeness delay.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_delay(timeout, Duration::from_millis(250))
    }

    pub fn with_delay(timeout: Duration, request_delay: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            request_delay,
        }
    }

    /// Fetch a page as text. DNS failures, timeouts, and HTTP error statuses
    /// all surface as errors; the fetch pipeline treats them as a signal to
    /// escalate rather than a hard failure.
    pub async fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let text = response.text().await?;
        tokio::time::sleep(self.request_delay).await;
        Ok(text)
    }
}
