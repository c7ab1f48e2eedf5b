//! Injected HTTP client configuration and instrumented request execution.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{IntoUrl, Method, RequestBuilder, Response, Url};
use tracing::{debug, warn};

/// Label used for hosts without a configured bucket.
const OTHER_BUCKET: &str = "other";

/// Process-wide HTTP settings, constructed once at startup.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Per-request timeout, covering connect through body completion.
    pub timeout: Duration,
    /// Host name to log label, so request logs group by service rather than URL.
    pub buckets: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let buckets = [("api.github.com", "github"), ("octo-sts.dev", "octosts")]
            .into_iter()
            .map(|(host, label)| (host.to_string(), label.to_string()))
            .collect();
        Self {
            user_agent: concat!("github-event-bots/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            buckets,
        }
    }
}

impl HttpConfig {
    /// Adds or replaces the log label for `host`.
    pub fn with_bucket(mut self, host: impl Into<String>, label: impl Into<String>) -> Self {
        self.buckets.insert(host.into(), label.into());
        self
    }

    /// Builds the shared client.
    ///
    /// Redirects are never followed automatically: callers that expect one
    /// (workflow log downloads) inspect the `Location` header themselves, so
    /// credentials are never forwarded to a redirected host.
    pub fn build(&self) -> Result<HttpClient, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(HttpClient {
            inner,
            buckets: Arc::new(self.buckets.clone()),
        })
    }
}

/// A cheaply cloneable HTTP client that logs every request it executes.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    buckets: Arc<BTreeMap<String, String>>,
}

impl HttpClient {
    /// Starts a request. Execute it with [`HttpClient::send`].
    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.inner.request(method, url)
    }

    /// The log label for requests to `url`.
    pub fn bucket_for(&self, url: &Url) -> &str {
        url.host_str()
            .and_then(|host| self.buckets.get(host))
            .map(String::as_str)
            .unwrap_or(OTHER_BUCKET)
    }

    /// Executes `request`, recording method, bucket, status and latency.
    ///
    /// Non-success statuses are returned as responses; only transport failures
    /// (connect, timeout, malformed request) are errors.
    pub async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<Response, reqwest::Error> {
        let request = request.build()?;
        let method = request.method().clone();
        let bucket = self.bucket_for(request.url()).to_string();
        let started = Instant::now();

        match self.inner.execute(request).await {
            Ok(response) => {
                debug!(
                    operation,
                    %method,
                    bucket = %bucket,
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "http request completed"
                );
                Ok(response)
            }
            Err(error) => {
                warn!(operation, %method, bucket = %bucket, %error, "http request failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn buckets_label_known_hosts() {
        let client = HttpConfig::default()
            .with_bucket("ingress.example.com", "ingress")
            .build()
            .unwrap();
        let url = |s: &str| Url::parse(s).unwrap();
        assert_eq!(client.bucket_for(&url("https://api.github.com/repos/a/b")), "github");
        assert_eq!(client.bucket_for(&url("https://octo-sts.dev/sts/exchange")), "octosts");
        assert_eq!(client.bucket_for(&url("https://ingress.example.com/")), "ingress");
        assert_eq!(client.bucket_for(&url("https://example.org/")), "other");
    }

    #[tokio::test]
    async fn redirects_are_returned_not_followed() {
        let server = MockServer::start();
        let redirect = server.mock(|when, then| {
            when.method(GET).path("/start");
            then.status(302).header("location", server.url("/target"));
        });
        let target = server.mock(|when, then| {
            when.method(GET).path("/target");
            then.status(200);
        });

        let client = HttpConfig::default().build().unwrap();
        let response = client
            .send("redirect check", client.request(reqwest::Method::GET, server.url("/start")))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 302);
        redirect.assert_calls(1);
        target.assert_calls(0);
    }
}
