use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};

use crate::error::MeldKitError;

/// A simple wrapper on an HTTP client for making requests. Sets sensible
/// defaults such as timeouts, user-agent & ensuring HTTPS.
///
/// Requests are sent exactly once: failed taps are never retried
/// automatically, the only retry path is a fresh user-initiated tap.
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
}

impl Request {
    /// Initializes a new `Request` instance.
    pub(crate) fn new() -> Self {
        let client = reqwest::Client::new();
        let timeout = Duration::from_secs(5);
        Self { client, timeout }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: &str) -> RequestBuilder {
        // HTTPS is required off-device; plain HTTP is tolerated for
        // loopback only (local development servers).
        assert!(url.starts_with("https") || url.starts_with("http://127.0.0.1"));

        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("meldkit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Creates a GET request builder with defaults applied.
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.req(Method::GET, url)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    /// Sends a request built by `req`/`get`/`post`.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, MeldKitError> {
        let (client, request) = request_builder.build_split();
        let request = request.map_err(|err| MeldKitError::NetworkError {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: None,
            error: format!("request build failed: {err}"),
        })?;
        let url = request.url().to_string();

        client
            .execute(request)
            .await
            .map_err(|err| MeldKitError::NetworkError {
                url,
                status: None,
                error: format!("request failed: {err}"),
            })
    }
}
