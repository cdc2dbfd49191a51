use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};

use crate::error::ShadowAuthError;

/// A simple wrapper on an HTTP client for making requests to the runtime, the identity service
/// and the JSON-RPC node. Sets the timeout and user-agent, optionally enforces HTTPS, and applies
/// retry middleware to idempotent calls.
#[derive(Debug, Clone)]
pub struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    require_https: bool,
}

impl Request {
    /// Initializes a new `Request` instance.
    pub(crate) fn new(timeout: Duration, require_https: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            max_retries: 2, // total attempts = 3
            require_https,
        }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("shadowauth-core/{}", env!("CARGO_PKG_VERSION")),
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

    /// Sends a request exactly once. Any HTTP status is returned to the caller; only transport
    /// failures become errors.
    ///
    /// Used for calls that must not be repeated, such as proof verification (a retry could issue
    /// a second session) and contract writes.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, ShadowAuthError> {
        execute_request_builder(request_builder, self.require_https, false)
            .await
            .map_err(Into::into)
    }

    /// Sends an idempotent request with retries for transient failures (timeouts, connect
    /// errors, 429 and 5xx).
    pub(crate) async fn handle_idempotent(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, ShadowAuthError> {
        let require_https = self.require_https;
        let Some(template) = request_builder.try_clone() else {
            return execute_request_builder(request_builder, require_https, true)
                .await
                .map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                RequestHandleError::permanent(
                    "<unknown>".to_string(),
                    None,
                    "request cannot be retried because it is not cloneable".to_string(),
                )
            })?;
            execute_request_builder(request_builder, require_https, true).await
        })
        .retry(backoff)
        .when(|err: &RequestHandleError| err.is_retryable())
        .await
        .map_err(Into::into)
    }
}

#[derive(Debug)]
struct RequestHandleError {
    url: String,
    status: Option<u16>,
    error: String,
    retryable: bool,
}

impl RequestHandleError {
    const fn retryable(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: true,
        }
    }

    const fn permanent(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<RequestHandleError> for ShadowAuthError {
    fn from(value: RequestHandleError) -> Self {
        Self::UpstreamUnavailable {
            url: value.url,
            status: value.status,
            error: value.error,
        }
    }
}

async fn execute_request_builder(
    request_builder: RequestBuilder,
    require_https: bool,
    reject_transient_status: bool,
) -> Result<Response, RequestHandleError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        RequestHandleError::permanent(
            err.url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            None,
            format!("request build failed: {err}"),
        )
    })?;
    let url = request.url().to_string();

    if require_https && request.url().scheme() != "https" {
        return Err(RequestHandleError::permanent(
            url,
            None,
            "refusing to send a request over plain http".to_string(),
        ));
    }

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if reject_transient_status && (status == 429 || (500..600).contains(&status)) {
                return Err(RequestHandleError::retryable(
                    url,
                    Some(status),
                    format!("request error with bad status code {status}"),
                ));
            }
            Ok(resp)
        }
        Err(err) => {
            if err.is_timeout() || err.is_connect() {
                return Err(RequestHandleError::retryable(
                    url,
                    None,
                    format!("request timeout/connect error: {err}"),
                ));
            }

            Err(RequestHandleError::permanent(
                url,
                None,
                format!("request failed: {err}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::Server;

    use super::*;

    #[tokio::test]
    async fn test_idempotent_request_retries_server_errors() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/health")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let request = Request::new(Duration::from_secs(2), false);
        let result = request
            .handle_idempotent(request.get(&format!("{}/health", server.url())))
            .await;

        failing.assert_async().await;
        match result.unwrap_err() {
            ShadowAuthError::UpstreamUnavailable { status, .. } => {
                assert_eq!(status, Some(503));
            }
            e => panic!("Expected UpstreamUnavailable, got {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_attempt_returns_status_to_caller() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/verify")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let request = Request::new(Duration::from_secs(2), false);
        let response = request
            .handle(request.post(&format!("{}/api/verify", server.url())))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status().as_u16(), 500);
    }

    #[tokio::test]
    async fn test_plain_http_rejected_when_https_required() {
        let request = Request::new(Duration::from_secs(2), true);
        let result = request.handle(request.get("http://127.0.0.1:1/health")).await;
        assert!(matches!(
            result,
            Err(ShadowAuthError::UpstreamUnavailable { status: None, .. })
        ));
    }
}
