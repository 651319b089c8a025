//! Retrying, cancellable request executor

use std::sync::Arc;
use std::time::Duration;

use nimbus_common::resilience::{BackoffCounter, BackoffStrategy};
use nimbus_domain::constants::{
    DEFAULT_MAX_REQUEST_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_USER_AGENT,
};
use reqwest::header::ACCEPT_CHARSET;
use reqwest::Client as ReqwestClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::request::{ApiRequest, ProgressListener};
use super::response::ApiResponse;
use crate::api::{AccessTokenProvider, ApiError};

/// Sends [`ApiRequest`]s with retry, backoff and cancellation.
///
/// Connection failures, 5xx and 429 responses are retried until the attempt
/// budget runs out. Every other failure is returned immediately.
#[derive(Clone)]
pub struct RequestExecutor {
    client: ReqwestClient,
    max_attempts: u32,
    backoff: BackoffStrategy,
    auth: Option<Arc<dyn AccessTokenProvider>>,
}

impl RequestExecutor {
    /// Start building a new executor.
    pub fn builder() -> RequestExecutorBuilder {
        RequestExecutorBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, ApiError> {
        Self::builder().build()
    }

    /// Attempt budget for authenticated requests.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether requests carry a bearer token.
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Delay policy between attempts.
    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    /// Execute the request with retry semantics.
    ///
    /// # Errors
    ///
    /// - [`ApiError::BodyNotResettable`] if the body was consumed by an
    ///   earlier send and cannot be rewound.
    /// - [`ApiError::Cancelled`] if `cancel` fires during an attempt.
    /// - The last attempt's failure once the budget is spent, or the first
    ///   non-retryable failure.
    pub async fn send(
        &self,
        request: &mut ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(request, None, cancel).await
    }

    /// Like [`send`](Self::send), reporting body upload progress.
    pub async fn send_with_progress(
        &self,
        request: &mut ApiRequest,
        listener: &dyn ProgressListener,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(request, Some(listener), cancel).await
    }

    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    async fn execute(
        &self,
        request: &mut ApiRequest,
        progress: Option<&dyn ProgressListener>,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        request.prepare_for_send()?;

        let token = match &self.auth {
            Some(auth) => Some(auth.access_token().await?),
            None => None,
        };
        let budget = request.attempt_budget().unwrap_or(if token.is_some() {
            self.max_attempts
        } else {
            DEFAULT_MAX_REQUEST_ATTEMPTS
        });

        let mut backoff = BackoffCounter::new(self.backoff.clone());
        backoff.reset(budget);

        loop {
            let attempt = backoff.retries() + 1;
            let err = match self.attempt(request, token.as_deref(), progress, cancel, attempt).await
            {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if !backoff.decrement() {
                warn!(attempts = attempt, error = %err, "request failed, no attempts left");
                return Err(err);
            }

            if let Err(reset_err) = request.reset_body() {
                warn!(error = %reset_err, "request body cannot be reset, not retrying");
                return Err(err);
            }

            warn!(
                attempt,
                remaining = backoff.attempts_remaining(),
                error = %err,
                "retryable request failure"
            );

            if let Err(wait_err) = backoff.wait_backoff(cancel).await {
                debug!(error = %wait_err, "backoff interrupted");
                return Err(err);
            }
        }
    }

    async fn attempt(
        &self,
        request: &mut ApiRequest,
        token: Option<&str>,
        progress: Option<&dyn ProgressListener>,
        cancel: &CancellationToken,
        attempt: u32,
    ) -> Result<ApiResponse, ApiError> {
        let body = request
            .read_body(progress)
            .map_err(|e| ApiError::Connection(format!("failed to read request body: {e}")))?;

        let mut builder = self.client.request(request.method().clone(), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder.header(ACCEPT_CHARSET, "utf-8");
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = request.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        debug!(attempt, authenticated = token.is_some(), request = %request, "sending HTTP request");

        let exchange = async {
            let response = builder.send().await?;
            debug!(attempt, status = %response.status(), "received HTTP response");
            ApiResponse::read(response).await
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ApiError::Cancelled),
            result = exchange => result,
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("authenticated", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestExecutor`].
pub struct RequestExecutorBuilder {
    timeout: Duration,
    max_attempts: u32,
    backoff: BackoffStrategy,
    user_agent: String,
    auth: Option<Arc<dyn AccessTokenProvider>>,
}

impl Default for RequestExecutorBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            max_attempts: DEFAULT_MAX_REQUEST_ATTEMPTS,
            backoff: BackoffStrategy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            auth: None,
        }
    }
}

impl RequestExecutorBuilder {
    /// Default timeout for connecting and reading.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries) for
    /// authenticated requests.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Delay policy between attempts.
    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// `User-Agent` header value.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Token provider for authenticated requests.
    pub fn auth(mut self, provider: Arc<dyn AccessTokenProvider>) -> Self {
        self.auth = Some(provider);
        self
    }

    /// Builds the executor and its HTTP client.
    pub fn build(self) -> Result<RequestExecutor, ApiError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(self.user_agent)
            .gzip(true)
            .no_proxy()
            .build()
            .map_err(|err| ApiError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(RequestExecutor {
            client,
            max_attempts: self.max_attempts.max(1),
            backoff: self.backoff,
            auth: self.auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::StaticTokenProvider;

    fn executor_with_attempts(attempts: u32) -> RequestExecutor {
        RequestExecutor::builder()
            .backoff(BackoffStrategy::Fixed(Duration::from_millis(5)))
            .max_attempts(attempts)
            .auth(Arc::new(StaticTokenProvider::new("test-token")))
            .build()
            .expect("executor")
    }

    fn get(server: &MockServer) -> ApiRequest {
        ApiRequest::get(Url::parse(&server.uri()).unwrap())
    }

    #[tokio::test]
    async fn returns_successful_response_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("accept-charset", "utf-8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let executor = executor_with_attempts(3);
        let response =
            executor.send(&mut get(&server), &CancellationToken::new()).await.expect("response");

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(matches!(response, ApiResponse::Raw(ref raw) if raw.body == b"ok"));
    }

    #[tokio::test]
    async fn retries_rate_limiting() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true }))
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let response = executor_with_attempts(3)
            .send(&mut get(&server), &CancellationToken::new())
            .await
            .expect("response");

        assert_eq!(response.json(), Some(&serde_json::json!({ "ok": true })));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such item"))
            .expect(1)
            .mount(&server)
            .await;

        let result = executor_with_attempts(3).send(&mut get(&server), &CancellationToken::new()).await;

        match result {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such item");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unauthenticated_requests_use_default_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(u64::from(DEFAULT_MAX_REQUEST_ATTEMPTS))
            .mount(&server)
            .await;

        let executor = RequestExecutor::builder()
            .backoff(BackoffStrategy::Fixed(Duration::from_millis(1)))
            .max_attempts(10)
            .build()
            .expect("executor");
        let result = executor.send(&mut get(&server), &CancellationToken::new()).await;

        assert!(matches!(result, Err(ApiError::Status { status: 500, .. })));
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| !r.headers.contains_key("authorization")));
    }

    #[tokio::test]
    async fn retries_on_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED
        let url = Url::parse(&format!("http://{}", addr)).unwrap();

        let result = executor_with_attempts(2)
            .send(&mut ApiRequest::get(url), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ApiError::Connection(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn cancelled_token_aborts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = executor_with_attempts(3).send(&mut get(&server), &cancel).await;

        assert!(matches!(result, Err(ApiError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
