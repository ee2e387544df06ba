use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";
const USER_AGENT: &str = concat!("prtally/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 5;
const NETWORK_BACKOFF: Duration = Duration::from_millis(300);
const SERVER_BACKOFF: Duration = Duration::from_millis(500);

/// Transport-level failures. Auth errors are terminal; network and server
/// errors are retried until the attempt budget runs out.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server error {status}: {body}")]
    Server { status: StatusCode, body: String },

    #[error("auth/rate error {status}: {body}")]
    Auth { status: StatusCode, body: String },
}

/// Minimal GraphQL transport: one request shape, bearer auth, bounded retry.
pub struct GithubClient {
    http: Client,
    endpoint: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: impl Into<String>) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            endpoint: GITHUB_GRAPHQL_ENDPOINT.to_string(),
            token: token.into(),
        })
    }

    /// Points the client at a different GraphQL endpoint (GitHub Enterprise
    /// installations, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Posts one GraphQL request and returns the raw response body.
    ///
    /// Network errors and 5xx responses are retried with a linearly growing
    /// delay; 401/403 fail immediately since retrying cannot help. The
    /// GraphQL-level `errors` array is the caller's responsibility.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<String, TransportError> {
        let request = serde_json::json!({ "query": query, "variables": variables });

        let mut last_err: Option<TransportError> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.token)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    warn!("attempt {}/{}: network failure: {}", attempt, MAX_ATTEMPTS, err);
                    last_err = Some(TransportError::Network(err));
                    sleep(NETWORK_BACKOFF * attempt).await;
                    continue;
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    warn!(
                        "attempt {}/{}: failed reading response body: {}",
                        attempt, MAX_ATTEMPTS, err
                    );
                    last_err = Some(TransportError::Network(err));
                    sleep(NETWORK_BACKOFF * attempt).await;
                    continue;
                }
            };

            if status.is_server_error() {
                warn!("attempt {}/{}: server error {}", attempt, MAX_ATTEMPTS, status);
                last_err = Some(TransportError::Server { status, body });
                sleep(SERVER_BACKOFF * attempt).await;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(TransportError::Auth { status, body });
            }

            debug!("GraphQL request completed with status {}", status);
            return Ok(body);
        }

        // The loop only falls through after recording at least one error.
        Err(last_err.expect("retry loop exhausted without an error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> GithubClient {
        GithubClient::new("test-token")
            .unwrap()
            .with_endpoint(format!("{}/graphql", server.uri()))
    }

    #[tokio::test]
    async fn returns_the_raw_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{}}"#))
            .expect(1)
            .mount(&server)
            .await;

        let body = test_client(&server)
            .graphql("query { viewer { login } }", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(body, r#"{"data":{}}"#);
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{}}"#))
            .mount(&server)
            .await;

        let body = test_client(&server)
            .graphql("query { viewer { login } }", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(body, r#"{"data":{}}"#);
    }

    #[tokio::test]
    async fn auth_errors_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server)
            .graphql("query { viewer { login } }", serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            TransportError::Auth { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(5)
            .mount(&server)
            .await;

        let err = test_client(&server)
            .graphql("query { viewer { login } }", serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            TransportError::Server { status, .. } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("expected server error, got {:?}", other),
        }
    }
}
