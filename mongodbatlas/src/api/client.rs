use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::common::{ApiQueryParams, AtlasErrorResponse};
use super::error::ApiError;
use super::pool::ConnectionPoolConfig;

/// MongoDB Atlas API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    retry_config: RetryConfig,
}

/// Retry policy for the client's own request retries
///
/// Only rate limiting and connection failures are retried here. Long-running
/// state transitions are the poller's job.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(endpoint: &str, access_token: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::with_config(endpoint, access_token, insecure, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        endpoint: &str,
        access_token: &str,
        insecure: bool,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let pool_config = ConnectionPoolConfig {
            request_timeout: std::time::Duration::from_secs(retry_config.timeout_seconds),
            ..Default::default()
        };
        let http_client = pool_config.build_client(insecure)?;

        let base_url = endpoint.trim_end_matches('/').to_string();
        let auth_header = format!("Bearer {}", access_token);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                auth_header,
                retry_config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(|| self.request(Method::GET, path).send(), path)
            .await?;
        Self::parse_success_response(response).await
    }

    /// Execute a GET request with query parameters
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.get(&full_path).await
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(|| self.request(Method::POST, path).json(body).send(), path)
            .await?;
        Self::parse_success_response(response).await
    }

    /// Execute a PATCH request with retry logic
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(|| self.request(Method::PATCH, path).json(body).send(), path)
            .await?;
        Self::parse_success_response(response).await
    }

    /// Execute a DELETE request; the response body is ignored
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute_with_retry(|| self.request(Method::DELETE, path).send(), path)
            .await
            .map(|_| ())
    }

    /// Execute a DELETE request with query parameters
    pub async fn delete_with_params(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<(), ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.delete(&full_path).await
    }

    /// Get clusters API
    pub fn clusters(&self) -> crate::api::clusters::ClustersApi<'_> {
        crate::api::clusters::ClustersApi::new(self)
    }

    /// Get advanced clusters API
    pub fn advanced_clusters(&self) -> crate::api::clusters::AdvancedClustersApi<'_> {
        crate::api::clusters::AdvancedClustersApi::new(self)
    }

    /// Get projects API
    pub fn projects(&self) -> crate::api::projects::ProjectsApi<'_> {
        crate::api::projects::ProjectsApi::new(self)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);

        tracing::debug!("{} request to: {}", method, url);

        self.inner
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(ACCEPT, "application/json")
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, Fut>(
        &self,
        request_fn: F,
        path: &str,
    ) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let retry = &self.inner.retry_config;
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= retry.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    retry.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    retry.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff)).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(ApiError::AuthError);
                    }

                    if status == StatusCode::SERVICE_UNAVAILABLE {
                        return Err(ApiError::ServiceUnavailable);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else {
                        return Err(Self::handle_error_response(response).await);
                    }
                }
                Err(e) => {
                    if is_connection_reset(&e) {
                        tracing::debug!("Connection reset while requesting {}: {}", path, e);
                        return Err(ApiError::ConnectionReset(e.to_string()));
                    }

                    if e.is_timeout() {
                        last_error = Some(ApiError::Timeout(retry.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::RequestError(e));
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response
    async fn parse_success_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    /// Handle error response
    async fn handle_error_response(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match serde_json::from_str::<AtlasErrorResponse>(&text) {
            Ok(body) => ApiError::ApiError {
                status,
                error_code: body.error_code,
                detail: body.detail.or(body.reason).unwrap_or(text),
            },
            Err(_) => ApiError::ApiError {
                status,
                error_code: None,
                detail: text,
            },
        }
    }
}

/// Walks the source chain looking for a reset connection
fn is_connection_reset(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);

    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        if e.to_string().contains("reset by peer") {
            return true;
        }
        source = e.source();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    fn fast_retries() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn client_sends_bearer_token_and_parses_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/atlas/v1.0/groups/p1")
            .match_header("authorization", "Bearer secret-token")
            .match_header("accept", "application/json")
            .with_body(r#"{"name":"payments"}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "secret-token", false).unwrap();

        let named: Named = client.get("/api/atlas/v1.0/groups/p1").await.unwrap();
        assert_eq!(named.name, "payments");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_strips_trailing_slash_from_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/atlas/v1.0/groups/p1")
            .with_body(r#"{"name":"x"}"#)
            .create_async()
            .await;

        let client = Client::new(&format!("{}/", server.url()), "token", false).unwrap();
        assert!(!client.base_url().ends_with('/'));

        let _: Named = client.get("/api/atlas/v1.0/groups/p1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_handles_authentication_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/atlas/v1.0/groups/p1")
            .with_status(401)
            .with_body(r#"{"error":401,"errorCode":"UNAUTHORIZED","detail":"bad token"}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "invalid", false).unwrap();

        let result: Result<Named, _> = client.get("/api/atlas/v1.0/groups/p1").await;
        assert!(matches!(result, Err(ApiError::AuthError)));
    }

    #[tokio::test]
    async fn client_parses_atlas_error_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/atlas/v1.0/groups/p1/clusters/gone")
            .with_status(404)
            .with_body(
                r#"{"detail":"No cluster named gone exists in group p1.","error":404,"errorCode":"CLUSTER_NOT_FOUND","reason":"Not Found"}"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "token", false).unwrap();

        let err = client
            .get::<Named>("/api/atlas/v1.0/groups/p1/clusters/gone")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), Some("CLUSTER_NOT_FOUND"));
        assert!(err.to_string().contains("No cluster named gone"));
    }

    #[tokio::test]
    async fn client_keeps_raw_text_of_unstructured_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/broken")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let client = Client::new(&server.url(), "token", false).unwrap();

        match client.get::<Named>("/broken").await {
            Err(ApiError::ApiError {
                status,
                error_code,
                detail,
            }) => {
                assert_eq!(status, 500);
                assert_eq!(error_code, None);
                assert_eq!(detail, "upstream exploded");
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn client_does_not_retry_service_unavailable() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/atlas/v1.0/groups/p1")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "token", false, fast_retries()).unwrap();

        let result = client.get::<Named>("/api/atlas/v1.0/groups/p1").await;
        assert!(matches!(result, Err(ApiError::ServiceUnavailable)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_retries_rate_limited_requests() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/atlas/v1.0/groups/p1")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "token", false, fast_retries()).unwrap();

        let result = client.get::<Named>("/api/atlas/v1.0/groups/p1").await;
        assert!(matches!(result, Err(ApiError::RateLimited)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_sends_delete_query_params() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/atlas/v1.0/groups/p1/clusters/c1")
            .match_query(Matcher::UrlEncoded("retainBackups".into(), "true".into()))
            .with_status(202)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "token", false).unwrap();
        let params = ApiQueryParams::new().add("retainBackups", true);

        client
            .delete_with_params("/api/atlas/v1.0/groups/p1/clusters/c1", &params)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_reports_unparseable_success_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/atlas/v1.0/groups/p1")
            .with_body("not json")
            .create_async()
            .await;

        let client = Client::new(&server.url(), "token", false).unwrap();

        let result = client.get::<Named>("/api/atlas/v1.0/groups/p1").await;
        assert!(matches!(result, Err(ApiError::ParseError(_))));
    }

    #[tokio::test]
    async fn client_handles_network_errors() {
        let client = Client::new("http://localhost:99999", "token", false).unwrap();

        let result = client.get::<Named>("/api/atlas/v1.0/groups/p1").await;
        assert!(matches!(result, Err(ApiError::RequestError(_))));
    }

    #[test]
    fn connection_reset_detected_in_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("error sending request")]
        struct Wrapper(#[source] std::io::Error);

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "boom");
        assert!(is_connection_reset(&Wrapper(reset)));

        let by_text = std::io::Error::new(
            std::io::ErrorKind::Other,
            "read tcp: connection reset by peer",
        );
        assert!(is_connection_reset(&by_text));

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!is_connection_reset(&Wrapper(refused)));
    }
}
