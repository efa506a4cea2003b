use std::sync::Arc;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::auth::TokenProvider;

use crate::error::ApiError;

/// JSON client for the remote scheduling API.
///
/// The bearer token is read from the injected [`TokenProvider`] on every
/// request rather than stored on the client.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl RestClient {
    pub fn new(config: &AppConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(config.api_root(), tokens)
    }

    pub fn with_base_url(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = self.tokens.access_token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Access token contains invalid header characters, sending unauthenticated"),
            }
        }

        headers
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers());

        if !query.is_empty() {
            req = req.query(query);
        }

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(|e| {
            error!("Transport failure for {}: {}", url, e);
            ApiError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(ApiError::from_response(status, &error_text));
        }

        Ok(response)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, query, body).await?;
        let bytes = response.bytes().await?;
        let data = serde_json::from_slice::<T>(&bytes)?;
        Ok(data)
    }

    /// Issue a request whose response body is ignored (e.g. `204 No Content`).
    pub async fn request_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<StatusCode, ApiError> {
        let response = self.send(method, path, &[], body).await?;
        Ok(response.status())
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ApiError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ApiError> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request_empty(Method::DELETE, path, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use shared_models::auth::Session;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str, session: Arc<Session>) -> RestClient {
        RestClient::with_base_url(format!("{}/api/", uri), session)
    }

    #[tokio::test]
    async fn test_bearer_token_read_per_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ping/"))
            .and(header("Authorization", "Bearer second"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&mock_server)
            .await;

        let session = Arc::new(Session::with_token("first"));
        let rest = client(&mock_server.uri(), session.clone());
        session.sign_in("second");

        let body: Value = rest.get("/ping/", &[]).await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_query_parameters_are_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/items/"))
            .and(query_param("kind", "weekly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
            .mount(&mock_server)
            .await;

        let rest = client(&mock_server.uri(), Arc::new(Session::new()));
        let items: Vec<i32> = rest.get("/items/", &[("kind", "weekly".to_string())]).await.unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_error_statuses_are_classified() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/missing/"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/invalid/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"start_time": ["Invalid."]})))
            .mount(&mock_server)
            .await;

        let rest = client(&mock_server.uri(), Arc::new(Session::new()));

        let err = rest.get::<Value>("/missing/", &[]).await.unwrap_err();
        assert_matches!(err, ApiError::NotFound(ref msg) if msg == "Not found.");

        let err = rest.post::<Value>("/invalid/", json!({})).await.unwrap_err();
        assert_matches!(err, ApiError::Validation { ref fields, .. } if fields.contains_key("start_time"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let rest = RestClient::with_base_url("http://127.0.0.1:9", Arc::new(Session::new()));
        let err = rest.get::<Value>("/anything/", &[]).await.unwrap_err();
        assert_matches!(err, ApiError::Network(_));
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/items/1/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let rest = client(&mock_server.uri(), Arc::new(Session::new()));
        assert!(rest.delete("/items/1/").await.is_ok());
    }
}
