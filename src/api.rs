mod auth;
mod projects;
mod tasks;

pub use auth::{AuthApi, SubscriptionApi, UserApi};
pub use projects::ProjectsApi;
pub use tasks::TasksApi;

use crate::error::ApiError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Thin JSON client for the todo API.
///
/// Cloning is cheap: the underlying connection pool is shared, and each clone
/// carries its own copy of the bearer token.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        ApiClient {
            http: Client::new(),
            base_url: crate::config::normalize_base_url(base_url),
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi { client: self }
    }

    pub fn user(&self) -> UserApi<'_> {
        UserApi { client: self }
    }

    pub fn subscription(&self) -> SubscriptionApi<'_> {
        SubscriptionApi { client: self }
    }

    pub fn tasks(&self) -> TasksApi<'_> {
        TasksApi { client: self }
    }

    pub fn projects(&self) -> ProjectsApi<'_> {
        ProjectsApi { client: self }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(method, path, &[], body).await
    }

    async fn execute<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        tracing::debug!(%method, %url, "api request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(|err| {
            tracing::warn!(%method, %url, error = %err, "api request failed");
            ApiError::Transport(err)
        })?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let err = ApiError::from_response(status, &text);
            tracing::warn!(%method, %url, %status, error = %err, "api error response");
            return Err(err);
        }

        let bytes = if status == StatusCode::NO_CONTENT {
            Default::default()
        } else {
            res.bytes().await?
        };
        // an empty body decodes like `null`
        let decoded = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&bytes)
        };
        decoded.map_err(|err| ApiError::Decode {
            message: err.to_string(),
        })
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    /// Fetches a collection. The server encodes an empty one as `null`.
    pub(crate) async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        self.execute::<Option<Vec<T>>, ()>(Method::GET, path, query, None)
            .await
            .map(Option::unwrap_or_default)
    }

    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// Whatever the server sends back on delete is ignored.
    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request::<serde_json::Value, ()>(Method::DELETE, path, None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::{json, Value};

    #[test]
    fn test_url_joins_with_and_without_slash() {
        let client = ApiClient::new("http://localhost:8080/api/v1/");
        assert_eq!(client.url("/tasks"), "http://localhost:8080/api/v1/tasks");
        assert_eq!(client.url("tasks"), "http://localhost:8080/api/v1/tasks");
    }

    #[tokio::test]
    async fn test_bearer_and_content_type_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer abc123")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"u1","email":"a@example.com","is_premium":false}"#)
            .expect(1)
            .create_async()
            .await;

        let mut client = ApiClient::new(&server.url());
        client.set_token("abc123");
        let user = client.user().me().await.unwrap();

        assert_eq!(user.email, "a@example.com");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/projects")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        let projects = client.projects().list().await.unwrap();

        assert!(projects.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/projects/missing")
            .with_status(404)
            .with_body(r#"{"error":"project not found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        let err = client.projects().get("missing").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.message(), "project not found");
    }

    #[tokio::test]
    async fn test_unauthorized_is_distinguished() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/me")
            .with_status(401)
            .with_body(r#"{"error":"invalid token"}"#)
            .create_async()
            .await;

        let mut client = ApiClient::new(&server.url());
        client.set_token("expired");
        let err = client.user().me().await.unwrap_err();

        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tasks")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        let err = client.tasks().list(None).await.unwrap_err();

        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_no_content_resolves_to_empty_value() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/ping")
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        let value: Value = client
            .request(Method::POST, "/ping", Some(&json!({})))
            .await
            .unwrap();

        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_null_list_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tasks/today")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;
        server
            .mock("GET", "/projects")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        assert!(client.tasks().today().await.unwrap().is_empty());
        assert!(client.projects().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_list_body_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tasks/upcoming")
            .match_query(Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        assert!(client.tasks().upcoming(14).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_ignores_response_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/projects/p1")
            .with_status(200)
            .with_body(r#"{"message":"project deleted"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        client.projects().delete("p1").await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // Nothing listens on port 9 of the loopback interface.
        let client = ApiClient::new("http://127.0.0.1:9");
        let err = client.projects().list().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
