use super::ApiClient;
use crate::error::ApiError;
use crate::models::{AuthResponse, CheckoutRequest, CheckoutSession, Credentials, User};

pub struct AuthApi<'a> {
    pub(super) client: &'a ApiClient,
}

impl AuthApi<'_> {
    pub async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.client.post("/auth/register", credentials).await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.client.post("/auth/login", credentials).await
    }
}

pub struct UserApi<'a> {
    pub(super) client: &'a ApiClient,
}

impl UserApi<'_> {
    pub async fn me(&self) -> Result<User, ApiError> {
        self.client.get("/me").await
    }
}

pub struct SubscriptionApi<'a> {
    pub(super) client: &'a ApiClient,
}

impl SubscriptionApi<'_> {
    /// Returns the billing provider URL to send the user to.
    pub async fn create_checkout_session(
        &self,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, ApiError> {
        let body = CheckoutRequest {
            success_url,
            cancel_url,
        };
        self.client
            .post("/subscription/create-checkout-session", &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const USER: &str = r#"{"id":"u1","email":"ada@example.com","is_premium":false}"#;

    fn credentials() -> Credentials {
        Credentials {
            email: "ada@example.com".to_string(),
            password: "secret1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_login_then_me() {
        let mut server = mockito::Server::new_async().await;
        let body = Matcher::Json(json!({ "email": "ada@example.com", "password": "secret1" }));
        server
            .mock("POST", "/auth/register")
            .match_body(body.clone())
            .with_status(201)
            .with_body(format!(r#"{{"token":"tok-register","user":{}}}"#, USER))
            .create_async()
            .await;
        server
            .mock("POST", "/auth/login")
            .match_body(body)
            .with_status(200)
            .with_body(format!(r#"{{"token":"tok-login","user":{}}}"#, USER))
            .create_async()
            .await;
        server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer tok-login")
            .with_status(200)
            .with_body(USER)
            .create_async()
            .await;

        let mut client = ApiClient::new(&server.url());
        let registered = client.auth().register(&credentials()).await.unwrap();
        assert_eq!(registered.token, "tok-register");

        let logged_in = client.auth().login(&credentials()).await.unwrap();
        client.set_token(logged_in.token);

        let me = client.user().me().await.unwrap();
        assert_eq!(me.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_login_with_bad_password() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"error":"invalid email or password"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        let err = client.auth().login(&credentials()).await.unwrap_err();
        assert_eq!(err.message(), "invalid email or password");
    }

    #[tokio::test]
    async fn test_checkout_session_sends_callback_urls() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/subscription/create-checkout-session")
            .match_body(Matcher::Json(json!({
                "success_url": "http://localhost:3000?upgrade=success",
                "cancel_url": "http://localhost:3000?upgrade=cancel"
            })))
            .with_status(200)
            .with_body(r#"{"url":"https://checkout.example.com/s/1"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        let session = client
            .subscription()
            .create_checkout_session(
                "http://localhost:3000?upgrade=success",
                "http://localhost:3000?upgrade=cancel",
            )
            .await
            .unwrap();
        assert_eq!(session.url.as_deref(), Some("https://checkout.example.com/s/1"));
    }
}
