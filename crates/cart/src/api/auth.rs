//! Authentication API client and session wiring.
//!
//! Thin client for the login/signup endpoints plus an [`AuthService`] that
//! feeds a successful credential into the session signal. Login success is
//! independent of whatever cart merge the session transition triggers.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiError, check_status, trim_base_url};
use crate::session::SessionHandle;

/// Client for the auth endpoints of the storefront API.
#[derive(Clone)]
pub struct AuthApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignupBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

impl AuthApi {
    /// Create an auth API client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url),
        }
    }

    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` on rejected credentials, or another
    /// `ApiError` if the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SecretString, ApiError> {
        let body = LoginBody {
            email,
            password: password.expose_secret(),
        };
        self.request_token("/auth/login", &body).await
    }

    /// Register an account and receive its bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if registration is rejected or the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<SecretString, ApiError> {
        let body = SignupBody {
            name,
            email,
            password: password.expose_secret(),
        };
        self.request_token("/auth/signup", &body).await
    }

    async fn request_token<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<SecretString, ApiError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let text = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&text)?;
        Ok(SecretString::from(parsed.token))
    }
}

/// Login/signup flows bound to a session signal.
///
/// Observers of the session (the cart engine's watcher among them) see the
/// credential appear and react; this service never waits on them.
#[derive(Clone)]
pub struct AuthService {
    api: AuthApi,
    session: SessionHandle,
}

impl AuthService {
    /// Bind an auth client to a session signal.
    #[must_use]
    pub const fn new(api: AuthApi, session: SessionHandle) -> Self {
        Self { api, session }
    }

    /// Log in and populate the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), ApiError> {
        let token = self.api.login(email, password).await?;
        self.session.login(token);
        Ok(())
    }

    /// Sign up and populate the session.
    ///
    /// # Errors
    ///
    /// Returns an error if registration is rejected or the request fails.
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<(), ApiError> {
        let token = self.api.signup(name, email, password).await?;
        self.session.login(token);
        Ok(())
    }

    /// Clear the session.
    pub fn logout(&self) {
        self.session.logout();
    }
}
