//! Remote cart gateway.
//!
//! Thin, stateless request/response mapping over the cart REST surface. The
//! engine owns all cart policy; this client only shapes requests, attaches
//! the bearer credential, and converts responses. The backend treats the
//! product identifier as the line-item identifier.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::instrument;

use kuppam_core::{CartLine, ProductId};

use super::conversions::{CartEnvelope, convert_cart_lines};
use super::{ApiError, check_status, trim_base_url};
use crate::session::SessionHandle;

/// Client for the cart endpoints of the storefront API.
#[derive(Clone)]
pub struct CartApi {
    inner: Arc<CartApiInner>,
}

struct CartApiInner {
    client: reqwest::Client,
    base_url: String,
    session: SessionHandle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLineBody<'a> {
    product_id: &'a ProductId,
    quantity: i64,
}

#[derive(Debug, Serialize)]
struct UpdateLineBody {
    quantity: i64,
}

impl CartApi {
    /// Create a cart API client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, session: SessionHandle) -> Self {
        Self {
            inner: Arc::new(CartApiInner {
                client,
                base_url: trim_base_url(base_url),
                session,
            }),
        }
    }

    /// Fetch the server cart as a line list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<Vec<CartLine>, ApiError> {
        let request = self.inner.client.get(self.endpoint("/cart"));
        self.execute(request).await
    }

    /// Add a new line item.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn create_line(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Vec<CartLine>, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("/cart"))
            .json(&CreateLineBody {
                product_id,
                quantity,
            });
        self.execute(request).await
    }

    /// Set an existing line item's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    #[instrument(skip(self), fields(item_id = %item_id, quantity))]
    pub async fn update_line(
        &self,
        item_id: &ProductId,
        quantity: i64,
    ) -> Result<Vec<CartLine>, ApiError> {
        let request = self
            .inner
            .client
            .put(self.endpoint(&format!("/cart/item/{item_id}")))
            .json(&UpdateLineBody { quantity });
        self.execute(request).await
    }

    /// Delete a line item.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn delete_line(&self, item_id: &ProductId) -> Result<Vec<CartLine>, ApiError> {
        let request = self
            .inner
            .client
            .delete(self.endpoint(&format!("/cart/item/{item_id}")));
        self.execute(request).await
    }

    /// Delete every line item.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<Vec<CartLine>, ApiError> {
        let request = self.inner.client.delete(self.endpoint("/cart"));
        self.execute(request).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Attach the credential, send, check status, convert the cart payload.
    ///
    /// An authorization-denied response clears the session before the error
    /// surfaces, flipping the engine back to the local cart.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<CartLine>, ApiError> {
        let request = match self.inner.session.token() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request.send().await?;
        let response = match check_status(response).await {
            Err(ApiError::Unauthorized) => {
                self.inner.session.clear_on_denied();
                return Err(ApiError::Unauthorized);
            }
            other => other?,
        };

        let body = response.text().await?;
        let envelope: CartEnvelope = serde_json::from_str(&body)?;
        Ok(convert_cart_lines(envelope))
    }
}
