//! Remote shop service client.
//!
//! # Architecture
//!
//! - The service is plain JSON over HTTP; [`HttpShopApi`] wraps a shared
//!   `reqwest::Client` and maps every non-success response to a typed error
//!   with the body captured for diagnostics.
//! - Stores depend on the [`ShopApi`] trait, not the concrete client, so
//!   tests drive them with scripted fakes.
//! - Wire request/response shapes live in [`types`] and never leak out of
//!   this module; trait methods traffic in domain types.
//!
//! # Endpoints
//!
//! - `POST auth/login/` - credential exchange for JWT access/refresh tokens
//! - `POST api/token/refresh/` - access-token renewal
//! - `POST auth/register/` - account creation
//! - `POST auth/update_profile/{id}/` - profile replacement (bearer auth)
//! - `POST auth/reset_password/` - password-reset code request
//! - `GET auth/flowers/` - full catalog (flowers + categories)
//! - `POST auth/orders/` - order submission

mod types;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use blossom_core::{ClientId, OrderId};

use crate::catalog::CatalogSnapshot;
use crate::checkout::Order;
use crate::config::ShopConfig;
use crate::session::{Profile, Registration};

use types::{
    CatalogResponse, LoginRequest, LoginResponse, OrderCreatedResponse, PasswordResetRequest,
    RefreshRequest, RefreshResponse, RegisterRequest, UpdateProfileRequest, order_request,
};

/// Errors that can occur when talking to the shop service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not the JSON we expected.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service rejected the request (4xx).
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body, or the status reason.
        message: String,
    },

    /// The service failed (5xx).
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body, or the status reason.
        message: String,
    },
}

impl ApiError {
    /// Whether the request never produced a usable HTTP response.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_))
    }

    /// The message the service attached to a rejection, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } | Self::Server { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// The remote shop service, as the stores see it.
///
/// Methods traffic in domain types; implementations own the wire format.
#[async_trait]
pub trait ShopApi: Send + Sync {
    /// Exchange credentials for tokens and the client profile.
    async fn login(&self, email: &str, password: &str) -> Result<LoginPayload, ApiError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError>;

    /// Create a new account.
    async fn register(&self, registration: &Registration) -> Result<(), ApiError>;

    /// Replace the stored profile fields for `client_id`.
    async fn update_profile(
        &self,
        access_token: &str,
        client_id: ClientId,
        profile: &Profile,
    ) -> Result<(), ApiError>;

    /// Request a password-reset code be sent to `email`.
    async fn request_password_reset(&self, email: &str) -> Result<(), ApiError>;

    /// Fetch the full catalog (flowers and categories).
    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, ApiError>;

    /// Submit an order; returns the server-assigned order id.
    async fn submit_order(&self, order: &Order) -> Result<OrderId, ApiError>;
}

/// Successful login result: both tokens plus the client profile.
#[derive(Debug, Clone)]
pub struct LoginPayload {
    /// JWT access token.
    pub access: String,
    /// JWT refresh token.
    pub refresh: String,
    /// The authenticated client's profile.
    pub profile: Profile,
}

// =============================================================================
// HttpShopApi
// =============================================================================

/// Production [`ShopApi`] implementation over `reqwest`.
#[derive(Clone)]
pub struct HttpShopApi {
    inner: Arc<HttpShopApiInner>,
}

struct HttpShopApiInner {
    client: reqwest::Client,
    config: ShopConfig,
}

impl HttpShopApi {
    /// Create a new client for the configured service.
    #[must_use]
    pub fn new(config: &ShopConfig) -> Self {
        Self {
            inner: Arc::new(HttpShopApiInner {
                client: reqwest::Client::new(),
                config: config.clone(),
            }),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.inner.client.post(self.inner.config.endpoint(path))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.inner.client.get(self.inner.config.endpoint(path))
    }

    /// Send a request and decode the JSON response.
    ///
    /// Non-success statuses become [`ApiError::Rejected`] / [`ApiError::Server`]
    /// with whatever message the error body carries.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .timeout(self.inner.config.http_timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %text.chars().take(200).collect::<String>(),
                "shop API returned non-success status"
            );

            let message = extract_error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

            return Err(if status.is_client_error() {
                ApiError::Rejected {
                    status: status.as_u16(),
                    message,
                }
            } else {
                ApiError::Server {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(200).collect::<String>(),
                "failed to parse shop API response"
            );
            ApiError::Parse(e)
        })
    }
}

#[async_trait]
impl ShopApi for HttpShopApi {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(&self, email: &str, password: &str) -> Result<LoginPayload, ApiError> {
        let response: LoginResponse = self
            .execute(self.post("auth/login/").json(&LoginRequest { email, password }))
            .await?;

        Ok(LoginPayload {
            access: response.access,
            refresh: response.refresh,
            profile: response.client.into_profile(),
        })
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let response: RefreshResponse = self
            .execute(
                self.post("api/token/refresh/").json(&RefreshRequest {
                    refresh: refresh_token,
                }),
            )
            .await?;

        Ok(response.access)
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .execute(
                self.post("auth/register/")
                    .json(&RegisterRequest::from(registration)),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, access_token, profile), fields(client_id = %client_id))]
    async fn update_profile(
        &self,
        access_token: &str,
        client_id: ClientId,
        profile: &Profile,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .execute(
                self.post(&format!("auth/update_profile/{client_id}/"))
                    .header("Authorization", format!("Bearer {access_token}"))
                    .json(&UpdateProfileRequest::from(profile)),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .execute(self.post("auth/reset_password/").json(&PasswordResetRequest { email }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, ApiError> {
        let response: CatalogResponse = self.execute(self.get("auth/flowers/")).await?;
        Ok(response.into_snapshot())
    }

    #[instrument(skip(self, order), fields(lines = order.lines.len()))]
    async fn submit_order(&self, order: &Order) -> Result<OrderId, ApiError> {
        let response: OrderCreatedResponse = self
            .execute(self.post("auth/orders/").json(&order_request(order)))
            .await?;
        Ok(response.order_id)
    }
}

/// Pull a human-readable message out of a service error body.
///
/// The service is not consistent: login failures use `error`, order failures
/// use `message`, token failures use `detail`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| value.get(key))
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}
