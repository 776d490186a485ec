//! Checkout: validate, build, submit.
//!
//! The builder turns the current cart lines and session profile into an
//! immutable [`Order`] and submits it. Validation happens entirely before
//! any network activity; construction is pure; submission is the only I/O.
//! The builder never mutates the cart - after a confirmed order the caller
//! clears it, which keeps checkout and cart decoupled and leaves the cart
//! intact for a retry when submission fails.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use blossom_core::{Email, EmailError, FlowerId, OrderId, Price};

use crate::api::{ApiError, ShopApi};
use crate::cart::CartLine;
use crate::session::Profile;

/// Errors found before any network activity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required contact field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The email field is present but not a usable address.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// There is nothing to order.
    #[error("cart is empty")]
    EmptyCart,
}

/// Errors from order submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The service refused the order; the message is shown to the user.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// The service could not be reached or answered unusably.
    #[error("network failure")]
    Network(#[source] ApiError),
}

/// Either phase of [`CheckoutOrderBuilder::place_order`] failing.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Validation failed; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Submission failed; the cart is untouched and can be retried.
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Progress of the checkout flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutState {
    /// No checkout in progress.
    #[default]
    Idle,
    /// Fields and cart are being validated.
    Validating,
    /// The order is on the wire.
    Submitting,
    /// The last submission was confirmed.
    Succeeded,
    /// The last validation or submission failed.
    Failed,
}

/// Shipping/contact fields as entered on the checkout screen.
#[derive(Debug, Clone, Default)]
pub struct CheckoutFields {
    /// Delivery address.
    pub address: String,
    /// Contact phone number.
    pub phone: String,
    /// Contact email.
    pub email: String,
}

/// One line of a built order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    /// Catalog item ordered.
    pub item_id: FlowerId,
    /// Display name, snapshotted from the cart line.
    pub name: String,
    /// Image path, snapshotted from the cart line.
    pub image: String,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    pub unit_price: Price,
}

/// The finalized purchase request. Built once at submission; immutable; the
/// remote service is its system of record (it is never persisted locally).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Customer display name ("First Last" or "Guest User").
    pub customer_name: String,
    /// Delivery address.
    pub address: String,
    /// Contact phone number.
    pub phone: String,
    /// Contact email.
    pub email: Email,
    /// Ordered lines.
    pub lines: Vec<OrderLine>,
    /// Total recomputed from the lines.
    pub total: Price,
}

/// A confirmed order: the server-assigned id plus the lines that were
/// submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    /// Server-assigned order id.
    pub order_id: OrderId,
    /// The submitted lines, echoed for the summary screen.
    pub lines: Vec<OrderLine>,
}

// =============================================================================
// CheckoutOrderBuilder
// =============================================================================

/// Drives `Idle -> Validating -> Submitting -> {Succeeded, Failed}`.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct CheckoutOrderBuilder {
    inner: Arc<CheckoutOrderBuilderInner>,
}

struct CheckoutOrderBuilderInner {
    api: Arc<dyn ShopApi>,
    state: RwLock<CheckoutState>,
    changes: watch::Sender<CheckoutState>,
}

impl CheckoutOrderBuilder {
    /// Create an idle builder over the given API.
    #[must_use]
    pub fn new(api: Arc<dyn ShopApi>) -> Self {
        let (changes, _) = watch::channel(CheckoutState::Idle);
        Self {
            inner: Arc::new(CheckoutOrderBuilderInner {
                api,
                state: RwLock::new(CheckoutState::Idle),
                changes,
            }),
        }
    }

    /// Check fields and cart without any network activity.
    ///
    /// Fields are checked in screen order (address, phone, email), so the
    /// first blank one is the one reported.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(fields: &CheckoutFields, lines: &[CartLine]) -> Result<(), ValidationError> {
        parse_fields(fields, lines).map(|_| ())
    }

    /// Build an order from fields, cart lines, and the session profile.
    ///
    /// Pure construction, no I/O. The total is recomputed from `lines` -
    /// caller-supplied totals are never trusted.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] exactly as [`Self::validate`] would.
    pub fn build(
        fields: &CheckoutFields,
        lines: &[CartLine],
        profile: Option<&Profile>,
    ) -> Result<Order, ValidationError> {
        let email = parse_fields(fields, lines)?;

        let order_lines: Vec<OrderLine> = lines
            .iter()
            .map(|line| OrderLine {
                item_id: line.item_id,
                name: line.name.clone(),
                image: line.image.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let total = lines
            .iter()
            .map(CartLine::line_total)
            .sum::<Price>()
            .rounded();

        Ok(Order {
            customer_name: profile.map_or_else(|| "Guest User".to_string(), Profile::display_name),
            address: fields.address.trim().to_string(),
            phone: fields.phone.trim().to_string(),
            email,
            lines: order_lines,
            total,
        })
    }

    /// Submit a built order.
    ///
    /// On success the caller is expected to clear the cart; on failure the
    /// cart is left untouched so the user can retry.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Rejected`] with the service's message, or
    /// [`SubmitError::Network`] when it cannot be reached.
    #[instrument(skip(self, order), fields(lines = order.lines.len()))]
    pub async fn submit(&self, order: &Order) -> Result<OrderConfirmation, SubmitError> {
        self.set_state(CheckoutState::Submitting);

        match self.inner.api.submit_order(order).await {
            Ok(order_id) => {
                self.set_state(CheckoutState::Succeeded);
                debug!(order_id = %order_id, "order confirmed");
                Ok(OrderConfirmation {
                    order_id,
                    lines: order.lines.clone(),
                })
            }
            Err(err) => {
                self.set_state(CheckoutState::Failed);
                warn!(error = %err, "order submission failed");
                Err(match err {
                    ApiError::Rejected { message, .. } | ApiError::Server { message, .. } => {
                        SubmitError::Rejected(message)
                    }
                    other => SubmitError::Network(other),
                })
            }
        }
    }

    /// Run the whole flow: validate, build, submit.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] before any network activity, or
    /// [`CheckoutError::Submit`] from the wire.
    pub async fn place_order(
        &self,
        fields: &CheckoutFields,
        lines: &[CartLine],
        profile: Option<&Profile>,
    ) -> Result<OrderConfirmation, CheckoutError> {
        self.set_state(CheckoutState::Validating);

        let order = match Self::build(fields, lines, profile) {
            Ok(order) => order,
            Err(err) => {
                self.set_state(CheckoutState::Failed);
                return Err(err.into());
            }
        };

        Ok(self.submit(&order).await?)
    }

    /// The current flow state.
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        *self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Observe flow-state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.inner.changes.subscribe()
    }

    fn set_state(&self, next: CheckoutState) {
        {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *state = next;
        }
        self.inner.changes.send_replace(next);
    }
}

/// Shared validation: blank checks in screen order, then email shape, then
/// the cart.
fn parse_fields(fields: &CheckoutFields, lines: &[CartLine]) -> Result<Email, ValidationError> {
    if fields.address.trim().is_empty() {
        return Err(ValidationError::MissingField("address"));
    }
    if fields.phone.trim().is_empty() {
        return Err(ValidationError::MissingField("phone"));
    }
    if fields.email.trim().is_empty() {
        return Err(ValidationError::MissingField("email"));
    }

    let email = Email::parse(&fields.email)?;

    if lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    Ok(email)
}
