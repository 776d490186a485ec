//! Authenticated session ownership.
//!
//! [`SessionManager`] is the only writer of session state. It performs the
//! credential exchange, renews the access token, and tears the session down
//! when renewal is no longer possible. Every other store reads the current
//! access token through it and never learns how the token was obtained.
//!
//! A failed refresh never leaves a half-valid session (token present,
//! profile stale): it always collapses to the logged-out state, because
//! continuing with a dead access token would make every other store silently
//! fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, instrument, warn};

use blossom_core::ClientId;

use crate::api::{ApiError, ShopApi};
use crate::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SecureStore};

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The service rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The refresh token was rejected or absent; the session has been torn
    /// down and the user must log in again.
    #[error("session expired")]
    SessionExpired,

    /// The service rejected the request with a message (registration or
    /// profile updates).
    #[error("{0}")]
    Rejected(String),

    /// The service could not be reached or answered unusably.
    #[error("network failure")]
    Network(#[source] ApiError),
}

/// The authenticated client's profile, as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Server-side client id, when the service includes one.
    pub id: Option<ClientId>,
    /// Account email.
    pub email: String,
    /// First name, if set on the account.
    pub first_name: Option<String>,
    /// Last name, if set on the account.
    pub last_name: Option<String>,
    /// Phone number, if set on the account.
    pub phone: Option<String>,
    /// Postal address, if set on the account.
    pub address: Option<String>,
    /// Avatar path, if set on the account.
    pub image: Option<String>,
}

impl Profile {
    /// Display name for greetings and order forms: `"First Last"`, falling
    /// back to `"Guest User"` when neither name is set.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        if name.is_empty() {
            "Guest User".to_string()
        } else {
            name.to_string()
        }
    }
}

/// A sparse profile update; `Some` fields overwrite, `None` fields are kept.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    /// New account email.
    pub email: Option<String>,
    /// New first name.
    pub first_name: Option<String>,
    /// New last name.
    pub last_name: Option<String>,
    /// New phone number.
    pub phone: Option<String>,
    /// New postal address.
    pub address: Option<String>,
}

impl ProfilePatch {
    fn apply(&self, profile: &mut Profile) {
        if let Some(email) = &self.email {
            profile.email.clone_from(email);
        }
        if let Some(first_name) = &self.first_name {
            profile.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &self.last_name {
            profile.last_name = Some(last_name.clone());
        }
        if let Some(phone) = &self.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(address) = &self.address {
            profile.address = Some(address.clone());
        }
    }
}

/// A new-account request.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: SecretString,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Phone number.
    pub phone: String,
    /// Postal address.
    pub address: String,
}

/// Snapshot of the session state.
///
/// Starts empty at process start, is populated by a successful login, and is
/// fully cleared by logout or an irrecoverable refresh failure.
#[derive(Debug, Clone, Default)]
pub struct Session {
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    obtained_at: Option<DateTime<Utc>>,
    profile: Option<Profile>,
}

impl Session {
    /// True iff both an access token and a profile are present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.profile.is_some()
    }

    /// The current access token, if any.
    #[must_use]
    pub const fn access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref()
    }

    /// The current refresh token, if any.
    #[must_use]
    pub const fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    /// When the current access token was obtained.
    #[must_use]
    pub const fn obtained_at(&self) -> Option<DateTime<Utc>> {
        self.obtained_at
    }

    /// The authenticated profile, if any.
    #[must_use]
    pub const fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }
}

// =============================================================================
// SessionManager
// =============================================================================

/// Owner of the authenticated session.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    api: Arc<dyn ShopApi>,
    secure: Arc<dyn SecureStore>,
    state: RwLock<Session>,
    changes: watch::Sender<Session>,
    /// Serializes token refreshes so two in-flight exchanges can never race
    /// and invalidate each other's refresh token.
    refresh_gate: Mutex<()>,
    /// Bumped on every completed successful exchange; lets a queued caller
    /// detect that the refresh it waited on already did the work.
    refresh_generation: AtomicU64,
}

impl SessionManager {
    /// Create a session manager over the given API and secure store.
    #[must_use]
    pub fn new(api: Arc<dyn ShopApi>, secure: Arc<dyn SecureStore>) -> Self {
        let (changes, _) = watch::channel(Session::default());
        Self {
            inner: Arc::new(SessionManagerInner {
                api,
                secure,
                state: RwLock::new(Session::default()),
                changes,
                refresh_gate: Mutex::new(()),
                refresh_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Observe session snapshots as they change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.changes.subscribe()
    }

    /// The current access token, for attaching to authorized calls.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    /// Submit credentials and establish a session.
    ///
    /// On success both tokens are persisted to the secure store and the
    /// profile is taken from the response. On failure the session is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when the service rejects
    /// the pair, [`AuthError::Network`] when it cannot be reached.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let payload = self
            .inner
            .api
            .login(email, password)
            .await
            .map_err(|err| match err {
                ApiError::Rejected { .. } => AuthError::InvalidCredentials,
                other => AuthError::Network(other),
            })?;

        // Best-effort persistence: a keychain hiccup must not block login.
        if let Err(err) = self.persist_tokens(&payload.access, &payload.refresh).await {
            warn!(error = %err, "failed to persist session tokens");
        }

        let session = self.mutate(|session| {
            session.access_token = Some(SecretString::from(payload.access.clone()));
            session.refresh_token = Some(SecretString::from(payload.refresh.clone()));
            session.obtained_at = Some(Utc::now());
            session.profile = Some(payload.profile.clone());
        });

        debug!("login succeeded");
        Ok(session)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Success replaces only the access token (and its timestamp); profile
    /// and refresh token are untouched. Any failure tears the session down
    /// and returns [`AuthError::SessionExpired`].
    ///
    /// Concurrent callers are serialized: a caller that finds a refresh
    /// already in flight awaits its outcome instead of spending the refresh
    /// token on a second exchange.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Session, AuthError> {
        let generation_before = self.inner.refresh_generation.load(Ordering::Acquire);
        let _gate = self.inner.refresh_gate.lock().await;

        // Someone else completed an exchange while we waited for the gate.
        if self.inner.refresh_generation.load(Ordering::Acquire) != generation_before {
            return Ok(self.session());
        }

        let Some(refresh_token) = self.session().refresh_token else {
            // Nothing to exchange: either never logged in, or a refresh that
            // failed while we queued already tore the session down.
            self.teardown().await;
            return Err(AuthError::SessionExpired);
        };

        match self.inner.api.refresh(refresh_token.expose_secret()).await {
            Ok(access) => {
                if let Err(err) = self.inner.secure.set(ACCESS_TOKEN_KEY, &access).await {
                    warn!(error = %err, "failed to persist refreshed access token");
                }

                let session = self.mutate(|session| {
                    session.access_token = Some(SecretString::from(access.clone()));
                    session.obtained_at = Some(Utc::now());
                });

                self.inner.refresh_generation.fetch_add(1, Ordering::AcqRel);
                debug!("access token refreshed");
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, tearing down session");
                self.teardown().await;
                Err(AuthError::SessionExpired)
            }
        }
    }

    /// Clear the session and delete persisted tokens.
    ///
    /// Idempotent: safe to call on an already-empty session.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.teardown().await;
    }

    /// Merge fields into the profile without touching tokens.
    ///
    /// Used after a profile-edit round trip; a no-op when logged out.
    pub fn update_profile(&self, patch: &ProfilePatch) -> Session {
        self.mutate(|session| {
            if let Some(profile) = session.profile.as_mut() {
                patch.apply(profile);
            }
        })
    }

    /// Push a profile edit to the service, then merge it locally.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionExpired`] when not authenticated or when
    /// the service no longer accepts the access token,
    /// [`AuthError::Rejected`] when it refuses the edit, and
    /// [`AuthError::Network`] on transport failure.
    #[instrument(skip(self, patch))]
    pub async fn save_profile(&self, patch: ProfilePatch) -> Result<Session, AuthError> {
        let session = self.session();
        let (Some(token), Some(profile)) = (session.access_token, session.profile) else {
            return Err(AuthError::SessionExpired);
        };
        let Some(client_id) = profile.id else {
            return Err(AuthError::Rejected(
                "profile has no client id to update".to_string(),
            ));
        };

        let mut merged = profile;
        patch.apply(&mut merged);

        self.inner
            .api
            .update_profile(token.expose_secret(), client_id, &merged)
            .await
            .map_err(|err| match err {
                ApiError::Rejected {
                    status: 401 | 403, ..
                } => AuthError::SessionExpired,
                ApiError::Rejected { message, .. } => AuthError::Rejected(message),
                other => AuthError::Network(other),
            })?;

        Ok(self.update_profile(&patch))
    }

    /// Create a new account. Does not establish a session; the user logs in
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] with the service's message when the
    /// account cannot be created, [`AuthError::Network`] on transport
    /// failure.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<(), AuthError> {
        self.inner
            .api
            .register(registration)
            .await
            .map_err(|err| match err {
                ApiError::Rejected { message, .. } => AuthError::Rejected(message),
                other => AuthError::Network(other),
            })
    }

    /// Ask the service to send a password-reset code to `email`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] or [`AuthError::Network`] as for
    /// [`Self::register`].
    #[instrument(skip(self), fields(email = %email))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.inner
            .api
            .request_password_reset(email)
            .await
            .map_err(|err| match err {
                ApiError::Rejected { message, .. } => AuthError::Rejected(message),
                other => AuthError::Network(other),
            })
    }

    /// Mutate the session under the write lock and publish the new snapshot.
    fn mutate(&self, f: impl FnOnce(&mut Session)) -> Session {
        let snapshot = {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            f(&mut state);
            state.clone()
        };
        self.inner.changes.send_replace(snapshot.clone());
        snapshot
    }

    async fn persist_tokens(&self, access: &str, refresh: &str) -> Result<(), crate::storage::StorageError> {
        self.inner.secure.set(ACCESS_TOKEN_KEY, access).await?;
        self.inner.secure.set(REFRESH_TOKEN_KEY, refresh).await?;
        Ok(())
    }

    async fn teardown(&self) {
        self.mutate(|session| *session = Session::default());

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(err) = self.inner.secure.delete(key).await {
                warn!(key, error = %err, "failed to delete persisted token");
            }
        }
    }
}
