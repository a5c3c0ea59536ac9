//! Access credential refresh
//!
//! Refreshes are single-flight: concurrent requests that are all rejected
//! with 401 share one call to the refresh endpoint, and a failed refresh ends
//! the session once for all of them.

use super::error::ClientError;
use crate::types::{RefreshRequest, RefreshResponse, error_message};
use medicat_core::{ACCESS_KEY, CredentialStore, REFRESH_KEY};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Why a refresh attempt failed
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh credential stored")]
    MissingCredential,

    #[error(transparent)]
    Client(#[from] ClientError),

    /// A concurrent request's refresh already failed and ended the session
    #[error("session already ended by a failed refresh")]
    SessionEnded,
}

pub(crate) struct Refresher {
    url: String,
    in_flight: Mutex<()>,
    // Number of failed refreshes so far
    failures: AtomicU64,
}

impl Refresher {
    pub(crate) fn new(url: String) -> Self {
        Self {
            url,
            in_flight: Mutex::new(()),
            failures: AtomicU64::new(0),
        }
    }

    /// Failure count to pass back to [`Refresher::refresh`]
    ///
    /// Read before sending the request whose rejection may need a refresh.
    pub(crate) fn generation(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    /// Obtain a usable access credential after `rejected` was refused
    ///
    /// When another caller already replaced `rejected` while this one waited
    /// for the lock, the replacement is returned without a network call.
    /// When another caller's refresh failed after `generation` was read,
    /// [`RefreshError::SessionEnded`] is returned and the caller must not end
    /// the session again.
    pub(crate) async fn refresh(
        &self,
        http: &reqwest::Client,
        store: &dyn CredentialStore,
        rejected: Option<&str>,
        generation: u64,
    ) -> Result<String, RefreshError> {
        let _guard = self.in_flight.lock().await;

        if let Some(current) = store.access_token().filter(|a| Some(a.as_str()) != rejected) {
            debug!("Access credential already refreshed by a concurrent request");
            return Ok(current);
        }

        if self.failures.load(Ordering::Acquire) != generation {
            debug!("Session already ended by a concurrent refresh failure");
            return Err(RefreshError::SessionEnded);
        }

        let result = self.exchange(http, store).await;
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::AcqRel);
        }
        result
    }

    async fn exchange(
        &self,
        http: &reqwest::Client,
        store: &dyn CredentialStore,
    ) -> Result<String, RefreshError> {
        let refresh = store.refresh_token().ok_or(RefreshError::MissingCredential)?;

        info!("Refreshing access credential");
        let response = http
            .post(&self.url)
            .json(&RefreshRequest { refresh })
            .send()
            .await
            .map_err(ClientError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| status.to_string());
            return Err(ClientError::from_status(status, message).into());
        }

        let body = response.text().await.map_err(ClientError::from)?;
        let tokens: RefreshResponse = serde_json::from_str(&body).map_err(ClientError::from)?;

        store.set(ACCESS_KEY, &tokens.access).map_err(ClientError::from)?;
        if let Some(rotated) = &tokens.refresh {
            store.set(REFRESH_KEY, rotated).map_err(ClientError::from)?;
        }

        Ok(tokens.access)
    }
}
