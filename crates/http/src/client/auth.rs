//! Credential exchange with the authentication endpoints

use super::{CatalogClient, ClientError};
use crate::types::{LoginRequest, LoginResponse, RefreshRequest};
use reqwest::Method;
use tracing::{debug, info};

impl CatalogClient {
    /// Exchange a username and password for a credential pair
    ///
    /// The call bypasses the refresh pipeline: a 401 here means the
    /// credentials were wrong, not that a session expired. On success both
    /// credentials are persisted and the session is marked authenticated.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        debug!(username, "Logging in");
        let response = self
            .public_request(Method::POST, &self.login_path)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body = response.text().await?;
        let pair: LoginResponse = serde_json::from_str(&body)?;

        self.session.store().store_credentials(&pair)?;
        self.session.login();
        info!(username, "Logged in");
        Ok(pair)
    }

    /// Ask the backend to revoke the stored refresh credential
    ///
    /// Does not touch local state; pair with [`medicat_core::SessionContext::logout`].
    /// Returns `Ok(false)` when there was no refresh credential to revoke.
    pub async fn revoke(&self) -> Result<bool, ClientError> {
        let Some(refresh) = self.session.store().refresh_token() else {
            return Ok(false);
        };

        let response = self
            .public_request(Method::POST, &self.logout_path)
            .json(&RefreshRequest { refresh })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        debug!("Refresh credential revoked");
        Ok(true)
    }
}
