//! Medicat catalog API client
//!
//! Every call made through [`CatalogClient::send`] carries the stored access
//! credential. A 401 on a fresh request triggers one credential refresh and a
//! single replay; when the refresh fails the session is cleared and the
//! [`Navigator`] is sent to the login entry point.

pub mod auth;
pub mod auxiliary;
pub mod error;
pub mod medicines;
pub mod navigator;
pub mod refresh;
pub mod request;

pub use auxiliary::{
    AuxiliaryResource, CategoryInput, FormInput, GenericNameInput, LogoUpload, ManufacturerInput,
    ResourceInput,
};
pub use error::ClientError;
pub use navigator::{LogNavigator, Navigator};
pub use request::{ApiRequest, FormPart, RequestBody, RetryState};

use crate::types::{Item, Listing, error_message};
use medicat_core::{LOGIN_PATH, MemoryStore, Page, SessionContext};
use refresh::{RefreshError, Refresher};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default path of the login endpoint
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login/";
/// Default path of the refresh endpoint
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh/";
/// Default path of the logout (refresh revocation) endpoint
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout/";

/// Catalog API client
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    login_path: String,
    logout_path: String,
    session: SessionContext,
    navigator: Arc<dyn Navigator>,
    refresher: Arc<Refresher>,
}

impl CatalogClient {
    /// Create a new client with default configuration and in-memory credentials
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> CatalogClientBuilder {
        CatalogClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session this client reads credentials from
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Send a request and decode a single object from the response
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let body = self.dispatch(request).await?.text().await?;
        let item: Item<T> = serde_json::from_str(&body)?;
        Ok(item.into_inner())
    }

    /// Send a request and decode a list, paginated or not
    pub async fn send_list<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Page<T>, ClientError> {
        let body = self.dispatch(request).await?.text().await?;
        let listing: Listing<T> = serde_json::from_str(&body)?;
        Ok(listing.into_page())
    }

    /// Send a request whose response body is irrelevant
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.dispatch(request).await.map(drop)
    }

    /// Run a request through credential injection and 401 recovery
    async fn dispatch(&self, mut request: ApiRequest) -> Result<reqwest::Response, ClientError> {
        let store = self.session.store();
        loop {
            let access = store.access_token();
            let generation = self.refresher.generation();
            let response = self.attempt(&request, access.as_deref()).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            let error = Self::error_from(response).await;
            if status != StatusCode::UNAUTHORIZED || request.retry_state() == RetryState::Retried {
                return Err(error);
            }

            request.mark_retried();
            match self
                .refresher
                .refresh(&self.client, store.as_ref(), access.as_deref(), generation)
                .await
            {
                Ok(_) => debug!(path = request.path(), "Replaying request with refreshed credential"),
                Err(RefreshError::SessionEnded) => return Err(error),
                Err(refresh_error) => {
                    warn!("Credential refresh failed: {refresh_error}");
                    self.end_session();
                    return Err(error);
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
        access: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        debug!(
            method = %request.method(),
            path = request.path(),
            authenticated = access.is_some(),
            retry = ?request.retry_state(),
            "Sending request"
        );
        let builder = request.build(&self.client, &self.base_url, access)?;
        Ok(builder.send().await?)
    }

    /// Clear credentials and send the user to the login entry point
    fn end_session(&self) {
        if let Err(err) = self.session.logout() {
            warn!("Failed to clear stored credentials: {err}");
        }
        self.navigator.navigate(LOGIN_PATH);
    }

    async fn error_from(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| status.to_string());
        ClientError::from_status(status, message)
    }

    /// Build a request to a path outside the credential-injecting pipeline
    fn public_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{path}", self.base_url))
    }
}

/// Builder for CatalogClient
#[derive(Default)]
pub struct CatalogClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    login_path: Option<String>,
    refresh_path: Option<String>,
    logout_path: Option<String>,
    session: Option<SessionContext>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl CatalogClientBuilder {
    /// Set the base URL, e.g. `http://localhost:8000/api`
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Override the login endpoint path
    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    /// Override the refresh endpoint path
    #[must_use]
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Override the logout endpoint path
    #[must_use]
    pub fn logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = Some(path.into());
        self
    }

    /// Use an existing session and its credential store
    #[must_use]
    pub fn session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the navigator invoked when the session cannot be recovered
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<CatalogClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|err| ClientError::Configuration(format!("invalid base_url {base_url:?}: {err}")))?;

        let mut client_builder = ClientBuilder::new();

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| concat!("medicat/", env!("CARGO_PKG_VERSION")).to_string()),
        );

        let client = client_builder.build()?;

        let refresh_path = self
            .refresh_path
            .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string());
        let refresher = Refresher::new(format!("{base_url}{refresh_path}"));

        Ok(CatalogClient {
            client,
            login_path: self
                .login_path
                .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string()),
            logout_path: self
                .logout_path
                .unwrap_or_else(|| DEFAULT_LOGOUT_PATH.to_string()),
            session: self
                .session
                .unwrap_or_else(|| SessionContext::new(Arc::new(MemoryStore::new()))),
            navigator: self.navigator.unwrap_or_else(|| Arc::new(LogNavigator)),
            refresher: Arc::new(refresher),
            base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::navigator::MockNavigator;
    use super::*;
    use medicat_core::{ACCESS_KEY, CredentialPair, CredentialStore, REFRESH_KEY};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signed_in() -> (SessionContext, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_credentials(&CredentialPair {
            access: "A1".into(),
            refresh: "R1".into(),
        }));
        (SessionContext::new(store.clone()), store)
    }

    #[test]
    fn builder_requires_valid_base_url() {
        assert!(matches!(
            CatalogClient::builder().build(),
            Err(ClientError::Configuration(_))
        ));
        assert!(matches!(
            CatalogClient::new("not a url"),
            Err(ClientError::Configuration(_))
        ));

        let client = CatalogClient::new("http://localhost:8000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
    }

    #[tokio::test]
    async fn failed_refresh_navigates_to_login_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let mut navigator = MockNavigator::new();
        navigator
            .expect_navigate()
            .withf(|path| path.to_string() == LOGIN_PATH)
            .times(1)
            .return_const(());

        let (session, store) = signed_in();
        let client = CatalogClient::builder()
            .base_url(server.uri())
            .session(session.clone())
            .navigator(Arc::new(navigator))
            .build()
            .unwrap();

        let result = client
            .send_list::<medicat_core::Category>(ApiRequest::get("/categories/"))
            .await;

        assert!(matches!(result, Err(ClientError::AuthenticationFailed(ref m)) if m == "expired"));
        assert!(!session.is_authenticated());
        assert!(store.get(ACCESS_KEY).is_none());
        assert!(store.get(REFRESH_KEY).is_none());
    }

    #[tokio::test]
    async fn missing_refresh_credential_ends_session_without_refresh_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forms/"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "A2"})))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_KEY, "A1").unwrap();
        let mut navigator = MockNavigator::new();
        navigator.expect_navigate().times(1).return_const(());

        let client = CatalogClient::builder()
            .base_url(server.uri())
            .session(SessionContext::new(store.clone()))
            .navigator(Arc::new(navigator))
            .build()
            .unwrap();

        let result = client.send_empty(ApiRequest::get("/forms/")).await;
        assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
        assert!(store.get(ACCESS_KEY).is_none());
    }

    #[tokio::test]
    async fn non_auth_errors_leave_session_alone() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/categories/9/"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Not found."})),
            )
            .mount(&server)
            .await;

        let mut navigator = MockNavigator::new();
        navigator.expect_navigate().times(0);

        let (session, store) = signed_in();
        let client = CatalogClient::builder()
            .base_url(server.uri())
            .session(session.clone())
            .navigator(Arc::new(navigator))
            .build()
            .unwrap();

        let result = client.send_empty(ApiRequest::delete("/categories/9/")).await;
        assert!(matches!(result, Err(ClientError::NotFound(ref m)) if m == "Not found."));
        assert!(session.is_authenticated());
        assert_eq!(store.access_token().as_deref(), Some("A1"));
    }
}
