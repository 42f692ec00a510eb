//! Composition root: validates configuration and wires the HTTP client,
//! session store, coordinator and repository together. View-models are
//! created on demand from here.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api_client::ApiClient;
use crate::capabilities::Capabilities;
use crate::config::{AppConfig, ConfigError};
use crate::navigation::{AppCoordinator, Route};
use crate::repository::{IncidentsRepo, IncidentsRepository};
use crate::session::KvSessionStore;
use crate::use_cases::{
    ChangeIncidentStatusUseCase, DashboardUseCase, GetIncidentTypesUseCase, GetIncidentsUseCase,
    LoginUseCase, SubmitIncidentUseCase, VerifyOtpUseCase,
};
use crate::view_models::{
    DashboardViewModel, IncidentListViewModel, LoginViewModel, OtpViewModel,
    SubmitIncidentViewModel,
};
use crate::{ApiError, Clock, SystemClock};

#[derive(Error, Debug)]
pub enum BootError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to create API client: {0}")]
    Api(#[from] ApiError),
}

pub struct App {
    config: AppConfig,
    client: Arc<ApiClient>,
    coordinator: Arc<AppCoordinator>,
    repo: Arc<dyn IncidentsRepository>,
    clock: Arc<dyn Clock>,
}

impl App {
    /// Builds the object graph. A persisted session is restored and its
    /// token installed on the client; later sign-ins and sign-outs keep the
    /// client's token in sync.
    #[instrument(skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: AppConfig, capabilities: Capabilities) -> Result<Self, BootError> {
        config.validate()?;

        let client = Arc::new(ApiClient::from_config(&config, capabilities.http.clone())?);
        let store = Arc::new(KvSessionStore::new(capabilities.kv.clone()));
        let coordinator = Arc::new(AppCoordinator::new(store));

        client.set_auth_token(coordinator.auth_token().as_deref());
        {
            let client = Arc::clone(&client);
            coordinator.on_session_change(move |session| {
                debug!(authenticated = session.is_authenticated(), "session changed");
                client.set_auth_token(session.auth_token());
            });
        }

        let repo: Arc<dyn IncidentsRepository> = Arc::new(IncidentsRepo::new(client.clone()));

        info!(
            authenticated = coordinator.is_authenticated(),
            "app initialised"
        );

        Ok(Self {
            config,
            client,
            coordinator,
            repo,
            clock: Arc::new(SystemClock),
        })
    }

    /// Network transport backed by reqwest; storage is supplied by the caller.
    #[cfg(feature = "reqwest-transport")]
    pub fn with_reqwest(
        config: AppConfig,
        kv: Arc<dyn crate::capabilities::KeyValueStore>,
    ) -> Result<Self, BootError> {
        let http = Arc::new(crate::capabilities::ReqwestTransport::new());
        Self::new(config, Capabilities::new(http, kv))
    }

    /// Replaces the clock used by date filters.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn coordinator(&self) -> &Arc<AppCoordinator> {
        &self.coordinator
    }

    pub fn root_route(&self) -> Route {
        self.coordinator.root_route()
    }

    // ========================================================================
    // View-models
    // ========================================================================

    pub fn login_view_model(&self) -> LoginViewModel {
        LoginViewModel::new(LoginUseCase::new(self.repo.clone()), self.coordinator.clone())
    }

    pub fn otp_view_model(&self, email: impl Into<String>) -> OtpViewModel {
        OtpViewModel::new(
            email,
            VerifyOtpUseCase::new(self.repo.clone()),
            self.coordinator.clone(),
            self.config.otp_success_delay(),
        )
    }

    pub fn incident_list_view_model(&self) -> IncidentListViewModel {
        IncidentListViewModel::new(
            GetIncidentsUseCase::new(self.repo.clone()),
            ChangeIncidentStatusUseCase::new(self.repo.clone()),
            self.coordinator.clone(),
            self.clock.clone(),
        )
    }

    pub fn dashboard_view_model(&self) -> DashboardViewModel {
        DashboardViewModel::new(DashboardUseCase::new(self.repo.clone()), self.coordinator.clone())
    }

    pub fn submit_incident_view_model(&self) -> SubmitIncidentViewModel {
        SubmitIncidentViewModel::new(
            GetIncidentTypesUseCase::new(self.repo.clone()),
            SubmitIncidentUseCase::new(self.repo.clone()),
            self.coordinator.clone(),
        )
    }

    /// Cancels in-flight requests, then signs out.
    pub fn logout(&self) {
        self.client.cancel_all();
        self.coordinator.logout();
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::testing::{mock_capabilities, MockReply};
    use crate::capabilities::{HttpMethod, KeyValueStore};
    use crate::session::SessionStore;
    use crate::Session;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> AppConfig {
        AppConfig::default()
            .with_base_url("https://api.example.com")
            .with_otp_success_delay(Duration::ZERO)
    }

    #[test]
    fn rejects_invalid_config() {
        let (caps, _, _) = mock_capabilities();
        let bad = AppConfig::default().with_base_url("ftp://nowhere");
        assert_matches!(App::new(bad, caps), Err(BootError::Config(_)));
    }

    #[test]
    fn fresh_install_starts_at_login() {
        let (caps, _, _) = mock_capabilities();
        let app = App::new(config(), caps).unwrap();

        assert_eq!(app.root_route(), Route::Login);
        assert!(!app.client().has_auth_token());
    }

    #[test]
    fn restores_persisted_session_token() {
        let (caps, _, kv) = mock_capabilities();
        KvSessionStore::new(kv.clone() as Arc<dyn KeyValueStore>)
            .set(&Session::signed_in("user@test.com", "tok-9"))
            .unwrap();

        let app = App::new(config(), caps).unwrap();

        assert_eq!(app.root_route(), Route::Home);
        assert!(app.client().has_auth_token());
    }

    #[tokio::test]
    async fn sign_in_installs_token_and_logout_removes_it() {
        let (caps, transport, _) = mock_capabilities();
        transport.on(HttpMethod::Get, "/incident", MockReply::json(200, &json!({"incidents": []})));
        let app = App::new(config(), caps).unwrap();

        app.coordinator().login_succeeded("user@test.com", "tok-1");
        assert!(app.client().has_auth_token());

        app.incident_list_view_model().load_incidents().await;
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.headers().get("Authorization"), Some("Bearer tok-1"));

        app.logout();
        assert!(!app.client().has_auth_token());
        assert_eq!(app.coordinator().routes(), vec![Route::Login]);
    }

    #[test]
    fn otp_view_model_uses_email() {
        let (caps, _, _) = mock_capabilities();
        let app = App::new(config(), caps).unwrap();
        assert_eq!(app.otp_view_model("user@test.com").email(), "user@test.com");
    }
}
