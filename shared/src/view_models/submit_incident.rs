use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::model::{IncidentRequestEntity, IncidentStatus, IncidentsTypeEntity};
use crate::navigation::AppCoordinator;
use crate::observable::Observable;
use crate::use_cases::{GetIncidentTypesUseCase, SubmitIncidentUseCase};
use crate::{DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};

pub const UNSET_LOCATION_TEXT: &str = "Tap to set location";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmitIncidentState {
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub selected_type: Option<IncidentsTypeEntity>,
    pub priority: i32,
    pub incident_types: Vec<IncidentsTypeEntity>,
    pub is_loading: bool,
    pub is_submitting: bool,
    pub error_message: Option<String>,
    pub showing_success_view: bool,
    pub submitted_incident_id: Option<String>,
}

impl Default for SubmitIncidentState {
    fn default() -> Self {
        Self {
            description: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            selected_type: None,
            priority: DEFAULT_PRIORITY,
            incident_types: Vec::new(),
            is_loading: false,
            is_submitting: false,
            error_message: None,
            showing_success_view: false,
            submitted_incident_id: None,
        }
    }
}

impl SubmitIncidentState {
    fn has_location(&self) -> bool {
        self.latitude != 0.0 && self.longitude != 0.0
    }

    pub fn is_form_valid(&self) -> bool {
        !self.description.trim().is_empty()
            && self.selected_type.is_some()
            && self.has_location()
            && (MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority)
    }

    pub fn location_text(&self) -> String {
        if self.latitude == 0.0 && self.longitude == 0.0 {
            UNSET_LOCATION_TEXT.to_string()
        } else {
            format!("{:.6}, {:.6}", self.latitude, self.longitude)
        }
    }

    /// The request for the current form, or `None` while the form is invalid.
    pub fn draft(&self, issuer_id: &str) -> Option<IncidentRequestEntity> {
        if !self.is_form_valid() {
            return None;
        }
        let selected = self.selected_type.as_ref()?;
        Some(IncidentRequestEntity {
            description: self.description.trim().to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            status: IncidentStatus::Submitted.raw(),
            priority: Some(self.priority),
            type_id: selected.id,
            issuer_id: issuer_id.to_string(),
        })
    }
}

pub struct SubmitIncidentViewModel {
    state: Observable<SubmitIncidentState>,
    get_types: GetIncidentTypesUseCase,
    submit: SubmitIncidentUseCase,
    coordinator: Arc<AppCoordinator>,
}

impl SubmitIncidentViewModel {
    pub fn new(
        get_types: GetIncidentTypesUseCase,
        submit: SubmitIncidentUseCase,
        coordinator: Arc<AppCoordinator>,
    ) -> Self {
        Self {
            state: Observable::default(),
            get_types,
            submit,
            coordinator,
        }
    }

    pub fn state(&self) -> SubmitIncidentState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmitIncidentState> {
        self.state.subscribe()
    }

    pub fn is_form_valid(&self) -> bool {
        self.state.with(SubmitIncidentState::is_form_valid)
    }

    pub fn location_text(&self) -> String {
        self.state.with(SubmitIncidentState::location_text)
    }

    #[instrument(skip(self))]
    pub async fn load_incident_types(&self) {
        self.state.update(|s| {
            s.is_loading = true;
            s.error_message = None;
        });

        match self.get_types.execute().await {
            Ok(types) => self.state.update(|s| {
                s.incident_types = types;
                s.is_loading = false;
            }),
            Err(e) => self.state.update(|s| {
                s.error_message = Some(e.to_string());
                s.is_loading = false;
            }),
        }
    }

    pub fn update_description(&self, description: impl Into<String>) {
        let description = description.into();
        self.state.update(|s| s.description = description);
    }

    pub fn update_location(&self, latitude: f64, longitude: f64) {
        self.state.update(|s| {
            s.latitude = latitude;
            s.longitude = longitude;
        });
    }

    pub fn select_incident_type(&self, incident_type: IncidentsTypeEntity) {
        self.state.update(|s| s.selected_type = Some(incident_type));
    }

    pub fn update_priority(&self, priority: i32) {
        self.state
            .update(|s| s.priority = priority.clamp(MIN_PRIORITY, MAX_PRIORITY));
    }

    /// Sends the form as a new incident. Does nothing while the form is
    /// invalid; on failure the form is left as it was.
    #[instrument(skip(self))]
    pub async fn submit_incident(&self) {
        let issuer = self.coordinator.current_user().unwrap_or_default();
        let Some(draft) = self.state.with(|s| s.draft(&issuer)) else {
            return;
        };

        self.state.update(|s| {
            s.is_submitting = true;
            s.error_message = None;
        });

        match self.submit.execute(&draft).await {
            Ok(created) => {
                info!(incident_id = %created.id, "incident submitted");
                self.state.update(|s| {
                    s.submitted_incident_id = Some(created.id);
                    s.is_submitting = false;
                    s.showing_success_view = true;
                });
            }
            Err(e) => {
                warn!(error = %e, "incident submission failed");
                self.state.update(|s| {
                    s.error_message = Some(e.to_string());
                    s.is_submitting = false;
                });
            }
        }
    }

    /// Clears the form. Loaded incident types are kept.
    pub fn reset_form(&self) {
        self.state.update(|s| {
            s.description.clear();
            s.latitude = 0.0;
            s.longitude = 0.0;
            s.selected_type = None;
            s.priority = DEFAULT_PRIORITY;
            s.error_message = None;
            s.submitted_incident_id = None;
        });
    }

    pub fn go_back_to_home(&self) {
        self.state.update(|s| s.showing_success_view = false);
        self.coordinator.navigate_back();
    }

    pub fn dismiss(&self) {
        self.coordinator.navigate_back();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{IncidentDto, IncidentsTypeDto};
    use crate::navigation::Route;
    use crate::repository::testing::FakeRepository;
    use crate::view_models::testing::fixtures;
    use crate::ApiError;

    fn roads() -> IncidentsTypeEntity {
        IncidentsTypeEntity {
            id: 7,
            english_name: "Roads".into(),
            ..Default::default()
        }
    }

    fn view_model(
        repo: &Arc<FakeRepository>,
        coordinator: &Arc<AppCoordinator>,
    ) -> SubmitIncidentViewModel {
        SubmitIncidentViewModel::new(
            GetIncidentTypesUseCase::new(repo.clone()),
            SubmitIncidentUseCase::new(repo.clone()),
            coordinator.clone(),
        )
    }

    fn fill_valid_form(vm: &SubmitIncidentViewModel) {
        vm.update_description("  Broken streetlight  ");
        vm.update_location(24.7136, 46.6753);
        vm.select_incident_type(roads());
        vm.update_priority(3);
    }

    #[test]
    fn form_validation() {
        let (repo, coordinator) = fixtures();
        let vm = view_model(&repo, &coordinator);
        assert!(!vm.is_form_valid());

        fill_valid_form(&vm);
        assert!(vm.is_form_valid());

        vm.update_description("   ");
        assert!(!vm.is_form_valid());

        vm.update_description("ok");
        vm.update_location(0.0, 46.0);
        assert!(!vm.is_form_valid());
    }

    #[test]
    fn priority_is_clamped() {
        let (repo, coordinator) = fixtures();
        let vm = view_model(&repo, &coordinator);
        assert_eq!(vm.state().priority, 1);

        vm.update_priority(9);
        assert_eq!(vm.state().priority, 5);
        vm.update_priority(-3);
        assert_eq!(vm.state().priority, 1);
    }

    #[test]
    fn location_text() {
        let (repo, coordinator) = fixtures();
        let vm = view_model(&repo, &coordinator);
        assert_eq!(vm.location_text(), UNSET_LOCATION_TEXT);

        vm.update_location(24.713_552_1, 46.675_296);
        assert_eq!(vm.location_text(), "24.713552, 46.675296");
    }

    #[tokio::test]
    async fn invalid_form_does_not_submit() {
        let (repo, coordinator) = fixtures();
        let vm = view_model(&repo, &coordinator);

        vm.update_description("Something");
        vm.submit_incident().await;

        assert!(repo.calls().is_empty());
        assert!(!vm.state().is_submitting);
    }

    #[tokio::test]
    async fn successful_submission() {
        let (repo, coordinator) = fixtures();
        coordinator.login_succeeded("user@test.com", "tok");
        FakeRepository::set(
            &repo.submit,
            Ok(IncidentDto {
                id: Some("inc-42".into()),
                ..Default::default()
            }),
        );
        let vm = view_model(&repo, &coordinator);
        fill_valid_form(&vm);

        vm.submit_incident().await;

        let state = vm.state();
        assert!(state.showing_success_view);
        assert!(!state.is_submitting);
        assert_eq!(state.submitted_incident_id.as_deref(), Some("inc-42"));

        let sent = repo.submitted.lock().unwrap()[0].clone();
        assert_eq!(sent.description, "Broken streetlight");
        assert_eq!(sent.status, 0);
        assert_eq!(sent.priority, Some(3));
        assert_eq!(sent.type_id, 7);
        assert_eq!(sent.issuer_id, "user@test.com");
    }

    #[tokio::test]
    async fn failed_submission_keeps_form() {
        let (repo, coordinator) = fixtures();
        FakeRepository::set(&repo.submit, Err(ApiError::StatusCode(500)));
        let vm = view_model(&repo, &coordinator);
        fill_valid_form(&vm);

        vm.submit_incident().await;

        let state = vm.state();
        assert_eq!(state.error_message.as_deref(), Some("HTTP error: 500"));
        assert!(!state.showing_success_view);
        assert!(!state.is_submitting);
        assert_eq!(state.description, "  Broken streetlight  ");
        assert_eq!(state.selected_type, Some(roads()));
    }

    #[tokio::test]
    async fn loads_types_and_resets() {
        let (repo, coordinator) = fixtures();
        FakeRepository::set(
            &repo.types,
            Ok(vec![IncidentsTypeDto {
                id: Some(7),
                english_name: Some("Roads".into()),
                ..Default::default()
            }]),
        );
        let vm = view_model(&repo, &coordinator);

        vm.load_incident_types().await;
        assert_eq!(vm.state().incident_types.len(), 1);
        assert!(!vm.state().is_loading);

        fill_valid_form(&vm);
        vm.reset_form();
        let state = vm.state();
        assert_eq!(state.description, "");
        assert_eq!(state.selected_type, None);
        assert_eq!(state.priority, 1);
        assert_eq!(state.incident_types.len(), 1);
    }

    #[tokio::test]
    async fn load_types_failure() {
        let (repo, coordinator) = fixtures();
        FakeRepository::set(&repo.types, Err(ApiError::Unauthorized));
        let vm = view_model(&repo, &coordinator);

        vm.load_incident_types().await;
        assert_eq!(vm.state().error_message.as_deref(), Some("Unauthorized access"));
    }

    #[test]
    fn leaving_the_screen_pops() {
        let (repo, coordinator) = fixtures();
        coordinator.navigate(Route::Home);
        coordinator.navigate_to_submit_incident();
        coordinator.navigate_to_submit_incident();
        let vm = view_model(&repo, &coordinator);

        vm.go_back_to_home();
        assert!(!vm.state().showing_success_view);
        assert_eq!(coordinator.stack_depth(), 2);

        vm.dismiss();
        assert_eq!(coordinator.routes(), vec![Route::Home]);
    }
}
