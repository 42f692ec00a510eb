//! One use case per backend operation: call the repository, map DTOs to entities.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::model::{
    DashboardEntity, IncidentEntity, IncidentRequestEntity, IncidentStatus, IncidentsTypeEntity,
    OtpEntity,
};
use crate::repository::IncidentsRepository;
use crate::{ApiError, ApiResult, LOGIN_SUCCESS_RESPONSE};

#[derive(Clone)]
pub struct LoginUseCase {
    repo: Arc<dyn IncidentsRepository>,
}

impl LoginUseCase {
    pub fn new(repo: Arc<dyn IncidentsRepository>) -> Self {
        Self { repo }
    }

    /// Succeeds only when the backend acknowledges with "OK" (any case).
    #[instrument(skip_all)]
    pub async fn execute(&self, email: &str) -> ApiResult<String> {
        let response = self.repo.login(email).await?;
        if !response.eq_ignore_ascii_case(LOGIN_SUCCESS_RESPONSE) {
            warn!(response = %response, "login rejected");
            return Err(ApiError::Custom(format!("Login failed: {response}")));
        }
        info!("login code requested");
        Ok(response)
    }
}

#[derive(Clone)]
pub struct VerifyOtpUseCase {
    repo: Arc<dyn IncidentsRepository>,
}

impl VerifyOtpUseCase {
    pub fn new(repo: Arc<dyn IncidentsRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, email: &str, otp: &str) -> ApiResult<OtpEntity> {
        Ok(self.repo.verify_otp(email, otp).await?.into_entity())
    }
}

#[derive(Clone)]
pub struct GetIncidentsUseCase {
    repo: Arc<dyn IncidentsRepository>,
}

impl GetIncidentsUseCase {
    pub fn new(repo: Arc<dyn IncidentsRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self) -> ApiResult<Vec<IncidentEntity>> {
        Ok(self.repo.get_incidents().await?.into_entities())
    }
}

#[derive(Clone)]
pub struct ChangeIncidentStatusUseCase {
    repo: Arc<dyn IncidentsRepository>,
}

impl ChangeIncidentStatusUseCase {
    pub fn new(repo: Arc<dyn IncidentsRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, id: &str, status: IncidentStatus) -> ApiResult<IncidentEntity> {
        Ok(self
            .repo
            .change_incident_status(id, status.raw())
            .await?
            .into_entity())
    }
}

#[derive(Clone)]
pub struct DashboardUseCase {
    repo: Arc<dyn IncidentsRepository>,
}

impl DashboardUseCase {
    pub fn new(repo: Arc<dyn IncidentsRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self) -> ApiResult<Vec<DashboardEntity>> {
        Ok(self.repo.dashboard().await?.into_entities())
    }
}

#[derive(Clone)]
pub struct SubmitIncidentUseCase {
    repo: Arc<dyn IncidentsRepository>,
}

impl SubmitIncidentUseCase {
    pub fn new(repo: Arc<dyn IncidentsRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, incident: &IncidentRequestEntity) -> ApiResult<IncidentEntity> {
        Ok(self.repo.submit_incident(incident).await?.into_entity())
    }
}

#[derive(Clone)]
pub struct GetIncidentTypesUseCase {
    repo: Arc<dyn IncidentsRepository>,
}

impl GetIncidentTypesUseCase {
    pub fn new(repo: Arc<dyn IncidentsRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self) -> ApiResult<Vec<IncidentsTypeEntity>> {
        Ok(self
            .repo
            .get_incident_types()
            .await?
            .into_iter()
            .map(crate::dto::IncidentsTypeDto::into_entity)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{DashboardDto, IncidentDto, IncidentsDto, OtpDto};
    use crate::repository::testing::FakeRepository;
    use assert_matches::assert_matches;
    use secrecy::ExposeSecret;

    fn fake() -> Arc<FakeRepository> {
        Arc::new(FakeRepository::default())
    }

    #[tokio::test]
    async fn login_accepts_ok_in_any_case() {
        let repo = fake();
        let use_case = LoginUseCase::new(repo.clone());

        FakeRepository::set(&repo.login, Ok("OK".into()));
        assert_eq!(use_case.execute("a@b.co").await.unwrap(), "OK");

        FakeRepository::set(&repo.login, Ok("ok".into()));
        assert_eq!(use_case.execute("a@b.co").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn login_rejects_other_responses() {
        let repo = fake();
        FakeRepository::set(&repo.login, Ok("FAILED".into()));
        let use_case = LoginUseCase::new(repo.clone());

        assert_eq!(
            use_case.execute("a@b.co").await,
            Err(ApiError::Custom("Login failed: FAILED".into()))
        );
    }

    #[tokio::test]
    async fn login_passes_errors_through() {
        let repo = fake();
        FakeRepository::set(&repo.login, Err(ApiError::StatusCode(500)));
        let use_case = LoginUseCase::new(repo.clone());

        assert_matches!(use_case.execute("a@b.co").await, Err(ApiError::StatusCode(500)));
    }

    #[tokio::test]
    async fn verify_otp_maps_token() {
        let repo = fake();
        FakeRepository::set(
            &repo.verify_otp,
            Ok(OtpDto {
                token: Some("t-9".into()),
                roles: None,
            }),
        );
        let entity = VerifyOtpUseCase::new(repo.clone())
            .execute("a@b.co", "1234")
            .await
            .unwrap();
        assert_eq!(entity.token.expose_secret(), "t-9");
        assert!(entity.roles.is_empty());
    }

    #[tokio::test]
    async fn list_and_dashboard_mapping() {
        let repo = fake();
        FakeRepository::set(
            &repo.incidents,
            Ok(IncidentsDto {
                incidents: Some(vec![IncidentDto {
                    id: Some("a".into()),
                    status: Some(2),
                    ..Default::default()
                }]),
            }),
        );
        FakeRepository::set(&repo.dashboard, Ok(DashboardDto::default()));

        let incidents = GetIncidentsUseCase::new(repo.clone()).execute().await.unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].status_enum(), IncidentStatus::Completed);

        let dashboard = DashboardUseCase::new(repo.clone()).execute().await.unwrap();
        assert!(dashboard.is_empty());
    }

    #[tokio::test]
    async fn change_status_sends_raw_value() {
        let repo = fake();
        FakeRepository::set(
            &repo.change_status,
            Ok(IncidentDto {
                id: Some("x".into()),
                status: Some(3),
                ..Default::default()
            }),
        );
        let updated = ChangeIncidentStatusUseCase::new(repo.clone())
            .execute("x", IncidentStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(updated.status_enum(), IncidentStatus::Rejected);
        assert_eq!(repo.call_count("change_incident_status"), 1);
    }
}
