use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::api_client::{paths, ApiClient, ApiEndpoint};
use crate::dto::{
    ChangeIncidentStatusDto, DashboardDto, IncidentDto, IncidentsDto, IncidentsRequestDto,
    IncidentsTypeDto, LoginRequestDto, OtpDto, VerifyOtpRequestDto,
};
use crate::model::IncidentRequestEntity;
use crate::ApiResult;

/// Backend operations, one HTTP call each. Errors pass through untouched.
#[async_trait]
pub trait IncidentsRepository: Send + Sync {
    /// Plain-text acknowledgement, `"OK"` on success.
    async fn login(&self, email: &str) -> ApiResult<String>;

    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<OtpDto>;

    async fn get_incidents(&self) -> ApiResult<IncidentsDto>;

    async fn change_incident_status(&self, id: &str, status: i32) -> ApiResult<IncidentDto>;

    async fn dashboard(&self) -> ApiResult<DashboardDto>;

    async fn submit_incident(&self, incident: &IncidentRequestEntity) -> ApiResult<IncidentDto>;

    async fn get_incident_types(&self) -> ApiResult<Vec<IncidentsTypeDto>>;
}

#[derive(Debug, Clone)]
pub struct IncidentsRepo {
    client: Arc<ApiClient>,
}

impl IncidentsRepo {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IncidentsRepository for IncidentsRepo {
    #[instrument(skip_all)]
    async fn login(&self, email: &str) -> ApiResult<String> {
        let endpoint = ApiEndpoint::post(paths::LOGIN).with_json(&LoginRequestDto { email })?;
        self.client.execute_raw(&endpoint, None).await
    }

    #[instrument(skip_all)]
    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<OtpDto> {
        let endpoint =
            ApiEndpoint::post(paths::VERIFY_OTP).with_json(&VerifyOtpRequestDto { email, otp })?;
        self.client.execute(&endpoint).await
    }

    #[instrument(skip_all)]
    async fn get_incidents(&self) -> ApiResult<IncidentsDto> {
        self.client.execute(&ApiEndpoint::get(paths::INCIDENTS)).await
    }

    #[instrument(skip(self))]
    async fn change_incident_status(&self, id: &str, status: i32) -> ApiResult<IncidentDto> {
        let endpoint = ApiEndpoint::put(paths::CHANGE_INCIDENT_STATUS).with_json(
            &ChangeIncidentStatusDto {
                incident_id: id,
                status,
            },
        )?;
        self.client.execute(&endpoint).await
    }

    #[instrument(skip_all)]
    async fn dashboard(&self) -> ApiResult<DashboardDto> {
        self.client.execute(&ApiEndpoint::get(paths::DASHBOARD)).await
    }

    #[instrument(skip_all, fields(type_id = incident.type_id))]
    async fn submit_incident(&self, incident: &IncidentRequestEntity) -> ApiResult<IncidentDto> {
        let endpoint = ApiEndpoint::post(paths::SUBMIT_INCIDENT)
            .with_json(&IncidentsRequestDto::from(incident))?;
        self.client.execute(&endpoint).await
    }

    #[instrument(skip_all)]
    async fn get_incident_types(&self) -> ApiResult<Vec<IncidentsTypeDto>> {
        self.client.execute(&ApiEndpoint::get(paths::INCIDENT_TYPES)).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::ApiError;
    use std::sync::Mutex;

    type Slot<T> = Mutex<Option<ApiResult<T>>>;

    /// Canned answers per operation; unset operations fail with `NoData`.
    #[derive(Default)]
    pub struct FakeRepository {
        pub login: Slot<String>,
        pub verify_otp: Slot<OtpDto>,
        pub incidents: Slot<IncidentsDto>,
        pub change_status: Slot<IncidentDto>,
        pub dashboard: Slot<DashboardDto>,
        pub submit: Slot<IncidentDto>,
        pub types: Slot<Vec<IncidentsTypeDto>>,
        pub calls: Mutex<Vec<String>>,
        pub submitted: Mutex<Vec<IncidentRequestEntity>>,
    }

    impl FakeRepository {
        pub fn set<T>(slot: &Slot<T>, value: ApiResult<T>) {
            *slot.lock().unwrap() = Some(value);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self, name: &str) -> usize {
            self.calls().iter().filter(|c| c.as_str() == name).count()
        }

        fn reply<T: Clone>(&self, name: &str, slot: &Slot<T>) -> ApiResult<T> {
            self.calls.lock().unwrap().push(name.to_string());
            slot.lock().unwrap().clone().unwrap_or(Err(ApiError::NoData))
        }
    }

    #[async_trait]
    impl IncidentsRepository for FakeRepository {
        async fn login(&self, _email: &str) -> ApiResult<String> {
            self.reply("login", &self.login)
        }

        async fn verify_otp(&self, _email: &str, _otp: &str) -> ApiResult<OtpDto> {
            self.reply("verify_otp", &self.verify_otp)
        }

        async fn get_incidents(&self) -> ApiResult<IncidentsDto> {
            self.reply("get_incidents", &self.incidents)
        }

        async fn change_incident_status(&self, _id: &str, _status: i32) -> ApiResult<IncidentDto> {
            self.reply("change_incident_status", &self.change_status)
        }

        async fn dashboard(&self) -> ApiResult<DashboardDto> {
            self.reply("dashboard", &self.dashboard)
        }

        async fn submit_incident(&self, incident: &IncidentRequestEntity) -> ApiResult<IncidentDto> {
            self.submitted.lock().unwrap().push(incident.clone());
            self.reply("submit_incident", &self.submit)
        }

        async fn get_incident_types(&self) -> ApiResult<Vec<IncidentsTypeDto>> {
            self.reply("get_incident_types", &self.types)
        }
    }
}
