//! Wire formats. Responses accept snake_case keys (and camelCase aliases);
//! every response field is optional and mapping fills in defaults.
//! Requests are written in snake_case.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{
    DashboardEntity, IncidentEntity, IncidentMediaEntity, IncidentRequestEntity,
    IncidentsTypeEntity, OtpEntity,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct IncidentsDto {
    pub incidents: Option<Vec<IncidentDto>>,
}

impl IncidentsDto {
    pub fn into_entities(self) -> Vec<IncidentEntity> {
        let now = Utc::now();
        self.incidents
            .unwrap_or_default()
            .into_iter()
            .map(|dto| dto.into_entity_at(now))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct IncidentDto {
    pub id: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Option<i32>,
    pub priority: Option<i32>,
    #[serde(alias = "typeId")]
    pub type_id: Option<i64>,
    #[serde(alias = "issuerId")]
    pub issuer_id: Option<String>,
    #[serde(alias = "assigneeId")]
    pub assignee_id: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(alias = "updatedAt")]
    pub updated_at: Option<String>,
    pub medias: Option<Vec<IncidentMediaDto>>,
}

impl IncidentDto {
    pub fn into_entity(self) -> IncidentEntity {
        self.into_entity_at(Utc::now())
    }

    /// `now` stands in for timestamps that are missing or unparsable.
    pub fn into_entity_at(self, now: DateTime<Utc>) -> IncidentEntity {
        IncidentEntity {
            id: self.id.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            latitude: self.latitude.unwrap_or_default(),
            longitude: self.longitude.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            priority: self.priority,
            type_id: self.type_id.unwrap_or_default(),
            issuer_id: self.issuer_id.unwrap_or_default(),
            assignee_id: self.assignee_id,
            created_at: parse_timestamp(self.created_at.as_deref(), now),
            updated_at: parse_timestamp(self.updated_at.as_deref(), now),
            medias: self
                .medias
                .unwrap_or_default()
                .into_iter()
                .map(IncidentMediaDto::into_entity)
                .collect(),
        }
    }
}

fn parse_timestamp(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match raw.map(DateTime::parse_from_rfc3339) {
        Some(Ok(parsed)) => parsed.with_timezone(&Utc),
        Some(Err(e)) => {
            debug!(value = raw.unwrap_or_default(), error = %e, "unparsable timestamp");
            fallback
        }
        None => fallback,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct IncidentMediaDto {
    pub id: Option<String>,
    #[serde(alias = "mimeType")]
    pub mime_type: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<i32>,
    #[serde(alias = "incidentId")]
    pub incident_id: Option<String>,
}

impl IncidentMediaDto {
    pub fn into_entity(self) -> IncidentMediaEntity {
        IncidentMediaEntity {
            id: self.id.unwrap_or_default(),
            mime_type: self.mime_type.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            media_type: self.media_type.unwrap_or_default(),
            incident_id: self.incident_id.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct IncidentsTypeDto {
    pub id: Option<i64>,
    #[serde(alias = "arabicName")]
    pub arabic_name: Option<String>,
    #[serde(alias = "englishName")]
    pub english_name: Option<String>,
    #[serde(alias = "subTypes")]
    pub sub_types: Option<Vec<IncidentsTypeDto>>,
    #[serde(alias = "categoryId")]
    pub category_id: Option<i64>,
}

impl IncidentsTypeDto {
    pub fn into_entity(self) -> IncidentsTypeEntity {
        IncidentsTypeEntity {
            id: self.id.unwrap_or_default(),
            arabic_name: self.arabic_name.unwrap_or_default(),
            english_name: self.english_name.unwrap_or_default(),
            category_id: self.category_id,
            sub_types: self
                .sub_types
                .unwrap_or_default()
                .into_iter()
                .map(Self::into_entity)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct DashboardDto {
    pub incidents: Option<Vec<DashboardIncidentDto>>,
}

impl DashboardDto {
    pub fn into_entities(self) -> Vec<DashboardEntity> {
        self.incidents
            .unwrap_or_default()
            .into_iter()
            .map(DashboardIncidentDto::into_entity)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardIncidentDto {
    pub status: Option<i32>,
    #[serde(rename = "_count")]
    pub count: Option<DashboardCountDto>,
}

impl DashboardIncidentDto {
    pub fn into_entity(self) -> DashboardEntity {
        DashboardEntity {
            status: self.status.unwrap_or_default(),
            count: self.count.and_then(|c| c.status).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardCountDto {
    pub status: Option<i64>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpDto {
    pub token: Option<String>,
    pub roles: Option<Vec<i32>>,
}

impl std::fmt::Debug for OtpDto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpDto")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("roles", &self.roles)
            .finish()
    }
}

impl OtpDto {
    pub fn into_entity(self) -> OtpEntity {
        OtpEntity {
            token: SecretString::new(self.token.unwrap_or_default()),
            roles: self.roles.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequestDto<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyOtpRequestDto<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeIncidentStatusDto<'a> {
    pub incident_id: &'a str,
    pub status: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IncidentsRequestDto {
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    pub type_id: i64,
    pub issuer_id: String,
}

impl From<&IncidentRequestEntity> for IncidentsRequestDto {
    fn from(entity: &IncidentRequestEntity) -> Self {
        Self {
            description: entity.description.clone(),
            latitude: entity.latitude,
            longitude: entity.longitude,
            status: entity.status,
            priority: entity.priority,
            type_id: entity.type_id,
            issuer_id: entity.issuer_id.clone(),
        }
    }
}
