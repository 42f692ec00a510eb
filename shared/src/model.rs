use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    #[default]
    Submitted,
    InProgress,
    Completed,
    Rejected,
}

impl IncidentStatus {
    pub const ALL: [Self; 4] = [
        Self::Submitted,
        Self::InProgress,
        Self::Completed,
        Self::Rejected,
    ];

    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Submitted),
            1 => Some(Self::InProgress),
            2 => Some(Self::Completed),
            3 => Some(Self::Rejected),
            _ => None,
        }
    }

    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Submitted => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
            Self::Rejected => 3,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
        }
    }

    /// Symbol name the shells render next to the title.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Submitted => "paperplane.fill",
            Self::InProgress => "clock.fill",
            Self::Completed => "checkmark.circle.fill",
            Self::Rejected => "xmark.circle.fill",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentMediaEntity {
    pub id: String,
    pub mime_type: String,
    pub url: String,
    pub media_type: i32,
    pub incident_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentEntity {
    pub id: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: i32,
    pub priority: Option<i32>,
    pub type_id: i64,
    pub issuer_id: String,
    pub assignee_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub medias: Vec<IncidentMediaEntity>,
}

impl IncidentEntity {
    /// Unknown raw values read as `Submitted`.
    #[must_use]
    pub fn status_enum(&self) -> IncidentStatus {
        IncidentStatus::from_raw(self.status).unwrap_or(IncidentStatus::Submitted)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEntity {
    pub status: i32,
    pub count: i64,
}

impl DashboardEntity {
    /// Unknown raw values read as `InProgress`.
    #[must_use]
    pub fn status_enum(&self) -> IncidentStatus {
        IncidentStatus::from_raw(self.status).unwrap_or(IncidentStatus::InProgress)
    }

    #[must_use]
    pub fn total(entities: &[Self]) -> i64 {
        entities.iter().map(|e| e.count).sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentsTypeEntity {
    pub id: i64,
    pub arabic_name: String,
    pub english_name: String,
    pub category_id: Option<i64>,
    pub sub_types: Vec<IncidentsTypeEntity>,
}

impl IncidentsTypeEntity {
    /// Depth-first, parents before their children.
    #[must_use]
    pub fn flatten(types: &[Self]) -> Vec<Self> {
        let mut out = Vec::new();
        for t in types {
            out.push(Self {
                sub_types: Vec::new(),
                ..t.clone()
            });
            out.extend(Self::flatten(&t.sub_types));
        }
        out
    }
}

/// A new incident as the client sends it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentRequestEntity {
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: i32,
    pub priority: Option<i32>,
    pub type_id: i64,
    pub issuer_id: String,
}

#[derive(Clone)]
pub struct OtpEntity {
    pub token: SecretString,
    pub roles: Vec<i32>,
}

impl fmt::Debug for OtpEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpEntity")
            .field("token", &"[REDACTED]")
            .field("roles", &self.roles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_raw_roundtrip_and_defaults() {
        for status in IncidentStatus::ALL {
            assert_eq!(IncidentStatus::from_raw(status.raw()), Some(status));
        }
        assert_eq!(IncidentStatus::from_raw(9), None);

        let dashboard = DashboardEntity { status: 9, count: 1 };
        assert_eq!(dashboard.status_enum(), IncidentStatus::InProgress);
    }

    #[test]
    fn status_presentation() {
        assert_eq!(IncidentStatus::InProgress.title(), "In Progress");
        assert_eq!(IncidentStatus::Rejected.icon(), "xmark.circle.fill");
        assert_eq!(IncidentStatus::Completed.to_string(), "Completed");
    }

    #[test]
    fn dashboard_total() {
        let entities = vec![
            DashboardEntity { status: 0, count: 5 },
            DashboardEntity { status: 1, count: 15 },
        ];
        assert_eq!(DashboardEntity::total(&entities), 20);
        assert_eq!(DashboardEntity::total(&[]), 0);
    }

    #[test]
    fn flatten_type_tree() {
        let leaf = |id: i64, name: &str| IncidentsTypeEntity {
            id,
            english_name: name.into(),
            ..Default::default()
        };
        let tree = vec![
            IncidentsTypeEntity {
                sub_types: vec![leaf(11, "Pothole"), leaf(12, "Streetlight")],
                ..leaf(1, "Roads")
            },
            leaf(2, "Noise"),
        ];

        let ids: Vec<i64> = IncidentsTypeEntity::flatten(&tree).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 11, 12, 2]);
        assert!(IncidentsTypeEntity::flatten(&tree)
            .iter()
            .all(|t| t.sub_types.is_empty()));
    }

    #[test]
    fn otp_debug_redacts_token() {
        let otp = OtpEntity {
            token: SecretString::new("super-secret".into()),
            roles: vec![1],
        };
        let rendered = format!("{otp:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
