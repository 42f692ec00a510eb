//! Per-screen state machines. Each view-model owns an observable state
//! snapshot and drives use cases and the coordinator.

pub mod dashboard;
pub mod incidents;
pub mod login;
pub mod otp;
pub mod submit_incident;

pub use self::dashboard::{DashboardState, DashboardViewModel};
pub use self::incidents::{DateFilter, IncidentListState, IncidentListViewModel};
pub use self::login::{is_valid_email, LoginState, LoginViewModel};
pub use self::otp::{OtpState, OtpViewModel};
pub use self::submit_incident::{SubmitIncidentState, SubmitIncidentViewModel};
