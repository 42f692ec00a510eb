//! Incident reporting client core: email/OTP sign-in, incident browsing and
//! filtering, dashboard statistics and incident submission, sitting between
//! a platform shell and a JSON REST backend.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api_client;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod dto;
pub mod model;
pub mod navigation;
pub mod observable;
pub mod repository;
pub mod session;
pub mod use_cases;
pub mod view_models;

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use api_client::{ApiClient, ApiEndpoint};
pub use app::App;
pub use capabilities::Capabilities;
pub use config::AppConfig;
pub use navigation::{AppCoordinator, Route};
pub use session::Session;

pub const DEFAULT_BASE_URL: &str = "https://ba4caf56-6e45-4662-bbfb-20878b8cd42e.mock.pstmn.io";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_OTP_SUCCESS_DELAY: Duration = Duration::from_millis(500);
pub const OTP_LENGTH: usize = 4;
pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 5;
pub const DEFAULT_PRIORITY: i32 = MIN_PRIORITY;
pub const LOGIN_SUCCESS_RESPONSE: &str = "OK";
pub const CUSTOM_RANGE_DEFAULT_DAYS: i64 = 7;

/// Every failure the REST layer can report. `Display` is the user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ApiError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Invalid response from server")]
    InvalidResponse,

    #[error("HTTP error: {0}")]
    StatusCode(u16),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("No data received")]
    NoData,

    #[error("{0}")]
    Custom(String),
}

impl ApiError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::StatusCode(_) => "HTTP_STATUS",
            Self::DecodingError(_) => "DECODING_ERROR",
            Self::NetworkError(_) => "NETWORK_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NoData => "NO_DATA",
            Self::Custom(_) => "CUSTOM",
        }
    }

    /// Maps a non-2xx status to its error. 2xx yields `None`.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 | 403 => Some(Self::Unauthorized),
            code => Some(Self::StatusCode(code)),
        }
    }
}

impl From<capabilities::HttpError> for ApiError {
    fn from(error: capabilities::HttpError) -> Self {
        use capabilities::HttpError;
        match error {
            HttpError::InvalidUrl { .. } => Self::InvalidUrl,
            e if e.is_transport() => Self::NetworkError(e.to_string()),
            e => Self::Custom(e.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Source of "now" for date-window filtering.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the device's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
