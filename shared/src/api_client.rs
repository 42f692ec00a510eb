//! REST client: endpoint description, default/auth headers, in-flight
//! request tracking with cancellation, and JSON decoding into typed values.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::capabilities::{
    HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    ValidatedUrl, JSON_CONTENT_TYPE,
};
use crate::config::AppConfig;
use crate::{ApiError, ApiResult, DEFAULT_REQUEST_TIMEOUT};

/// Backend routes.
pub mod paths {
    pub const LOGIN: &str = "/login";
    pub const VERIFY_OTP: &str = "/verify-otp";
    pub const INCIDENTS: &str = "/incident";
    pub const CHANGE_INCIDENT_STATUS: &str = "/incident/change-status";
    pub const DASHBOARD: &str = "/incident/dashboard";
    pub const SUBMIT_INCIDENT: &str = "/incident";
    pub const INCIDENT_TYPES: &str = "/types";
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiEndpoint {
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Vec<u8>>,
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
    pub query_items: Vec<(String, String)>,
}

impl ApiEndpoint {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            parameters: None,
            query_items: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Get)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Post)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Put)
    }

    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Encodes `value` as the JSON request body.
    pub fn with_json<T: Serialize>(self, value: &T) -> ApiResult<Self> {
        Ok(self.with_body(Self::create_body(value)?))
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Map<String, serde_json::Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_items.push((name.into(), value.into()));
        self
    }

    pub fn create_body<T: Serialize>(value: &T) -> ApiResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ApiError::Custom(format!("Encoding error: {e}")))
    }

    /// Query items from a map, in key order.
    pub fn query_from(parameters: &BTreeMap<String, String>) -> Vec<(String, String)> {
        parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Explicit bytes take precedence over the parameter map.
    fn request_body(&self) -> ApiResult<Option<Vec<u8>>> {
        match (&self.body, &self.parameters) {
            (Some(body), _) => Ok(Some(body.clone())),
            (None, Some(params)) => Self::create_body(params).map(Some),
            (None, None) => Ok(None),
        }
    }
}

/// Removes its request from the in-flight registry when the call ends,
/// whichever way it ends.
struct InFlightGuard<'a> {
    registry: &'a Mutex<HashMap<String, CancellationToken>>,
    request_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);
    }
}

pub struct ApiClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    default_headers: RwLock<HttpHeaders>,
    auth_token: RwLock<Option<SecretString>>,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
    timeout: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("has_auth_token", &self.has_auth_token())
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>) -> ApiResult<Self> {
        let base_url = Url::parse(base_url).map_err(|_| ApiError::InvalidUrl)?;
        ValidatedUrl::from_url(&base_url).map_err(|_| ApiError::InvalidUrl)?;

        let mut headers = HttpHeaders::new();
        headers.insert("Content-Type", JSON_CONTENT_TYPE)?;
        headers.insert("Accept", JSON_CONTENT_TYPE)?;

        Ok(Self {
            base_url,
            transport,
            default_headers: RwLock::new(headers),
            auth_token: RwLock::new(None),
            in_flight: Mutex::new(HashMap::new()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn from_config(config: &AppConfig, transport: Arc<dyn HttpTransport>) -> ApiResult<Self> {
        let client = Self::new(&config.base_url, transport)?.with_timeout(config.request_timeout());
        if let Some(agent) = &config.user_agent {
            client.set_default_header("User-Agent", agent)?;
        }
        Ok(client)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_default_header(&self, name: &str, value: &str) -> ApiResult<()> {
        self.default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, value)
            .map_err(ApiError::from)
    }

    /// `None` or an empty token drops the Authorization header. Requests
    /// already built keep whatever they were built with.
    pub fn set_auth_token(&self, token: Option<&str>) {
        let token = token.filter(|t| !t.is_empty());
        debug!(present = token.is_some(), "auth token updated");
        *self
            .auth_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token.map(|t| SecretString::new(t.to_string()));
    }

    pub fn has_auth_token(&self) -> bool {
        self.auth_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Cancels everything currently in flight. Requests started afterwards
    /// are unaffected.
    pub fn cancel_all(&self) {
        let tokens: Vec<CancellationToken> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, token)| token)
            .collect();
        if !tokens.is_empty() {
            debug!(count = tokens.len(), "cancelling in-flight requests");
        }
        for token in tokens {
            token.cancel();
        }
    }

    pub async fn execute<T: DeserializeOwned>(&self, endpoint: &ApiEndpoint) -> ApiResult<T> {
        self.execute_with_headers(endpoint, None).await
    }

    pub async fn execute_with_headers<T: DeserializeOwned>(
        &self,
        endpoint: &ApiEndpoint,
        headers: Option<&HttpHeaders>,
    ) -> ApiResult<T> {
        let response = self.send(endpoint, headers).await?;
        if response.body().is_empty() {
            return Err(ApiError::NoData);
        }
        serde_json::from_slice(response.body()).map_err(|e| ApiError::DecodingError(e.to_string()))
    }

    /// For endpoints that answer with no content; the body is ignored.
    pub async fn execute_empty(
        &self,
        endpoint: &ApiEndpoint,
        headers: Option<&HttpHeaders>,
    ) -> ApiResult<()> {
        self.send(endpoint, headers).await.map(|_| ())
    }

    /// Body as trimmed UTF-8 text.
    pub async fn execute_raw(
        &self,
        endpoint: &ApiEndpoint,
        headers: Option<&HttpHeaders>,
    ) -> ApiResult<String> {
        let response = self.send(endpoint, headers).await?;
        let text = std::str::from_utf8(response.body())
            .map_err(|e| ApiError::DecodingError(e.to_string()))?;
        Ok(text.trim().to_string())
    }

    fn build_url(&self, endpoint: &ApiEndpoint) -> ApiResult<ValidatedUrl> {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            endpoint.path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(None);
        if !endpoint.query_items.is_empty() {
            url.query_pairs_mut().extend_pairs(
                endpoint
                    .query_items
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }
        ValidatedUrl::from_url(&url).map_err(|_| ApiError::InvalidUrl)
    }

    fn build_request(
        &self,
        endpoint: &ApiEndpoint,
        extra_headers: Option<&HttpHeaders>,
    ) -> ApiResult<HttpRequest> {
        let url = self.build_url(endpoint)?;

        let mut headers = self
            .default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(token) = self
            .auth_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            headers.insert("Authorization", format!("Bearer {}", token.expose_secret()))?;
        }
        if let Some(extra) = extra_headers {
            headers.merge(extra)?;
        }

        let mut request = HttpRequest::new(endpoint.method, url)
            .with_headers(&headers)?
            .with_timeout(self.timeout)?;
        if let Some(body) = endpoint.request_body()? {
            request = request.with_body(body)?;
        }
        Ok(request)
    }

    #[instrument(skip(self, endpoint, extra_headers), fields(method = %endpoint.method, path = %endpoint.path))]
    async fn send(
        &self,
        endpoint: &ApiEndpoint,
        extra_headers: Option<&HttpHeaders>,
    ) -> ApiResult<HttpResponse> {
        let request = self.build_request(endpoint, extra_headers)?;
        let request_id = request.request_id().to_string();
        let timeout_ms = request.timeout_ms();

        let token = CancellationToken::new();
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id.clone(), token.clone());
        let _guard = InFlightGuard {
            registry: &self.in_flight,
            request_id: request_id.clone(),
        };

        debug!(request_id = %request_id, "sending request");

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(HttpError::Cancelled { request_id: request_id.clone() }),
            result = tokio::time::timeout(self.timeout, self.transport.execute(request)) => {
                result.unwrap_or_else(|_| Err(HttpError::Timeout {
                    timeout_ms,
                    request_id: request_id.clone(),
                }))
            }
        };

        let response = outcome.map_err(|e| {
            let error = ApiError::from(e);
            warn!(request_id = %request_id, code = error.code(), error = %error, "request failed");
            error
        })?;

        debug!(
            request_id = %request_id,
            status = response.status(),
            duration_ms = response.duration_ms(),
            "response received"
        );

        if !(100..=599).contains(&response.status()) {
            return Err(ApiError::InvalidResponse);
        }
        if let Some(error) = ApiError::from_status(response.status()) {
            warn!(request_id = %request_id, code = error.code(), status = response.status(), "request rejected");
            return Err(error);
        }
        Ok(response)
    }
}
