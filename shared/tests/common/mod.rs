//! Shared harness: an in-process backend that answers by method and path.

#![allow(dead_code)]

use async_trait::async_trait;
use incident_core::capabilities::{
    HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpResult, HttpTransport, MemoryKvStore,
};
use incident_core::{App, AppConfig, Capabilities, FixedClock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "https://incidents.test";

#[derive(Default)]
pub struct Backend {
    routes: Mutex<HashMap<(HttpMethod, String), (u16, String)>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl Backend {
    pub fn reply(&self, method: HttpMethod, path: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), (status, body.into()));
    }

    pub fn reply_json(&self, method: HttpMethod, path: &str, body: &Value) {
        self.reply(method, path, 200, body.to_string());
    }

    pub fn seen(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self, method: HttpMethod, path: &str) -> HttpRequest {
        self.seen()
            .into_iter()
            .rev()
            .find(|r| r.method() == method && r.url().path() == path)
            .unwrap_or_else(|| panic!("no {method} {path} request"))
    }

    pub fn last_json(&self, method: HttpMethod, path: &str) -> Value {
        serde_json::from_slice(self.last(method, path).body().unwrap()).unwrap()
    }
}

#[async_trait]
impl HttpTransport for Backend {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        let key = (request.method(), request.url().path().to_string());
        let request_id = request.request_id().to_string();
        self.seen.lock().unwrap().push(request);

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(HttpResponse::new(
            status,
            HttpHeaders::new(),
            body.into_bytes(),
            request_id,
            0,
        ))
    }
}

pub struct Harness {
    pub app: App,
    pub backend: Arc<Backend>,
    pub kv: Arc<MemoryKvStore>,
}

pub fn clock() -> FixedClock {
    FixedClock(chrono::DateTime::parse_from_rfc3339("2024-03-15T12:00:00+00:00").unwrap())
}

pub fn harness() -> Harness {
    harness_with_kv(Arc::new(MemoryKvStore::new()))
}

pub fn harness_with_kv(kv: Arc<MemoryKvStore>) -> Harness {
    let backend = Arc::new(Backend::default());
    let config = AppConfig::default()
        .with_base_url(BASE_URL)
        .with_otp_success_delay(Duration::ZERO);
    let app = App::new(config, Capabilities::new(backend.clone(), kv.clone()))
        .unwrap()
        .with_clock(Arc::new(clock()));
    Harness { app, backend, kv }
}
