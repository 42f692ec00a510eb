//! I/O seams the core depends on. The platform shell supplies the concrete
//! implementations; tests supply in-process ones.

mod http;
mod kv;

use std::sync::Arc;

pub use self::http::{
    HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpResult, HttpTransport,
    ValidatedUrl, DEFAULT_TIMEOUT_MS, JSON_CONTENT_TYPE, MAX_TIMEOUT_MS,
};
pub use self::kv::{
    KeyNamespace, KeyValueStore, KvError, KvKey, MemoryKvStore, StorageErrorCode, TypedKvStore,
};

#[cfg(not(target_arch = "wasm32"))]
pub use self::kv::SqliteKvStore;

#[cfg(feature = "reqwest-transport")]
pub use self::http::ReqwestTransport;

#[derive(Clone)]
pub struct Capabilities {
    pub http: Arc<dyn HttpTransport>,
    pub kv: Arc<dyn KeyValueStore>,
}

impl Capabilities {
    pub fn new(http: Arc<dyn HttpTransport>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { http, kv }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    pub use super::http::testing::{MockReply, MockTransport};
    use super::{Capabilities, MemoryKvStore};
    use std::sync::Arc;

    pub fn mock_capabilities() -> (Capabilities, Arc<MockTransport>, Arc<MemoryKvStore>) {
        let transport = Arc::new(MockTransport::new());
        let kv = Arc::new(MemoryKvStore::new());
        let caps = Capabilities::new(transport.clone(), kv.clone());
        (caps, transport, kv)
    }
}
