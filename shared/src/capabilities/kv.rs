use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

pub const MAX_KEY_LENGTH: usize = 128;
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Logical area a key belongs to; stored keys are `"{namespace}:{name}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyNamespace {
    Session,
}

impl KeyNamespace {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
        }
    }
}

/// A namespaced key. Names are 1..=128 bytes of ASCII letters, digits,
/// `_`, `-` or `.`, and may not start with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KvKey {
    namespace: KeyNamespace,
    name: String,
}

impl KvKey {
    pub fn new(namespace: KeyNamespace, name: impl Into<String>) -> Result<Self, KvError> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("empty key")
        } else if name.len() > MAX_KEY_LENGTH {
            Some("key too long")
        } else if name.starts_with('.') {
            Some("key may not start with '.'")
        } else if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
        {
            Some("key may only contain ASCII letters, digits, '_', '-' and '.'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(KvError::InvalidKey {
                key: name.escape_debug().take(MAX_KEY_LENGTH).collect(),
                reason: reason.to_string(),
            }),
            None => Ok(Self { namespace, name }),
        }
    }

    pub fn namespace(&self) -> KeyNamespace {
        self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage form, e.g. `session:auth_token`.
    pub fn raw(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.as_str(), self.name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage error ({code:?}): {message}")]
    Storage {
        code: StorageErrorCode,
        message: String,
    },

    #[error("value at '{key}' is not valid JSON: {message}")]
    Serialization { key: String, message: String },
}

impl KvError {
    pub fn storage(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
        }
    }

    /// Transient contention; the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage {
                code: StorageErrorCode::Busy | StorageErrorCode::Locked,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    Busy,
    Locked,
    Corrupted,
    DiskFull,
    PermissionDenied,
    CannotOpen,
    Other,
}

/// Small persistent key-value storage. Values are opaque bytes; use
/// [`TypedKvStore`] for JSON-encoded values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &KvKey) -> Result<Option<Vec<u8>>, KvError>;

    fn set(&self, key: &KvKey, value: Vec<u8>) -> Result<(), KvError>;

    /// Returns whether the key existed.
    fn delete(&self, key: &KvKey) -> Result<bool, KvError>;
}

fn check_value_size(value: &[u8]) -> Result<(), KvError> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(KvError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &KvKey) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.raw())
            .cloned())
    }

    fn set(&self, key: &KvKey, value: Vec<u8>) -> Result<(), KvError> {
        check_value_size(&value)?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.raw(), value);
        Ok(())
    }

    fn delete(&self, key: &KvKey) -> Result<bool, KvError> {
        Ok(self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key.raw())
            .is_some())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use self::sqlite::SqliteKvStore;

#[cfg(not(target_arch = "wasm32"))]
mod sqlite {
    use super::{check_value_size, KeyValueStore, KvError, KvKey, StorageErrorCode};
    use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
    use std::path::Path;
    use std::sync::{Mutex, PoisonError};

    const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_entries (
        key TEXT PRIMARY KEY NOT NULL,
        value BLOB NOT NULL,
        updated_at INTEGER NOT NULL
    );";

    /// File-backed store used by the shells for session persistence.
    pub struct SqliteKvStore {
        conn: Mutex<Connection>,
    }

    impl std::fmt::Debug for SqliteKvStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SqliteKvStore").finish_non_exhaustive()
        }
    }

    impl SqliteKvStore {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, KvError> {
            let conn = Connection::open(path).map_err(storage_error)?;
            Self::with_connection(conn)
        }

        pub fn open_in_memory() -> Result<Self, KvError> {
            let conn = Connection::open_in_memory().map_err(storage_error)?;
            Self::with_connection(conn)
        }

        fn with_connection(conn: Connection) -> Result<Self, KvError> {
            conn.execute_batch(SCHEMA).map_err(storage_error)?;
            Ok(Self {
                conn: Mutex::new(conn),
            })
        }
    }

    impl KeyValueStore for SqliteKvStore {
        fn get(&self, key: &KvKey) -> Result<Option<Vec<u8>>, KvError> {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            conn.query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key.raw()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(storage_error)
        }

        fn set(&self, key: &KvKey, value: Vec<u8>) -> Result<(), KvError> {
            check_value_size(&value)?;
            let now = chrono::Utc::now().timestamp_millis();
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key.raw(), value, now],
            )
            .map_err(storage_error)?;
            Ok(())
        }

        fn delete(&self, key: &KvKey) -> Result<bool, KvError> {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            let removed = conn
                .execute("DELETE FROM kv_entries WHERE key = ?1", params![key.raw()])
                .map_err(storage_error)?;
            Ok(removed > 0)
        }
    }

    fn storage_error(error: rusqlite::Error) -> KvError {
        let code = match error.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) => StorageErrorCode::Busy,
            Some(ErrorCode::DatabaseLocked) => StorageErrorCode::Locked,
            Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
                StorageErrorCode::Corrupted
            }
            Some(ErrorCode::DiskFull) => StorageErrorCode::DiskFull,
            Some(ErrorCode::PermissionDenied | ErrorCode::ReadOnly) => {
                StorageErrorCode::PermissionDenied
            }
            Some(ErrorCode::CannotOpen) => StorageErrorCode::CannotOpen,
            _ => StorageErrorCode::Other,
        };
        KvError::storage(code, error.to_string())
    }
}

/// JSON values under one namespace, on top of any [`KeyValueStore`].
pub struct TypedKvStore<T> {
    namespace: KeyNamespace,
    marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> TypedKvStore<T> {
    pub fn new(namespace: KeyNamespace) -> Self {
        Self {
            namespace,
            marker: PhantomData,
        }
    }

    pub fn key(&self, name: impl Into<String>) -> Result<KvKey, KvError> {
        KvKey::new(self.namespace, name)
    }

    pub fn get(&self, store: &dyn KeyValueStore, name: &str) -> Result<Option<T>, KvError> {
        let key = self.key(name)?;
        let Some(bytes) = store.get(&key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| KvError::Serialization {
                key: key.raw(),
                message: e.to_string(),
            })
    }

    pub fn set(&self, store: &dyn KeyValueStore, name: &str, value: &T) -> Result<(), KvError> {
        let key = self.key(name)?;
        let bytes = serde_json::to_vec(value).map_err(|e| KvError::Serialization {
            key: key.raw(),
            message: e.to_string(),
        })?;
        store.set(&key, bytes)
    }

    pub fn delete(&self, store: &dyn KeyValueStore, name: &str) -> Result<bool, KvError> {
        store.delete(&self.key(name)?)
    }
}
