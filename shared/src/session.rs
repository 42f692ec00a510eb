use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::capabilities::{KeyNamespace, KeyValueStore, KvError, MemoryKvStore, TypedKvStore};

const IS_AUTHENTICATED_KEY: &str = "is_authenticated";
const CURRENT_USER_KEY: &str = "current_user";
const AUTH_TOKEN_KEY: &str = "auth_token";

/// Who is signed in. The token is present exactly when the session is
/// authenticated.
#[derive(Clone, Default)]
pub struct Session {
    is_authenticated: bool,
    current_user: Option<String>,
    auth_token: Option<SecretString>,
}

impl Session {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            current_user: Some(user.into()),
            auth_token: Some(SecretString::new(token.into())),
        }
    }

    pub(crate) fn from_parts(
        is_authenticated: bool,
        current_user: Option<String>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            is_authenticated,
            current_user,
            auth_token: auth_token.map(SecretString::new),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    pub fn is_consistent(&self) -> bool {
        self.is_authenticated == self.auth_token.is_some()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.is_authenticated == other.is_authenticated
            && self.current_user == other.current_user
            && self.auth_token() == other.auth_token()
    }
}

impl Eq for Session {}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("is_authenticated", &self.is_authenticated)
            .field("current_user", &self.current_user)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Persisted copy of the session, read once at boot.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Result<Session, KvError>;

    fn set(&self, session: &Session) -> Result<(), KvError>;

    fn clear(&self) -> Result<(), KvError>;
}

/// Stores the three session fields as separate JSON entries in the
/// `session` namespace.
pub struct KvSessionStore {
    kv: Arc<dyn KeyValueStore>,
    flags: TypedKvStore<bool>,
    strings: TypedKvStore<String>,
}

impl KvSessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            flags: TypedKvStore::new(KeyNamespace::Session),
            strings: TypedKvStore::new(KeyNamespace::Session),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    fn set_or_delete(&self, key: &str, value: Option<&str>) -> Result<(), KvError> {
        match value {
            Some(v) => self.strings.set(self.kv.as_ref(), key, &v.to_string()),
            None => self.strings.delete(self.kv.as_ref(), key).map(|_| ()),
        }
    }
}

impl SessionStore for KvSessionStore {
    fn get(&self) -> Result<Session, KvError> {
        let kv = self.kv.as_ref();
        Ok(Session::from_parts(
            self.flags.get(kv, IS_AUTHENTICATED_KEY)?.unwrap_or(false),
            self.strings.get(kv, CURRENT_USER_KEY)?,
            self.strings.get(kv, AUTH_TOKEN_KEY)?,
        ))
    }

    fn set(&self, session: &Session) -> Result<(), KvError> {
        self.flags.set(
            self.kv.as_ref(),
            IS_AUTHENTICATED_KEY,
            &session.is_authenticated(),
        )?;
        self.set_or_delete(CURRENT_USER_KEY, session.current_user())?;
        self.set_or_delete(AUTH_TOKEN_KEY, session.auth_token())
    }

    fn clear(&self) -> Result<(), KvError> {
        let kv = self.kv.as_ref();
        self.flags.delete(kv, IS_AUTHENTICATED_KEY)?;
        self.strings.delete(kv, CURRENT_USER_KEY)?;
        self.strings.delete(kv, AUTH_TOKEN_KEY)?;
        Ok(())
    }
}
