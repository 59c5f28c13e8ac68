use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use tracing::debug;

use crate::config::ResolverConfig;
use crate::types::{Payload, SessionError, Value};

/// Per-user session storage shared between consecutive requests.
///
/// Every call may fail, e.g. when the current invocation has no HTTP session.
pub trait Session {
    /// # Errors
    ///
    /// Returns [`SessionError`] when the session cannot be accessed.
    fn has(&self, key: &str) -> Result<bool, SessionError>;

    /// # Errors
    ///
    /// Returns [`SessionError`] when the session cannot be accessed.
    fn get(&self, key: &str) -> Result<Option<Payload>, SessionError>;

    /// # Errors
    ///
    /// Returns [`SessionError`] when the session cannot be accessed.
    fn set(&self, key: &str, payload: Payload) -> Result<(), SessionError>;

    /// # Errors
    ///
    /// Returns [`SessionError`] when the session cannot be accessed.
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// An in-process session store.
#[derive(Debug, Default)]
pub struct MemorySession {
    entries: Mutex<HashMap<String, Payload>>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Payload>>, SessionError> {
        self.entries
            .lock()
            .map_err(|_| SessionError::Backend("session lock poisoned".to_owned()))
    }
}

impl Session for MemorySession {
    fn has(&self, key: &str) -> Result<bool, SessionError> {
        Ok(self.entries()?.contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Option<Payload>, SessionError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, payload: Payload) -> Result<(), SessionError> {
        self.entries()?.insert(key.to_owned(), payload);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Stand-in for invocations without an HTTP session, such as console commands.
/// Every call fails with [`SessionError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSession;

impl Session for NoSession {
    fn has(&self, _key: &str) -> Result<bool, SessionError> {
        Err(SessionError::Unavailable)
    }

    fn get(&self, _key: &str) -> Result<Option<Payload>, SessionError> {
        Err(SessionError::Unavailable)
    }

    fn set(&self, _key: &str, _payload: Payload) -> Result<(), SessionError> {
        Err(SessionError::Unavailable)
    }

    fn remove(&self, _key: &str) -> Result<(), SessionError> {
        Err(SessionError::Unavailable)
    }
}

/// Carries a form submission across the redirect that follows a dependency change.
///
/// The write side calls [`persist`](Self::persist). On the next request a
/// fresh bridge loads the payload on first use and deletes it from the
/// session, so it is consumed exactly once. A bridge is request-scoped: the
/// loaded payload is cached for its lifetime.
pub struct DataBridge<'s> {
    session: &'s dyn Session,
    key: String,
    data: OnceCell<Payload>,
}

impl<'s> DataBridge<'s> {
    pub fn new(session: &'s dyn Session, config: &ResolverConfig) -> Self {
        Self {
            session,
            key: config.session_key.clone(),
            data: OnceCell::new(),
        }
    }

    /// Store `payload` for the next request, replacing any unconsumed payload.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the session cannot be written.
    pub fn persist(&self, payload: Payload) -> Result<(), SessionError> {
        debug!(key = %self.key, fields = payload.len(), "bridging submission across redirect");
        self.session.set(&self.key, payload)
    }

    /// Whether the bridge holds a non-empty payload for this request.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.load().is_empty()
    }

    /// The bridged value for `name`, or `default` when absent or `Null`.
    #[must_use]
    pub fn get(&self, name: &str, default: Value) -> Value {
        self.load().get_or(name, default)
    }

    /// The full bridged payload, empty when nothing was bridged.
    #[must_use]
    pub fn data(&self) -> &Payload {
        self.load()
    }

    fn load(&self) -> &Payload {
        self.data.get_or_init(|| match self.take() {
            Ok(Some(payload)) => {
                debug!(key = %self.key, fields = payload.len(), "recovered bridged submission");
                payload
            }
            Ok(None) => Payload::new(),
            Err(err) => {
                debug!(key = %self.key, error = %err, "session unavailable, bridge left empty");
                Payload::new()
            }
        })
    }

    fn take(&self) -> Result<Option<Payload>, SessionError> {
        if !self.session.has(&self.key)? {
            return Ok(None);
        }
        let payload = self.session.get(&self.key)?;
        self.session.remove(&self.key)?;
        Ok(payload)
    }
}

impl fmt::Debug for DataBridge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBridge")
            .field("key", &self.key)
            .field("data", &self.data.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn config() -> ResolverConfig {
        ResolverConfig::default()
    }

    #[test]
    fn persisted_payload_is_consumed_once() {
        let session = MemorySession::new();
        let cfg = config();

        DataBridge::new(&session, &cfg)
            .persist(Payload::new().with("Category", "books"))
            .unwrap();

        let next = DataBridge::new(&session, &cfg);
        assert!(next.has_data());
        assert_eq!(next.get("Category", Value::Null), Value::from("books"));
        assert!(!session.has(&cfg.session_key).unwrap());

        let later = DataBridge::new(&session, &cfg);
        assert!(!later.has_data());
    }

    #[test]
    fn loaded_payload_survives_for_instance_lifetime() {
        let session = MemorySession::new();
        let cfg = config();
        session
            .set(&cfg.session_key, Payload::new().with("a", 1_i64))
            .unwrap();

        let bridge = DataBridge::new(&session, &cfg);
        assert!(bridge.has_data());
        assert!(bridge.has_data());
        assert_eq!(bridge.data().len(), 1);
    }

    #[test]
    fn persist_overwrites_unconsumed_payload() {
        let session = MemorySession::new();
        let cfg = config();
        let writer = DataBridge::new(&session, &cfg);
        writer.persist(Payload::new().with("a", 1_i64)).unwrap();
        writer.persist(Payload::new().with("b", 2_i64)).unwrap();

        let reader = DataBridge::new(&session, &cfg);
        assert_eq!(reader.get("a", Value::Null), Value::Null);
        assert_eq!(reader.get("b", Value::Null), Value::Int(2));
    }

    #[test]
    fn missing_key_returns_default() {
        let session = MemorySession::new();
        let cfg = config();
        session
            .set(&cfg.session_key, Payload::new().with("a", 1_i64))
            .unwrap();
        let bridge = DataBridge::new(&session, &cfg);
        assert_eq!(bridge.get("b", Value::from("fallback")), Value::from("fallback"));
    }

    #[test]
    fn no_session_is_swallowed() {
        let cfg = config();
        let bridge = DataBridge::new(&NoSession, &cfg);
        assert!(!bridge.has_data());
        assert_eq!(bridge.get("a", Value::Int(9)), Value::Int(9));
        assert!(bridge.data().is_empty());
        assert!(matches!(
            bridge.persist(Payload::new()),
            Err(SessionError::Unavailable)
        ));
    }

    #[derive(Default)]
    struct CountingSession {
        inner: MemorySession,
        reads: Cell<usize>,
    }

    impl Session for CountingSession {
        fn has(&self, key: &str) -> Result<bool, SessionError> {
            self.reads.set(self.reads.get() + 1);
            self.inner.has(key)
        }
        fn get(&self, key: &str) -> Result<Option<Payload>, SessionError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, payload: Payload) -> Result<(), SessionError> {
            self.inner.set(key, payload)
        }
        fn remove(&self, key: &str) -> Result<(), SessionError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn session_is_read_at_most_once() {
        let session = CountingSession::default();
        let cfg = config();
        let bridge = DataBridge::new(&session, &cfg);
        assert!(!bridge.has_data());
        let _ = bridge.get("x", Value::Null);
        let _ = bridge.data();
        assert_eq!(session.reads.get(), 1);
    }

    struct FailingRemove(MemorySession);

    impl Session for FailingRemove {
        fn has(&self, key: &str) -> Result<bool, SessionError> {
            self.0.has(key)
        }
        fn get(&self, key: &str) -> Result<Option<Payload>, SessionError> {
            self.0.get(key)
        }
        fn set(&self, key: &str, payload: Payload) -> Result<(), SessionError> {
            self.0.set(key, payload)
        }
        fn remove(&self, _key: &str) -> Result<(), SessionError> {
            Err(SessionError::Backend("read-only".into()))
        }
    }

    #[test]
    fn failed_clear_leaves_bridge_empty() {
        let cfg = config();
        let session = FailingRemove(MemorySession::new());
        session
            .set(&cfg.session_key, Payload::new().with("a", 1_i64))
            .unwrap();
        let bridge = DataBridge::new(&session, &cfg);
        assert!(!bridge.has_data());
    }
}
