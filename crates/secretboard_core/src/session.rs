//! crates/secretboard_core/src/session.rs
//!
//! The session identity provider and the context object carrying the
//! identity into every component that needs it.
//!
//! Ownership is plain identifier equality. Anyone presenting the same
//! identifier can delete the same notes; nothing binds a session to a note
//! cryptographically.

use crate::domain::{Note, SessionId};
use crate::ports::{PortResult, SessionStorage};

/// The local storage key the identifier is persisted under.
pub const SESSION_STORAGE_KEY: &str = "secretboard_session";

pub struct SessionIdentityProvider;

impl SessionIdentityProvider {
    /// Returns the persisted identifier, generating and persisting one on first use.
    pub fn get_session_id(storage: &dyn SessionStorage) -> PortResult<SessionId> {
        if let Some(existing) = storage.get_item(SESSION_STORAGE_KEY)? {
            if !existing.trim().is_empty() {
                return Ok(SessionId::new(existing));
            }
        }
        let fresh = SessionId::generate();
        storage.set_item(SESSION_STORAGE_KEY, fresh.as_str())?;
        Ok(fresh)
    }
}

/// Built once at start-up and handed to every component.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: SessionId,
}

impl SessionContext {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    pub fn from_storage(storage: &dyn SessionStorage) -> PortResult<Self> {
        Ok(Self::new(SessionIdentityProvider::get_session_id(storage)?))
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Whether the note was authored by this session.
    pub fn owns(&self, note: &Note) -> bool {
        note.session_id == self.session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStorage {
        items: Mutex<HashMap<String, String>>,
        writes: Mutex<usize>,
    }

    impl SessionStorage for MemoryStorage {
        fn get_item(&self, key: &str) -> PortResult<Option<String>> {
            Ok(self.items.lock().unwrap().get(key).cloned())
        }

        fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
            *self.writes.lock().unwrap() += 1;
            self.items
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[test]
    fn first_call_generates_and_persists_once() {
        let storage = MemoryStorage::default();

        let first = SessionIdentityProvider::get_session_id(&storage).unwrap();
        let second = SessionIdentityProvider::get_session_id(&storage).unwrap();

        assert_eq!(first, second);
        assert_eq!(*storage.writes.lock().unwrap(), 1);
        assert_eq!(
            storage.get_item(SESSION_STORAGE_KEY).unwrap().as_deref(),
            Some(first.as_str())
        );
    }

    #[test]
    fn existing_identifier_is_returned_untouched() {
        let storage = MemoryStorage::default();
        storage.set_item(SESSION_STORAGE_KEY, "abc-123").unwrap();

        let context = SessionContext::from_storage(&storage).unwrap();

        assert_eq!(context.session_id().as_str(), "abc-123");
        assert_eq!(*storage.writes.lock().unwrap(), 1);
    }
}
