use crate::domain::models::AuthSession;
use crate::infrastructure::error::JournalError;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Bumped whenever the stored session shape changes; older or newer
/// payloads left behind by another build are discarded, not errors.
const PAYLOAD_VERSION: u32 = 1;

pub trait SessionStore: Send + Sync {
    fn save_session(&self, session: &AuthSession) -> Result<(), JournalError>;
    fn load_session(&self) -> Result<Option<AuthSession>, JournalError>;
    fn clear_session(&self) -> Result<(), JournalError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    version: u32,
    session: AuthSession,
}

fn encode_session(session: &AuthSession) -> Result<String, JournalError> {
    serde_json::to_string(&StoredSession {
        version: PAYLOAD_VERSION,
        session: session.clone(),
    })
    .map_err(|error| JournalError::Credential(error.to_string()))
}

/// A payload that does not parse or carries another version reads as no
/// session, so a stale credential can never block sign-in.
fn decode_session(payload: &str) -> Option<AuthSession> {
    serde_json::from_str::<StoredSession>(payload)
        .ok()
        .filter(|stored| stored.version == PAYLOAD_VERSION)
        .map(|stored| stored.session)
}

#[derive(Debug, Clone)]
pub struct KeyringSessionStore {
    service_name: String,
    account_name: String,
}

impl KeyringSessionStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, JournalError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| JournalError::Credential(error.to_string()))
    }
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new("oratio.session", "default")
    }
}

impl SessionStore for KeyringSessionStore {
    fn save_session(&self, session: &AuthSession) -> Result<(), JournalError> {
        self.entry()?
            .set_password(&encode_session(session)?)
            .map_err(|error| JournalError::Credential(error.to_string()))
    }

    fn load_session(&self) -> Result<Option<AuthSession>, JournalError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(JournalError::Credential(error.to_string())),
        };
        Ok(decode_session(&payload))
    }

    fn clear_session(&self) -> Result<(), JournalError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(JournalError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    session: Mutex<Option<AuthSession>>,
}

impl SessionStore for InMemorySessionStore {
    fn save_session(&self, session: &AuthSession) -> Result<(), JournalError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| JournalError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn load_session(&self) -> Result<Option<AuthSession>, JournalError> {
        let guard = self
            .session
            .lock()
            .map_err(|error| JournalError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn clear_session(&self) -> Result<(), JournalError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| JournalError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}
