use crate::domain::models::AuthSession;
use crate::infrastructure::auth_client::{AuthClient, PasswordSignIn, SignUpRequest};
use crate::infrastructure::credential_store::SessionStore;
use crate::infrastructure::error::JournalError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const SESSION_LEEWAY_SECONDS: i64 = 30;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Holds the signed-in session and keeps the saved copy in step with it.
pub struct SessionManager<A, S>
where
    A: AuthClient,
    S: SessionStore,
{
    auth_client: Arc<A>,
    session_store: Arc<S>,
    now_provider: NowProvider,
}

impl<A, S> SessionManager<A, S>
where
    A: AuthClient,
    S: SessionStore,
{
    pub fn new(auth_client: Arc<A>, session_store: Arc<S>) -> Self {
        Self {
            auth_client,
            session_store,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, JournalError> {
        let session = self
            .auth_client
            .sign_in(PasswordSignIn {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.session_store.save_session(&session)?;
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, JournalError> {
        let session = self
            .auth_client
            .sign_up(SignUpRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.session_store.save_session(&session)?;
        Ok(session)
    }

    /// The local session is cleared even when the remote sign-out fails;
    /// the remote error is still surfaced.
    pub async fn sign_out(&self) -> Result<(), JournalError> {
        let stored = self.session_store.load_session()?;
        let remote_result = match stored {
            Some(session) => self.auth_client.sign_out(&session.access_token).await,
            None => Ok(()),
        };
        self.session_store.clear_session()?;
        remote_result
    }

    /// Loads the saved session; an expired one is cleared and dropped.
    pub fn current_session(&self) -> Result<Option<AuthSession>, JournalError> {
        let Some(session) = self.session_store.load_session()? else {
            return Ok(None);
        };
        if !session.is_valid_at((self.now_provider)(), SESSION_LEEWAY_SECONDS) {
            self.session_store.clear_session()?;
            return Ok(None);
        }
        Ok(Some(session))
    }
}
