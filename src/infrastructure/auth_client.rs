use crate::domain::models::AuthSession;
use crate::infrastructure::error::JournalError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use url::Url;

#[derive(Debug, Clone)]
pub struct PasswordSignIn {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn sign_in(&self, request: PasswordSignIn) -> Result<AuthSession, JournalError>;
    async fn sign_up(&self, request: SignUpRequest) -> Result<AuthSession, JournalError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), JournalError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestAuthClient {
    client: Client,
    base_url: Url,
    anon_key: String,
}

#[derive(Debug, serde::Deserialize)]
struct SessionPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: Option<UserPayload>,
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct UserPayload {
    id: String,
    email: Option<String>,
    user_metadata: Option<serde_json::Value>,
}

impl ReqwestAuthClient {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, JournalError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| JournalError::InvalidConfig(format!("invalid api base url: {error}")))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            anon_key: anon_key.into(),
        })
    }

    fn auth_endpoint(&self, action: &str) -> Result<Url, JournalError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| JournalError::Auth("api base URL cannot be a base".to_string()))?;
            segments.push("auth");
            segments.push("v1");
            segments.push(action);
        }
        Ok(url)
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), JournalError> {
        if value.trim().is_empty() {
            return Err(JournalError::Auth(format!("{field} must not be empty")));
        }
        Ok(())
    }

    async fn post_for_session(
        &self,
        url: Url,
        body: serde_json::Value,
    ) -> Result<AuthSession, JournalError> {
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| JournalError::Auth(format!("request failed: {error}")))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|error| JournalError::Auth(format!("failed reading auth response: {error}")))?;

        let parsed = serde_json::from_str::<SessionPayload>(&raw).map_err(|error| {
            JournalError::Auth(format!("invalid auth response payload: {error}; body={raw}"))
        })?;

        if !status.is_success() || parsed.error.is_some() {
            let code = parsed
                .error
                .unwrap_or_else(|| format!("http_{}", status.as_u16()));
            let detail = parsed
                .error_description
                .or(parsed.msg)
                .unwrap_or_else(|| raw.clone());
            return Err(JournalError::Auth(format!("auth endpoint error: {code}; {detail}")));
        }

        let access_token = parsed
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| JournalError::Auth("auth response did not include a token".to_string()))?;
        let user = parsed
            .user
            .ok_or_else(|| JournalError::Auth("auth response did not include a user".to_string()))?;

        let display_name = user
            .user_metadata
            .as_ref()
            .and_then(|metadata| metadata.get("name"))
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        let expires_in = parsed.expires_in.unwrap_or(0).max(0);
        Ok(AuthSession {
            access_token,
            refresh_token: parsed.refresh_token,
            user_id: user.id,
            email: user.email.unwrap_or_default(),
            display_name,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        })
    }
}

#[async_trait]
impl AuthClient for ReqwestAuthClient {
    async fn sign_in(&self, request: PasswordSignIn) -> Result<AuthSession, JournalError> {
        Self::ensure_non_empty(&request.email, "email")?;
        Self::ensure_non_empty(&request.password, "password")?;

        let mut url = self.auth_endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        self.post_for_session(
            url,
            serde_json::json!({
                "email": request.email.trim(),
                "password": request.password,
            }),
        )
        .await
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<AuthSession, JournalError> {
        Self::ensure_non_empty(&request.name, "name")?;
        Self::ensure_non_empty(&request.email, "email")?;
        Self::ensure_non_empty(&request.password, "password")?;

        let url = self.auth_endpoint("signup")?;
        self.post_for_session(
            url,
            serde_json::json!({
                "email": request.email.trim(),
                "password": request.password,
                "data": { "name": request.name.trim() },
            }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let url = self.auth_endpoint("logout")?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| JournalError::Auth(format!("sign-out request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JournalError::Auth(format!(
                "sign-out failed: http {}; body={body}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
