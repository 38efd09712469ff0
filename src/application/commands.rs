use crate::application::bootstrap::bootstrap_workspace;
use crate::application::categories::CategoryService;
use crate::application::journal::JournalService;
use crate::application::mentor::{MentorService, MentorTurn};
use crate::application::notifications::{NoticeQueue, Notifier};
use crate::application::session::SessionManager;
use crate::domain::calendar::month_grid;
use crate::domain::filter::EntryFilter;
use crate::domain::models::{
    AuthSession, CalendarDay, Category, ChatMessage, ChatRole, ChatSession, Entry, EntryDraft,
    JournalStats, UserProfile, Verse, WriteOutcome,
};
use crate::domain::stats::compute_stats;
use crate::infrastructure::auth_client::ReqwestAuthClient;
use crate::infrastructure::config::{
    read_api_base_url, read_mentor_model, resolve_anon_key, resolve_mentor_api_key,
    resolve_timezone,
};
use crate::infrastructure::credential_store::KeyringSessionStore;
use crate::infrastructure::error::JournalError;
use crate::infrastructure::object_storage::{
    AVATARS_BUCKET, ENTRY_IMAGES_BUCKET, ObjectStorage, ReqwestObjectStorage, next_object_name,
};
use crate::infrastructure::rest_store::{CategoryStore, ChatStore, ProfileStore, RestStore};
use crate::infrastructure::text_generation::ReqwestGeminiClient;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const DEFAULT_ACCENT_COLOR: &str = "#2badee";
const DEFAULT_PROFILE_NAME: &str = "Amigo(a)";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    timezone: Tz,
    now_provider: NowProvider,
    notices: Arc<NoticeQueue>,
    store: Arc<RestStore>,
    object_storage: ReqwestObjectStorage,
    journal: JournalService<RestStore>,
    categories: CategoryService<RestStore>,
    mentor: MentorService<RestStore, ReqwestGeminiClient>,
    sessions: SessionManager<ReqwestAuthClient, KeyringSessionStore>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, JournalError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = bootstrap.config_dir;
        let logs_dir = bootstrap.logs_dir;

        let api_base_url = read_api_base_url(&config_dir)?;
        let anon_key = resolve_anon_key(&config_dir)?;
        let timezone = resolve_timezone(&config_dir)?;
        let mentor_model = read_mentor_model(&config_dir)?;
        let mentor_api_key = resolve_mentor_api_key().unwrap_or_default();

        let notices = Arc::new(NoticeQueue::new());
        let store = Arc::new(RestStore::new(&api_base_url, anon_key.clone())?);
        let object_storage = ReqwestObjectStorage::new(&api_base_url, anon_key.clone())?;
        let generation = Arc::new(ReqwestGeminiClient::new(mentor_api_key, mentor_model)?);
        let auth_client = Arc::new(ReqwestAuthClient::new(&api_base_url, anon_key)?);
        let session_store = Arc::new(KeyringSessionStore::default());

        Ok(Self {
            config_dir,
            logs_dir,
            timezone,
            now_provider: Arc::new(Utc::now),
            notices: Arc::clone(&notices),
            journal: JournalService::new(
                Arc::clone(&store),
                Arc::clone(&notices) as Arc<dyn Notifier>,
            ),
            categories: CategoryService::new(
                Arc::clone(&store),
                Arc::clone(&notices) as Arc<dyn Notifier>,
            ),
            mentor: MentorService::new(Arc::clone(&store), generation),
            sessions: SessionManager::new(auth_client, session_store),
            store,
            object_storage,
            runtime: Mutex::new(RuntimeState::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn command_error(&self, command: &str, error: &JournalError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn today(&self) -> NaiveDate {
        (self.now_provider)().with_timezone(&self.timezone).date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Calendar,
    Journal,
    Settings,
    Chat,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Journal => "journal",
            Self::Settings => "settings",
            Self::Chat => "chat",
        }
    }

    fn parse(value: &str) -> Result<Self, JournalError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "calendar" => Ok(Self::Calendar),
            "journal" => Ok(Self::Journal),
            "settings" => Ok(Self::Settings),
            "chat" => Ok(Self::Chat),
            other => Err(JournalError::InvalidInput(format!(
                "unsupported view: {other}"
            ))),
        }
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    view: ViewMode,
    selected_date: Option<NaiveDate>,
    profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MentorChatResponse {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_title: Option<String>,
    pub reply: ChatMessage,
}

pub async fn sign_in_impl(
    state: &AppState,
    email: String,
    password: String,
) -> Result<SessionResponse, JournalError> {
    let session = state.sessions.sign_in(email.trim(), &password).await?;
    enter_account(state, &session).await?;
    state.log_info("sign_in", &format!("signed in user_id={}", session.user_id));
    Ok(session_response(&session))
}

pub async fn sign_up_impl(
    state: &AppState,
    name: String,
    email: String,
    password: String,
) -> Result<SessionResponse, JournalError> {
    let session = state
        .sessions
        .sign_up(name.trim(), email.trim(), &password)
        .await?;
    enter_account(state, &session).await?;
    state.log_info("sign_up", &format!("signed up user_id={}", session.user_id));
    Ok(session_response(&session))
}

pub async fn sign_out_impl(state: &AppState) -> Result<(), JournalError> {
    let remote_result = state.sessions.sign_out().await;
    leave_account(state)?;
    state.log_info("sign_out", "cleared session and local account state");
    remote_result
}

/// Deletes every row the account owns before closing the session.
pub async fn delete_account_impl(state: &AppState) -> Result<(), JournalError> {
    let session = require_session(state)?;
    let token = session.access_token.as_str();

    state.journal.delete_all(token).await?;
    for category in state.store.list_categories(token).await? {
        state.store.delete_category(token, &category.id).await?;
    }
    for chat_session in state.store.list_sessions(token).await? {
        state.store.delete_session(token, &chat_session.id).await?;
    }

    let remote_result = state.sessions.sign_out().await;
    leave_account(state)?;
    state.log_info(
        "delete_account",
        &format!("deleted account data for user_id={}", session.user_id),
    );
    remote_result
}

pub fn entries_impl(state: &AppState) -> Result<Vec<Entry>, JournalError> {
    state.journal.entries()
}

pub async fn create_entry_impl(
    state: &AppState,
    draft: EntryDraft,
) -> Result<WriteOutcome, JournalError> {
    let session = require_session(state)?;
    let outcome = state
        .journal
        .create_entry(&session.access_token, &session.user_id, draft)
        .await?;
    log_outcome(state, "create_entry", &outcome);
    Ok(outcome)
}

pub async fn update_entry_impl(
    state: &AppState,
    entry: Entry,
) -> Result<WriteOutcome, JournalError> {
    let session = require_session(state)?;
    let outcome = state.journal.update_entry(&session.access_token, entry).await?;
    log_outcome(state, "update_entry", &outcome);
    Ok(outcome)
}

pub async fn delete_entry_impl(
    state: &AppState,
    entry_id: String,
) -> Result<WriteOutcome, JournalError> {
    let session = require_session(state)?;
    let outcome = state
        .journal
        .delete_entry(&session.access_token, entry_id.trim())
        .await?;
    log_outcome(state, "delete_entry", &outcome);
    Ok(outcome)
}

pub async fn toggle_favorite_impl(
    state: &AppState,
    entry_id: String,
) -> Result<WriteOutcome, JournalError> {
    let session = require_session(state)?;
    let outcome = state
        .journal
        .toggle_favorite(&session.access_token, entry_id.trim())
        .await?;
    log_outcome(state, "toggle_favorite", &outcome);
    Ok(outcome)
}

pub async fn refresh_journal_impl(state: &AppState) -> Result<Vec<Entry>, JournalError> {
    let session = require_session(state)?;
    state.journal.refresh(&session.access_token).await?;
    state.journal.entries()
}

pub fn calendar_month_impl(
    state: &AppState,
    year: i32,
    month: u32,
) -> Result<Vec<CalendarDay>, JournalError> {
    let entries = state.journal.entries()?;
    Ok(month_grid(year, month, &entries, state.timezone, state.today()))
}

pub fn journal_stats_impl(state: &AppState) -> Result<JournalStats, JournalError> {
    let entries = state.journal.entries()?;
    Ok(compute_stats(&entries, state.timezone, state.today()))
}

pub fn filtered_entries_impl(
    state: &AppState,
    filter: EntryFilter,
) -> Result<Vec<Entry>, JournalError> {
    let entries = state.journal.entries()?;
    Ok(filter.apply(&entries, state.timezone))
}

pub fn select_date_impl(state: &AppState, date: Option<String>) -> Result<(), JournalError> {
    let parsed = match date.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| {
            JournalError::InvalidInput(format!("date must be YYYY-MM-DD: {error}"))
        })?),
        None => None,
    };
    lock_runtime(state)?.selected_date = parsed;
    Ok(())
}

pub fn selected_day_entries_impl(state: &AppState) -> Result<Vec<Entry>, JournalError> {
    let selected = lock_runtime(state)?.selected_date;
    let Some(selected) = selected else {
        return Ok(Vec::new());
    };
    Ok(state
        .journal
        .entries()?
        .into_iter()
        .filter(|entry| entry.local_day(state.timezone) == selected)
        .collect())
}

pub fn set_view_impl(state: &AppState, view: String) -> Result<(), JournalError> {
    let view = ViewMode::parse(&view)?;
    lock_runtime(state)?.view = view;
    Ok(())
}

pub fn current_view_impl(state: &AppState) -> Result<String, JournalError> {
    Ok(lock_runtime(state)?.view.as_str().to_string())
}

pub fn drain_notices_impl(state: &AppState) -> Vec<String> {
    state.notices.drain()
}

pub fn categories_impl(state: &AppState) -> Result<Vec<Category>, JournalError> {
    state.categories.categories()
}

pub async fn add_category_impl(
    state: &AppState,
    name: String,
    color_theme: String,
) -> Result<Category, JournalError> {
    let session = require_session(state)?;
    let created = state
        .categories
        .add_category(
            &session.access_token,
            &session.user_id,
            crate::domain::models::CategoryDraft {
                name: name.trim().to_string(),
                color_theme: color_theme.trim().to_string(),
            },
        )
        .await?;
    state.log_info("add_category", &format!("created category_id={}", created.id));
    Ok(created)
}

pub async fn update_category_impl(
    state: &AppState,
    category: Category,
) -> Result<(), JournalError> {
    let session = require_session(state)?;
    state
        .categories
        .update_category(&session.access_token, category)
        .await
}

pub async fn delete_category_impl(
    state: &AppState,
    category_id: String,
) -> Result<(), JournalError> {
    let session = require_session(state)?;
    state
        .categories
        .delete_category(&session.access_token, category_id.trim())
        .await
}

pub async fn chat_with_mentor_impl(
    state: &AppState,
    session_id: Option<String>,
    text: String,
) -> Result<MentorChatResponse, JournalError> {
    let session = require_session(state)?;
    let user_name = {
        let runtime = lock_runtime(state)?;
        runtime
            .profile
            .as_ref()
            .map(|profile| profile.name.clone())
            .or_else(|| session.display_name.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string())
    };
    let context_entries = state.journal.entries()?;

    let reply = state
        .mentor
        .send_message(
            &session.access_token,
            &session.user_id,
            session_id.as_deref(),
            &user_name,
            &context_entries,
            &text,
        )
        .await?;

    let session_title = reply.session.map(|created| created.title);
    match reply.turn {
        MentorTurn::Replied(message) => Ok(MentorChatResponse {
            session_id: reply.session_id,
            session_title,
            reply: message,
        }),
        // A lost connection becomes a visible chat turn instead of a
        // failed command. The session id is real even on the first
        // message, so follow-ups reach the persisted user turn.
        MentorTurn::Unavailable { reason } => {
            state.log_error("chat_with_mentor", &reason);
            let message = ChatMessage {
                id: next_id("msg"),
                session_id: reply.session_id.clone(),
                role: ChatRole::Model,
                content: format!("Erro de conexão: {reason}. Verifique sua internet."),
                created_at: (state.now_provider)(),
            };
            Ok(MentorChatResponse {
                session_id: reply.session_id,
                session_title,
                reply: message,
            })
        }
    }
}

pub async fn list_chat_sessions_impl(state: &AppState) -> Result<Vec<ChatSession>, JournalError> {
    let session = require_session(state)?;
    state.mentor.list_sessions(&session.access_token).await
}

pub async fn rename_chat_session_impl(
    state: &AppState,
    session_id: String,
    title: String,
) -> Result<(), JournalError> {
    let session = require_session(state)?;
    state
        .mentor
        .rename_session(&session.access_token, session_id.trim(), title.trim())
        .await
}

pub async fn delete_chat_session_impl(
    state: &AppState,
    session_id: String,
) -> Result<(), JournalError> {
    let session = require_session(state)?;
    state
        .mentor
        .delete_session(&session.access_token, session_id.trim())
        .await
}

pub async fn chat_messages_impl(
    state: &AppState,
    session_id: String,
) -> Result<Vec<ChatMessage>, JournalError> {
    let session = require_session(state)?;
    state
        .mentor
        .load_messages(&session.access_token, session_id.trim())
        .await
}

pub async fn verse_of_the_day_impl(state: &AppState, theme: Option<String>) -> Verse {
    state
        .mentor
        .verse_of_the_day(theme.as_deref().map(str::trim).filter(|value| !value.is_empty()))
        .await
}

pub async fn suggest_prayer_impl(state: &AppState, category: String) -> String {
    state.mentor.suggest_prayer(category.trim()).await
}

pub async fn upload_entry_image_impl(
    state: &AppState,
    bytes: Vec<u8>,
    extension: String,
    content_type: String,
) -> Result<String, JournalError> {
    let session = require_session(state)?;
    let object_name = next_object_name(extension.trim());
    let url = state
        .object_storage
        .upload(
            &session.access_token,
            ENTRY_IMAGES_BUCKET,
            &object_name,
            bytes,
            content_type.trim(),
        )
        .await?;
    state.log_info("upload_entry_image", &format!("uploaded {object_name}"));
    Ok(url)
}

pub async fn upload_avatar_impl(
    state: &AppState,
    bytes: Vec<u8>,
    extension: String,
    content_type: String,
) -> Result<UserProfile, JournalError> {
    let session = require_session(state)?;
    let object_name = next_object_name(extension.trim());
    let url = state
        .object_storage
        .upload(
            &session.access_token,
            AVATARS_BUCKET,
            &object_name,
            bytes,
            content_type.trim(),
        )
        .await?;

    let mut profile = ensure_profile(state, &session).await?;
    profile.avatar_url = Some(url);
    state
        .store
        .upsert_profile(&session.access_token, &profile)
        .await?;
    lock_runtime(state)?.profile = Some(profile.clone());
    state.log_info("upload_avatar", &format!("uploaded {object_name}"));
    Ok(profile)
}

pub async fn update_profile_impl(
    state: &AppState,
    name: Option<String>,
    accent_color: Option<String>,
) -> Result<UserProfile, JournalError> {
    let session = require_session(state)?;
    let mut profile = ensure_profile(state, &session).await?;

    if let Some(name) = name.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        profile.name = name.to_string();
    }
    if let Some(accent) = accent_color.as_deref().map(str::trim).filter(|value| !value.is_empty())
    {
        profile.accent_color = Some(accent.to_string());
    }

    state
        .store
        .upsert_profile(&session.access_token, &profile)
        .await?;
    lock_runtime(state)?.profile = Some(profile.clone());
    state.log_info("update_profile", &format!("updated user_id={}", profile.id));
    Ok(profile)
}

pub async fn profile_impl(state: &AppState) -> Result<UserProfile, JournalError> {
    let session = require_session(state)?;
    ensure_profile(state, &session).await
}

fn require_session(state: &AppState) -> Result<AuthSession, JournalError> {
    state
        .sessions
        .current_session()?
        .ok_or(JournalError::SessionExpired)
}

async fn enter_account(state: &AppState, session: &AuthSession) -> Result<(), JournalError> {
    let profile = ensure_profile(state, session).await?;
    state.journal.refresh(&session.access_token).await?;
    state
        .categories
        .refresh(&session.access_token, &session.user_id)
        .await?;

    let mut runtime = lock_runtime(state)?;
    runtime.profile = Some(profile);
    runtime.view = ViewMode::Calendar;
    runtime.selected_date = None;
    Ok(())
}

fn leave_account(state: &AppState) -> Result<(), JournalError> {
    state.journal.clear()?;
    state.categories.clear()?;
    let mut runtime = lock_runtime(state)?;
    *runtime = RuntimeState::default();
    Ok(())
}

async fn ensure_profile(
    state: &AppState,
    session: &AuthSession,
) -> Result<UserProfile, JournalError> {
    if let Some(profile) = state
        .store
        .fetch_profile(&session.access_token, &session.user_id)
        .await?
    {
        return Ok(profile);
    }

    let profile = UserProfile {
        id: session.user_id.clone(),
        name: session
            .display_name
            .clone()
            .unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string()),
        avatar_url: None,
        accent_color: Some(DEFAULT_ACCENT_COLOR.to_string()),
    };
    state
        .store
        .upsert_profile(&session.access_token, &profile)
        .await?;
    Ok(profile)
}

fn session_response(session: &AuthSession) -> SessionResponse {
    SessionResponse {
        user_id: session.user_id.clone(),
        email: session.email.clone(),
        display_name: session.display_name.clone(),
        expires_at: session.expires_at.to_rfc3339(),
    }
}

fn log_outcome(state: &AppState, command: &str, outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Committed { id } => {
            state.log_info(command, &format!("committed id={id}"));
        }
        WriteOutcome::RolledBack { reason } => {
            state.log_error(command, &format!("rolled back: {reason}"));
        }
    }
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, JournalError> {
    state
        .runtime
        .lock()
        .map_err(|_| JournalError::State("runtime lock poisoned".to_string()))
}
