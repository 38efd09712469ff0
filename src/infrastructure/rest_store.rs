use crate::domain::models::{
    Category, CategoryDraft, ChatMessage, ChatRole, ChatSession, Entry, UserProfile,
};
use crate::infrastructure::error::JournalError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use url::Url;

const ENTRIES_TABLE: &str = "prayers";
const CATEGORIES_TABLE: &str = "categories";
const PROFILES_TABLE: &str = "profiles";
const CHAT_SESSIONS_TABLE: &str = "chat_sessions";
const CHAT_MESSAGES_TABLE: &str = "chat_messages";

// Row-level security scopes deletes to the principal; the sentinel makes the
// filter match every remaining row.
const DELETE_ALL_SENTINEL: &str = "neq.00000000-0000-0000-0000-000000000000";

#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn list_entries(&self, access_token: &str) -> Result<Vec<Entry>, JournalError>;
    async fn create_entry(
        &self,
        access_token: &str,
        user_id: &str,
        entry: &Entry,
    ) -> Result<String, JournalError>;
    async fn update_entry(&self, access_token: &str, entry: &Entry) -> Result<(), JournalError>;
    async fn delete_entry(&self, access_token: &str, entry_id: &str) -> Result<(), JournalError>;
    async fn set_favorite(
        &self,
        access_token: &str,
        entry_id: &str,
        is_favorite: bool,
    ) -> Result<(), JournalError>;
    async fn delete_all_entries(&self, access_token: &str) -> Result<(), JournalError>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list_categories(&self, access_token: &str) -> Result<Vec<Category>, JournalError>;
    async fn create_category(
        &self,
        access_token: &str,
        user_id: &str,
        draft: &CategoryDraft,
    ) -> Result<Category, JournalError>;
    async fn update_category(
        &self,
        access_token: &str,
        category: &Category,
    ) -> Result<(), JournalError>;
    async fn delete_category(
        &self,
        access_token: &str,
        category_id: &str,
    ) -> Result<(), JournalError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<UserProfile>, JournalError>;
    async fn upsert_profile(
        &self,
        access_token: &str,
        profile: &UserProfile,
    ) -> Result<(), JournalError>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn list_sessions(&self, access_token: &str) -> Result<Vec<ChatSession>, JournalError>;
    async fn create_session(
        &self,
        access_token: &str,
        user_id: &str,
        title: &str,
    ) -> Result<ChatSession, JournalError>;
    async fn rename_session(
        &self,
        access_token: &str,
        session_id: &str,
        title: &str,
    ) -> Result<(), JournalError>;
    async fn delete_session(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<(), JournalError>;
    async fn list_messages(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, JournalError>;
    async fn append_message(
        &self,
        access_token: &str,
        user_id: &str,
        session_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, JournalError>;
}

/// PostgREST-style client over the hosted durable store. All requests carry
/// the anon api key plus the caller's bearer token; row visibility is the
/// backend's concern.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: Url,
    anon_key: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct EntryRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    title: String,
    content: String,
    category: String,
    date: String,
    is_favorite: bool,
    #[serde(default)]
    images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CategoryRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    color_theme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ProfileRow {
    id: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
    accent_color: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatSessionRow {
    id: String,
    title: String,
    created_at: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatMessageRow {
    id: String,
    session_id: String,
    role: String,
    content: String,
    created_at: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, JournalError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| JournalError::InvalidConfig(format!("invalid api base url: {error}")))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            anon_key: anon_key.into(),
        })
    }

    fn table_endpoint(&self, table: &str) -> Result<Url, JournalError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| JournalError::Store("api base URL cannot be a base".to_string()))?;
            segments.push("rest");
            segments.push("v1");
            segments.push(table);
        }
        Ok(url)
    }

    fn row_endpoint(&self, table: &str, row_id: &str) -> Result<Url, JournalError> {
        let mut url = self.table_endpoint(table)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{row_id}"));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, access_token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), JournalError> {
        if value.trim().is_empty() {
            return Err(JournalError::Store(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn store_http_error(status: reqwest::StatusCode, body: &str) -> JournalError {
        let message = if body.trim().is_empty() {
            format!("store api error: http {}", status.as_u16())
        } else {
            format!("store api error: http {}; body={body}", status.as_u16())
        };
        JournalError::Store(message)
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<String, JournalError> {
        let response = request
            .send()
            .await
            .map_err(|error| JournalError::Store(format!("network error while {context}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| JournalError::Store(format!("failed reading response while {context}: {error}")))?;

        if !status.is_success() {
            return Err(Self::store_http_error(status, &body));
        }
        Ok(body)
    }

    fn parse_rows<T: serde::de::DeserializeOwned>(
        body: &str,
        context: &str,
    ) -> Result<Vec<T>, JournalError> {
        serde_json::from_str(body).map_err(|error| {
            JournalError::Store(format!("invalid payload while {context}: {error}; body={body}"))
        })
    }

    fn parse_returned_row<T: serde::de::DeserializeOwned>(
        body: &str,
        context: &str,
    ) -> Result<T, JournalError> {
        let mut rows: Vec<T> = Self::parse_rows(body, context)?;
        if rows.is_empty() {
            return Err(JournalError::Store(format!(
                "empty representation while {context}"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    fn parse_timestamp(raw: Option<String>) -> DateTime<Utc> {
        raw.as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|value| value.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

fn entry_to_row(entry: &Entry, user_id: Option<&str>) -> EntryRow {
    EntryRow {
        id: None,
        title: entry.title.clone(),
        content: entry.content.clone(),
        category: entry.category.clone(),
        date: entry.date.to_rfc3339(),
        is_favorite: entry.is_favorite,
        images: entry.images.clone(),
        user_id: user_id.map(ToOwned::to_owned),
    }
}

fn row_to_entry(row: EntryRow) -> Result<Entry, JournalError> {
    let id = row
        .id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| JournalError::Store("entry row is missing an id".to_string()))?;
    let date = DateTime::parse_from_rfc3339(&row.date)
        .map_err(|error| JournalError::Store(format!("invalid entry date '{}': {error}", row.date)))?
        .with_timezone(&Utc);

    Ok(Entry {
        id,
        title: row.title,
        content: row.content,
        category: row.category,
        date,
        is_favorite: row.is_favorite,
        images: row.images,
    })
}

fn row_to_category(row: CategoryRow) -> Result<Category, JournalError> {
    let id = row
        .id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| JournalError::Store("category row is missing an id".to_string()))?;
    Ok(Category {
        id,
        name: row.name,
        color_theme: row.color_theme,
    })
}

fn row_to_message(row: ChatMessageRow) -> Result<ChatMessage, JournalError> {
    Ok(ChatMessage {
        role: ChatRole::parse(&row.role).map_err(JournalError::Store)?,
        id: row.id,
        session_id: row.session_id,
        content: row.content,
        created_at: RestStore::parse_timestamp(row.created_at),
    })
}

#[async_trait]
impl EntryStore for RestStore {
    async fn list_entries(&self, access_token: &str) -> Result<Vec<Entry>, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let mut url = self.table_endpoint(ENTRIES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "date.desc");
        let body = self
            .execute(self.request(Method::GET, url, access_token), "listing entries")
            .await?;

        let rows: Vec<EntryRow> = Self::parse_rows(&body, "listing entries")?;
        rows.into_iter().map(row_to_entry).collect()
    }

    async fn create_entry(
        &self,
        access_token: &str,
        user_id: &str,
        entry: &Entry,
    ) -> Result<String, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(user_id, "user id")?;

        let url = self.table_endpoint(ENTRIES_TABLE)?;
        let row = entry_to_row(entry, Some(user_id));
        let body = self
            .execute(
                self.request(Method::POST, url, access_token)
                    .header("Prefer", "return=representation")
                    .json(&row),
                "creating entry",
            )
            .await?;

        let created: EntryRow = Self::parse_returned_row(&body, "creating entry")?;
        created
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| JournalError::Store("create response did not include an id".to_string()))
    }

    async fn update_entry(&self, access_token: &str, entry: &Entry) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(&entry.id, "entry id")?;

        let url = self.row_endpoint(ENTRIES_TABLE, &entry.id)?;
        let patch = serde_json::json!({
            "title": entry.title,
            "content": entry.content,
            "category": entry.category,
            "date": entry.date.to_rfc3339(),
            "images": entry.images,
        });
        self.execute(
            self.request(Method::PATCH, url, access_token).json(&patch),
            "updating entry",
        )
        .await?;
        Ok(())
    }

    async fn delete_entry(&self, access_token: &str, entry_id: &str) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(entry_id, "entry id")?;

        let url = self.row_endpoint(ENTRIES_TABLE, entry_id)?;
        self.execute(self.request(Method::DELETE, url, access_token), "deleting entry")
            .await?;
        Ok(())
    }

    async fn set_favorite(
        &self,
        access_token: &str,
        entry_id: &str,
        is_favorite: bool,
    ) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(entry_id, "entry id")?;

        let url = self.row_endpoint(ENTRIES_TABLE, entry_id)?;
        let patch = serde_json::json!({ "is_favorite": is_favorite });
        self.execute(
            self.request(Method::PATCH, url, access_token).json(&patch),
            "toggling favorite",
        )
        .await?;
        Ok(())
    }

    async fn delete_all_entries(&self, access_token: &str) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let mut url = self.table_endpoint(ENTRIES_TABLE)?;
        url.query_pairs_mut().append_pair("id", DELETE_ALL_SENTINEL);
        self.execute(
            self.request(Method::DELETE, url, access_token),
            "deleting all entries",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for RestStore {
    async fn list_categories(&self, access_token: &str) -> Result<Vec<Category>, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let mut url = self.table_endpoint(CATEGORIES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.asc");
        let body = self
            .execute(
                self.request(Method::GET, url, access_token),
                "listing categories",
            )
            .await?;

        let rows: Vec<CategoryRow> = Self::parse_rows(&body, "listing categories")?;
        rows.into_iter().map(row_to_category).collect()
    }

    async fn create_category(
        &self,
        access_token: &str,
        user_id: &str,
        draft: &CategoryDraft,
    ) -> Result<Category, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(user_id, "user id")?;

        let url = self.table_endpoint(CATEGORIES_TABLE)?;
        let row = CategoryRow {
            id: None,
            name: draft.name.clone(),
            color_theme: draft.color_theme.clone(),
            user_id: Some(user_id.to_string()),
        };
        let body = self
            .execute(
                self.request(Method::POST, url, access_token)
                    .header("Prefer", "return=representation")
                    .json(&row),
                "creating category",
            )
            .await?;

        let created: CategoryRow = Self::parse_returned_row(&body, "creating category")?;
        row_to_category(created)
    }

    async fn update_category(
        &self,
        access_token: &str,
        category: &Category,
    ) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(&category.id, "category id")?;

        let url = self.row_endpoint(CATEGORIES_TABLE, &category.id)?;
        let patch = serde_json::json!({
            "name": category.name,
            "color_theme": category.color_theme,
        });
        self.execute(
            self.request(Method::PATCH, url, access_token).json(&patch),
            "updating category",
        )
        .await?;
        Ok(())
    }

    async fn delete_category(
        &self,
        access_token: &str,
        category_id: &str,
    ) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(category_id, "category id")?;

        let url = self.row_endpoint(CATEGORIES_TABLE, category_id)?;
        self.execute(
            self.request(Method::DELETE, url, access_token),
            "deleting category",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for RestStore {
    async fn fetch_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<UserProfile>, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(user_id, "user id")?;

        let url = self.row_endpoint(PROFILES_TABLE, user_id)?;
        let body = self
            .execute(
                self.request(Method::GET, url, access_token),
                "fetching profile",
            )
            .await?;

        let mut rows: Vec<ProfileRow> = Self::parse_rows(&body, "fetching profile")?;
        if rows.is_empty() {
            return Ok(None);
        }
        let row = rows.swap_remove(0);
        Ok(Some(UserProfile {
            id: row.id,
            name: row.full_name.unwrap_or_default(),
            avatar_url: row.avatar_url,
            accent_color: row.accent_color,
        }))
    }

    async fn upsert_profile(
        &self,
        access_token: &str,
        profile: &UserProfile,
    ) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(&profile.id, "profile id")?;

        let url = self.table_endpoint(PROFILES_TABLE)?;
        let row = ProfileRow {
            id: profile.id.clone(),
            full_name: Some(profile.name.clone()),
            avatar_url: profile.avatar_url.clone(),
            accent_color: profile.accent_color.clone(),
        };
        self.execute(
            self.request(Method::POST, url, access_token)
                .header("Prefer", "resolution=merge-duplicates")
                .json(&row),
            "upserting profile",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatStore for RestStore {
    async fn list_sessions(&self, access_token: &str) -> Result<Vec<ChatSession>, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let mut url = self.table_endpoint(CHAT_SESSIONS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");
        let body = self
            .execute(
                self.request(Method::GET, url, access_token),
                "listing chat sessions",
            )
            .await?;

        let rows: Vec<ChatSessionRow> = Self::parse_rows(&body, "listing chat sessions")?;
        Ok(rows
            .into_iter()
            .map(|row| ChatSession {
                id: row.id,
                title: row.title,
                created_at: Self::parse_timestamp(row.created_at),
            })
            .collect())
    }

    async fn create_session(
        &self,
        access_token: &str,
        user_id: &str,
        title: &str,
    ) -> Result<ChatSession, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(user_id, "user id")?;
        Self::ensure_non_empty(title, "session title")?;

        let url = self.table_endpoint(CHAT_SESSIONS_TABLE)?;
        let body = self
            .execute(
                self.request(Method::POST, url, access_token)
                    .header("Prefer", "return=representation")
                    .json(&serde_json::json!({ "user_id": user_id, "title": title })),
                "creating chat session",
            )
            .await?;

        let row: ChatSessionRow = Self::parse_returned_row(&body, "creating chat session")?;
        Ok(ChatSession {
            id: row.id,
            title: row.title,
            created_at: Self::parse_timestamp(row.created_at),
        })
    }

    async fn rename_session(
        &self,
        access_token: &str,
        session_id: &str,
        title: &str,
    ) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(session_id, "session id")?;
        Self::ensure_non_empty(title, "session title")?;

        let url = self.row_endpoint(CHAT_SESSIONS_TABLE, session_id)?;
        self.execute(
            self.request(Method::PATCH, url, access_token)
                .json(&serde_json::json!({ "title": title })),
            "renaming chat session",
        )
        .await?;
        Ok(())
    }

    async fn delete_session(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<(), JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(session_id, "session id")?;

        let url = self.row_endpoint(CHAT_SESSIONS_TABLE, session_id)?;
        self.execute(
            self.request(Method::DELETE, url, access_token),
            "deleting chat session",
        )
        .await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(session_id, "session id")?;

        let mut url = self.table_endpoint(CHAT_MESSAGES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("session_id", &format!("eq.{session_id}"))
            .append_pair("order", "created_at.asc");
        let body = self
            .execute(
                self.request(Method::GET, url, access_token),
                "listing chat messages",
            )
            .await?;

        let rows: Vec<ChatMessageRow> = Self::parse_rows(&body, "listing chat messages")?;
        rows.into_iter().map(row_to_message).collect()
    }

    async fn append_message(
        &self,
        access_token: &str,
        user_id: &str,
        session_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(user_id, "user id")?;
        Self::ensure_non_empty(session_id, "session id")?;

        let url = self.table_endpoint(CHAT_MESSAGES_TABLE)?;
        let body = self
            .execute(
                self.request(Method::POST, url, access_token)
                    .header("Prefer", "return=representation")
                    .json(&serde_json::json!({
                        "user_id": user_id,
                        "session_id": session_id,
                        "role": role.as_str(),
                        "content": content,
                    })),
                "appending chat message",
            )
            .await?;

        let row: ChatMessageRow = Self::parse_returned_row(&body, "appending chat message")?;
        row_to_message(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_row_round_trips_through_domain() {
        let entry = Entry {
            id: "ent-1".to_string(),
            title: "Evening prayer".to_string(),
            content: "For patience".to_string(),
            category: "FORÇA".to_string(),
            date: DateTime::parse_from_rfc3339("2026-03-10T21:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc),
            is_favorite: true,
            images: vec!["https://example.com/pic.png".to_string()],
        };

        let mut row = entry_to_row(&entry, Some("usr-1"));
        assert_eq!(row.user_id.as_deref(), Some("usr-1"));
        row.id = Some("ent-1".to_string());
        row.is_favorite = true;

        let back = row_to_entry(row).expect("valid row");
        assert_eq!(back, entry);
    }

    #[test]
    fn entry_row_without_id_is_rejected() {
        let row = EntryRow {
            id: None,
            title: "t".to_string(),
            content: String::new(),
            category: "c".to_string(),
            date: "2026-03-10T21:00:00Z".to_string(),
            is_favorite: false,
            images: Vec::new(),
            user_id: None,
        };
        assert!(row_to_entry(row).is_err());
    }

    #[test]
    fn message_row_with_unknown_role_is_rejected() {
        let row = ChatMessageRow {
            id: "msg-1".to_string(),
            session_id: "ses-1".to_string(),
            role: "assistant".to_string(),
            content: "hi".to_string(),
            created_at: None,
        };
        assert!(row_to_message(row).is_err());
    }

    #[test]
    fn endpoints_address_rows_by_filter() {
        let store = RestStore::new("https://journal.example.com", "anon").expect("valid base");
        let url = store.row_endpoint(ENTRIES_TABLE, "ent-9").expect("url");
        assert_eq!(url.path(), "/rest/v1/prayers");
        assert_eq!(url.query(), Some("id=eq.ent-9"));
    }
}
