use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub is_favorite: bool,
    pub images: Vec<String>,
}

impl Entry {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "entry.id")?;
        validate_non_empty(&self.title, "entry.title")?;
        validate_non_empty(&self.category, "entry.category")?;
        for image in &self.images {
            validate_non_empty(image, "entry.images[]")?;
        }
        Ok(())
    }

    /// Calendar day this entry belongs to in the viewer's time zone. Entries
    /// are grouped by this value, never by the exact instant.
    pub fn local_day(&self, tz: Tz) -> NaiveDate {
        self.date.with_timezone(&tz).date_naive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryDraft {
    pub title: String,
    pub content: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub images: Vec<String>,
}

impl EntryDraft {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "entry.title")?;
        validate_non_empty(&self.category, "entry.category")?;
        for image in &self.images {
            validate_non_empty(image, "entry.images[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color_theme: String,
}

impl Category {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "category.id")?;
        validate_non_empty(&self.name, "category.name")?;
        validate_non_empty(&self.color_theme, "category.color_theme")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub color_theme: String,
}

impl CategoryDraft {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "category.name")?;
        validate_non_empty(&self.color_theme, "category.color_theme")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub accent_color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "user" => Ok(Self::User),
            "model" => Ok(Self::Model),
            other => Err(format!("unknown chat role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verse {
    pub text: String,
    pub reference: String,
    pub image_url: Option<String>,
}

/// Derived per render pass, never persisted or cached across list changes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JournalStats {
    pub total: usize,
    pub favorites: usize,
    pub current_month: usize,
    pub streak_days: u32,
}

/// Terminal state of one optimistic mutation: the remote write either
/// confirmed (with the durable id) or local state was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed { id: String },
    RolledBack { reason: String },
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
