pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::AppState;
pub use domain::models::{
    CalendarDay, Category, ChatMessage, ChatSession, Entry, EntryDraft, JournalStats, UserProfile,
    Verse, WriteOutcome,
};
pub use infrastructure::error::JournalError;
