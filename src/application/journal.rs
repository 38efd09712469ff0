use crate::application::notifications::Notifier;
use crate::domain::models::{Entry, EntryDraft, WriteOutcome};
use crate::infrastructure::error::JournalError;
use crate::infrastructure::rest_store::EntryStore;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(1);

const TEMP_ID_PREFIX: &str = "tmp-";

fn next_temp_id() -> String {
    let sequence = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
    format!("{TEMP_ID_PREFIX}{}-{sequence}", Utc::now().timestamp_micros())
}

pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Applies journal writes to the local list first and keeps the remote
/// store authoritative. A failed write rolls the local list back and
/// queues a user-visible notice; it is never retried automatically.
pub struct JournalService<S: EntryStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    entries: Mutex<Vec<Entry>>,
}

impl<S: EntryStore> JournalService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Result<Vec<Entry>, JournalError> {
        Ok(self.lock_entries()?.clone())
    }

    pub fn clear(&self) -> Result<(), JournalError> {
        self.lock_entries()?.clear();
        Ok(())
    }

    /// Replaces the local list wholesale with the remote state.
    pub async fn refresh(&self, access_token: &str) -> Result<(), JournalError> {
        let remote = self.store.list_entries(access_token).await?;
        *self.lock_entries()? = remote;
        Ok(())
    }

    pub async fn create_entry(
        &self,
        access_token: &str,
        user_id: &str,
        draft: EntryDraft,
    ) -> Result<WriteOutcome, JournalError> {
        let entry = Entry {
            id: next_temp_id(),
            title: draft.title,
            content: draft.content,
            category: draft.category,
            date: draft.date,
            is_favorite: false,
            images: draft.images,
        };
        entry
            .validate()
            .map_err(JournalError::InvalidInput)?;

        let temp_id = entry.id.clone();
        self.lock_entries()?.insert(0, entry.clone());

        match self.store.create_entry(access_token, user_id, &entry).await {
            Ok(durable_id) => {
                let mut entries = self.lock_entries()?;
                if let Some(stored) = entries.iter_mut().find(|candidate| candidate.id == temp_id) {
                    stored.id = durable_id.clone();
                }
                Ok(WriteOutcome::Committed { id: durable_id })
            }
            Err(error) => {
                self.lock_entries()?
                    .retain(|candidate| candidate.id != temp_id);
                self.notifier
                    .notify(&format!("Could not save the entry: {error}"));
                self.reconcile(access_token).await?;
                Ok(WriteOutcome::RolledBack {
                    reason: error.to_string(),
                })
            }
        }
    }

    pub async fn update_entry(
        &self,
        access_token: &str,
        updated: Entry,
    ) -> Result<WriteOutcome, JournalError> {
        updated
            .validate()
            .map_err(JournalError::InvalidInput)?;
        if is_temporary_id(&updated.id) {
            return Err(JournalError::InvalidInput(
                "entry is still being saved".to_string(),
            ));
        }

        let previous = {
            let mut entries = self.lock_entries()?;
            let Some(stored) = entries
                .iter_mut()
                .find(|candidate| candidate.id == updated.id)
            else {
                return Err(JournalError::InvalidInput(format!(
                    "unknown entry id: {}",
                    updated.id
                )));
            };
            std::mem::replace(stored, updated.clone())
        };

        match self.store.update_entry(access_token, &updated).await {
            Ok(()) => Ok(WriteOutcome::Committed {
                id: updated.id.clone(),
            }),
            Err(error) => {
                self.notifier
                    .notify(&format!("Could not update the entry: {error}"));
                if !self.reconcile(access_token).await? {
                    let mut entries = self.lock_entries()?;
                    if let Some(stored) = entries
                        .iter_mut()
                        .find(|candidate| candidate.id == updated.id)
                    {
                        *stored = previous;
                    }
                }
                Ok(WriteOutcome::RolledBack {
                    reason: error.to_string(),
                })
            }
        }
    }

    pub async fn delete_entry(
        &self,
        access_token: &str,
        entry_id: &str,
    ) -> Result<WriteOutcome, JournalError> {
        let (removed_at, removed) = {
            let mut entries = self.lock_entries()?;
            let Some(position) = entries
                .iter()
                .position(|candidate| candidate.id == entry_id)
            else {
                return Err(JournalError::InvalidInput(format!(
                    "unknown entry id: {entry_id}"
                )));
            };
            (position, entries.remove(position))
        };

        match self.store.delete_entry(access_token, entry_id).await {
            Ok(()) => Ok(WriteOutcome::Committed {
                id: entry_id.to_string(),
            }),
            Err(error) => {
                self.notifier
                    .notify(&format!("Could not delete the entry: {error}"));
                if !self.reconcile(access_token).await? {
                    let mut entries = self.lock_entries()?;
                    let position = removed_at.min(entries.len());
                    entries.insert(position, removed);
                }
                Ok(WriteOutcome::RolledBack {
                    reason: error.to_string(),
                })
            }
        }
    }

    pub async fn toggle_favorite(
        &self,
        access_token: &str,
        entry_id: &str,
    ) -> Result<WriteOutcome, JournalError> {
        let flipped = {
            let mut entries = self.lock_entries()?;
            let Some(stored) = entries
                .iter_mut()
                .find(|candidate| candidate.id == entry_id)
            else {
                return Err(JournalError::InvalidInput(format!(
                    "unknown entry id: {entry_id}"
                )));
            };
            stored.is_favorite = !stored.is_favorite;
            stored.is_favorite
        };

        match self
            .store
            .set_favorite(access_token, entry_id, flipped)
            .await
        {
            Ok(()) => Ok(WriteOutcome::Committed {
                id: entry_id.to_string(),
            }),
            Err(error) => {
                // Only the flag is restored; a concurrent edit to other
                // fields must not be clobbered by the rollback.
                let mut entries = self.lock_entries()?;
                if let Some(stored) = entries
                    .iter_mut()
                    .find(|candidate| candidate.id == entry_id)
                {
                    stored.is_favorite = !flipped;
                }
                self.notifier
                    .notify(&format!("Could not update the favorite: {error}"));
                Ok(WriteOutcome::RolledBack {
                    reason: error.to_string(),
                })
            }
        }
    }

    pub async fn delete_all(&self, access_token: &str) -> Result<(), JournalError> {
        self.store.delete_all_entries(access_token).await?;
        self.lock_entries()?.clear();
        Ok(())
    }

    /// Refetches the remote list after a failed write. Returns false and
    /// queues a notice when the refetch itself fails, leaving the local
    /// list for the caller to restore.
    async fn reconcile(&self, access_token: &str) -> Result<bool, JournalError> {
        match self.store.list_entries(access_token).await {
            Ok(remote) => {
                *self.lock_entries()? = remote;
                Ok(true)
            }
            Err(error) => {
                self.notifier
                    .notify(&format!("Could not reload entries: {error}"));
                Ok(false)
            }
        }
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, Vec<Entry>>, JournalError> {
        self.entries
            .lock()
            .map_err(|_| JournalError::State("journal entry list lock poisoned".to_string()))
    }
}
