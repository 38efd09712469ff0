use crate::application::notifications::Notifier;
use crate::domain::models::{Category, CategoryDraft};
use crate::infrastructure::error::JournalError;
use crate::infrastructure::rest_store::CategoryStore;
use std::sync::{Arc, Mutex, MutexGuard};

/// Seeded for accounts that have never created a category.
pub const DEFAULT_CATEGORIES: [(&str, &str); 5] = [
    ("GRATIDÃO", "emerald"),
    ("INTERCESSÃO", "blue"),
    ("CRESCIMENTO", "amber"),
    ("CONFISSÃO", "rose"),
    ("FORÇA", "purple"),
];

pub struct CategoryService<S: CategoryStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    categories: Mutex<Vec<Category>>,
}

impl<S: CategoryStore> CategoryService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            categories: Mutex::new(Vec::new()),
        }
    }

    pub fn categories(&self) -> Result<Vec<Category>, JournalError> {
        Ok(self.lock_categories()?.clone())
    }

    pub fn clear(&self) -> Result<(), JournalError> {
        self.lock_categories()?.clear();
        Ok(())
    }

    /// Loads the remote list, seeding the defaults for an empty account.
    pub async fn refresh(&self, access_token: &str, user_id: &str) -> Result<(), JournalError> {
        let mut remote = self.store.list_categories(access_token).await?;
        if remote.is_empty() {
            for (name, color_theme) in DEFAULT_CATEGORIES {
                let created = self
                    .store
                    .create_category(
                        access_token,
                        user_id,
                        &CategoryDraft {
                            name: name.to_string(),
                            color_theme: color_theme.to_string(),
                        },
                    )
                    .await?;
                remote.push(created);
            }
        }
        *self.lock_categories()? = remote;
        Ok(())
    }

    pub async fn add_category(
        &self,
        access_token: &str,
        user_id: &str,
        draft: CategoryDraft,
    ) -> Result<Category, JournalError> {
        draft.validate().map_err(JournalError::InvalidInput)?;
        match self.store.create_category(access_token, user_id, &draft).await {
            Ok(created) => {
                self.lock_categories()?.push(created.clone());
                Ok(created)
            }
            Err(error) => {
                self.notifier
                    .notify(&format!("Could not save the category: {error}"));
                Err(error)
            }
        }
    }

    pub async fn update_category(
        &self,
        access_token: &str,
        updated: Category,
    ) -> Result<(), JournalError> {
        updated.validate().map_err(JournalError::InvalidInput)?;
        let previous = {
            let mut categories = self.lock_categories()?;
            let Some(stored) = categories
                .iter_mut()
                .find(|candidate| candidate.id == updated.id)
            else {
                return Err(JournalError::InvalidInput(format!(
                    "unknown category id: {}",
                    updated.id
                )));
            };
            std::mem::replace(stored, updated.clone())
        };

        if let Err(error) = self.store.update_category(access_token, &updated).await {
            let mut categories = self.lock_categories()?;
            if let Some(stored) = categories
                .iter_mut()
                .find(|candidate| candidate.id == updated.id)
            {
                *stored = previous;
            }
            self.notifier
                .notify(&format!("Could not update the category: {error}"));
            return Err(error);
        }
        Ok(())
    }

    pub async fn delete_category(
        &self,
        access_token: &str,
        category_id: &str,
    ) -> Result<(), JournalError> {
        let (removed_at, removed) = {
            let mut categories = self.lock_categories()?;
            let Some(position) = categories
                .iter()
                .position(|candidate| candidate.id == category_id)
            else {
                return Err(JournalError::InvalidInput(format!(
                    "unknown category id: {category_id}"
                )));
            };
            (position, categories.remove(position))
        };

        if let Err(error) = self.store.delete_category(access_token, category_id).await {
            let mut categories = self.lock_categories()?;
            let position = removed_at.min(categories.len());
            categories.insert(position, removed);
            self.notifier
                .notify(&format!("Could not delete the category: {error}"));
            return Err(error);
        }
        Ok(())
    }

    fn lock_categories(&self) -> Result<MutexGuard<'_, Vec<Category>>, JournalError> {
        self.categories
            .lock()
            .map_err(|_| JournalError::State("category list lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notifications::NoticeQueue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Debug, Default)]
    struct FakeCategoryStore {
        remote: Mutex<Vec<Category>>,
        fail_writes: AtomicBool,
        next_id: AtomicU64,
    }

    impl FakeCategoryStore {
        fn with_remote(categories: Vec<Category>) -> Self {
            Self {
                remote: Mutex::new(categories),
                ..Self::default()
            }
        }

        fn check_write(&self) -> Result<(), JournalError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(JournalError::Store("remote write rejected".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CategoryStore for FakeCategoryStore {
        async fn list_categories(&self, _access_token: &str) -> Result<Vec<Category>, JournalError> {
            Ok(self.remote.lock().expect("remote lock poisoned").clone())
        }

        async fn create_category(
            &self,
            _access_token: &str,
            _user_id: &str,
            draft: &CategoryDraft,
        ) -> Result<Category, JournalError> {
            self.check_write()?;
            let created = Category {
                id: format!("cat-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                name: draft.name.clone(),
                color_theme: draft.color_theme.clone(),
            };
            self.remote
                .lock()
                .expect("remote lock poisoned")
                .push(created.clone());
            Ok(created)
        }

        async fn update_category(
            &self,
            _access_token: &str,
            category: &Category,
        ) -> Result<(), JournalError> {
            self.check_write()?;
            let mut remote = self.remote.lock().expect("remote lock poisoned");
            if let Some(stored) = remote
                .iter_mut()
                .find(|candidate| candidate.id == category.id)
            {
                *stored = category.clone();
            }
            Ok(())
        }

        async fn delete_category(
            &self,
            _access_token: &str,
            category_id: &str,
        ) -> Result<(), JournalError> {
            self.check_write()?;
            self.remote
                .lock()
                .expect("remote lock poisoned")
                .retain(|candidate| candidate.id != category_id);
            Ok(())
        }
    }

    fn sample_category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            color_theme: "blue".to_string(),
        }
    }

    fn service(
        store: Arc<FakeCategoryStore>,
    ) -> (CategoryService<FakeCategoryStore>, Arc<NoticeQueue>) {
        let notices = Arc::new(NoticeQueue::new());
        (
            CategoryService::new(store, Arc::clone(&notices) as Arc<dyn Notifier>),
            notices,
        )
    }

    #[tokio::test]
    async fn refresh_seeds_the_defaults_for_an_empty_account() {
        let store = Arc::new(FakeCategoryStore::default());
        let (categories, _notices) = service(Arc::clone(&store));

        categories.refresh("token", "user-1").await.expect("refresh");

        let loaded = categories.categories().expect("categories");
        assert_eq!(loaded.len(), DEFAULT_CATEGORIES.len());
        assert_eq!(loaded[0].name, "GRATIDÃO");
        assert_eq!(loaded[0].color_theme, "emerald");
        assert_eq!(
            store.remote.lock().expect("remote lock poisoned").len(),
            DEFAULT_CATEGORIES.len()
        );
    }

    #[tokio::test]
    async fn refresh_keeps_an_existing_list_untouched() {
        let store = Arc::new(FakeCategoryStore::with_remote(vec![sample_category(
            "cat-1", "Custom",
        )]));
        let (categories, _notices) = service(Arc::clone(&store));

        categories.refresh("token", "user-1").await.expect("refresh");

        let loaded = categories.categories().expect("categories");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Custom");
    }

    #[tokio::test]
    async fn add_category_appends_the_stored_row() {
        let store = Arc::new(FakeCategoryStore::with_remote(vec![sample_category(
            "cat-1", "Custom",
        )]));
        let (categories, _notices) = service(Arc::clone(&store));
        categories.refresh("token", "user-1").await.expect("refresh");

        let created = categories
            .add_category(
                "token",
                "user-1",
                CategoryDraft {
                    name: "LOUVOR".to_string(),
                    color_theme: "teal".to_string(),
                },
            )
            .await
            .expect("create");

        assert!(created.id.starts_with("cat-"));
        assert_eq!(categories.categories().expect("categories").len(), 2);
    }

    #[tokio::test]
    async fn failed_update_restores_the_previous_value() {
        let store = Arc::new(FakeCategoryStore::with_remote(vec![sample_category(
            "cat-1", "Original",
        )]));
        let (categories, notices) = service(Arc::clone(&store));
        categories.refresh("token", "user-1").await.expect("refresh");
        store.fail_writes.store(true, Ordering::SeqCst);

        let result = categories
            .update_category("token", sample_category("cat-1", "Edited"))
            .await;

        assert!(result.is_err());
        assert_eq!(categories.categories().expect("categories")[0].name, "Original");
        assert!(!notices.drain().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_reinserts_at_the_original_position() {
        let store = Arc::new(FakeCategoryStore::with_remote(vec![
            sample_category("cat-1", "First"),
            sample_category("cat-2", "Second"),
            sample_category("cat-3", "Third"),
        ]));
        let (categories, notices) = service(Arc::clone(&store));
        categories.refresh("token", "user-1").await.expect("refresh");
        store.fail_writes.store(true, Ordering::SeqCst);

        assert!(categories.delete_category("token", "cat-2").await.is_err());
        let ids: Vec<String> = categories
            .categories()
            .expect("categories")
            .iter()
            .map(|category| category.id.clone())
            .collect();
        assert_eq!(ids, vec!["cat-1", "cat-2", "cat-3"]);
        assert!(!notices.drain().is_empty());
    }
}
