use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{EntryId, NewEntry, RankAssignment, RatedEntry},
    services::ranks::sort_by_standing,
};

use super::RatingStore;

/// Rating store kept entirely in process memory
///
/// Used for local runs without PostgreSQL and by the integration tests.
#[derive(Default)]
pub struct InMemoryRatingStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: EntryId,
    entries: BTreeMap<EntryId, RatedEntry>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn require(&mut self, id: EntryId) -> AppResult<&mut RatedEntry> {
        self.entries.get_mut(&id).ok_or(AppError::NotFound(id))
    }
}

#[async_trait::async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn find_by_owner_and_subject(
        &self,
        owner: &str,
        subject: &str,
    ) -> AppResult<Option<RatedEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .values()
            .find(|e| e.owner == owner && e.subject == subject)
            .cloned())
    }

    async fn insert(&self, entry: NewEntry) -> AppResult<RatedEntry> {
        let mut inner = self.inner.write().await;

        if inner
            .entries
            .values()
            .any(|e| e.owner == entry.owner && e.subject == entry.subject)
        {
            return Err(AppError::DuplicateEntry {
                owner: entry.owner,
                subject: entry.subject,
            });
        }

        inner.last_id += 1;
        let now = Utc::now();
        let stored = RatedEntry {
            id: inner.last_id,
            owner: entry.owner,
            subject: entry.subject,
            rating: entry.rating,
            category: entry.category,
            rank: None,
            created_at: now,
            updated_at: now,
        };
        inner.entries.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn find_by_id(&self, id: EntryId) -> AppResult<Option<RatedEntry>> {
        Ok(self.inner.read().await.entries.get(&id).cloned())
    }

    async fn update_rating(&self, id: EntryId, rating: i32) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let entry = inner.require(id)?;
        entry.rating = rating;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn update_ratings(&self, ratings: &[(EntryId, i32)]) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        if let Some((missing, _)) = ratings.iter().find(|(id, _)| !inner.entries.contains_key(id)) {
            return Err(AppError::NotFound(*missing));
        }

        let now = Utc::now();
        for &(id, rating) in ratings {
            let entry = inner.require(id)?;
            entry.rating = rating;
            entry.updated_at = now;
        }
        Ok(())
    }

    async fn update_rank(&self, id: EntryId, rank: i32) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.require(id)?.rank = Some(rank);
        Ok(())
    }

    async fn apply_ranks(&self, owner: &str, ranks: &[RankAssignment]) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        if let Some(missing) = ranks.iter().find(|a| {
            inner
                .entries
                .get(&a.id)
                .map_or(true, |e| e.owner != owner)
        }) {
            return Err(AppError::NotFound(missing.id));
        }

        for assignment in ranks {
            inner.require(assignment.id)?.rank = Some(assignment.rank);
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner: &str) -> AppResult<Vec<RatedEntry>> {
        let inner = self.inner.read().await;
        let mut entries: Vec<RatedEntry> = inner
            .entries
            .values()
            .filter(|e| e.owner == owner)
            .cloned()
            .collect();
        sort_by_standing(&mut entries);
        Ok(entries)
    }

    async fn delete(&self, id: EntryId) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::NotFound(id))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.inner.read().await.entries.len() as i64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn new_entry(owner: &str, subject: &str, rating: i32) -> NewEntry {
        NewEntry {
            owner: owner.to_string(),
            subject: subject.to_string(),
            category: Category::Okay,
            rating,
        }
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = InMemoryRatingStore::new();
        tokio_test::block_on(async {
            let first = store.insert(new_entry("alice", "Heat", 3000)).await.unwrap();
            let second = store.insert(new_entry("alice", "Ronin", 3000)).await.unwrap();
            assert_eq!(first.id, 1);
            assert_eq!(second.id, 2);
            assert_eq!(first.rank, None);
        });
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let store = InMemoryRatingStore::new();
        let first = store.insert(new_entry("alice", "Heat", 3000)).await.unwrap();
        store.delete(first.id).await.unwrap();
        let second = store.insert(new_entry("alice", "Heat", 3000)).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_duplicate_subject_rejected_per_owner() {
        let store = InMemoryRatingStore::new();
        store.insert(new_entry("alice", "Heat", 3000)).await.unwrap();

        let err = store.insert(new_entry("alice", "Heat", 4000)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEntry { .. }));

        assert!(store.insert(new_entry("bob", "Heat", 4000)).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_by_owner_orders_by_standing() {
        let store = InMemoryRatingStore::new();
        store.insert(new_entry("alice", "A", 2000)).await.unwrap();
        store.insert(new_entry("alice", "B", 4000)).await.unwrap();
        store.insert(new_entry("alice", "C", 2000)).await.unwrap();
        store.insert(new_entry("bob", "D", 5000)).await.unwrap();

        let titles: Vec<String> = store
            .list_by_owner("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.subject)
            .collect();
        assert_eq!(titles, vec!["B", "A", "C"]);
    }

    #[tokio::test]
    async fn test_update_ratings_is_all_or_nothing() {
        let store = InMemoryRatingStore::new();
        let a = store.insert(new_entry("alice", "A", 2000)).await.unwrap();

        let err = store.update_ratings(&[(a.id, 2500), (99, 1000)]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(99)));

        let unchanged = store.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(unchanged.rating, 2000);
    }

    #[tokio::test]
    async fn test_apply_ranks_rejects_foreign_entries() {
        let store = InMemoryRatingStore::new();
        let a = store.insert(new_entry("alice", "A", 2000)).await.unwrap();
        let b = store.insert(new_entry("bob", "B", 2000)).await.unwrap();

        let ranks = [
            RankAssignment { id: a.id, rank: 1 },
            RankAssignment { id: b.id, rank: 2 },
        ];
        assert!(store.apply_ranks("alice", &ranks).await.is_err());
        assert_eq!(store.find_by_id(a.id).await.unwrap().unwrap().rank, None);
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let store = InMemoryRatingStore::new();
        assert!(store.find_by_id(1).await.unwrap().is_none());
        assert!(matches!(store.update_rating(1, 10).await, Err(AppError::NotFound(1))));
        assert!(matches!(store.update_rank(1, 1).await, Err(AppError::NotFound(1))));
        assert!(matches!(store.delete(1).await, Err(AppError::NotFound(1))));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
