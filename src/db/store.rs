use crate::{
    error::AppResult,
    models::{EntryId, NewEntry, RankAssignment, RatedEntry},
};

/// Persistence for rated entries
///
/// Implementations report infrastructure failures as
/// [`AppError::StoreUnavailable`](crate::error::AppError::StoreUnavailable)
/// and must never swallow them. Writes addressed to a missing id fail with
/// `NotFound`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingStore: Send + Sync {
    /// Looks up an owner's entry by movie title
    async fn find_by_owner_and_subject(
        &self,
        owner: &str,
        subject: &str,
    ) -> AppResult<Option<RatedEntry>>;

    /// Inserts a new entry, rejecting a duplicate (owner, subject) with `DuplicateEntry`
    async fn insert(&self, entry: NewEntry) -> AppResult<RatedEntry>;

    async fn find_by_id(&self, id: EntryId) -> AppResult<Option<RatedEntry>>;

    async fn update_rating(&self, id: EntryId, rating: i32) -> AppResult<()>;

    /// Updates several ratings at once; either all land or none do
    async fn update_ratings(&self, ratings: &[(EntryId, i32)]) -> AppResult<()>;

    async fn update_rank(&self, id: EntryId, rank: i32) -> AppResult<()>;

    /// Persists a full rank assignment for one owner; either all land or none do
    async fn apply_ranks(&self, owner: &str, ranks: &[RankAssignment]) -> AppResult<()>;

    /// All of an owner's entries, by rating descending then id ascending
    async fn list_by_owner(&self, owner: &str) -> AppResult<Vec<RatedEntry>>;

    async fn delete(&self, id: EntryId) -> AppResult<()>;

    /// Total number of stored entries across all owners
    async fn count(&self) -> AppResult<i64>;

    /// Backend name for logging and status reporting
    fn name(&self) -> &'static str;
}
