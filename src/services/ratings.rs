use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::{
    db::RatingStore,
    error::{AppError, AppResult},
    models::{
        normalize_owner, normalize_subject, Category, ComparisonResult, EntryId, NewEntry,
        Outcome, RatedEntry,
    },
};

use super::{
    elo::{self, RatingEngine},
    owner_locks::{OwnerLocks, StaleOwners},
    pairing::{self, Matchup},
    ranks,
};

/// How often rank recomputation is attempted before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Wait before attempt `n + 1` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Store write that must be followed by a rank recomputation
#[derive(Debug)]
enum Mutation {
    Insert(NewEntry),
    Rating(EntryId, i32),
    Ratings(Vec<(EntryId, i32)>),
    Delete(EntryId),
}

/// State left behind by a committed mutation
struct Committed {
    inserted: Option<RatedEntry>,
    /// The owner's entries with fresh ranks, by standing
    entries: Vec<RatedEntry>,
}

/// Applies mutations and keeps an owner's stored ranks in step with ratings
#[derive(Clone)]
struct Reranker {
    store: Arc<dyn RatingStore>,
    retry: RetryPolicy,
    stale: StaleOwners,
}

impl Reranker {
    async fn apply(&self, mutation: Mutation) -> AppResult<Option<RatedEntry>> {
        match mutation {
            Mutation::Insert(entry) => self.store.insert(entry).await.map(Some),
            Mutation::Rating(id, rating) => self.store.update_rating(id, rating).await.map(|_| None),
            Mutation::Ratings(ratings) => self.store.update_ratings(&ratings).await.map(|_| None),
            Mutation::Delete(id) => self.store.delete(id).await.map(|_| None),
        }
    }

    /// Recomputes and persists the owner's ranks, retrying store failures
    ///
    /// When every attempt fails the owner is marked stale so the next access
    /// repairs it.
    async fn rerank(&self, owner: &str) -> AppResult<Vec<RatedEntry>> {
        let mut attempt = 1;
        loop {
            match self.try_rerank(owner).await {
                Ok(entries) => {
                    self.stale.clear(owner);
                    return Ok(entries);
                }
                Err(e) if e.is_store_failure() && attempt < self.retry.attempts => {
                    tracing::warn!(
                        owner = %owner,
                        attempt,
                        error = %e,
                        "Rank recompute failed, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.stale.mark(owner);
                    tracing::error!(
                        owner = %owner,
                        attempts = attempt,
                        error = %e,
                        "Rank recompute failed, ranks left for repair on next access"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn try_rerank(&self, owner: &str) -> AppResult<Vec<RatedEntry>> {
        let mut entries = self.store.list_by_owner(owner).await?;
        let assignments = ranks::recompute_ranks(&entries);
        let changed = ranks::changed_ranks(&entries, &assignments);

        match changed.as_slice() {
            [] => {}
            [single] => self.store.update_rank(single.id, single.rank).await?,
            _ => self.store.apply_ranks(owner, &changed).await?,
        }

        tracing::debug!(owner = %owner, changed = changed.len(), "Ranks recomputed");

        ranks::apply_assignments(&mut entries, &assignments);
        Ok(entries)
    }
}

/// Rating and ranking operations over one owner's movie list at a time
///
/// Every operation holds the owner's lock for its full duration, so ranks
/// are never recomputed concurrently for the same owner. The write and the
/// rerank that follows it run in a spawned task that owns the lock, which
/// keeps them together even when the caller stops waiting.
pub struct RatingService {
    store: Arc<dyn RatingStore>,
    engine: RatingEngine,
    locks: OwnerLocks,
    reranker: Reranker,
}

impl RatingService {
    pub fn new(store: Arc<dyn RatingStore>, engine: RatingEngine, retry: RetryPolicy) -> Self {
        let reranker = Reranker {
            store: store.clone(),
            retry,
            stale: StaleOwners::default(),
        };

        Self {
            store,
            engine,
            locks: OwnerLocks::new(),
            reranker,
        }
    }

    pub fn engine(&self) -> RatingEngine {
        self.engine
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Total number of entries across all owners
    pub async fn count_entries(&self) -> AppResult<i64> {
        self.store.count().await
    }

    /// Whether the owner's stored ranks are waiting for repair
    pub fn has_stale_ranks(&self, owner: &str) -> bool {
        self.reranker.stale.contains(owner)
    }

    /// Records a first judgment for a movie and ranks it among the owner's list
    pub async fn add_entry(
        &self,
        owner: &str,
        subject: &str,
        category: Category,
    ) -> AppResult<RatedEntry> {
        let owner = normalize_owner(owner)?;
        let subject = normalize_subject(subject)?;
        let guard = self.locks.acquire(&owner).await;

        if self
            .store
            .find_by_owner_and_subject(&owner, &subject)
            .await?
            .is_some()
        {
            tracing::info!(owner = %owner, subject = %subject, "Movie already exists");
            return Err(AppError::DuplicateEntry { owner, subject });
        }

        let rating = elo::initial_rating(category);
        let new_entry = NewEntry {
            owner: owner.clone(),
            subject,
            category,
            rating,
        };

        let committed = self
            .commit(guard, &owner, Some(Mutation::Insert(new_entry)))
            .await?;
        let inserted = committed
            .inserted
            .ok_or_else(|| AppError::Internal("Insert returned no entry".to_string()))?;
        let entry = pick(&committed.entries, inserted.id)?;

        tracing::info!(
            owner = %owner,
            entry_id = entry.id,
            subject = %entry.subject,
            category = %category,
            rating,
            rank = ?entry.rank,
            "Added movie"
        );

        Ok(entry)
    }

    /// Looks up one entry with its current rank
    pub async fn get_entry(&self, id: EntryId) -> AppResult<RatedEntry> {
        let entry = self.require(id).await?;
        let entries = self.owner_entries(&entry.owner).await?;
        pick(&entries, id)
    }

    /// An owner's entries by standing, optionally limited to one category
    pub async fn list_entries(
        &self,
        owner: &str,
        category: Option<Category>,
    ) -> AppResult<Vec<RatedEntry>> {
        let owner = normalize_owner(owner)?;
        let entries = self.owner_entries(&owner).await?;

        Ok(match category {
            Some(category) => entries
                .into_iter()
                .filter(|e| e.category == category)
                .collect(),
            None => entries,
        })
    }

    /// Applies a pairwise comparison and returns both entries after reranking
    pub async fn compare(
        &self,
        a_id: EntryId,
        b_id: EntryId,
        outcome: Outcome,
    ) -> AppResult<ComparisonResult> {
        if a_id == b_id {
            return Err(AppError::SelfComparison);
        }

        let owner = {
            let a = self.require(a_id).await?;
            let b = self.require(b_id).await?;
            if a.owner != b.owner {
                return Err(AppError::CrossOwnerComparison(a.owner, b.owner));
            }
            a.owner
        };

        let guard = self.locks.acquire(&owner).await;

        // Ratings may have moved while waiting for the lock
        let a = self.require(a_id).await?;
        let b = self.require(b_id).await?;
        let (new_a, new_b) = self.engine.update(a.rating, b.rating, outcome);

        let committed = self
            .commit(
                guard,
                &owner,
                Some(Mutation::Ratings(vec![(a_id, new_a), (b_id, new_b)])),
            )
            .await?;

        let entry_a = pick(&committed.entries, a_id)?;
        let entry_b = pick(&committed.entries, b_id)?;

        tracing::info!(
            owner = %owner,
            movie_a = a_id,
            movie_b = b_id,
            outcome = ?outcome,
            rating_a = %format!("{} -> {}", a.rating, new_a),
            rating_b = %format!("{} -> {}", b.rating, new_b),
            "Comparison applied"
        );

        Ok(ComparisonResult { entry_a, entry_b })
    }

    /// Administrative rating override that bypasses the comparison rule
    pub async fn set_rating(&self, id: EntryId, rating: i64) -> AppResult<RatedEntry> {
        let rating = elo::validate_rating(rating)?;
        let current = self.require(id).await?;
        let guard = self.locks.acquire(&current.owner).await;

        let committed = self
            .commit(guard, &current.owner, Some(Mutation::Rating(id, rating)))
            .await?;
        let entry = pick(&committed.entries, id)?;

        tracing::info!(
            owner = %entry.owner,
            entry_id = id,
            previous = current.rating,
            rating,
            rank = ?entry.rank,
            "Rating set directly"
        );

        Ok(entry)
    }

    /// Removes an entry and closes the gap it leaves in the owner's ranks
    pub async fn delete_entry(&self, id: EntryId) -> AppResult<()> {
        let entry = self.require(id).await?;
        let guard = self.locks.acquire(&entry.owner).await;

        let committed = self
            .commit(guard, &entry.owner, Some(Mutation::Delete(id)))
            .await?;

        tracing::info!(
            owner = %entry.owner,
            entry_id = id,
            remaining = committed.entries.len(),
            "Deleted movie"
        );

        Ok(())
    }

    /// Most informative opponent for an entry's next comparison, if any
    pub async fn suggest_opponent(&self, id: EntryId) -> AppResult<Option<Matchup>> {
        let owner = self.require(id).await?.owner;
        let entries = self.owner_entries(&owner).await?;
        let subject = pick(&entries, id)?;

        Ok(pairing::suggest_opponent(&subject, &entries)
            .map(|opponent| Matchup::new(&subject, opponent)))
    }

    async fn require(&self, id: EntryId) -> AppResult<RatedEntry> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound(id))
    }

    /// Reads the owner's entries, repairing stale or inconsistent ranks first
    async fn owner_entries(&self, owner: &str) -> AppResult<Vec<RatedEntry>> {
        let guard = self.locks.acquire(owner).await;
        let entries = self.store.list_by_owner(owner).await?;

        if !self.has_stale_ranks(owner) && ranks::ranks_consistent(&entries) {
            return Ok(entries);
        }

        tracing::warn!(owner = %owner, "Stored ranks out of date, recomputing");
        Ok(self.commit(guard, owner, None).await?.entries)
    }

    async fn commit(
        &self,
        guard: OwnedMutexGuard<()>,
        owner: &str,
        mutation: Option<Mutation>,
    ) -> AppResult<Committed> {
        let reranker = self.reranker.clone();
        let owner = owner.to_string();

        // Detached so a dropped caller cannot separate the write from its rerank
        let task = tokio::spawn(async move {
            let _guard = guard;
            let inserted = match mutation {
                Some(mutation) => reranker.apply(mutation).await?,
                None => None,
            };
            let entries = reranker.rerank(&owner).await?;
            Ok::<_, AppError>(Committed { inserted, entries })
        });

        task.await.map_err(|e| AppError::Internal(e.to_string()))?
    }
}

fn pick(entries: &[RatedEntry], id: EntryId) -> AppResult<RatedEntry> {
    entries
        .iter()
        .find(|e| e.id == id)
        .cloned()
        .ok_or(AppError::NotFound(id))
}
