use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{EntryId, NewEntry, RankAssignment, RatedEntry},
};

use super::RatingStore;

const ENTRY_COLUMNS: &str = "id, user_name, movie_title, elo_rating, initial_rating, \
                             rank_position, created_at, updated_at";

/// Creates a PostgreSQL connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Movie ratings schema is up to date");
    Ok(())
}

/// Row shape of the `movie_ratings` table
#[derive(Debug, FromRow)]
struct MovieRatingRow {
    id: i64,
    user_name: String,
    movie_title: String,
    elo_rating: i32,
    initial_rating: String,
    rank_position: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MovieRatingRow> for RatedEntry {
    type Error = AppError;

    fn try_from(row: MovieRatingRow) -> Result<Self, Self::Error> {
        Ok(RatedEntry {
            id: row.id,
            owner: row.user_name,
            subject: row.movie_title,
            rating: row.elo_rating,
            category: row.initial_rating.parse()?,
            rank: row.rank_position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fails when a batch rank write touched fewer rows than it assigned
///
/// The rows vanished or changed owner underneath the write, so the stored
/// ranks are incomplete and the owner has to be reranked.
fn check_rank_rows(owner: &str, expected: usize, updated: u64) -> AppResult<()> {
    if updated == expected as u64 {
        return Ok(());
    }

    tracing::warn!(
        owner = %owner,
        expected,
        updated,
        "Rank assignment did not match the owner's rows"
    );
    Err(AppError::StoreUnavailable(format!(
        "rank assignment for {} updated {} of {} rows",
        owner, updated, expected
    )))
}

/// Rating store backed by the `movie_ratings` table
#[derive(Clone)]
pub struct PgRatingStore {
    pool: PgPool,
}

impl PgRatingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RatingStore for PgRatingStore {
    async fn find_by_owner_and_subject(
        &self,
        owner: &str,
        subject: &str,
    ) -> AppResult<Option<RatedEntry>> {
        let row = sqlx::query_as::<_, MovieRatingRow>(&format!(
            "SELECT {} FROM movie_ratings WHERE user_name = $1 AND movie_title = $2",
            ENTRY_COLUMNS
        ))
        .bind(owner)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RatedEntry::try_from).transpose()
    }

    async fn insert(&self, entry: NewEntry) -> AppResult<RatedEntry> {
        let result = sqlx::query_as::<_, MovieRatingRow>(&format!(
            r#"
            INSERT INTO movie_ratings (user_name, movie_title, elo_rating, initial_rating)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(&entry.owner)
        .bind(&entry.subject)
        .bind(entry.rating)
        .bind(entry.category.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.try_into(),
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateEntry {
                owner: entry.owner,
                subject: entry.subject,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: EntryId) -> AppResult<Option<RatedEntry>> {
        let row = sqlx::query_as::<_, MovieRatingRow>(&format!(
            "SELECT {} FROM movie_ratings WHERE id = $1",
            ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RatedEntry::try_from).transpose()
    }

    async fn update_rating(&self, id: EntryId, rating: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE movie_ratings
            SET elo_rating = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            "#,
        )
        .bind(rating)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }
        Ok(())
    }

    async fn update_ratings(&self, ratings: &[(EntryId, i32)]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for &(id, rating) in ratings {
            let result = sqlx::query(
                r#"
                UPDATE movie_ratings
                SET elo_rating = $1, updated_at = CURRENT_TIMESTAMP
                WHERE id = $2
                "#,
            )
            .bind(rating)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            // Dropping the transaction rolls back the updates already made
            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_rank(&self, id: EntryId, rank: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE movie_ratings SET rank_position = $1 WHERE id = $2")
            .bind(rank)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }
        Ok(())
    }

    async fn apply_ranks(&self, owner: &str, ranks: &[RankAssignment]) -> AppResult<()> {
        let ids: Vec<i64> = ranks.iter().map(|a| a.id).collect();
        let positions: Vec<i32> = ranks.iter().map(|a| a.rank).collect();

        // A single statement, so the whole assignment commits or none of it does
        let result = sqlx::query(
            r#"
            UPDATE movie_ratings AS m
            SET rank_position = r.rank_position
            FROM UNNEST($1::BIGINT[], $2::INTEGER[]) AS r(id, rank_position)
            WHERE m.id = r.id AND m.user_name = $3
            "#,
        )
        .bind(&ids)
        .bind(&positions)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        check_rank_rows(owner, ranks.len(), result.rows_affected())
    }

    async fn list_by_owner(&self, owner: &str) -> AppResult<Vec<RatedEntry>> {
        let rows = sqlx::query_as::<_, MovieRatingRow>(&format!(
            r#"
            SELECT {}
            FROM movie_ratings
            WHERE user_name = $1
            ORDER BY elo_rating DESC, id ASC
            "#,
            ENTRY_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RatedEntry::try_from).collect()
    }

    async fn delete(&self, id: EntryId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM movie_ratings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movie_ratings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
