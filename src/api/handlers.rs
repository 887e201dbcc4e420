use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{Category, EntryId, Outcome, RatedEntry},
    services::{
        elo::{self, MAX_RATING},
        Matchup,
    },
};

use super::AppState;

/// User whose list is shown when the query names nobody
const DEFAULT_USER: &str = "Jack";

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct ListMoviesQuery {
    pub user: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    pub user_name: String,
    pub movie_title: String,
    pub initial_rating: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRatingRequest {
    pub elo_rating: f64,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub movie_a_id: EntryId,
    pub movie_b_id: EntryId,
    pub result: Outcome,
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub id: EntryId,
    pub user_name: String,
    pub movie_title: String,
    pub elo_rating: i32,
    pub initial_rating: Category,
    pub rank_position: Option<i32>,
    pub stars: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&RatedEntry> for MovieResponse {
    fn from(entry: &RatedEntry) -> Self {
        Self {
            id: entry.id,
            user_name: entry.owner.clone(),
            movie_title: entry.subject.clone(),
            elo_rating: entry.rating,
            initial_rating: entry.category,
            rank_position: entry.rank,
            stars: star_score(entry.rating),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieEnvelope {
    pub status: &'static str,
    pub movie: MovieResponse,
}

impl MovieEnvelope {
    fn success(entry: &RatedEntry) -> Self {
        Self {
            status: "success",
            movie: MovieResponse::from(entry),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub movie_a_id: EntryId,
    pub movie_b_id: EntryId,
    pub movie_a: MovieResponse,
    pub movie_b: MovieResponse,
}

#[derive(Debug, Serialize)]
pub struct OpponentResponse {
    pub movie: Option<MovieResponse>,
    pub expected_score: Option<f64>,
    pub information_gain: Option<f64>,
}

impl From<Option<Matchup>> for OpponentResponse {
    fn from(matchup: Option<Matchup>) -> Self {
        match matchup {
            Some(m) => Self {
                movie: Some(MovieResponse::from(&m.opponent)),
                expected_score: Some(m.expected_score),
                information_gain: Some(m.information_gain),
            },
            None => Self {
                movie: None,
                expected_score: None,
                information_gain: None,
            },
        }
    }
}

/// Maps a rating onto a 1.0 to 5.0 star scale, one decimal place
pub fn star_score(rating: i32) -> f64 {
    let stars = 1.0 + f64::from(rating) / f64::from(MAX_RATING) * 4.0;
    (stars * 10.0).round() / 10.0
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Store connectivity and entry count
pub async fn store_status(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let movie_count = state.ratings.count_entries().await?;
    Ok(Json(json!({
        "status": "connected",
        "store": state.ratings.store_name(),
        "movie_count": movie_count,
    })))
}

/// List a user's movies, optionally filtered by judgment category
pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<ListMoviesQuery>,
) -> AppResult<Json<Vec<MovieResponse>>> {
    let user = params.user.as_deref().unwrap_or(DEFAULT_USER);
    let category = params
        .category
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(str::parse::<Category>)
        .transpose()?;

    let entries = state.ratings.list_entries(user, category).await?;
    Ok(Json(entries.iter().map(MovieResponse::from).collect()))
}

/// Add a movie from a first judgment
pub async fn create_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<CreateMovieRequest>,
) -> AppResult<(StatusCode, Json<MovieEnvelope>)> {
    let category: Category = request.initial_rating.parse()?;

    tracing::info!(
        request_id = %request_id,
        user = %request.user_name,
        category = %category,
        "Adding movie"
    );

    let entry = state
        .ratings
        .add_entry(&request.user_name, &request.movie_title, category)
        .await?;

    Ok((StatusCode::CREATED, Json(MovieEnvelope::success(&entry))))
}

/// Get a single movie
pub async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<EntryId>,
) -> AppResult<Json<MovieResponse>> {
    let entry = state.ratings.get_entry(movie_id).await?;
    Ok(Json(MovieResponse::from(&entry)))
}

/// Set a movie's rating directly
pub async fn update_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(movie_id): Path<EntryId>,
    Json(request): Json<UpdateRatingRequest>,
) -> AppResult<Json<MovieEnvelope>> {
    tracing::info!(
        request_id = %request_id,
        movie_id,
        elo_rating = request.elo_rating,
        "Setting rating"
    );

    let rating = elo::rating_from_input(request.elo_rating)?;
    let entry = state.ratings.set_rating(movie_id, rating).await?;

    Ok(Json(MovieEnvelope::success(&entry)))
}

/// Delete a movie
pub async fn delete_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(movie_id): Path<EntryId>,
) -> AppResult<Json<Value>> {
    tracing::info!(request_id = %request_id, movie_id, "Deleting movie");

    state.ratings.delete_entry(movie_id).await?;
    Ok(Json(json!({ "status": "success" })))
}

/// Suggest the next opponent for a movie
pub async fn suggest_opponent(
    State(state): State<AppState>,
    Path(movie_id): Path<EntryId>,
) -> AppResult<Json<OpponentResponse>> {
    let matchup = state.ratings.suggest_opponent(movie_id).await?;
    Ok(Json(OpponentResponse::from(matchup)))
}

/// Record the outcome of a pairwise comparison
pub async fn compare_movies(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<CompareRequest>,
) -> AppResult<Json<CompareResponse>> {
    tracing::info!(
        request_id = %request_id,
        movie_a = request.movie_a_id,
        movie_b = request.movie_b_id,
        result = ?request.result,
        "Processing comparison"
    );

    let result = state
        .ratings
        .compare(request.movie_a_id, request.movie_b_id, request.result)
        .await?;

    Ok(Json(CompareResponse {
        movie_a_id: result.entry_a.id,
        movie_b_id: result.entry_b.id,
        movie_a: MovieResponse::from(&result.entry_a),
        movie_b: MovieResponse::from(&result.entry_b),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_score() {
        assert_eq!(star_score(0), 1.0);
        assert_eq!(star_score(5000), 5.0);
        assert_eq!(star_score(4000), 4.2);
        assert_eq!(star_score(2000), 2.6);
        assert_eq!(star_score(3333), 3.7);
    }
}
