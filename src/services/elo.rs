use crate::{
    error::{AppError, AppResult},
    models::{Category, Outcome},
};

/// Lowest rating an entry can hold
pub const MIN_RATING: i32 = 0;

/// Highest rating an entry can hold
pub const MAX_RATING: i32 = 5000;

/// K-factor applied when none is configured
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Rating difference that shifts the expected score by a factor of ten
const RATING_SCALE: f64 = 400.0;

/// Seed rating for a freshly judged movie
pub fn initial_rating(category: Category) -> i32 {
    match category {
        Category::ThumbsDown => 2000,
        Category::Okay => 3000,
        Category::ThumbsUp => 4000,
    }
}

/// Seed rating for a judgment label such as `"thumbs_up"`
pub fn initial_rating_for_label(label: &str) -> AppResult<i32> {
    label.parse::<Category>().map(initial_rating)
}

/// Expected score of A against B on the logistic Elo curve
pub fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(rating_b - rating_a) / RATING_SCALE))
}

/// Checks a raw rating against the allowed range
pub fn validate_rating(rating: i64) -> AppResult<i32> {
    if rating < i64::from(MIN_RATING) || rating > i64::from(MAX_RATING) {
        return Err(AppError::OutOfRange(rating as f64));
    }
    Ok(rating as i32)
}

/// Range-checks a client-supplied rating before dropping its fraction
///
/// `-0.5` and `5000.5` are rejected rather than truncated into range.
pub fn rating_from_input(value: f64) -> AppResult<i64> {
    if !value.is_finite() || value < f64::from(MIN_RATING) || value > f64::from(MAX_RATING) {
        return Err(AppError::OutOfRange(value));
    }
    Ok(value.trunc() as i64)
}

/// Elo-style rating adjustment for pairwise comparisons
///
/// Pure and deterministic: the same ratings and outcome always give the same
/// result. The delta credited to A is debited from B, and both results stay
/// within [`MIN_RATING`, `MAX_RATING`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingEngine {
    k_factor: f64,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_K_FACTOR)
    }
}

impl RatingEngine {
    pub fn new(k_factor: f64) -> Self {
        Self { k_factor }
    }

    pub fn k_factor(&self) -> f64 {
        self.k_factor
    }

    /// Computes both ratings after a comparison between A and B
    pub fn update(&self, rating_a: i32, rating_b: i32, outcome: Outcome) -> (i32, i32) {
        let rating_a = rating_a.clamp(MIN_RATING, MAX_RATING);
        let rating_b = rating_b.clamp(MIN_RATING, MAX_RATING);

        let expected = expected_score(rating_a, rating_b);
        let raw_delta = (self.k_factor * (outcome.score_a() - expected)).round() as i32;

        // The shared delta is bounded by whichever side would leave the range first
        let max_gain = (MAX_RATING - rating_a).min(rating_b - MIN_RATING);
        let max_loss = (rating_a - MIN_RATING).min(MAX_RATING - rating_b);
        let delta = raw_delta.clamp(-max_loss, max_gain);

        (rating_a + delta, rating_b - delta)
    }
}
