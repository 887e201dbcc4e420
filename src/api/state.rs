use std::sync::Arc;

use crate::{
    db::InMemoryRatingStore,
    services::{RatingEngine, RatingService, RetryPolicy},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ratings: Arc<RatingService>,
}

impl AppState {
    pub fn new(ratings: RatingService) -> Self {
        Self {
            ratings: Arc::new(ratings),
        }
    }

    /// State backed by a fresh in-memory store with default engine settings
    pub fn in_memory() -> Self {
        Self::new(RatingService::new(
            Arc::new(InMemoryRatingStore::new()),
            RatingEngine::default(),
            RetryPolicy::default(),
        ))
    }
}
