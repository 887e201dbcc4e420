pub mod elo;
pub mod owner_locks;
pub mod pairing;
pub mod ranks;
pub mod ratings;

pub use elo::RatingEngine;
pub use pairing::Matchup;
pub use ratings::{RatingService, RetryPolicy};
