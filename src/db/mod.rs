pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::InMemoryRatingStore;
pub use postgres::{create_pool, run_migrations, PgRatingStore};
pub use store::RatingStore;

#[cfg(test)]
pub use store::MockRatingStore;
