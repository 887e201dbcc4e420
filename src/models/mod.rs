pub mod comparison;
pub mod entry;

pub use comparison::{ComparisonResult, Outcome, RankAssignment};
pub use entry::{normalize_owner, normalize_subject, Category, EntryId, NewEntry, RatedEntry};
