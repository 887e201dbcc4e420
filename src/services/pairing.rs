//! Opponent selection for placement comparisons.
//!
//! A comparison teaches the most when its outcome is least certain, i.e. when
//! the expected score is closest to 0.5. The information gain `p * (1 - p)`
//! falls monotonically with the rating gap, so the closest-rated candidate is
//! the best opponent.

use crate::models::RatedEntry;

use super::elo::expected_score;

/// A suggested comparison and how uncertain its outcome is
#[derive(Debug, Clone, PartialEq)]
pub struct Matchup {
    pub opponent: RatedEntry,
    /// Probability that the subject beats the opponent
    pub expected_score: f64,
    pub information_gain: f64,
}

impl Matchup {
    pub fn new(subject: &RatedEntry, opponent: &RatedEntry) -> Self {
        Self {
            opponent: opponent.clone(),
            expected_score: expected_score(subject.rating, opponent.rating),
            information_gain: information_gain(subject.rating, opponent.rating),
        }
    }
}

/// Information gain of a matchup between two ratings
pub fn information_gain(rating_a: i32, rating_b: i32) -> f64 {
    let p = expected_score(rating_a, rating_b);
    p * (1.0 - p)
}

/// Picks the most informative opponent for `subject` among `candidates`
///
/// Candidates in the subject's own category are preferred; the rest of the
/// owner's entries are only considered when that category has nobody else.
/// Equal rating gaps resolve to the smaller id.
pub fn suggest_opponent<'a>(
    subject: &RatedEntry,
    candidates: &'a [RatedEntry],
) -> Option<&'a RatedEntry> {
    let others = || {
        candidates
            .iter()
            .filter(move |c| c.id != subject.id && c.owner == subject.owner)
    };

    let closest = |pool: Vec<&'a RatedEntry>| {
        pool.into_iter()
            .min_by_key(|c| ((i64::from(c.rating) - i64::from(subject.rating)).abs(), c.id))
    };

    let same_category: Vec<&RatedEntry> =
        others().filter(|c| c.category == subject.category).collect();

    if same_category.is_empty() {
        closest(others().collect())
    } else {
        closest(same_category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::Utc;

    fn entry(id: i64, rating: i32, category: Category) -> RatedEntry {
        RatedEntry {
            id,
            owner: "bob".to_string(),
            subject: format!("Movie {}", id),
            rating,
            category,
            rank: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_information_gain_peaks_at_equal_ratings() {
        assert_eq!(information_gain(3000, 3000), 0.25);
        assert!(information_gain(3000, 3100) < 0.25);
        assert!(information_gain(3000, 3400) < information_gain(3000, 3100));
    }

    #[test]
    fn test_prefers_closest_in_same_category() {
        let subject = entry(1, 4000, Category::ThumbsUp);
        let candidates = vec![
            subject.clone(),
            entry(2, 4200, Category::ThumbsUp),
            entry(3, 4050, Category::ThumbsUp),
            entry(4, 4001, Category::Okay),
        ];

        let opponent = suggest_opponent(&subject, &candidates).unwrap();
        assert_eq!(opponent.id, 3);
    }

    #[test]
    fn test_equal_gaps_pick_smaller_id() {
        let subject = entry(5, 3000, Category::Okay);
        let candidates = vec![entry(8, 3100, Category::Okay), entry(6, 2900, Category::Okay)];

        assert_eq!(suggest_opponent(&subject, &candidates).unwrap().id, 6);
    }

    #[test]
    fn test_falls_back_to_other_categories() {
        let subject = entry(1, 2000, Category::ThumbsDown);
        let candidates = vec![
            subject.clone(),
            entry(2, 4000, Category::ThumbsUp),
            entry(3, 3000, Category::Okay),
        ];

        assert_eq!(suggest_opponent(&subject, &candidates).unwrap().id, 3);
    }

    #[test]
    fn test_matchup_scores() {
        let subject = entry(1, 2400, Category::Okay);
        let opponent = entry(2, 2000, Category::Okay);
        let matchup = Matchup::new(&subject, &opponent);

        assert_eq!(matchup.opponent.id, 2);
        assert!((matchup.expected_score - 10.0 / 11.0).abs() < 1e-12);
        assert!((matchup.information_gain - 10.0 / 121.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_opponent_when_alone() {
        let subject = entry(1, 2000, Category::ThumbsDown);
        assert!(suggest_opponent(&subject, &[subject.clone()]).is_none());
        assert!(suggest_opponent(&subject, &[]).is_none());
    }
}
