//! Candidate ranking

use std::cmp::Ordering;

use crate::types::Candidate;

/// Highest confidence wins; equal confidence goes to the higher-priority
/// strategy, then to the earlier candidate.
pub fn select_best_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().reduce(|best, next| {
        match compare_candidates(next, best) {
            Ordering::Greater => next,
            _ => best,
        }
    })
}

/// `Greater` when `a` should be preferred over `b`
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.confidence
        .partial_cmp(&b.confidence)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.strategy.rank().cmp(&a.strategy.rank()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LocatorStrategy;
    use action_primitives::SelectorDescriptor;

    fn candidate(strategy: LocatorStrategy, matches: usize) -> Candidate {
        Candidate::new(SelectorDescriptor::css("x"), strategy, matches)
    }

    #[test]
    fn test_select_best_candidate() {
        let candidates = vec![
            candidate(LocatorStrategy::Role, 3),
            candidate(LocatorStrategy::Text, 2),
            candidate(LocatorStrategy::Css, 4),
        ];
        let best = select_best_candidate(&candidates).unwrap();
        assert_eq!(best.strategy, LocatorStrategy::Role);
    }

    #[test]
    fn test_fewer_matches_beat_priority() {
        let candidates = vec![
            candidate(LocatorStrategy::TestId, 5),
            candidate(LocatorStrategy::Label, 2),
        ];
        let best = select_best_candidate(&candidates).unwrap();
        assert_eq!(best.strategy, LocatorStrategy::Label);
    }

    #[test]
    fn test_ties_go_to_higher_priority() {
        // 1.0 / 2 == 0.5 / 1
        let candidates = vec![
            candidate(LocatorStrategy::Text, 1),
            candidate(LocatorStrategy::TestId, 2),
        ];
        let best = select_best_candidate(&candidates).unwrap();
        assert_eq!(best.strategy, LocatorStrategy::TestId);
    }

    #[test]
    fn test_select_best_candidate_empty() {
        assert!(select_best_candidate(&[]).is_none());
    }
}
