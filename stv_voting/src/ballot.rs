use std::collections::HashSet;

use crate::config::*;

/// A ranking of candidates and the weight it carries.
///
/// Preference levels start at 1. Each level holds a set of candidates, which may
/// be empty (skipped level) or hold several candidates (equal ranking) when the
/// election allows it. The ranking never changes. The value and the cursor are
/// only moved by the counting engine.
#[derive(PartialEq, Debug, Clone)]
pub struct Ballot {
    ranking: Vec<Vec<CandidateId>>,
    value: f64,
    cursor: u32,
}

impl Ballot {
    /// Trailing empty levels are dropped.
    pub fn new(mut ranking: Vec<Vec<CandidateId>>, value: f64) -> Ballot {
        while matches!(ranking.last(), Some(level) if level.is_empty()) {
            ranking.pop();
        }
        Ballot {
            ranking,
            value,
            cursor: 1,
        }
    }

    pub fn ranking(&self) -> &[Vec<CandidateId>] {
        &self.ranking
    }

    pub fn num_levels(&self) -> u32 {
        self.ranking.len() as u32
    }

    /// The candidates ranked at the given level, or nothing if the level does not exist.
    pub fn get_preference(&self, level: u32) -> &[CandidateId] {
        if level == 0 {
            return &[];
        }
        self.ranking
            .get((level - 1) as usize)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    pub fn value(&self) -> VoteValue {
        VoteValue(self.value)
    }

    pub fn add_value(&mut self, amount: f64) {
        self.value += amount;
    }

    /// The lowest preference level that has not been fully used yet.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub(crate) fn advance_to(&mut self, level: u32) {
        debug_assert!(level >= self.cursor, "the cursor only moves forward");
        self.cursor = level;
    }

    /// A copy of this ballot carrying only part of its weight.
    pub(crate) fn split(&self, value: f64) -> Ballot {
        Ballot {
            ranking: self.ranking.clone(),
            value,
            cursor: self.cursor,
        }
    }

    /// Checks the shape of the ranking against the validation options.
    ///
    /// `is_known` tells if a candidate id belongs to the election.
    pub fn validate(
        &self,
        options: &CountOptions,
        is_known: impl Fn(CandidateId) -> bool,
    ) -> Result<(), InvalidReason> {
        if self.ranking.iter().all(|level| level.is_empty()) {
            return Err(InvalidReason::Empty);
        }
        let mut seen: HashSet<CandidateId> = HashSet::new();
        for (idx, level) in self.ranking.iter().enumerate() {
            let level_num = (idx + 1) as u32;
            // Trailing empty levels are already gone: an empty level is always a gap.
            if level.is_empty() && !options.allow_skipped {
                return Err(InvalidReason::SkippedRanking(level_num));
            }
            if level.len() > 1 && !options.allow_equal {
                return Err(InvalidReason::EqualRanking(level_num));
            }
            for cid in level.iter() {
                if !is_known(*cid) {
                    return Err(InvalidReason::UnknownCandidate(cid.0));
                }
                if !seen.insert(*cid) && !options.allow_repeat {
                    return Err(InvalidReason::RepeatedCandidate(*cid));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(levels: &[&[u32]]) -> Vec<Vec<CandidateId>> {
        levels
            .iter()
            .map(|l| l.iter().map(|id| CandidateId(*id)).collect())
            .collect()
    }

    fn known(cid: CandidateId) -> bool {
        (1..=4).contains(&cid.0)
    }

    #[test]
    fn preferences() {
        let b = Ballot::new(ranking(&[&[2], &[1, 3], &[], &[]]), 1.0);
        assert_eq!(b.num_levels(), 2);
        assert_eq!(b.get_preference(1), &[CandidateId(2)]);
        assert_eq!(b.get_preference(2), &[CandidateId(1), CandidateId(3)]);
        assert!(b.get_preference(0).is_empty());
        assert!(b.get_preference(3).is_empty());
        assert_eq!(b.cursor(), 1);
        assert_eq!(b.value(), VoteValue(1.0));
    }

    #[test]
    fn add_value() {
        let mut b = Ballot::new(ranking(&[&[1]]), 1.0);
        b.add_value(2.0);
        assert_eq!(b.value(), VoteValue(3.0));
    }

    #[test]
    fn validation_defaults() {
        let opts = CountOptions::DEFAULT_OPTIONS;
        let ok = Ballot::new(ranking(&[&[1], &[2], &[3]]), 1.0);
        assert_eq!(ok.validate(&opts, known), Ok(()));

        let empty = Ballot::new(ranking(&[&[]]), 1.0);
        assert_eq!(empty.validate(&opts, known), Err(InvalidReason::Empty));

        let skipped = Ballot::new(ranking(&[&[1], &[], &[3]]), 1.0);
        assert_eq!(
            skipped.validate(&opts, known),
            Err(InvalidReason::SkippedRanking(2))
        );

        let equal = Ballot::new(ranking(&[&[1, 2], &[3]]), 1.0);
        assert_eq!(
            equal.validate(&opts, known),
            Err(InvalidReason::EqualRanking(1))
        );

        let repeat = Ballot::new(ranking(&[&[1], &[2], &[1]]), 1.0);
        assert_eq!(
            repeat.validate(&opts, known),
            Err(InvalidReason::RepeatedCandidate(CandidateId(1)))
        );

        let unknown = Ballot::new(ranking(&[&[1], &[9]]), 1.0);
        assert_eq!(
            unknown.validate(&opts, known),
            Err(InvalidReason::UnknownCandidate(9))
        );
    }

    #[test]
    fn validation_permissive() {
        let opts = CountOptions {
            allow_equal: true,
            allow_repeat: true,
            allow_skipped: true,
            ..CountOptions::DEFAULT_OPTIONS
        };
        let b = Ballot::new(ranking(&[&[], &[1, 2], &[2], &[], &[4]]), 1.0);
        assert_eq!(b.validate(&opts, known), Ok(()));
        // Unknown candidates are never accepted.
        let unknown = Ballot::new(ranking(&[&[1], &[0]]), 1.0);
        assert_eq!(
            unknown.validate(&opts, known),
            Err(InvalidReason::UnknownCandidate(0))
        );
    }
}
