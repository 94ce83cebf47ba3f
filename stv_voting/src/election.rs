use snafu::OptionExt;

use crate::ballot::Ballot;
use crate::candidate::Candidate;
use crate::config::*;

/// The candidates, the ballots and the number of seats of one election.
///
/// Elections are assembled with a [`crate::builder::Builder`]. Once built, only the
/// counting engine changes the state and the votes of the candidates.
#[derive(PartialEq, Debug, Clone)]
pub struct Election {
    pub(crate) title: Option<String>,
    // In registration order.
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) ballots: Vec<Ballot>,
    pub(crate) num_seats: u32,
    pub(crate) num_valid_ballots: u64,
    pub(crate) num_invalid_ballots: u64,
}

impl Election {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The candidates in registration order, optionally restricted to one state.
    pub fn candidates(&self, state: Option<CandidateState>) -> Vec<&Candidate> {
        self.candidates
            .iter()
            .filter(|c| state.map_or(true, |s| c.state() == s))
            .collect()
    }

    pub fn candidate(&self, cid: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id() == cid)
    }

    pub(crate) fn candidate_mut(&mut self, cid: CandidateId) -> VotingResult<&mut Candidate> {
        self.candidates
            .iter_mut()
            .find(|c| c.id() == cid)
            .context(UnknownCandidateSnafu { id: cid.0 })
    }

    fn position(&self, cid: CandidateId) -> VotingResult<usize> {
        self.candidates
            .iter()
            .position(|c| c.id() == cid)
            .context(UnknownCandidateSnafu { id: cid.0 })
    }

    pub fn num_seats(&self) -> u32 {
        self.num_seats
    }

    /// Weight of the ballots accepted for the count.
    pub fn num_valid_ballots(&self) -> u64 {
        self.num_valid_ballots
    }

    /// Weight of the ballots dropped because they were invalid.
    pub fn num_invalid_ballots(&self) -> u64 {
        self.num_invalid_ballots
    }

    pub fn ballots(&self) -> &[Ballot] {
        &self.ballots
    }

    /// Moves votes between two candidates of this election.
    pub(crate) fn transfer_votes(
        &mut self,
        from: CandidateId,
        to: CandidateId,
        amount: VoteValue,
        precision: u32,
    ) -> VotingResult<()> {
        let from_idx = self.position(from)?;
        let to_idx = self.position(to)?;
        if from_idx < to_idx {
            let (left, right) = self.candidates.split_at_mut(to_idx);
            left[from_idx].transfer_votes(amount, &mut right[0], precision)
        } else {
            let (left, right) = self.candidates.split_at_mut(from_idx);
            right[0].transfer_votes(amount, &mut left[to_idx], precision)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::Builder;
    use crate::config::*;

    #[test]
    fn filters_keep_candidate_order() {
        let mut builder = Builder::new(2, &CountOptions::DEFAULT_OPTIONS)
            .unwrap()
            .candidates(&["C", "A", "B"])
            .unwrap();
        builder.withdraw(CandidateId(2)).unwrap();
        builder.add_ballot_simple(&["C", "B"]).unwrap();
        let election = builder.build().unwrap();

        let names: Vec<&str> = election.candidates(None).iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        let hopeful: Vec<&str> = election
            .candidates(Some(CandidateState::Hopeful))
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(hopeful, vec!["C", "B"]);
        assert_eq!(
            election.candidates(Some(CandidateState::Withdrawn)).len(),
            1
        );
        assert_eq!(election.num_seats(), 2);
        assert_eq!(election.num_valid_ballots(), 1);
    }

    #[test]
    fn transfers_in_both_directions() {
        let mut builder = Builder::new(1, &CountOptions::DEFAULT_OPTIONS)
            .unwrap()
            .candidates(&["A", "B"])
            .unwrap();
        builder.add_ballot_simple(&["A"]).unwrap();
        let mut election = builder.build().unwrap();
        election
            .candidate_mut(CandidateId(1))
            .unwrap()
            .add_votes(VoteValue(4.0));
        election
            .transfer_votes(CandidateId(1), CandidateId(2), VoteValue(3.0), 5)
            .unwrap();
        election
            .transfer_votes(CandidateId(2), CandidateId(1), VoteValue(1.0), 5)
            .unwrap();
        assert_eq!(
            election.candidate(CandidateId(1)).unwrap().votes(),
            VoteValue(2.0)
        );
        assert_eq!(
            election.candidate(CandidateId(2)).unwrap().votes(),
            VoteValue(2.0)
        );
        assert!(election
            .transfer_votes(CandidateId(1), CandidateId(7), VoteValue(1.0), 5)
            .is_err());
    }
}
