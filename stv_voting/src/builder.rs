use std::collections::HashMap;

use log::{debug, warn};
use snafu::{ensure, OptionExt};

use crate::ballot::Ballot;
use crate::candidate::Candidate;
pub use crate::config::*;
use crate::election::Election;

/// A builder for assembling an election.
///
/// Candidates get their ids from a counter owned by the builder, starting at 1,
/// unless an explicit id is given. Ballots are checked against the validation
/// options as they are added, and identical rankings are merged.
///
/// ```
/// pub use stv_voting::builder::Builder;
/// pub use stv_voting::CountOptions;
/// # use stv_voting::VotingErrors;
///
/// let mut builder = Builder::new(1, &CountOptions::DEFAULT_OPTIONS)?
///     .candidates(&["Anna", "Bob"])?;
///
/// builder.add_ballot_simple(&["Anna", "Bob"])?;
/// let election = builder.build()?;
/// assert_eq!(election.num_valid_ballots(), 1);
///
/// # Ok::<(), VotingErrors>(())
/// ```
pub struct Builder {
    options: CountOptions,
    num_seats: u32,
    title: Option<String>,
    candidates: Vec<Candidate>,
    next_id: u32,
    ballots: Vec<Ballot>,
    // Position of each distinct ranking in `ballots`
    seen_rankings: HashMap<Vec<Vec<CandidateId>>, usize>,
    num_valid: u64,
    num_invalid: u64,
}

impl Builder {
    pub fn new(num_seats: u32, options: &CountOptions) -> VotingResult<Builder> {
        ensure!(num_seats > 0, InvalidSeatsSnafu { num_seats });
        Ok(Builder {
            options: options.clone(),
            num_seats,
            title: None,
            candidates: Vec::new(),
            next_id: 1,
            ballots: Vec::new(),
            seen_rankings: HashMap::new(),
            num_valid: 0,
            num_invalid: 0,
        })
    }

    pub fn title(mut self, title: &str) -> Builder {
        self.title = Some(title.to_string());
        self
    }

    /// Registers candidates with generated ids, in the given order.
    pub fn candidates(mut self, names: &[&str]) -> VotingResult<Builder> {
        for name in names {
            self.add_candidate(name, None)?;
        }
        Ok(self)
    }

    pub fn add_candidate(&mut self, name: &str, id: Option<u32>) -> VotingResult<CandidateId> {
        let cid = match id {
            Some(x) => CandidateId(x),
            None => {
                // Skip the ids that were taken explicitly.
                while self.candidates.iter().any(|c| c.id().0 == self.next_id) {
                    self.next_id += 1;
                }
                let x = self.next_id;
                self.next_id += 1;
                CandidateId(x)
            }
        };
        ensure!(
            self.candidates.iter().all(|c| c.id() != cid),
            DuplicateCandidateIdSnafu { id: cid.0 }
        );
        debug!("add_candidate: {}: {}", cid, name);
        self.candidates.push(Candidate::new(cid, name));
        Ok(cid)
    }

    /// Marks a candidate as withdrawn. It will not receive any vote.
    pub fn withdraw(&mut self, cid: CandidateId) -> VotingResult<()> {
        let c = self
            .candidates
            .iter_mut()
            .find(|c| c.id() == cid)
            .context(UnknownCandidateSnafu { id: cid.0 })?;
        c.set_state(CandidateState::Withdrawn)
    }

    /// Adds a ballot by candidate names, with one candidate per preference level.
    ///
    /// A name that is not registered makes the ballot invalid.
    pub fn add_ballot_simple(&mut self, names: &[&str]) -> VotingResult<bool> {
        let mut ranking: Vec<Vec<CandidateId>> = Vec::new();
        for name in names {
            match self.candidates.iter().find(|c| c.name() == *name) {
                Some(c) => ranking.push(vec![c.id()]),
                None => {
                    return self.reject(InvalidReason::UnknownName(name.to_string()), 1);
                }
            }
        }
        self.add_ballot(ranking, 1)
    }

    /// Adds a ballot with a weight of `multiplier`.
    ///
    /// Returns true if the ballot was accepted and false if it was dropped as invalid.
    /// Invalid ballots are an error when the options do not allow them.
    pub fn add_ballot(
        &mut self,
        ranking: Vec<Vec<CandidateId>>,
        multiplier: u64,
    ) -> VotingResult<bool> {
        if multiplier == 0 {
            return Ok(false);
        }
        let ballot = Ballot::new(ranking, multiplier as f64);
        let candidates = &self.candidates;
        let validity = ballot.validate(&self.options, |cid| {
            candidates.iter().any(|c| c.id() == cid)
        });
        if let Err(reason) = validity {
            return self.reject(reason, multiplier);
        }

        self.num_valid += multiplier;
        let key = ballot.ranking().to_vec();
        if let Some(idx) = self.seen_rankings.get(&key) {
            self.ballots[*idx].add_value(multiplier as f64);
        } else {
            self.seen_rankings.insert(key, self.ballots.len());
            self.ballots.push(ballot);
        }
        Ok(true)
    }

    fn reject(&mut self, reason: InvalidReason, multiplier: u64) -> VotingResult<bool> {
        ensure!(self.options.allow_invalid, InvalidBallotSnafu { reason });
        warn!("Dropping {} invalid ballot(s): {}", multiplier, reason);
        self.num_invalid += multiplier;
        Ok(false)
    }

    pub fn build(self) -> VotingResult<Election> {
        ensure!(!self.candidates.is_empty(), NoCandidatesSnafu);
        debug!(
            "build: {} candidates, {} distinct ballots, {} valid, {} invalid",
            self.candidates.len(),
            self.ballots.len(),
            self.num_valid,
            self.num_invalid
        );
        Ok(Election {
            title: self.title,
            candidates: self.candidates,
            ballots: self.ballots,
            num_seats: self.num_seats,
            num_valid_ballots: self.num_valid,
            num_invalid_ballots: self.num_invalid,
        })
    }
}
