mod ballot;
pub mod builder;
mod candidate;
mod config;
mod election;
pub mod manual;

use log::{debug, info, warn};
use snafu::{ensure, OptionExt};

use std::collections::BTreeMap;

pub use crate::ballot::Ballot;
pub use crate::candidate::Candidate;
pub use crate::config::*;
pub use crate::election::Election;

/// The contract shared by all the counting methods.
///
/// A method is bound to an election, then advanced one round at a time with
/// [`CountingMethod::step`] (or all at once with [`CountingMethod::run`]).
/// Every round appends one [`Stage`] to the history.
pub trait CountingMethod {
    fn name(&self) -> &'static str;

    fn set_election(&mut self, election: Election);

    /// The bound election.
    ///
    /// Fails if no election is bound, or if it has nothing to count.
    fn election(&self) -> VotingResult<&Election>;

    /// The number of votes needed to be elected.
    ///
    /// The value is cached. `recalculate` forces it to be computed again from the
    /// current state of the count.
    fn quota(&mut self, recalculate: bool) -> VotingResult<VoteValue>;

    fn stages(&self) -> &[Stage];

    /// True once the count reached its end and no more rounds can run.
    fn is_finished(&self) -> bool;

    /// Runs one round and returns the stage it produced.
    fn step(&mut self) -> VotingResult<Stage>;

    fn result(&self) -> VotingResult<CountResult>;

    /// The number of seats not filled yet.
    fn num_vacancies(&self) -> VotingResult<i64> {
        let election = self.election()?;
        let filled = election.candidates(Some(CandidateState::Elected)).len() as i64;
        Ok(election.num_seats() as i64 - filled)
    }

    fn is_complete(&self) -> VotingResult<bool> {
        Ok(self.num_vacancies()? <= 0)
    }

    fn run(&mut self) -> VotingResult<CountResult> {
        info!("Running {}", self.name());
        while !self.is_finished() {
            let stage = self.step()?;
            debug!("run: stage {} total: {}", stage.round, stage.total);
        }
        self.result()
    }
}

/// Creates the counting method selected in the options.
pub fn counting_method(options: &CountOptions) -> Box<dyn CountingMethod> {
    Box::new(Stv::new(options))
}

/// Runs the counting method selected in the options over the given election.
pub fn run_count(election: Election, options: &CountOptions) -> VotingResult<CountResult> {
    info!(
        "Processing {:?} valid ballots ({:?} invalid), {:?} seats, options: {:?}",
        election.num_valid_ballots(),
        election.num_invalid_ballots(),
        election.num_seats(),
        options
    );
    for c in election.candidates(None) {
        info!("Candidate: {}: {} ({})", c.id(), c.name(), c.state());
    }
    let mut method = counting_method(options);
    method.set_election(election);
    method.run()
}

// Where a ballot goes when it leaves a candidate.
enum Routing {
    // The next usable level, with one part of the ballot per hopeful candidate at that level.
    Moved(Vec<(CandidateId, Ballot)>),
    Exhausted(VoteValue),
}

/// Single Transferable Vote with the Droop quota and fractional surplus transfers.
///
/// Each round either elects the candidates that reached the quota and transfers
/// their surplus, or defeats the weakest candidate and transfers all its ballots.
/// The quota is computed once, or every round with [`MethodKind::StvReducingQuota`].
pub struct Stv {
    options: CountOptions,
    election: Option<Election>,
    quota: Option<VoteValue>,
    stages: Vec<Stage>,
    // The ballots currently counted for each candidate.
    piles: BTreeMap<CandidateId, Vec<Ballot>>,
    exhausted: VoteValue,
    elected: Vec<CandidateId>,
    finished: bool,
}

impl Stv {
    pub fn new(options: &CountOptions) -> Stv {
        Stv {
            options: options.clone(),
            election: None,
            quota: None,
            stages: Vec::new(),
            piles: BTreeMap::new(),
            exhausted: VoteValue::EMPTY,
            elected: Vec::new(),
            finished: false,
        }
    }

    fn election_mut(&mut self) -> VotingResult<&mut Election> {
        self.election.as_mut().context(ElectionNotDefinedSnafu)
    }

    /// Droop quota: floor(ballots / (seats + 1)) + 1.
    fn calculate_quota(&self) -> VotingResult<VoteValue> {
        let election = self.election()?;
        let ballots = match self.options.method {
            MethodKind::Stv => election.num_valid_ballots() as f64,
            MethodKind::StvReducingQuota => round_to(
                election.num_valid_ballots() as f64 - self.exhausted.0,
                self.options.precision,
            ),
        };
        let seats = election.num_seats() as f64;
        Ok(VoteValue((ballots / (seats + 1.0)).floor() + 1.0))
    }

    fn hopefuls(&self) -> VotingResult<Vec<(CandidateId, VoteValue)>> {
        let precision = self.options.precision;
        Ok(self
            .election()?
            .candidates(Some(CandidateState::Hopeful))
            .iter()
            .map(|c| (c.id(), c.votes().round(precision)))
            .collect())
    }

    /// All the candidates, the most favoured first.
    fn tiebreak_order(&self, round: u32) -> VotingResult<Vec<CandidateId>> {
        let candidates: Vec<(CandidateId, String)> = self
            .election()?
            .candidates(None)
            .iter()
            .map(|c| (c.id(), c.name().to_string()))
            .collect();
        let res = match &self.options.tiebreak_mode {
            TieBreakMode::UseCandidateOrder => candidates.iter().map(|(cid, _)| *cid).collect(),
            TieBreakMode::Permutation(names) => {
                let mut res: Vec<CandidateId> = Vec::new();
                for name in names.iter() {
                    if let Some((cid, _)) = candidates.iter().find(|(_, n)| n == name) {
                        if !res.contains(cid) {
                            res.push(*cid);
                        }
                    }
                }
                for (cid, _) in candidates.iter() {
                    if !res.contains(cid) {
                        res.push(*cid);
                    }
                }
                res
            }
            TieBreakMode::Random(seed) => candidate_permutation_crypto(&candidates, *seed, round),
        };
        Ok(res)
    }

    fn distribute_first_preferences(&mut self) -> VotingResult<()> {
        let ballots: Vec<Ballot> = self.election()?.ballots().to_vec();
        let mut exhausted = VoteValue::EMPTY;
        for ballot in ballots {
            match self.route(ballot)? {
                Routing::Moved(parts) => {
                    for (cid, part) in parts {
                        self.election_mut()?
                            .candidate_mut(cid)?
                            .add_votes(part.value());
                        self.piles.entry(cid).or_default().push(part);
                    }
                }
                Routing::Exhausted(value) => {
                    exhausted += value;
                }
            }
        }
        if exhausted > VoteValue::EMPTY {
            warn!(
                "{} votes rank no hopeful candidate and are exhausted from the start",
                exhausted
            );
        }
        self.exhausted += exhausted;
        Ok(())
    }

    /// Finds the next usable preference of a ballot, starting at its cursor.
    ///
    /// The ballot is split evenly between the hopeful candidates sharing that level.
    fn route(&self, mut ballot: Ballot) -> VotingResult<Routing> {
        let election = self.election()?;
        let mut level = ballot.cursor();
        while level <= ballot.num_levels() {
            let mut hopefuls: Vec<CandidateId> = Vec::new();
            for cid in ballot.get_preference(level) {
                let is_hopeful = election
                    .candidate(*cid)
                    .map_or(false, |c| c.state() == CandidateState::Hopeful);
                if is_hopeful && !hopefuls.contains(cid) {
                    hopefuls.push(*cid);
                }
            }
            if !hopefuls.is_empty() {
                ballot.advance_to(level);
                let share = ballot.value().0 / hopefuls.len() as f64;
                let parts = hopefuls
                    .iter()
                    .map(|cid| (*cid, ballot.split(share)))
                    .collect();
                return Ok(Routing::Moved(parts));
            }
            level += 1;
        }
        Ok(Routing::Exhausted(ballot.value()))
    }

    /// Sends ballots taken from a candidate to their next usable preference.
    ///
    /// When `empties_pile` is set, the candidate gives away everything it holds: the
    /// last debit takes the exact remaining balance so that no rounding residue stays.
    fn move_ballots(
        &mut self,
        from: CandidateId,
        ballots: Vec<Ballot>,
        empties_pile: bool,
    ) -> VotingResult<()> {
        let precision = self.options.precision;
        let mut transfers: BTreeMap<CandidateId, VoteValue> = BTreeMap::new();
        let mut exhausted = VoteValue::EMPTY;
        for ballot in ballots {
            match self.route(ballot)? {
                Routing::Moved(parts) => {
                    for (to, part) in parts {
                        *transfers.entry(to).or_insert(VoteValue::EMPTY) += part.value();
                        self.piles.entry(to).or_default().push(part);
                    }
                }
                Routing::Exhausted(value) => {
                    exhausted += value;
                }
            }
        }
        debug!(
            "move_ballots: from {}: transfers: {:?} exhausted: {}",
            from, transfers, exhausted
        );

        // Debits in candidate order, exhausted value last.
        let election = self.election()?;
        let mut debits: Vec<(Option<CandidateId>, VoteValue)> = election
            .candidates(None)
            .iter()
            .filter_map(|c| transfers.get(&c.id()).map(|amount| (Some(c.id()), *amount)))
            .collect();
        if exhausted > VoteValue::EMPTY {
            debits.push((None, exhausted));
        }
        if empties_pile && !debits.is_empty() {
            let balance = election
                .candidate(from)
                .context(UnknownCandidateSnafu { id: from.0 })?
                .votes();
            let last = debits.len() - 1;
            let others: VoteValue = debits[..last].iter().map(|(_, amount)| *amount).sum();
            debits[last].1 = balance - others;
        }

        for (to, amount) in debits {
            match to {
                Some(to) => {
                    self.election_mut()?
                        .transfer_votes(from, to, amount, precision)?;
                }
                None => {
                    self.election_mut()?
                        .candidate_mut(from)?
                        .exhaust_votes(amount, precision)?;
                    self.exhausted += amount;
                }
            }
        }
        Ok(())
    }

    fn elect_reaching_quota(
        &mut self,
        quota: VoteValue,
        round: u32,
    ) -> VotingResult<Vec<CandidateId>> {
        let vacancies = self.num_vacancies()?;
        if vacancies <= 0 {
            return Ok(Vec::new());
        }
        let precision = self.options.precision;
        let order = self.tiebreak_order(round)?;
        let mut reaching: Vec<(CandidateId, VoteValue)> = self
            .hopefuls()?
            .into_iter()
            .filter(|(_, votes)| *votes >= quota.round(precision))
            .collect();
        sort_by_votes(&mut reaching, &order);
        if reaching.len() as i64 > vacancies {
            info!(
                "Round {}: {} candidates reached the quota for {} seat(s)",
                round,
                reaching.len(),
                vacancies
            );
            reaching.truncate(vacancies as usize);
        }

        let mut res = Vec::new();
        for (cid, votes) in reaching {
            let c = self.election_mut()?.candidate_mut(cid)?;
            c.set_state(CandidateState::Elected)?;
            c.log(format!("Elected with {} votes", votes.display(2)));
            info!("Round {}: {} -> elected ({} votes)", round, c.name(), votes);
            self.elected.push(cid);
            res.push(cid);
        }
        Ok(res)
    }

    fn transfer_surplus(&mut self, cid: CandidateId, quota: VoteValue) -> VotingResult<()> {
        let precision = self.options.precision;
        let votes = self
            .election()?
            .candidate(cid)
            .context(UnknownCandidateSnafu { id: cid.0 })?
            .votes();
        let surplus = votes - quota;
        self.election_mut()?
            .candidate_mut(cid)?
            .set_surplus(surplus, false);
        if surplus.round(precision) <= VoteValue::EMPTY {
            return Ok(());
        }

        // Every ballot passes on the same fraction of its value.
        let ratio = surplus.0 / votes.0;
        debug!(
            "transfer_surplus: {}: votes {} surplus {} ratio {}",
            cid, votes, surplus, ratio
        );
        let pile = self.piles.remove(&cid).unwrap_or_default();
        let mut kept: Vec<Ballot> = Vec::new();
        let mut moving: Vec<Ballot> = Vec::new();
        for ballot in pile.iter() {
            let value = ballot.value().0;
            kept.push(ballot.split(value * (1.0 - ratio)));
            moving.push(ballot.split(value * ratio));
        }
        self.piles.insert(cid, kept);
        self.move_ballots(cid, moving, false)
    }

    fn eliminate_lowest(&mut self, round: u32) -> VotingResult<()> {
        let order = self.tiebreak_order(round)?;
        let hopefuls = self.hopefuls()?;
        let min_votes = match hopefuls.iter().map(|(_, vv)| *vv).reduce(|a, b| {
            if b < a {
                b
            } else {
                a
            }
        }) {
            Some(x) => x,
            None => return Ok(()),
        };
        let lowest: Vec<CandidateId> = hopefuls
            .iter()
            .filter(|(_, vv)| *vv <= min_votes)
            .map(|(cid, _)| *cid)
            .collect();
        // The least favoured of the tied candidates is defeated.
        let loser = *lowest
            .iter()
            .max_by_key(|cid| rank_in(&order, **cid))
            .context(NoCandidatesToCountSnafu)?;
        if lowest.len() > 1 {
            info!(
                "Round {}: tie between {:?} for the lowest count, defeating {}",
                round, lowest, loser
            );
        }

        let c = self.election_mut()?.candidate_mut(loser)?;
        c.set_state(CandidateState::Defeated)?;
        c.log(format!("Defeated with {} votes", min_votes.display(2)));
        info!("Round {}: {} -> defeated ({} votes)", round, c.name(), min_votes);

        let pile = self.piles.remove(&loser).unwrap_or_default();
        self.move_ballots(loser, pile, true)
    }

    /// Returns true when the count is over.
    fn check_termination(&mut self, round: u32) -> VotingResult<bool> {
        if self.is_complete()? {
            return Ok(true);
        }
        let vacancies = self.num_vacancies()?;
        let mut hopefuls = self.hopefuls()?;
        if hopefuls.is_empty() {
            warn!(
                "No hopeful candidate left, {} seat(s) remain unfilled",
                vacancies
            );
            return Ok(true);
        }
        if hopefuls.len() as i64 <= vacancies {
            let order = self.tiebreak_order(round)?;
            sort_by_votes(&mut hopefuls, &order);
            for (cid, votes) in hopefuls {
                let c = self.election_mut()?.candidate_mut(cid)?;
                c.set_state(CandidateState::Elected)?;
                c.log("Elected to fill a remaining seat".to_string());
                info!(
                    "Round {}: {} -> elected without reaching the quota ({} votes)",
                    round,
                    c.name(),
                    votes
                );
                self.elected.push(cid);
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Takes the snapshot of the round, draining the logs of the candidates.
    fn log_stage(&mut self, round: u32, quota: VoteValue) -> VotingResult<Stage> {
        let precision = self.options.precision;
        let exhausted = self.exhausted;
        let election = self.election_mut()?;
        let mut votes: Vec<(CandidateId, VoteValue)> = Vec::new();
        let mut changes: Vec<(CandidateId, Vec<String>)> = Vec::new();
        let mut total = VoteValue::EMPTY;
        for c in election.candidates.iter_mut() {
            total += c.votes();
            votes.push((c.id(), c.votes().round(precision)));
            changes.push((c.id(), c.get_log(true)));
        }
        Ok(Stage {
            round,
            quota,
            votes,
            changes,
            total: total.round(precision),
            exhausted: exhausted.round(precision),
        })
    }
}

impl CountingMethod for Stv {
    fn name(&self) -> &'static str {
        match self.options.method {
            MethodKind::Stv => "STV",
            MethodKind::StvReducingQuota => "STV (reducing quota)",
        }
    }

    fn set_election(&mut self, election: Election) {
        self.election = Some(election);
        self.quota = None;
        self.stages.clear();
        self.piles.clear();
        self.exhausted = VoteValue::EMPTY;
        self.elected.clear();
        self.finished = false;
    }

    fn election(&self) -> VotingResult<&Election> {
        let election = self.election.as_ref().context(ElectionNotDefinedSnafu)?;
        ensure!(!election.candidates.is_empty(), NoCandidatesToCountSnafu);
        ensure!(election.num_valid_ballots() > 0, EmptyElectionSnafu);
        Ok(election)
    }

    fn quota(&mut self, recalculate: bool) -> VotingResult<VoteValue> {
        match self.quota {
            Some(q) if !recalculate => Ok(q),
            _ => {
                let q = self.calculate_quota()?;
                self.quota = Some(q);
                Ok(q)
            }
        }
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn step(&mut self) -> VotingResult<Stage> {
        ensure!(!self.finished, CountFinishedSnafu);
        let round = self.stages.len() as u32 + 1;
        if round == 1 {
            self.distribute_first_preferences()?;
        }
        let recalculate = self.options.method == MethodKind::StvReducingQuota;
        let quota = self.quota(recalculate)?;
        info!("Round {} (quota: {})", round, quota);

        let elected_now = self.elect_reaching_quota(quota, round)?;
        for cid in elected_now.iter() {
            self.transfer_surplus(*cid, quota)?;
        }

        let mut done = self.check_termination(round)?;
        if !done && elected_now.is_empty() {
            self.eliminate_lowest(round)?;
            done = self.check_termination(round)?;
        }

        let stage = self.log_stage(round, quota)?;
        debug!("step: stage: {:?}", stage);
        self.stages.push(stage.clone());
        if done {
            self.finished = true;
        } else if round >= self.options.max_stages {
            return NoConvergenceSnafu {
                max_stages: self.options.max_stages,
            }
            .fail();
        }
        Ok(stage)
    }

    fn result(&self) -> VotingResult<CountResult> {
        let election = self.election()?;
        let quota = match self.quota {
            Some(q) => q,
            None => self.calculate_quota()?,
        };
        let precision = self.options.precision;
        let candidates = election
            .candidates(None)
            .iter()
            .map(|c| CandidateSummary {
                id: c.id(),
                name: c.name().to_string(),
                state: c.state(),
                votes: c.votes().round(precision),
            })
            .collect();
        Ok(CountResult {
            quota,
            candidates,
            elected: self.elected.clone(),
            stages: self.stages.clone(),
        })
    }
}

fn rank_in(order: &[CandidateId], cid: CandidateId) -> usize {
    order
        .iter()
        .position(|c| *c == cid)
        .unwrap_or(order.len())
}

// Most votes first, ties in tie-break order.
fn sort_by_votes(candidates: &mut [(CandidateId, VoteValue)], order: &[CandidateId]) {
    candidates.sort_by(|(cid1, v1), (cid2, v2)| {
        v2.partial_cmp(v1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| rank_in(order, *cid1).cmp(&rank_in(order, *cid2)))
    });
}

/// Generates a "random" permutation of the candidates. Random in this context means hard to guess in advance.
/// This uses a cryptographic hash that is resilient to collisions.
fn candidate_permutation_crypto(
    candidates: &[(CandidateId, String)],
    seed: u32,
    num_round: u32,
) -> Vec<CandidateId> {
    let mut data: Vec<(CandidateId, String)> = candidates
        .iter()
        .map(|(cid, name)| {
            (
                *cid,
                sha256::digest(format!("{:08}{:08}{}", seed, num_round, name)),
            )
        })
        .collect();
    data.sort_by(|a, b| a.1.cmp(&b.1));
    data.iter().map(|p| p.0).collect()
}
