// ********* Vote arithmetic ***********

use snafu::Snafu;
use std::fmt::Display;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Rounds a value to the given number of decimal places.
pub fn round_to(x: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (x * factor).round() / factor
}

/// An amount of ballot weight. Transfers at partial strength make it fractional.
#[derive(PartialEq, PartialOrd, Debug, Clone, Copy, Default)]
pub struct VoteValue(pub f64);

impl VoteValue {
    pub const EMPTY: VoteValue = VoteValue(0.0);

    pub fn round(self, precision: u32) -> VoteValue {
        VoteValue(round_to(self.0, precision))
    }

    /// Formats the value for humans, with a fixed number of decimals.
    pub fn display(self, decimals: usize) -> String {
        format!("{:.*}", decimals, self.0)
    }
}

impl std::iter::Sum for VoteValue {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteValue(iter.map(|vv| vv.0).sum())
    }
}

impl AddAssign for VoteValue {
    fn add_assign(&mut self, rhs: VoteValue) {
        self.0 += rhs.0;
    }
}

impl SubAssign for VoteValue {
    fn sub_assign(&mut self, rhs: VoteValue) {
        self.0 -= rhs.0;
    }
}

impl Add for VoteValue {
    type Output = VoteValue;
    fn add(self: VoteValue, rhs: VoteValue) -> VoteValue {
        VoteValue(self.0 + rhs.0)
    }
}

impl Sub for VoteValue {
    type Output = VoteValue;
    fn sub(self: VoteValue, rhs: VoteValue) -> VoteValue {
        VoteValue(self.0 - rhs.0)
    }
}

impl Display for VoteValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ********* Identities and states ***********

/// Identifier of a candidate, unique within one election.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub u32);

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The state of a candidate during a count.
///
/// Hopeful candidates may become elected or defeated. The other states are final.
/// Withdrawn is only set while the election is assembled.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CandidateState {
    Hopeful,
    Elected,
    Defeated,
    Withdrawn,
}

impl CandidateState {
    pub fn label(&self) -> &'static str {
        match self {
            CandidateState::Hopeful => "Hopeful",
            CandidateState::Elected => "Elected",
            CandidateState::Defeated => "Defeated",
            CandidateState::Withdrawn => "Withdrawn",
        }
    }

    /// True if the state can be left for `next`.
    pub fn can_become(&self, next: CandidateState) -> bool {
        *self == next || *self == CandidateState::Hopeful
    }
}

impl Display for CandidateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ******** Output data structures *********

/// Snapshot of one round of the count.
#[derive(PartialEq, Debug, Clone)]
pub struct Stage {
    pub round: u32,
    /// The quota in force during this round.
    pub quota: VoteValue,
    /// Votes per candidate, rounded to the precision of the count, in candidate order.
    pub votes: Vec<(CandidateId, VoteValue)>,
    /// What happened to each candidate during the round.
    pub changes: Vec<(CandidateId, Vec<String>)>,
    /// Sum of the votes held by all the candidates.
    pub total: VoteValue,
    /// Value of all the ballots exhausted so far.
    pub exhausted: VoteValue,
}

impl Stage {
    pub fn votes_of(&self, cid: CandidateId) -> Option<VoteValue> {
        self.votes
            .iter()
            .find(|(cid2, _)| *cid2 == cid)
            .map(|(_, vv)| *vv)
    }

    pub fn changes_of(&self, cid: CandidateId) -> &[String] {
        self.changes
            .iter()
            .find(|(cid2, _)| *cid2 == cid)
            .map(|(_, c)| c.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct CandidateSummary {
    pub id: CandidateId,
    pub name: String,
    pub state: CandidateState,
    pub votes: VoteValue,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CountResult {
    pub quota: VoteValue,
    /// The final state of every candidate, in candidate order.
    pub candidates: Vec<CandidateSummary>,
    /// The elected candidates, in the order they were elected.
    pub elected: Vec<CandidateId>,
    pub stages: Vec<Stage>,
}

// ********* Errors **********

/// Why a ballot was refused.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum InvalidReason {
    Empty,
    UnknownCandidate(u32),
    UnknownName(String),
    SkippedRanking(u32),
    EqualRanking(u32),
    RepeatedCandidate(CandidateId),
}

impl Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::Empty => write!(f, "the ballot ranks no candidate"),
            InvalidReason::UnknownCandidate(id) => write!(f, "unknown candidate id {}", id),
            InvalidReason::UnknownName(name) => write!(f, "unknown candidate {}", name),
            InvalidReason::SkippedRanking(level) => {
                write!(f, "preference {} is skipped", level)
            }
            InvalidReason::EqualRanking(level) => {
                write!(f, "several candidates share preference {}", level)
            }
            InvalidReason::RepeatedCandidate(cid) => {
                write!(f, "candidate {} is ranked more than once", cid)
            }
        }
    }
}

/// The family of an error, which tells the caller how to react to it.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorKind {
    /// Setup misuse. Fix the invocation.
    Configuration,
    /// The election cannot be counted as configured. Another set of options may work.
    Count,
    /// A broken invariant in the counting engine.
    Candidate,
}

/// Errors that prevent the algorithm from completing successfully.
#[derive(PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VotingErrors {
    #[snafu(display("Election not defined"))]
    ElectionNotDefined,
    #[snafu(display("The number of seats must be positive, got {num_seats}"))]
    InvalidSeats { num_seats: u32 },
    #[snafu(display("No candidates registered"))]
    NoCandidates,
    #[snafu(display("Unknown candidate id {id}"))]
    UnknownCandidate { id: u32 },
    #[snafu(display("Candidate id {id} is used twice"))]
    DuplicateCandidateId { id: u32 },
    #[snafu(display("Invalid ballot: {reason}"))]
    InvalidBallot { reason: InvalidReason },
    #[snafu(display("The count is already finished"))]
    CountFinished,
    #[snafu(display("No candidates found"))]
    NoCandidatesToCount,
    #[snafu(display("No ballot found"))]
    EmptyElection,
    #[snafu(display("The count did not finish within {max_stages} stages"))]
    NoConvergence { max_stages: u32 },
    #[snafu(display(
        "Not enough votes to transfer: {name} holds {balance} and was asked for {amount}"
    ))]
    InsufficientBalance {
        name: String,
        balance: f64,
        amount: f64,
    },
    #[snafu(display("Candidate {name} cannot go from {from} to {to}"))]
    InvalidStateTransition {
        name: String,
        from: CandidateState,
        to: CandidateState,
    },
}

impl VotingErrors {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VotingErrors::ElectionNotDefined
            | VotingErrors::InvalidSeats { .. }
            | VotingErrors::NoCandidates
            | VotingErrors::UnknownCandidate { .. }
            | VotingErrors::DuplicateCandidateId { .. }
            | VotingErrors::InvalidBallot { .. }
            | VotingErrors::CountFinished => ErrorKind::Configuration,
            VotingErrors::NoCandidatesToCount
            | VotingErrors::EmptyElection
            | VotingErrors::NoConvergence { .. } => ErrorKind::Count,
            VotingErrors::InsufficientBalance { .. }
            | VotingErrors::InvalidStateTransition { .. } => ErrorKind::Candidate,
        }
    }
}

pub type VotingResult<T> = Result<T, VotingErrors>;

// ********* Configuration **********

/// How ties are resolved, both when several candidates reach the quota with the
/// same number of votes and when several candidates share the lowest count.
///
/// Every mode defines an order of the candidates. Election ties go to the
/// earliest candidate in that order, elimination ties defeat the latest one.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TieBreakMode {
    /// The order in which the candidates were registered.
    UseCandidateOrder,
    /// An explicit order, by candidate name. Candidates not listed come after, in registration order.
    Permutation(Vec<String>),
    /// A hard to guess order, derived from a cryptographic hash of the seed,
    /// the round number and the candidate name.
    Random(u32),
}

/// The members of the STV family that can be selected.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MethodKind {
    /// Droop quota computed once from the valid ballots.
    Stv,
    /// Droop quota recomputed every round from the ballots that are not exhausted.
    StvReducingQuota,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CountOptions {
    /// Accept ballots that rank several candidates at the same level.
    pub allow_equal: bool,
    /// Accept ballots that rank a candidate more than once.
    pub allow_repeat: bool,
    /// Accept ballots with gaps in the preference levels.
    pub allow_skipped: bool,
    /// Drop invalid ballots instead of rejecting the whole input.
    pub allow_invalid: bool,
    pub max_stages: u32,
    /// Decimal places used when comparing votes to the quota and in stage snapshots.
    pub precision: u32,
    pub tiebreak_mode: TieBreakMode,
    pub method: MethodKind,
}

impl CountOptions {
    pub const DEFAULT_OPTIONS: CountOptions = CountOptions {
        allow_equal: false,
        allow_repeat: false,
        allow_skipped: false,
        allow_invalid: true,
        max_stages: 100,
        precision: 5,
        tiebreak_mode: TieBreakMode::UseCandidateOrder,
        method: MethodKind::Stv,
    };
}

impl Default for CountOptions {
    fn default() -> Self {
        CountOptions::DEFAULT_OPTIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.234567, 2), 1.23);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(VoteValue(1.0 / 3.0).round(5), VoteValue(0.33333));
        assert_eq!(VoteValue(1.5).display(2), "1.50");
    }

    #[test]
    fn state_transitions() {
        assert!(CandidateState::Hopeful.can_become(CandidateState::Elected));
        assert!(CandidateState::Hopeful.can_become(CandidateState::Withdrawn));
        assert!(!CandidateState::Elected.can_become(CandidateState::Hopeful));
        assert!(!CandidateState::Defeated.can_become(CandidateState::Elected));
        assert_eq!(CandidateState::Withdrawn.to_string(), "Withdrawn");
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            VotingErrors::ElectionNotDefined.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            VotingErrors::NoConvergence { max_stages: 3 }.kind(),
            ErrorKind::Count
        );
        assert_eq!(
            VotingErrors::InsufficientBalance {
                name: "A".to_string(),
                balance: 1.0,
                amount: 2.0
            }
            .kind(),
            ErrorKind::Candidate
        );
    }
}
