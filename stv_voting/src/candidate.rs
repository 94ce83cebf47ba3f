use log::debug;
use snafu::ensure;

use crate::config::*;

/// A candidate and its running tally.
#[derive(PartialEq, Debug, Clone)]
pub struct Candidate {
    id: CandidateId,
    name: String,
    votes: VoteValue,
    surplus: VoteValue,
    state: CandidateState,
    log: Vec<String>,
}

impl Candidate {
    pub fn new(id: CandidateId, name: &str) -> Candidate {
        Candidate {
            id,
            name: name.to_string(),
            votes: VoteValue::EMPTY,
            surplus: VoteValue::EMPTY,
            state: CandidateState::Hopeful,
            log: Vec::new(),
        }
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn votes(&self) -> VoteValue {
        self.votes
    }

    pub fn add_votes(&mut self, amount: VoteValue) {
        self.votes += amount;
    }

    /// Moves `amount` votes to another candidate.
    ///
    /// The balance check is done at the given precision, so that transferring the
    /// full balance always succeeds despite floating point noise.
    pub fn transfer_votes(
        &mut self,
        amount: VoteValue,
        to: &mut Candidate,
        precision: u32,
    ) -> VotingResult<()> {
        self.check_balance(amount, precision)?;
        self.votes -= amount;
        to.add_votes(amount);
        let decimals = display_decimals(precision);
        self.log(format!(
            "Transferred {} votes to {}",
            amount.display(decimals),
            to.name
        ));
        to.log(format!(
            "Received {} votes from {}",
            amount.display(decimals),
            self.name
        ));
        Ok(())
    }

    /// Removes `amount` votes carried by ballots that have no further usable preference.
    pub fn exhaust_votes(&mut self, amount: VoteValue, precision: u32) -> VotingResult<()> {
        self.check_balance(amount, precision)?;
        self.votes -= amount;
        let decimals = display_decimals(precision);
        self.log(format!("Exhausted {} votes", amount.display(decimals)));
        Ok(())
    }

    fn check_balance(&self, amount: VoteValue, precision: u32) -> VotingResult<()> {
        ensure!(
            (self.votes - amount).round(precision) >= VoteValue::EMPTY,
            InsufficientBalanceSnafu {
                name: self.name.clone(),
                balance: self.votes.0,
                amount: amount.0,
            }
        );
        Ok(())
    }

    pub fn surplus(&self) -> VoteValue {
        self.surplus
    }

    pub fn set_surplus(&mut self, amount: VoteValue, increment: bool) {
        self.surplus = if increment {
            self.surplus + amount
        } else {
            amount
        };
    }

    pub fn state(&self) -> CandidateState {
        self.state
    }

    pub fn formatted_state(&self) -> &'static str {
        self.state.label()
    }

    pub fn set_state(&mut self, state: CandidateState) -> VotingResult<()> {
        ensure!(
            self.state.can_become(state),
            InvalidStateTransitionSnafu {
                name: self.name.clone(),
                from: self.state,
                to: state,
            }
        );
        debug!(
            "set_state: {} ({}): {:?} -> {:?}",
            self.name, self.id, self.state, state
        );
        self.state = state;
        Ok(())
    }

    pub fn log(&mut self, message: String) {
        self.log.push(message);
    }

    /// The messages logged since the last reset.
    pub fn get_log(&mut self, reset: bool) -> Vec<String> {
        if reset {
            std::mem::take(&mut self.log)
        } else {
            self.log.clone()
        }
    }
}

// Messages never show more than 2 decimals.
fn display_decimals(precision: u32) -> usize {
    precision.min(2) as usize
}
