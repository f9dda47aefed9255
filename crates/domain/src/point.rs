//! Member point ledger.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::{Amount, MemberId};

use crate::error::{DomainError, Result};

/// Basic reward percentage applied when a member has no tier override.
pub const BASIC_REWARD_PERCENT: u64 = 3;

#[derive(Debug, Default)]
struct PointLedgerState {
    balances: HashMap<MemberId, Amount>,
    reward_percents: HashMap<MemberId, u64>,
}

/// Shared handle over member point balances and reward tiers.
#[derive(Debug, Clone, Default)]
pub struct PointLedger {
    state: Arc<RwLock<PointLedgerState>>,
}

impl PointLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a member's balance outright (test fixture).
    pub fn set_balance(&self, member: MemberId, balance: Amount) {
        self.state.write().unwrap().balances.insert(member, balance);
    }

    /// Overrides a member's reward-tier percentage.
    pub fn set_reward_percent(&self, member: MemberId, percent: u64) {
        self.state
            .write()
            .unwrap()
            .reward_percents
            .insert(member, percent);
    }

    /// Current balance, zero for unknown members.
    pub fn balance(&self, member: MemberId) -> Amount {
        self.state
            .read()
            .unwrap()
            .balances
            .get(&member)
            .copied()
            .unwrap_or_default()
    }

    /// The member's reward percentage; rejects percentages that would
    /// credit the full purchase amount or more.
    pub fn reward_percent(&self, member: MemberId) -> Result<u64> {
        let percent = self
            .state
            .read()
            .unwrap()
            .reward_percents
            .get(&member)
            .copied()
            .unwrap_or(BASIC_REWARD_PERCENT);
        if percent >= 100 {
            return Err(DomainError::RewardPercentTooHigh(percent));
        }
        Ok(percent)
    }

    /// Debits points from a member; fails on insufficient balance.
    pub fn debit(&self, member: MemberId, amount: Amount) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let balance = state.balances.entry(member).or_default();
        *balance = balance.checked_sub(amount).ok_or({
            DomainError::InsufficientPoints {
                member,
                requested: amount,
                balance: *balance,
            }
        })?;
        Ok(())
    }

    /// Credits points to a member.
    pub fn credit(&self, member: MemberId, amount: Amount) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let balance = state.balances.entry(member).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(DomainError::AmountOverflow)?;
        Ok(())
    }
}
