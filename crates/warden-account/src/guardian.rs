//! Guardian registry
//!
//! Guardians are added and removed through a two-step, time-locked flow:
//! a request opens a pending entry, and a confirmation is accepted only
//! inside `[period, period + window)` after the request. Pending entries are
//! never swept; an expired entry stays until cancelled or replaced by a
//! fresh request.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use warden_core::Address;

use crate::error::{AccountError, Result};

/// Number of guardian approvals needed for quorum
pub fn majority_of(count: usize) -> usize {
    if count == 0 {
        0
    } else {
        count / 2 + 1
    }
}

/// Position of a timestamp relative to a pending entry's confirmation window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    NotOver,
    Open,
    Expired,
}

/// Time lock applied to a pending guardian change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationWindow {
    pub period: u64,
    pub window: u64,
}

impl ConfirmationWindow {
    pub fn new(period: u64, window: u64) -> Self {
        Self { period, window }
    }

    pub fn state(&self, requested_at: u64, now: u64) -> WindowState {
        let elapsed = now.saturating_sub(requested_at);
        if elapsed < self.period {
            WindowState::NotOver
        } else if elapsed >= self.period.saturating_add(self.window) {
            WindowState::Expired
        } else {
            WindowState::Open
        }
    }
}

/// Which side of the guardian lifecycle a pending entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Addition,
    Removal,
}

/// Guardians of one account plus their pending changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianSet {
    guardians: BTreeSet<Address>,
    pending_additions: BTreeMap<Address, u64>,
    pending_removals: BTreeMap<Address, u64>,
}

impl GuardianSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, candidate: &Address) -> bool {
        self.guardians.contains(candidate)
    }

    pub fn len(&self) -> usize {
        self.guardians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guardians.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.guardians.iter()
    }

    pub fn to_vec(&self) -> Vec<Address> {
        self.guardians.iter().copied().collect()
    }

    pub fn majority(&self) -> usize {
        majority_of(self.len())
    }

    /// Request timestamp of a pending addition
    pub fn pending_addition(&self, candidate: &Address) -> Option<u64> {
        self.pending_additions.get(candidate).copied()
    }

    /// Request timestamp of a pending removal
    pub fn pending_removal(&self, candidate: &Address) -> Option<u64> {
        self.pending_removals.get(candidate).copied()
    }

    /// Record a pending addition of `candidate` at `now`
    ///
    /// An existing entry is replaced only if it has expired under `timing`,
    /// the window in force now rather than when that entry was recorded.
    pub fn request_addition(
        &mut self,
        account: &Address,
        candidate: Address,
        now: u64,
        timing: ConfirmationWindow,
    ) -> Result<()> {
        self.request(Change::Addition, account, candidate, now, timing)
    }

    /// Record a pending removal; expiry of an existing entry is judged as in
    /// [`GuardianSet::request_addition`]
    pub fn request_removal(
        &mut self,
        account: &Address,
        candidate: Address,
        now: u64,
        timing: ConfirmationWindow,
    ) -> Result<()> {
        self.request(Change::Removal, account, candidate, now, timing)
    }

    pub fn confirm_addition(
        &mut self,
        candidate: Address,
        now: u64,
        timing: ConfirmationWindow,
    ) -> Result<()> {
        self.confirm(Change::Addition, candidate, now, timing)
    }

    pub fn confirm_removal(
        &mut self,
        candidate: Address,
        now: u64,
        timing: ConfirmationWindow,
    ) -> Result<()> {
        self.confirm(Change::Removal, candidate, now, timing)
    }

    pub fn cancel_addition(&mut self, candidate: Address) -> Result<()> {
        self.pending_additions
            .remove(&candidate)
            .map(|_| ())
            .ok_or(AccountError::UnknownPendingAddition(candidate))
    }

    pub fn cancel_removal(&mut self, candidate: Address) -> Result<()> {
        self.pending_removals
            .remove(&candidate)
            .map(|_| ())
            .ok_or(AccountError::UnknownPendingRemoval(candidate))
    }

    fn pending_mut(&mut self, change: Change) -> &mut BTreeMap<Address, u64> {
        match change {
            Change::Addition => &mut self.pending_additions,
            Change::Removal => &mut self.pending_removals,
        }
    }

    fn request(
        &mut self,
        change: Change,
        account: &Address,
        candidate: Address,
        now: u64,
        timing: ConfirmationWindow,
    ) -> Result<()> {
        if candidate.is_reserved() {
            return Err(AccountError::InvalidGuardianAddress(candidate));
        }
        if candidate == *account {
            return Err(AccountError::GuardianCannotBeSelf);
        }
        match change {
            Change::Addition if self.contains(&candidate) => {
                return Err(AccountError::DuplicateGuardian(candidate))
            }
            Change::Removal if !self.contains(&candidate) => {
                return Err(AccountError::NonExistentGuardian(candidate))
            }
            _ => {}
        }

        let pending = self.pending_mut(change);
        if let Some(requested_at) = pending.get(&candidate) {
            if timing.state(*requested_at, now) != WindowState::Expired {
                return Err(match change {
                    Change::Addition => AccountError::DuplicateGuardianAddition(candidate),
                    Change::Removal => AccountError::DuplicateGuardianRemoval(candidate),
                });
            }
        }
        pending.insert(candidate, now);
        Ok(())
    }

    fn confirm(
        &mut self,
        change: Change,
        candidate: Address,
        now: u64,
        timing: ConfirmationWindow,
    ) -> Result<()> {
        let requested_at = match change {
            Change::Addition => self
                .pending_addition(&candidate)
                .ok_or(AccountError::UnknownPendingAddition(candidate))?,
            Change::Removal => self
                .pending_removal(&candidate)
                .ok_or(AccountError::UnknownPendingRemoval(candidate))?,
        };

        match (change, timing.state(requested_at, now)) {
            (Change::Addition, WindowState::NotOver) => {
                Err(AccountError::PendingAdditionNotOver(candidate))
            }
            (Change::Addition, WindowState::Expired) => {
                Err(AccountError::PendingAdditionExpired(candidate))
            }
            (Change::Removal, WindowState::NotOver) => {
                Err(AccountError::PendingRemovalNotOver(candidate))
            }
            (Change::Removal, WindowState::Expired) => {
                Err(AccountError::PendingRemovalExpired(candidate))
            }
            (Change::Addition, WindowState::Open) => {
                self.pending_additions.remove(&candidate);
                if !self.guardians.insert(candidate) {
                    return Err(AccountError::DuplicateGuardian(candidate));
                }
                Ok(())
            }
            (Change::Removal, WindowState::Open) => {
                self.pending_removals.remove(&candidate);
                if !self.guardians.remove(&candidate) {
                    return Err(AccountError::NonExistentGuardian(candidate));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: Address = Address([0xaa; 20]);
    const G1: Address = Address([0x01; 20]);
    const G2: Address = Address([0x02; 20]);
    const TIMING: ConfirmationWindow = ConfirmationWindow {
        period: 100,
        window: 50,
    };

    #[test]
    fn test_majority_table() {
        assert_eq!(majority_of(0), 0);
        assert_eq!(majority_of(1), 1);
        assert_eq!(majority_of(2), 2);
        assert_eq!(majority_of(3), 2);
        assert_eq!(majority_of(4), 3);
        assert_eq!(majority_of(5), 3);
    }

    #[test]
    fn test_window_boundaries() {
        assert_eq!(TIMING.state(1000, 1099), WindowState::NotOver);
        assert_eq!(TIMING.state(1000, 1100), WindowState::Open);
        assert_eq!(TIMING.state(1000, 1149), WindowState::Open);
        assert_eq!(TIMING.state(1000, 1150), WindowState::Expired);
    }

    #[test]
    fn test_request_validation() {
        let mut set = GuardianSet::new();
        assert!(matches!(
            set.request_addition(&ACCOUNT, Address::ZERO, 0, TIMING),
            Err(AccountError::InvalidGuardianAddress(_))
        ));
        assert!(matches!(
            set.request_addition(&ACCOUNT, Address::SENTINEL, 0, TIMING),
            Err(AccountError::InvalidGuardianAddress(_))
        ));
        assert!(matches!(
            set.request_addition(&ACCOUNT, ACCOUNT, 0, TIMING),
            Err(AccountError::GuardianCannotBeSelf)
        ));
        assert!(matches!(
            set.request_removal(&ACCOUNT, G1, 0, TIMING),
            Err(AccountError::NonExistentGuardian(_))
        ));

        set.request_addition(&ACCOUNT, G1, 0, TIMING).unwrap();
        assert!(matches!(
            set.request_addition(&ACCOUNT, G1, 10, TIMING),
            Err(AccountError::DuplicateGuardianAddition(_))
        ));
    }

    #[test]
    fn test_addition_lifecycle() {
        let mut set = GuardianSet::new();
        set.request_addition(&ACCOUNT, G1, 1000, TIMING).unwrap();

        assert!(matches!(
            set.confirm_addition(G1, 1099, TIMING),
            Err(AccountError::PendingAdditionNotOver(_))
        ));
        set.confirm_addition(G1, 1100, TIMING).unwrap();

        assert!(set.contains(&G1));
        assert_eq!(set.pending_addition(&G1), None);
        assert!(matches!(
            set.request_addition(&ACCOUNT, G1, 2000, TIMING),
            Err(AccountError::DuplicateGuardian(_))
        ));
    }

    #[test]
    fn test_expired_addition_can_be_re_requested() {
        let mut set = GuardianSet::new();
        set.request_addition(&ACCOUNT, G1, 1000, TIMING).unwrap();
        assert!(matches!(
            set.confirm_addition(G1, 1150, TIMING),
            Err(AccountError::PendingAdditionExpired(_))
        ));

        // The stale entry stays until replaced
        assert_eq!(set.pending_addition(&G1), Some(1000));
        set.request_addition(&ACCOUNT, G1, 1150, TIMING).unwrap();
        assert_eq!(set.pending_addition(&G1), Some(1150));
    }

    #[test]
    fn test_re_request_uses_current_window() {
        let mut set = GuardianSet::new();
        set.request_addition(&ACCOUNT, G1, 1000, TIMING).unwrap();

        // a wider window keeps the old entry live
        let widened = ConfirmationWindow::new(TIMING.period, TIMING.window * 10);
        assert!(matches!(
            set.request_addition(&ACCOUNT, G1, 1150, widened),
            Err(AccountError::DuplicateGuardianAddition(_))
        ));
        set.confirm_addition(G1, 1150, widened).unwrap();
        assert!(set.contains(&G1));
    }

    #[test]
    fn test_removal_lifecycle_and_cancel() {
        let mut set = GuardianSet::new();
        for g in [G1, G2] {
            set.request_addition(&ACCOUNT, g, 0, TIMING).unwrap();
            set.confirm_addition(g, 100, TIMING).unwrap();
        }

        set.request_removal(&ACCOUNT, G1, 200, TIMING).unwrap();
        set.cancel_removal(G1).unwrap();
        assert!(matches!(
            set.cancel_removal(G1),
            Err(AccountError::UnknownPendingRemoval(_))
        ));
        assert!(matches!(
            set.confirm_removal(G1, 300, TIMING),
            Err(AccountError::UnknownPendingRemoval(_))
        ));

        set.request_removal(&ACCOUNT, G2, 200, TIMING).unwrap();
        assert!(matches!(
            set.confirm_removal(G2, 350, TIMING),
            Err(AccountError::PendingRemovalExpired(_))
        ));
        set.confirm_removal(G2, 349, TIMING).unwrap();

        assert_eq!(set.to_vec(), vec![G1]);
        assert_eq!(set.majority(), 1);
    }
}
