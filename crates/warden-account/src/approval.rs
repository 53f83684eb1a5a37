//! Approval ledger for guardian-gated operations
//!
//! Approvals arrive through two channels: direct calls by the owner or a
//! guardian, and bundles of signatures collected off-chain and submitted by
//! anyone. Both write into the same per-account ledger keyed by operation
//! hash and approver, and a single [`ApprovalLedger::tally`] decides quorum.
//! Entries expire lazily: an approval counts while
//! `recorded_at + validity > now` and is never swept.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_core::{keccak256, keccak256_multi, Address, Bytes32, ChainId};

use crate::error::{AccountError, Result};
use crate::guardian::GuardianSet;

/// What a gated operation is for; bound into its hash so a signature for
/// one purpose never satisfies another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Migrate,
    Cancel,
}

impl Purpose {
    pub fn tag(&self) -> &'static [u8] {
        match self {
            Purpose::Migrate => b"MigrateSignatureScheme",
            Purpose::Cancel => b"CancelSignatureMigration",
        }
    }
}

/// Digest identifying one instance of a gated operation
pub fn operation_hash(
    payload: &[u8],
    purpose: Purpose,
    account: &Address,
    chain_id: ChainId,
    nonce: u64,
) -> Bytes32 {
    let payload_hash = keccak256(payload);
    Bytes32::new(keccak256_multi(&[
        &payload_hash,
        purpose.tag(),
        account.as_bytes(),
        &chain_id.as_u64().to_be_bytes(),
        &nonce.to_be_bytes(),
    ]))
}

/// Who an approval was recorded for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approver {
    Owner,
    Guardian(Address),
}

impl Approver {
    /// Resolve an identity against the account and its current guardians
    pub fn resolve(account: &Address, guardians: &GuardianSet, who: &Address) -> Option<Self> {
        if who == account {
            Some(Approver::Owner)
        } else if guardians.contains(who) {
            Some(Approver::Guardian(*who))
        } else {
            None
        }
    }
}

/// Approvals recorded for one operation hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub owner_at: Option<u64>,
    pub guardians: BTreeMap<Address, u64>,
}

/// Time-valid approval count for one operation hash
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub owner_approved: bool,
    pub guardian_approvals: usize,
    /// Guardian majority at the time of the tally (0 without guardians)
    pub required: usize,
}

impl Tally {
    pub fn has_quorum(&self) -> bool {
        self.owner_approved && self.guardian_approvals >= self.required
    }

    pub fn require_owner(&self) -> Result<()> {
        if !self.owner_approved {
            return Err(AccountError::LackOfOwnerApproval);
        }
        Ok(())
    }

    pub fn require_quorum(&self) -> Result<()> {
        self.require_owner()?;
        if self.guardian_approvals < self.required {
            return Err(AccountError::InsufficientApprovers {
                approvals: self.guardian_approvals,
                required: self.required,
            });
        }
        Ok(())
    }
}

fn is_live(recorded_at: u64, now: u64, validity: u64) -> bool {
    recorded_at.saturating_add(validity) > now
}

/// Per-account approval ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLedger {
    entries: BTreeMap<Bytes32, ApprovalEntry>,
}

impl ApprovalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, hash: &Bytes32) -> Option<&ApprovalEntry> {
        self.entries.get(hash)
    }

    fn recorded_at(&self, hash: &Bytes32, approver: Approver) -> Option<u64> {
        let entry = self.entries.get(hash)?;
        match approver {
            Approver::Owner => entry.owner_at,
            Approver::Guardian(guardian) => entry.guardians.get(&guardian).copied(),
        }
    }

    /// Whether `approver` holds a time-valid approval for `hash`
    pub fn is_valid(&self, hash: &Bytes32, approver: Approver, now: u64, validity: u64) -> bool {
        self.recorded_at(hash, approver)
            .is_some_and(|at| is_live(at, now, validity))
    }

    fn record(&mut self, hash: Bytes32, approver: Approver, now: u64) {
        let entry = self.entries.entry(hash).or_default();
        match approver {
            Approver::Owner => entry.owner_at = Some(now),
            Approver::Guardian(guardian) => {
                entry.guardians.insert(guardian, now);
            }
        }
    }

    /// Record a time-stamped approval, refusing a second live one
    fn record_fresh(
        &mut self,
        hash: Bytes32,
        approver: Approver,
        who: Address,
        now: u64,
        validity: u64,
    ) -> Result<()> {
        if self.is_valid(&hash, approver, now, validity) {
            return Err(AccountError::DuplicateApproval(who));
        }
        self.record(hash, approver, now);
        Ok(())
    }

    /// Direct channel: the caller approves for itself
    pub fn approve_on_chain(
        &mut self,
        account: &Address,
        guardians: &GuardianSet,
        caller: Address,
        hash: Bytes32,
        now: u64,
        validity: u64,
    ) -> Result<Approver> {
        let approver = Approver::resolve(account, guardians, &caller)
            .ok_or(AccountError::CallerNotOwnerOrGuardian(caller))?;
        self.record_fresh(hash, approver, caller, now, validity)?;
        Ok(approver)
    }

    /// Bundled channel: ingest pre-collected signatures
    ///
    /// `verify` checks one approver's signature over `hash`; it is called
    /// only for identities that resolve to the owner or a current guardian.
    #[allow(clippy::too_many_arguments)]
    pub fn approve_bundled<F>(
        &mut self,
        account: &Address,
        guardians: &GuardianSet,
        hash: Bytes32,
        approvers: &[Address],
        signatures: &[Vec<u8>],
        now: u64,
        validity: u64,
        mut verify: F,
    ) -> Result<()>
    where
        F: FnMut(Approver, &Address, &[u8]) -> bool,
    {
        if approvers.len() != signatures.len() {
            return Err(AccountError::InvalidArrayLength {
                approvers: approvers.len(),
                signatures: signatures.len(),
            });
        }

        let mut seen = BTreeSet::new();
        for (who, signature) in approvers.iter().zip(signatures) {
            if !seen.insert(*who) {
                return Err(AccountError::DuplicateApprover(*who));
            }
            let approver = Approver::resolve(account, guardians, who)
                .ok_or(AccountError::NonExistentApprover(*who))?;
            if !verify(approver, who, signature) {
                debug!(approver = %who, hash = %hash.short(), "Rejected approver signature");
                return Err(AccountError::InvalidApproverSignature(*who));
            }
            self.record_fresh(hash, approver, *who, now, validity)?;
        }
        Ok(())
    }

    /// Remove the caller's own approval
    pub fn revoke(&mut self, account: &Address, caller: Address, hash: &Bytes32) -> Result<()> {
        let removed = match self.entries.get_mut(hash) {
            Some(entry) if caller == *account => entry.owner_at.take().is_some(),
            Some(entry) => entry.guardians.remove(&caller).is_some(),
            None => false,
        };
        if !removed {
            return Err(AccountError::CannotRevokeUnapproved(caller));
        }
        if self
            .entries
            .get(hash)
            .is_some_and(|e| e.owner_at.is_none() && e.guardians.is_empty())
        {
            self.entries.remove(hash);
        }
        Ok(())
    }

    /// Count time-valid approvals; guardians removed since approving do not count
    pub fn tally(&self, hash: &Bytes32, guardians: &GuardianSet, now: u64, validity: u64) -> Tally {
        let required = guardians.majority();
        let Some(entry) = self.entries.get(hash) else {
            return Tally {
                required,
                ..Tally::default()
            };
        };
        Tally {
            owner_approved: entry.owner_at.is_some_and(|at| is_live(at, now, validity)),
            guardian_approvals: entry
                .guardians
                .iter()
                .filter(|(g, at)| guardians.contains(g) && is_live(**at, now, validity))
                .count(),
            required,
        }
    }
}
