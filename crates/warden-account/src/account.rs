//! Per-account state aggregate and the call context

use std::collections::HashMap;

use tracing::debug;
use warden_core::{is_signed_by, personal_message_hash, Address, Bytes32, ChainId};

use crate::approval::ApprovalLedger;
use crate::error::{AccountError, Result};
use crate::guardian::{ConfirmationWindow, GuardianSet};
use crate::migration::{MigrationRequest, PendingMigration};
use crate::module::{ActiveSigner, ContractSignatureValidator, ModuleAllowList, ModuleRegistry};
use crate::policy::{PolicyOverrides, PolicyParam, PolicyStore};

/// Maximum depth of account-owned-by-account signature checks
pub const MAX_NESTED_SIGNER_DEPTH: u8 = 4;

/// Caller identity and the single time sample used for a whole call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub sender: Address,
    pub timestamp: u64,
}

impl Call {
    pub fn new(sender: Address, timestamp: u64) -> Self {
        Self { sender, timestamp }
    }

    /// Fail unless the account is acting on its own behalf
    pub fn require_self(&self, account: &Address) -> Result<()> {
        if self.sender != *account {
            return Err(AccountError::CallerNotSelf(self.sender));
        }
        Ok(())
    }
}

/// Everything the security core stores for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub(crate) signer: ActiveSigner,
    pub(crate) guardians: GuardianSet,
    pub(crate) policy: PolicyOverrides,
    pub(crate) pending_migration: Option<PendingMigration>,
    pub(crate) migration_nonce: u64,
    pub(crate) approvals: ApprovalLedger,
}

impl AccountState {
    pub(crate) fn new(signer: ActiveSigner) -> Self {
        Self {
            signer,
            guardians: GuardianSet::new(),
            policy: PolicyOverrides::new(),
            pending_migration: None,
            migration_nonce: 0,
            approvals: ApprovalLedger::new(),
        }
    }

    pub fn signer(&self) -> &ActiveSigner {
        &self.signer
    }

    pub fn guardians(&self) -> &GuardianSet {
        &self.guardians
    }

    pub fn policy_overrides(&self) -> &PolicyOverrides {
        &self.policy
    }

    pub fn pending_migration(&self) -> Option<&PendingMigration> {
        self.pending_migration.as_ref()
    }

    pub fn migration_nonce(&self) -> u64 {
        self.migration_nonce
    }

    pub fn approvals(&self) -> &ApprovalLedger {
        &self.approvals
    }
}

/// Read-only view of everything outside the account being mutated
#[derive(Clone, Copy)]
pub(crate) struct Host<'a> {
    pub chain_id: ChainId,
    pub policy: &'a PolicyStore,
    pub allow_list: &'a dyn ModuleAllowList,
    pub modules: &'a ModuleRegistry,
    pub accounts: &'a HashMap<Address, AccountState>,
    pub depth: u8,
}

impl Host<'_> {
    pub fn policy_of(&self, state: &AccountState, param: PolicyParam) -> Result<u64> {
        self.policy.of(&state.policy, param)
    }

    pub fn confirmation(
        &self,
        state: &AccountState,
        period: PolicyParam,
    ) -> Result<ConfirmationWindow> {
        Ok(ConfirmationWindow::new(
            self.policy_of(state, period)?,
            self.policy_of(state, PolicyParam::SecurityWindow)?,
        ))
    }

    /// Key format and allow-list checks on a migration target
    pub fn validate_target(&self, request: &MigrationRequest) -> Result<()> {
        let module = self.modules.get(request.module)?;
        if !module.is_valid_key_type(&request.key_material) {
            return Err(AccountError::InvalidKeyType(request.module));
        }
        if !self
            .allow_list
            .is_registered(request.module, &request.capabilities)
        {
            return Err(AccountError::UnregisteredFacetAndSelectors(request.module));
        }
        Ok(())
    }

    /// Check an owner signature through the account's active module
    pub fn verify_owner(&self, signer: &ActiveSigner, hash: &Bytes32, signature: &[u8]) -> bool {
        match self.modules.get(signer.module) {
            Ok(module) => module.validate_owner_signature(&signer.state, hash, signature, self),
            Err(e) => {
                debug!("Owner signature check skipped: {}", e);
                false
            }
        }
    }

    /// Check a guardian signature: a key signing the personal-message hash,
    /// or a guardian that is itself an account
    pub fn verify_guardian(&self, guardian: &Address, hash: &Bytes32, signature: &[u8]) -> bool {
        is_signed_by(&personal_message_hash(hash), signature, guardian)
            || self.is_valid_signature(guardian, hash, signature)
    }
}

impl ContractSignatureValidator for Host<'_> {
    fn is_valid_signature(&self, signer: &Address, hash: &Bytes32, signature: &[u8]) -> bool {
        if self.depth >= MAX_NESTED_SIGNER_DEPTH {
            debug!(signer = %signer, "Nested signer depth exceeded");
            return false;
        }
        let Some(nested) = self.accounts.get(signer) else {
            return false;
        };
        let deeper = Host {
            depth: self.depth + 1,
            ..*self
        };
        deeper.verify_owner(&nested.signer, hash, signature)
    }
}
