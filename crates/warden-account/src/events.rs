//! Events emitted by committed operations

use serde::{Deserialize, Serialize};
use warden_core::{Address, Bytes32, ModuleId};

use crate::approval::Purpose;
use crate::policy::PolicyParam;

/// State change notification, appended to the engine's log when a call commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    PolicyInitialized {
        param: PolicyParam,
        default: u64,
        min: u64,
        max: u64,
    },
    PolicyChanged {
        account: Address,
        param: PolicyParam,
        value: u64,
    },

    AccountCreated {
        account: Address,
        module: ModuleId,
    },

    GuardianAdditionRequested {
        account: Address,
        guardian: Address,
        requested_at: u64,
    },
    GuardianAdded {
        account: Address,
        guardian: Address,
    },
    GuardianAdditionCancelled {
        account: Address,
        guardian: Address,
    },
    GuardianRemovalRequested {
        account: Address,
        guardian: Address,
        requested_at: u64,
    },
    GuardianRemoved {
        account: Address,
        guardian: Address,
    },
    GuardianRemovalCancelled {
        account: Address,
        guardian: Address,
    },

    ApprovalRecorded {
        account: Address,
        purpose: Purpose,
        hash: Bytes32,
        approver: Address,
    },
    ApprovalRevoked {
        account: Address,
        purpose: Purpose,
        hash: Bytes32,
        approver: Address,
    },

    MigrationExecuted {
        account: Address,
        module: ModuleId,
        execute_at: u64,
        nonce: u64,
    },
    SchemeMigration {
        account: Address,
        from: ModuleId,
        to: ModuleId,
    },
    MigrationCanceled {
        account: Address,
        module: ModuleId,
        nonce: u64,
    },

    OwnerAdded {
        account: Address,
        owner: Address,
    },
    OwnerRemoved {
        account: Address,
        owner: Address,
    },
    ChangedThreshold {
        account: Address,
        threshold: u32,
    },
    HashApproved {
        account: Address,
        owner: Address,
        hash: Bytes32,
    },
}

impl Event {
    /// Account the event belongs to, `None` for global policy events
    pub fn account(&self) -> Option<Address> {
        match self {
            Event::PolicyInitialized { .. } => None,
            Event::PolicyChanged { account, .. }
            | Event::AccountCreated { account, .. }
            | Event::GuardianAdditionRequested { account, .. }
            | Event::GuardianAdded { account, .. }
            | Event::GuardianAdditionCancelled { account, .. }
            | Event::GuardianRemovalRequested { account, .. }
            | Event::GuardianRemoved { account, .. }
            | Event::GuardianRemovalCancelled { account, .. }
            | Event::ApprovalRecorded { account, .. }
            | Event::ApprovalRevoked { account, .. }
            | Event::MigrationExecuted { account, .. }
            | Event::SchemeMigration { account, .. }
            | Event::MigrationCanceled { account, .. }
            | Event::OwnerAdded { account, .. }
            | Event::OwnerRemoved { account, .. }
            | Event::ChangedThreshold { account, .. }
            | Event::HashApproved { account, .. } => Some(*account),
        }
    }
}
