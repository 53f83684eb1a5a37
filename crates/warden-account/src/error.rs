//! Error types for account security operations

use thiserror::Error;
use warden_core::{Address, ModuleId};

use crate::policy::PolicyParam;

/// Result type alias for account operations
pub type Result<T> = std::result::Result<T, AccountError>;

/// Failure class of an [`AccountError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, reserved or duplicate identities
    Validation,
    /// Caller is not the account, an owner, or a guardian
    Authorization,
    /// Too early, expired, nothing pending, or already pending
    Temporal,
    /// Module or capability set missing from the allow-list
    AllowList,
    /// Bad recovered signer or not enough approvals
    Quorum,
    /// Configuration, IO, or primitive failures
    Internal,
}

/// Errors that can occur in account security operations
#[derive(Debug, Error)]
pub enum AccountError {
    /// Core primitive error
    #[error("Core error: {0}")]
    Core(#[from] warden_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ---- accounts ----
    #[error("Unknown account: {0}")]
    UnknownAccount(Address),

    #[error("Account already exists: {0}")]
    AccountExists(Address),

    #[error("Invalid account identity: {0}")]
    InvalidAccount(Address),

    #[error("Caller {0} is not the account itself")]
    CallerNotSelf(Address),

    // ---- policy ----
    #[error("Policy parameter already initialized: {0:?}")]
    AlreadyInitialized(PolicyParam),

    #[error("Policy parameter not initialized: {0:?}")]
    PolicyNotInitialized(PolicyParam),

    #[error("Invalid policy bounds for {param:?}: min={min} default={default} max={max}")]
    InvalidPolicyBounds {
        param: PolicyParam,
        default: u64,
        min: u64,
        max: u64,
    },

    #[error("Value {value} for {param:?} outside ({min}, {max})")]
    OutOfBoundary {
        param: PolicyParam,
        value: u64,
        min: u64,
        max: u64,
    },

    // ---- guardians ----
    #[error("Invalid guardian address: {0}")]
    InvalidGuardianAddress(Address),

    #[error("Guardian cannot be the account itself")]
    GuardianCannotBeSelf,

    #[error("Already a guardian: {0}")]
    DuplicateGuardian(Address),

    #[error("Not a guardian: {0}")]
    NonExistentGuardian(Address),

    #[error("Guardian addition already pending: {0}")]
    DuplicateGuardianAddition(Address),

    #[error("Guardian removal already pending: {0}")]
    DuplicateGuardianRemoval(Address),

    #[error("No pending guardian addition: {0}")]
    UnknownPendingAddition(Address),

    #[error("No pending guardian removal: {0}")]
    UnknownPendingRemoval(Address),

    #[error("Pending guardian addition not over: {0}")]
    PendingAdditionNotOver(Address),

    #[error("Pending guardian addition expired: {0}")]
    PendingAdditionExpired(Address),

    #[error("Pending guardian removal not over: {0}")]
    PendingRemovalNotOver(Address),

    #[error("Pending guardian removal expired: {0}")]
    PendingRemovalExpired(Address),

    // ---- approvals ----
    #[error("Caller {0} is neither the owner nor a guardian")]
    CallerNotOwnerOrGuardian(Address),

    #[error("Approvers and signatures differ in length: {approvers} != {signatures}")]
    InvalidArrayLength { approvers: usize, signatures: usize },

    #[error("Duplicate approver: {0}")]
    DuplicateApprover(Address),

    #[error("Approver is neither the owner nor a guardian: {0}")]
    NonExistentApprover(Address),

    #[error("Invalid approver signature: {0}")]
    InvalidApproverSignature(Address),

    #[error("Approval already recorded for {0}")]
    DuplicateApproval(Address),

    #[error("Insufficient approvers: {approvals} of {required} guardian approvals")]
    InsufficientApprovers { approvals: usize, required: usize },

    #[error("No approval to revoke for {0}")]
    CannotRevokeUnapproved(Address),

    #[error("Owner approval missing")]
    LackOfOwnerApproval,

    // ---- migration ----
    #[error("Unknown verification module: {0}")]
    UnknownModule(ModuleId),

    #[error("Key material rejected by module {0}")]
    InvalidKeyType(ModuleId),

    #[error("Module {0} and capability set are not allow-listed")]
    UnregisteredFacetAndSelectors(ModuleId),

    #[error("Account has guardians; use the guardian approval route")]
    InvalidRouteWithGuardian,

    #[error("No pending migration")]
    NonexistentMigration,

    #[error("Migration already pending")]
    PendingMigrationExists,

    #[error("Request does not match the pending migration")]
    PendingMigrationMismatch,

    #[error("Migration period not over: executable at {execute_at}, now {now}")]
    MigrationPeriodNotOver { execute_at: u64, now: u64 },

    // ---- multi-signature ----
    #[error("Active signer is not a multi-signature owner set")]
    SignerNotMultiSig,

    #[error("Invalid owner payload: {0}")]
    InvalidOwnerPayload(String),

    #[error("Invalid threshold {threshold} for {owners} owners")]
    InvalidThreshold { threshold: u32, owners: usize },

    #[error("Invalid owner address: {0}")]
    InvalidOwnerAddress(Address),

    #[error("Duplicate owner: {0}")]
    DuplicateOwner(Address),

    #[error("{prev} does not precede {owner}")]
    InvalidOwnerPair { prev: Address, owner: Address },

    #[error("Caller {0} is not a multi-signature owner")]
    CallerNotMultiSigOwner(Address),

    #[error("Signature container truncated at offset {0}")]
    InsufficientSignerLength(usize),

    #[error("Invalid signature type: {0}")]
    InvalidSignatureType(u8),

    #[error("Invalid signature length {len} for type {sig_type}")]
    InvalidSignatureLength { sig_type: u8, len: usize },
}

impl AccountError {
    /// Classify this error for callers deciding whether to wait, re-sign, or give up
    pub fn kind(&self) -> ErrorKind {
        use AccountError::*;
        match self {
            Core(_) | Io(_) | Config(_) | AlreadyInitialized(_) | PolicyNotInitialized(_)
            | InvalidPolicyBounds { .. } => ErrorKind::Internal,

            CallerNotSelf(_)
            | CallerNotOwnerOrGuardian(_)
            | CallerNotMultiSigOwner(_)
            | InvalidRouteWithGuardian => ErrorKind::Authorization,

            DuplicateGuardianAddition(_)
            | DuplicateGuardianRemoval(_)
            | UnknownPendingAddition(_)
            | UnknownPendingRemoval(_)
            | PendingAdditionNotOver(_)
            | PendingAdditionExpired(_)
            | PendingRemovalNotOver(_)
            | PendingRemovalExpired(_)
            | NonexistentMigration
            | PendingMigrationExists
            | MigrationPeriodNotOver { .. } => ErrorKind::Temporal,

            UnregisteredFacetAndSelectors(_) | UnknownModule(_) => ErrorKind::AllowList,

            InvalidApproverSignature(_)
            | InsufficientApprovers { .. }
            | LackOfOwnerApproval
            | DuplicateApproval(_)
            | CannotRevokeUnapproved(_) => ErrorKind::Quorum,

            _ => ErrorKind::Validation,
        }
    }
}

impl From<toml::de::Error> for AccountError {
    fn from(e: toml::de::Error) -> Self {
        AccountError::Config(e.to_string())
    }
}
