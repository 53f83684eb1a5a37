//! Warden Account - smart-account security and recovery state
//!
//! Guardian management with time-locked confirmation windows, a dual-channel
//! approval ledger, two-phase signature-scheme migration, and the
//! verification modules accounts authorize through. [`Warden`] owns the
//! per-account state and is the entry point for every operation.

pub mod account;
pub mod approval;
pub mod config;
pub mod error;
pub mod events;
pub mod guardian;
pub mod migration;
pub mod module;
pub mod multisig;
pub mod policy;
pub mod warden;

pub use account::{AccountState, Call, MAX_NESTED_SIGNER_DEPTH};
pub use approval::{operation_hash, ApprovalEntry, ApprovalLedger, Approver, Purpose, Tally};
pub use config::{PolicyConfig, WardenConfig};
pub use error::{AccountError, ErrorKind, Result};
pub use events::Event;
pub use guardian::{majority_of, ConfirmationWindow, GuardianSet, WindowState};
pub use migration::{MigrationRequest, PendingMigration};
pub use module::{
    selectors, ActiveSigner, ContractSignatureValidator, ModuleAllowList, ModuleRegistry,
    NoContractSigners, Secp256k1Verifier, SignerState, StaticAllowList, VerificationModule,
};
pub use multisig::{
    encode_owner_payload, parse_owner_payload, split_signatures, MultiSigState, MultiSigVerifier,
    OwnerSet, SignatureContainer, SignatureTuple, SignatureType, SignatureValidation,
};
pub use policy::{PolicyBounds, PolicyOverrides, PolicyParam, PolicyStore};
pub use warden::Warden;
