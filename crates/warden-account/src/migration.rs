//! Signature-scheme migration
//!
//! Replacing an account's verification module is a two-phase operation.
//! An approved request records a [`PendingMigration`] that becomes
//! executable after the migration period; finalization tears down the
//! outgoing module and installs the incoming one. Accounts without
//! guardians migrate on the owner's word alone; accounts with guardians
//! need the owner plus a guardian majority, gathered on-chain, off-chain, or
//! both. Cancellation mirrors the same approval flow under its own purpose.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warden_core::{Address, Bytes32, ModuleId, Selector};

use crate::account::{AccountState, Call, Host};
use crate::approval::{operation_hash, Approver, Purpose, Tally};
use crate::error::{AccountError, Result};
use crate::events::Event;
use crate::module::{selectors, ActiveSigner, ModuleAllowList};
use crate::policy::PolicyParam;
use crate::warden::Warden;

/// Target of a migration: module, key material, and exposed capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub module: ModuleId,
    pub key_material: Vec<u8>,
    pub capabilities: Vec<Selector>,
}

impl MigrationRequest {
    pub fn new(module: ModuleId, key_material: Vec<u8>, capabilities: Vec<Selector>) -> Self {
        Self {
            module,
            key_material,
            capabilities,
        }
    }

    /// Canonical payload hashed into the operation hash
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            Address::LEN + 8 + self.key_material.len() + self.capabilities.len() * 4,
        );
        out.extend_from_slice(self.module.address().as_bytes());
        out.extend_from_slice(&(self.key_material.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.key_material);
        out.extend_from_slice(&(self.capabilities.len() as u32).to_be_bytes());
        for selector in &self.capabilities {
            out.extend_from_slice(selector.as_bytes());
        }
        out
    }
}

/// Approved migration waiting for finalization; zero-valued when none
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMigration {
    pub module: ModuleId,
    pub key_material: Vec<u8>,
    pub capabilities: Vec<Selector>,
    pub execute_at: u64,
}

impl PendingMigration {
    pub fn is_none(&self) -> bool {
        *self == PendingMigration::default()
    }

    pub fn request(&self) -> MigrationRequest {
        MigrationRequest::new(self.module, self.key_material.clone(), self.capabilities.clone())
    }

    fn matches(&self, request: &MigrationRequest) -> bool {
        self.module == request.module
            && self.key_material == request.key_material
            && self.capabilities == request.capabilities
    }
}

fn gated_hash(
    host: &Host<'_>,
    account: &Address,
    state: &AccountState,
    purpose: Purpose,
    request: &MigrationRequest,
) -> Bytes32 {
    operation_hash(
        &request.encode(),
        purpose,
        account,
        host.chain_id,
        state.migration_nonce,
    )
}

fn ensure_not_pending(state: &AccountState) -> Result<()> {
    if state.pending_migration.is_some() {
        return Err(AccountError::PendingMigrationExists);
    }
    Ok(())
}

fn ensure_pending_matches(state: &AccountState, request: &MigrationRequest) -> Result<()> {
    match &state.pending_migration {
        None => Err(AccountError::NonexistentMigration),
        Some(pending) if !pending.matches(request) => Err(AccountError::PendingMigrationMismatch),
        Some(_) => Ok(()),
    }
}

fn ensure_no_guardians(state: &AccountState) -> Result<()> {
    if !state.guardians.is_empty() {
        return Err(AccountError::InvalidRouteWithGuardian);
    }
    Ok(())
}

fn execute_migration(
    host: &Host<'_>,
    account: Address,
    state: &mut AccountState,
    request: &MigrationRequest,
    now: u64,
    events: &mut Vec<Event>,
) -> Result<()> {
    ensure_not_pending(state)?;
    let period = host.policy_of(state, PolicyParam::MigrationPeriod)?;
    let execute_at = now.saturating_add(period);

    state.pending_migration = Some(PendingMigration {
        module: request.module,
        key_material: request.key_material.clone(),
        capabilities: request.capabilities.clone(),
        execute_at,
    });
    state.migration_nonce += 1;

    events.push(Event::MigrationExecuted {
        account,
        module: request.module,
        execute_at,
        nonce: state.migration_nonce,
    });
    Ok(())
}

fn execute_cancellation(
    account: Address,
    state: &mut AccountState,
    events: &mut Vec<Event>,
) -> Result<()> {
    let pending = state
        .pending_migration
        .take()
        .ok_or(AccountError::NonexistentMigration)?;
    state.migration_nonce += 1;

    events.push(Event::MigrationCanceled {
        account,
        module: pending.module,
        nonce: state.migration_nonce,
    });
    Ok(())
}

/// Record a direct approval and report the resulting tally
fn record_on_chain(
    host: &Host<'_>,
    call: &Call,
    account: Address,
    state: &mut AccountState,
    purpose: Purpose,
    hash: Bytes32,
    events: &mut Vec<Event>,
) -> Result<Tally> {
    let validity = host.policy_of(state, PolicyParam::ApprovalValidityPeriod)?;
    state.approvals.approve_on_chain(
        &account,
        &state.guardians,
        call.sender,
        hash,
        call.timestamp,
        validity,
    )?;
    events.push(Event::ApprovalRecorded {
        account,
        purpose,
        hash,
        approver: call.sender,
    });
    Ok(state
        .approvals
        .tally(&hash, &state.guardians, call.timestamp, validity))
}

/// Ingest a signature bundle, which must carry the owner, and report the
/// resulting tally
#[allow(clippy::too_many_arguments)]
fn record_bundle(
    host: &Host<'_>,
    call: &Call,
    account: Address,
    state: &mut AccountState,
    purpose: Purpose,
    hash: Bytes32,
    approvers: &[Address],
    signatures: &[Vec<u8>],
    events: &mut Vec<Event>,
) -> Result<Tally> {
    if !approvers.contains(&account) {
        return Err(AccountError::LackOfOwnerApproval);
    }
    let validity = host.policy_of(state, PolicyParam::ApprovalValidityPeriod)?;
    let signer = &state.signer;
    state.approvals.approve_bundled(
        &account,
        &state.guardians,
        hash,
        approvers,
        signatures,
        call.timestamp,
        validity,
        |approver, who, signature| match approver {
            Approver::Owner => host.verify_owner(signer, &hash, signature),
            Approver::Guardian(_) => host.verify_guardian(who, &hash, signature),
        },
    )?;
    events.extend(approvers.iter().map(|approver| Event::ApprovalRecorded {
        account,
        purpose,
        hash,
        approver: *approver,
    }));
    Ok(state
        .approvals
        .tally(&hash, &state.guardians, call.timestamp, validity))
}

fn revoke(
    call: &Call,
    account: Address,
    state: &mut AccountState,
    purpose: Purpose,
    hash: Bytes32,
    events: &mut Vec<Event>,
) -> Result<()> {
    state.approvals.revoke(&account, call.sender, &hash)?;
    events.push(Event::ApprovalRevoked {
        account,
        purpose,
        hash,
        approver: call.sender,
    });
    Ok(())
}

impl<L: ModuleAllowList> Warden<L> {
    /// Operation hash approvers sign to migrate `account` to `request`
    pub fn migration_hash(&self, account: Address, request: &MigrationRequest) -> Result<Bytes32> {
        self.inspect(account, |host, state| {
            gated_hash(&host, &account, state, Purpose::Migrate, request)
        })
    }

    /// Operation hash approvers sign to cancel the pending `request`
    pub fn cancellation_hash(
        &self,
        account: Address,
        request: &MigrationRequest,
    ) -> Result<Bytes32> {
        self.inspect(account, |host, state| {
            gated_hash(&host, &account, state, Purpose::Cancel, request)
        })
    }

    /// Time-valid approvals for `hash` at `now`
    pub fn approval_count(&self, account: Address, hash: &Bytes32, now: u64) -> Result<Tally> {
        let state = self.state(account)?;
        let validity = self
            .policy_store()
            .of(&state.policy, PolicyParam::ApprovalValidityPeriod)?;
        Ok(state.approvals.tally(hash, &state.guardians, now, validity))
    }

    pub fn pending_migration(&self, account: Address) -> Result<PendingMigration> {
        Ok(self
            .state(account)?
            .pending_migration
            .clone()
            .unwrap_or_default())
    }

    pub fn migration_nonce(&self, account: Address) -> Result<u64> {
        Ok(self.state(account)?.migration_nonce)
    }

    /// Owner-only migration for accounts without guardians
    pub fn migrate(
        &mut self,
        call: Call,
        account: Address,
        request: &MigrationRequest,
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            call.require_self(&account)?;
            host.validate_target(request)?;
            ensure_no_guardians(state)?;
            execute_migration(&host, account, state, request, call.timestamp, events)
        })
    }

    /// Migration backed by a bundle of owner and guardian signatures
    pub fn migrate_with_guardian_approvals(
        &mut self,
        call: Call,
        account: Address,
        request: &MigrationRequest,
        approvers: &[Address],
        signatures: &[Vec<u8>],
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            host.validate_target(request)?;
            ensure_not_pending(state)?;
            let hash = gated_hash(&host, &account, state, Purpose::Migrate, request);
            let tally = record_bundle(
                &host, &call, account, state, Purpose::Migrate, hash, approvers, signatures, events,
            )?;
            tally.require_quorum()?;
            execute_migration(&host, account, state, request, call.timestamp, events)
        })
    }

    /// Direct approval by the owner or a guardian; executes the migration
    /// once quorum is reached and returns whether it did
    pub fn approve_migration(
        &mut self,
        call: Call,
        account: Address,
        request: &MigrationRequest,
    ) -> Result<bool> {
        self.transact(account, |host, state, events| {
            host.validate_target(request)?;
            ensure_not_pending(state)?;
            let hash = gated_hash(&host, &account, state, Purpose::Migrate, request);
            let tally =
                record_on_chain(&host, &call, account, state, Purpose::Migrate, hash, events)?;
            if !tally.has_quorum() {
                debug!(
                    account = %account,
                    approvals = tally.guardian_approvals,
                    required = tally.required,
                    owner = tally.owner_approved,
                    "Migration approval recorded"
                );
                return Ok(false);
            }
            execute_migration(&host, account, state, request, call.timestamp, events)?;
            Ok(true)
        })
    }

    pub fn revoke_migration_approval(
        &mut self,
        call: Call,
        account: Address,
        request: &MigrationRequest,
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            let hash = gated_hash(&host, &account, state, Purpose::Migrate, request);
            revoke(&call, account, state, Purpose::Migrate, hash, events)
        })
    }

    /// Install the pending migration once its period is over
    pub fn finalize_migration(&mut self, call: Call, account: Address) -> Result<()> {
        self.transact(account, |host, state, events| {
            let pending = state
                .pending_migration
                .clone()
                .ok_or(AccountError::NonexistentMigration)?;
            if call.timestamp < pending.execute_at {
                return Err(AccountError::MigrationPeriodNotOver {
                    execute_at: pending.execute_at,
                    now: call.timestamp,
                });
            }
            host.validate_target(&pending.request())?;

            let outgoing = state.signer.module;
            if state.signer.exposes(&selectors::uninit_signer()) {
                match host.modules.get(outgoing) {
                    Ok(module) => module.uninit_signer(&mut state.signer.state)?,
                    Err(e) => {
                        warn!(account = %account, "Outgoing module unavailable for teardown: {}", e)
                    }
                }
            } else {
                debug!(
                    account = %account,
                    module = %outgoing,
                    "Outgoing module exposes no teardown hook"
                );
            }

            let incoming = host.modules.get(pending.module)?;
            let signer_state = incoming.init_signer(&pending.key_material)?;
            state.signer = ActiveSigner {
                module: pending.module,
                key_material: pending.key_material,
                capabilities: pending.capabilities,
                state: signer_state,
            };
            state.pending_migration = None;

            info!(
                account = %account,
                from = %outgoing,
                to = %pending.module,
                "Signature scheme migrated"
            );
            events.push(Event::SchemeMigration {
                account,
                from: outgoing,
                to: pending.module,
            });
            Ok(())
        })
    }

    /// Owner-only cancellation for accounts without guardians
    pub fn cancel_migration(
        &mut self,
        call: Call,
        account: Address,
        request: &MigrationRequest,
    ) -> Result<()> {
        self.transact(account, |_, state, events| {
            call.require_self(&account)?;
            ensure_pending_matches(state, request)?;
            ensure_no_guardians(state)?;
            execute_cancellation(account, state, events)
        })
    }

    /// Cancellation backed by a bundle that must include the owner
    pub fn cancel_migration_with_guardian_approvals(
        &mut self,
        call: Call,
        account: Address,
        request: &MigrationRequest,
        approvers: &[Address],
        signatures: &[Vec<u8>],
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            ensure_pending_matches(state, request)?;
            let hash = gated_hash(&host, &account, state, Purpose::Cancel, request);
            let tally = record_bundle(
                &host, &call, account, state, Purpose::Cancel, hash, approvers, signatures, events,
            )?;
            tally.require_quorum()?;
            execute_cancellation(account, state, events)
        })
    }

    /// Direct cancellation approval; cancels once quorum is reached and
    /// returns whether it did
    pub fn approve_cancellation(
        &mut self,
        call: Call,
        account: Address,
        request: &MigrationRequest,
    ) -> Result<bool> {
        self.transact(account, |host, state, events| {
            ensure_pending_matches(state, request)?;
            let hash = gated_hash(&host, &account, state, Purpose::Cancel, request);
            let tally =
                record_on_chain(&host, &call, account, state, Purpose::Cancel, hash, events)?;
            if !tally.has_quorum() {
                return Ok(false);
            }
            execute_cancellation(account, state, events)?;
            Ok(true)
        })
    }

    pub fn revoke_cancellation_approval(
        &mut self,
        call: Call,
        account: Address,
        request: &MigrationRequest,
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            let hash = gated_hash(&host, &account, state, Purpose::Cancel, request);
            revoke(&call, account, state, Purpose::Cancel, hash, events)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WardenConfig;
    use crate::module::{Secp256k1Verifier, StaticAllowList, VerificationModule};
    use crate::multisig::{encode_owner_payload, MultiSigVerifier};
    use warden_core::{LocalSigner, DAY};

    const ACCOUNT: Address = Address([0xaa; 20]);
    const SECP: ModuleId = ModuleId(Address([0x10; 20]));
    const MULTISIG: ModuleId = ModuleId(Address([0x11; 20]));
    const NOW: u64 = 1_700_000_000;

    fn setup() -> Warden {
        let mut allow_list = StaticAllowList::new();
        allow_list.allow(SECP, Secp256k1Verifier.capabilities());
        allow_list.allow(MULTISIG, MultiSigVerifier.capabilities());
        let mut warden = Warden::new(&WardenConfig::default(), allow_list).unwrap();
        warden.register_module(SECP, Box::new(Secp256k1Verifier));
        warden.register_module(MULTISIG, Box::new(MultiSigVerifier));

        let owner = LocalSigner::from_bytes(&[0x42; 32]).unwrap();
        warden
            .create_account(ACCOUNT, SECP, owner.public_key(), Secp256k1Verifier.capabilities())
            .unwrap();
        warden
    }

    fn to_multisig() -> MigrationRequest {
        MigrationRequest::new(
            MULTISIG,
            encode_owner_payload(1, &[Address::new([0x01; 20])]),
            MultiSigVerifier.capabilities(),
        )
    }

    #[test]
    fn test_encode_binds_every_field() {
        let request = to_multisig();
        let mut other = request.clone();
        other.capabilities.pop();
        assert_ne!(request.encode(), other.encode());

        let mut other = request.clone();
        other.key_material.push(0);
        assert_ne!(request.encode(), other.encode());
    }

    #[test]
    fn test_migrate_then_finalize() {
        let mut warden = setup();
        let call = Call::new(ACCOUNT, NOW);
        let request = to_multisig();

        warden.migrate(call, ACCOUNT, &request).unwrap();
        let pending = warden.pending_migration(ACCOUNT).unwrap();
        assert_eq!(pending.execute_at, NOW + 3 * DAY);
        assert_eq!(warden.migration_nonce(ACCOUNT).unwrap(), 1);

        assert!(matches!(
            warden.migrate(call, ACCOUNT, &request),
            Err(AccountError::PendingMigrationExists)
        ));
        assert!(matches!(
            warden.finalize_migration(
                Call::new(Address::new([0x77; 20]), NOW + 3 * DAY - 1),
                ACCOUNT
            ),
            Err(AccountError::MigrationPeriodNotOver { .. })
        ));

        warden
            .finalize_migration(Call::new(Address::new([0x77; 20]), NOW + 3 * DAY), ACCOUNT)
            .unwrap();
        assert_eq!(warden.active_signer(ACCOUNT).unwrap().module, MULTISIG);
        assert!(warden.pending_migration(ACCOUNT).unwrap().is_none());
        assert!(matches!(
            warden.finalize_migration(call, ACCOUNT),
            Err(AccountError::NonexistentMigration)
        ));
    }

    #[test]
    fn test_migrate_validates_target() {
        let mut warden = setup();
        let call = Call::new(ACCOUNT, NOW);

        let unknown =
            MigrationRequest::new(ModuleId::new(Address::new([0x99; 20])), vec![], vec![]);
        assert!(matches!(
            warden.migrate(call, ACCOUNT, &unknown),
            Err(AccountError::UnknownModule(_))
        ));

        let mut bad_key = to_multisig();
        bad_key.key_material = encode_owner_payload(2, &[Address::new([0x01; 20])]);
        assert!(matches!(
            warden.migrate(call, ACCOUNT, &bad_key),
            Err(AccountError::InvalidKeyType(_))
        ));

        warden.allow_list_mut().revoke(MULTISIG);
        assert!(matches!(
            warden.migrate(call, ACCOUNT, &to_multisig()),
            Err(AccountError::UnregisteredFacetAndSelectors(_))
        ));
        assert!(matches!(
            warden.migrate(Call::new(Address::new([0x01; 20]), NOW), ACCOUNT, &to_multisig()),
            Err(AccountError::CallerNotSelf(_))
        ));
    }

    #[test]
    fn test_cancel_requires_matching_payload() {
        let mut warden = setup();
        let call = Call::new(ACCOUNT, NOW);
        let request = to_multisig();

        assert!(matches!(
            warden.cancel_migration(call, ACCOUNT, &request),
            Err(AccountError::NonexistentMigration)
        ));
        warden.migrate(call, ACCOUNT, &request).unwrap();

        let mut other = request.clone();
        other.key_material = encode_owner_payload(1, &[Address::new([0x02; 20])]);
        assert!(matches!(
            warden.cancel_migration(call, ACCOUNT, &other),
            Err(AccountError::PendingMigrationMismatch)
        ));

        warden.cancel_migration(call, ACCOUNT, &request).unwrap();
        assert!(warden.pending_migration(ACCOUNT).unwrap().is_none());
        assert_eq!(warden.migration_nonce(ACCOUNT).unwrap(), 2);
    }

    #[test]
    fn test_nonce_changes_operation_hash() {
        let mut warden = setup();
        let call = Call::new(ACCOUNT, NOW);
        let request = to_multisig();

        let before = warden.migration_hash(ACCOUNT, &request).unwrap();
        assert_ne!(before, warden.cancellation_hash(ACCOUNT, &request).unwrap());

        warden.migrate(call, ACCOUNT, &request).unwrap();
        warden.cancel_migration(call, ACCOUNT, &request).unwrap();
        assert_ne!(before, warden.migration_hash(ACCOUNT, &request).unwrap());
    }
}
