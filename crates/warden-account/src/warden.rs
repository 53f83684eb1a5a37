//! The Warden engine
//!
//! Owns every account's security state and the collaborators they share:
//! the global policy bounds, the verification module registry, and the
//! module allow-list. Each mutating call runs against a draft of one
//! account; the draft and the events it produced are committed together,
//! or not at all.

use std::collections::HashMap;

use tracing::{debug, info};
use warden_core::{Address, Bytes32, ChainId, ModuleId, Selector};

use crate::account::{AccountState, Call, Host};
use crate::config::WardenConfig;
use crate::error::{AccountError, Result};
use crate::events::Event;
use crate::guardian::GuardianSet;
use crate::migration::MigrationRequest;
use crate::module::{
    ActiveSigner, ModuleAllowList, ModuleRegistry, SignerState, StaticAllowList,
    VerificationModule,
};
use crate::multisig::{encode_owner_payload, MultiSigState, SignatureValidation};
use crate::policy::{PolicyParam, PolicyStore};

/// Security and recovery core for a set of smart accounts
pub struct Warden<L: ModuleAllowList = StaticAllowList> {
    chain_id: ChainId,
    policy: PolicyStore,
    allow_list: L,
    modules: ModuleRegistry,
    accounts: HashMap<Address, AccountState>,
    events: Vec<Event>,
}

impl<L: ModuleAllowList> Warden<L> {
    /// Create an engine with every policy parameter initialized from `config`
    pub fn new(config: &WardenConfig, allow_list: L) -> Result<Self> {
        let mut warden = Self::with_chain(config.chain_id(), allow_list);
        for param in PolicyParam::ALL {
            let bounds = config.policy.bounds(param);
            warden.initialize_policy(param, bounds.default, bounds.min, bounds.max)?;
        }
        Ok(warden)
    }

    /// Create an engine whose policy parameters are still uninitialized
    pub fn with_chain(chain_id: ChainId, allow_list: L) -> Self {
        Self {
            chain_id,
            policy: PolicyStore::new(),
            allow_list,
            modules: ModuleRegistry::new(),
            accounts: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn register_module(&mut self, id: ModuleId, module: Box<dyn VerificationModule>) {
        debug!(module = %id, name = module.name(), "Registered verification module");
        self.modules.register(id, module);
    }

    pub fn allow_list(&self) -> &L {
        &self.allow_list
    }

    pub fn allow_list_mut(&mut self) -> &mut L {
        &mut self.allow_list
    }

    pub fn policy_store(&self) -> &PolicyStore {
        &self.policy
    }

    /// Events committed since the last drain
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn account(&self, account: Address) -> Option<&AccountState> {
        self.accounts.get(&account)
    }

    pub(crate) fn state(&self, account: Address) -> Result<&AccountState> {
        self.accounts
            .get(&account)
            .ok_or(AccountError::UnknownAccount(account))
    }

    fn host(&self) -> Host<'_> {
        Host {
            chain_id: self.chain_id,
            policy: &self.policy,
            allow_list: &self.allow_list,
            modules: &self.modules,
            accounts: &self.accounts,
            depth: 0,
        }
    }

    /// Read-only access to one account together with its host view
    pub(crate) fn inspect<T, F>(&self, account: Address, op: F) -> Result<T>
    where
        F: FnOnce(Host<'_>, &AccountState) -> T,
    {
        let state = self.state(account)?;
        Ok(op(self.host(), state))
    }

    /// Run `op` on a draft of `account`; commit the draft and its events on success
    pub(crate) fn transact<T, F>(&mut self, account: Address, op: F) -> Result<T>
    where
        F: FnOnce(Host<'_>, &mut AccountState, &mut Vec<Event>) -> Result<T>,
    {
        let mut draft = self.state(account)?.clone();
        let mut events = Vec::new();
        let out = op(self.host(), &mut draft, &mut events)?;
        self.accounts.insert(account, draft);
        self.commit(events);
        Ok(out)
    }

    fn commit(&mut self, events: Vec<Event>) {
        for event in &events {
            info!(event = ?event, "Committed");
        }
        self.events.extend(events);
    }

    // ---- accounts ----

    /// Register a new account and run its module's setup hook
    pub fn create_account(
        &mut self,
        account: Address,
        module: ModuleId,
        key_material: Vec<u8>,
        capabilities: Vec<Selector>,
    ) -> Result<()> {
        if account.is_reserved() {
            return Err(AccountError::InvalidAccount(account));
        }
        if self.accounts.contains_key(&account) {
            return Err(AccountError::AccountExists(account));
        }
        let request = MigrationRequest::new(module, key_material, capabilities);
        self.host().validate_target(&request)?;

        let state = self.modules.get(module)?.init_signer(&request.key_material)?;
        let signer = ActiveSigner {
            module,
            key_material: request.key_material,
            capabilities: request.capabilities,
            state,
        };
        self.accounts.insert(account, AccountState::new(signer));
        self.commit(vec![Event::AccountCreated { account, module }]);
        Ok(())
    }

    pub fn active_signer(&self, account: Address) -> Result<&ActiveSigner> {
        Ok(&self.state(account)?.signer)
    }

    /// Whether `signature` authorizes `hash` under the account's active module
    pub fn is_valid_signature(
        &self,
        account: Address,
        hash: &Bytes32,
        signature: &[u8],
    ) -> Result<bool> {
        self.inspect(account, |host, state| {
            host.verify_owner(&state.signer, hash, signature)
        })
    }

    // ---- policy ----

    pub fn initialize_policy(
        &mut self,
        param: PolicyParam,
        default: u64,
        min: u64,
        max: u64,
    ) -> Result<()> {
        self.policy.initialize(param, default, min, max)?;
        self.commit(vec![Event::PolicyInitialized {
            param,
            default,
            min,
            max,
        }]);
        Ok(())
    }

    /// Override a policy value for the calling account
    pub fn set_policy(
        &mut self,
        call: Call,
        account: Address,
        param: PolicyParam,
        value: u64,
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            call.require_self(&account)?;
            host.policy.check(param, value)?;
            state.policy.insert(param, value);
            events.push(Event::PolicyChanged {
                account,
                param,
                value,
            });
            Ok(())
        })
    }

    pub fn policy_of(&self, account: Address, param: PolicyParam) -> Result<u64> {
        let state = self.state(account)?;
        self.policy.of(&state.policy, param)
    }

    // ---- guardians ----

    pub fn request_guardian_addition(
        &mut self,
        call: Call,
        account: Address,
        guardian: Address,
    ) -> Result<()> {
        self.request_guardian_additions(call, account, &[guardian])
    }

    pub fn request_guardian_additions(
        &mut self,
        call: Call,
        account: Address,
        guardians: &[Address],
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            call.require_self(&account)?;
            let timing = host.confirmation(state, PolicyParam::AdditionPeriod)?;
            for guardian in guardians {
                state
                    .guardians
                    .request_addition(&account, *guardian, call.timestamp, timing)?;
                events.push(Event::GuardianAdditionRequested {
                    account,
                    guardian: *guardian,
                    requested_at: call.timestamp,
                });
            }
            Ok(())
        })
    }

    pub fn confirm_guardian_addition(
        &mut self,
        call: Call,
        account: Address,
        guardian: Address,
    ) -> Result<()> {
        self.confirm_guardian_additions(call, account, &[guardian])
    }

    pub fn confirm_guardian_additions(
        &mut self,
        call: Call,
        account: Address,
        guardians: &[Address],
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            let timing = host.confirmation(state, PolicyParam::AdditionPeriod)?;
            for guardian in guardians {
                state
                    .guardians
                    .confirm_addition(*guardian, call.timestamp, timing)?;
                events.push(Event::GuardianAdded {
                    account,
                    guardian: *guardian,
                });
            }
            Ok(())
        })
    }

    pub fn cancel_guardian_addition(
        &mut self,
        call: Call,
        account: Address,
        guardian: Address,
    ) -> Result<()> {
        self.cancel_guardian_additions(call, account, &[guardian])
    }

    pub fn cancel_guardian_additions(
        &mut self,
        call: Call,
        account: Address,
        guardians: &[Address],
    ) -> Result<()> {
        self.transact(account, |_, state, events| {
            call.require_self(&account)?;
            for guardian in guardians {
                state.guardians.cancel_addition(*guardian)?;
                events.push(Event::GuardianAdditionCancelled {
                    account,
                    guardian: *guardian,
                });
            }
            Ok(())
        })
    }

    pub fn request_guardian_removal(
        &mut self,
        call: Call,
        account: Address,
        guardian: Address,
    ) -> Result<()> {
        self.request_guardian_removals(call, account, &[guardian])
    }

    pub fn request_guardian_removals(
        &mut self,
        call: Call,
        account: Address,
        guardians: &[Address],
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            call.require_self(&account)?;
            let timing = host.confirmation(state, PolicyParam::RemovalPeriod)?;
            for guardian in guardians {
                state
                    .guardians
                    .request_removal(&account, *guardian, call.timestamp, timing)?;
                events.push(Event::GuardianRemovalRequested {
                    account,
                    guardian: *guardian,
                    requested_at: call.timestamp,
                });
            }
            Ok(())
        })
    }

    pub fn confirm_guardian_removal(
        &mut self,
        call: Call,
        account: Address,
        guardian: Address,
    ) -> Result<()> {
        self.confirm_guardian_removals(call, account, &[guardian])
    }

    pub fn confirm_guardian_removals(
        &mut self,
        call: Call,
        account: Address,
        guardians: &[Address],
    ) -> Result<()> {
        self.transact(account, |host, state, events| {
            let timing = host.confirmation(state, PolicyParam::RemovalPeriod)?;
            for guardian in guardians {
                state
                    .guardians
                    .confirm_removal(*guardian, call.timestamp, timing)?;
                events.push(Event::GuardianRemoved {
                    account,
                    guardian: *guardian,
                });
            }
            Ok(())
        })
    }

    pub fn cancel_guardian_removal(
        &mut self,
        call: Call,
        account: Address,
        guardian: Address,
    ) -> Result<()> {
        self.cancel_guardian_removals(call, account, &[guardian])
    }

    pub fn cancel_guardian_removals(
        &mut self,
        call: Call,
        account: Address,
        guardians: &[Address],
    ) -> Result<()> {
        self.transact(account, |_, state, events| {
            call.require_self(&account)?;
            for guardian in guardians {
                state.guardians.cancel_removal(*guardian)?;
                events.push(Event::GuardianRemovalCancelled {
                    account,
                    guardian: *guardian,
                });
            }
            Ok(())
        })
    }

    pub fn guardians(&self, account: Address) -> Result<&GuardianSet> {
        Ok(&self.state(account)?.guardians)
    }

    pub fn is_guardian(&self, account: Address, who: &Address) -> Result<bool> {
        Ok(self.state(account)?.guardians.contains(who))
    }

    pub fn guardian_count(&self, account: Address) -> Result<usize> {
        Ok(self.state(account)?.guardians.len())
    }

    pub fn majority(&self, account: Address) -> Result<usize> {
        Ok(self.state(account)?.guardians.majority())
    }

    /// An account may be torn down only once it has no guardians
    pub fn is_removable(&self, account: Address) -> Result<bool> {
        Ok(self.state(account)?.guardians.is_empty())
    }

    pub fn pending_guardian_addition(
        &self,
        account: Address,
        guardian: &Address,
    ) -> Result<Option<u64>> {
        Ok(self.state(account)?.guardians.pending_addition(guardian))
    }

    pub fn pending_guardian_removal(
        &self,
        account: Address,
        guardian: &Address,
    ) -> Result<Option<u64>> {
        Ok(self.state(account)?.guardians.pending_removal(guardian))
    }

    // ---- multi-signature owners ----

    pub fn add_owner(
        &mut self,
        call: Call,
        account: Address,
        owner: Address,
        threshold: u32,
    ) -> Result<()> {
        self.transact(account, |_, state, events| {
            call.require_self(&account)?;
            multisig_mut(state)?.add_owner(owner, threshold)?;
            sync_key_material(state);
            events.push(Event::OwnerAdded { account, owner });
            events.push(Event::ChangedThreshold { account, threshold });
            Ok(())
        })
    }

    pub fn remove_owner(
        &mut self,
        call: Call,
        account: Address,
        prev: Address,
        owner: Address,
        threshold: u32,
    ) -> Result<()> {
        self.transact(account, |_, state, events| {
            call.require_self(&account)?;
            multisig_mut(state)?.remove_owner(prev, owner, threshold)?;
            sync_key_material(state);
            events.push(Event::OwnerRemoved { account, owner });
            events.push(Event::ChangedThreshold { account, threshold });
            Ok(())
        })
    }

    pub fn swap_owner(
        &mut self,
        call: Call,
        account: Address,
        prev: Address,
        old: Address,
        new: Address,
    ) -> Result<()> {
        self.transact(account, |_, state, events| {
            call.require_self(&account)?;
            multisig_mut(state)?.swap_owner(prev, old, new)?;
            sync_key_material(state);
            events.push(Event::OwnerRemoved { account, owner: old });
            events.push(Event::OwnerAdded { account, owner: new });
            Ok(())
        })
    }

    pub fn change_threshold(&mut self, call: Call, account: Address, threshold: u32) -> Result<()> {
        self.transact(account, |_, state, events| {
            call.require_self(&account)?;
            multisig_mut(state)?.change_threshold(threshold)?;
            sync_key_material(state);
            events.push(Event::ChangedThreshold { account, threshold });
            Ok(())
        })
    }

    /// Pre-approve `hash` on behalf of the calling owner
    pub fn approve_hash(&mut self, call: Call, account: Address, hash: Bytes32) -> Result<()> {
        self.transact(account, |_, state, events| {
            multisig_mut(state)?.approve_hash(call.sender, hash)?;
            events.push(Event::HashApproved {
                account,
                owner: call.sender,
                hash,
            });
            Ok(())
        })
    }

    pub fn owners(&self, account: Address) -> Result<Vec<Address>> {
        Ok(multisig(self.state(account)?)?.owners().to_vec())
    }

    pub fn threshold(&self, account: Address) -> Result<u32> {
        Ok(multisig(self.state(account)?)?.threshold())
    }

    /// Validate a signature container against an explicit `required` count
    pub fn check_signatures(
        &self,
        account: Address,
        hash: &Bytes32,
        signatures: &[u8],
        required: u32,
    ) -> Result<SignatureValidation> {
        let state = self.state(account)?;
        let host = self.host();
        multisig(state)?.check_signatures(hash, signatures, required, &host)
    }
}

fn multisig(state: &AccountState) -> Result<&MultiSigState> {
    match &state.signer.state {
        SignerState::MultiSig(multisig) => Ok(multisig),
        _ => Err(AccountError::SignerNotMultiSig),
    }
}

fn multisig_mut(state: &mut AccountState) -> Result<&mut MultiSigState> {
    match &mut state.signer.state {
        SignerState::MultiSig(multisig) => Ok(multisig),
        _ => Err(AccountError::SignerNotMultiSig),
    }
}

/// Keep the stored init payload in step with the live owner set
fn sync_key_material(state: &mut AccountState) {
    if let SignerState::MultiSig(multisig) = &state.signer.state {
        state.signer.key_material =
            encode_owner_payload(multisig.threshold(), &multisig.owners().to_vec());
    }
}
