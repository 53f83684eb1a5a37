//! Verification modules and their collaborators
//!
//! An account authorizes through exactly one active verification module at
//! a time. Modules validate key material, set up and tear down their
//! per-account signer state, and check owner signatures. Which modules (and
//! which capability sets) an account may migrate to is decided by an
//! external [`ModuleAllowList`].

use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_core::{
    address_from_public_key, is_signed_by, personal_message_hash, Address, Bytes32, ModuleId,
    Selector,
};

use crate::error::{AccountError, Result};
use crate::multisig::MultiSigState;

/// Capability selectors shared by verification modules
pub mod selectors {
    use warden_core::Selector;

    pub fn init_signer() -> Selector {
        Selector::of("initializeSigner(bytes)")
    }

    pub fn uninit_signer() -> Selector {
        Selector::of("uninitializeSigner()")
    }

    pub fn is_valid_signature() -> Selector {
        Selector::of("isValidSignature(bytes32,bytes)")
    }

    pub fn validate_owner_signature() -> Selector {
        Selector::of("validateOwnerSignature(bytes32,bytes)")
    }
}

/// Allow-list of installable modules, maintained outside this crate
pub trait ModuleAllowList {
    /// Whether `module` may be installed exposing `capabilities`
    fn is_registered(&self, module: ModuleId, capabilities: &[Selector]) -> bool;
}

/// In-memory allow-list keyed by module
#[derive(Debug, Clone, Default)]
pub struct StaticAllowList {
    modules: HashMap<ModuleId, BTreeSet<Selector>>,
}

impl StaticAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `module` with any subset of `capabilities`
    pub fn allow(&mut self, module: ModuleId, capabilities: impl IntoIterator<Item = Selector>) {
        self.modules
            .entry(module)
            .or_default()
            .extend(capabilities);
    }

    pub fn revoke(&mut self, module: ModuleId) {
        self.modules.remove(&module);
    }
}

impl ModuleAllowList for StaticAllowList {
    fn is_registered(&self, module: ModuleId, capabilities: &[Selector]) -> bool {
        match self.modules.get(&module) {
            Some(allowed) => {
                !capabilities.is_empty() && capabilities.iter().all(|c| allowed.contains(c))
            }
            None => false,
        }
    }
}

/// Signature check for owners that are themselves accounts
pub trait ContractSignatureValidator {
    fn is_valid_signature(&self, signer: &Address, hash: &Bytes32, signature: &[u8]) -> bool;
}

/// Validator for contexts with no contract owners
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContractSigners;

impl ContractSignatureValidator for NoContractSigners {
    fn is_valid_signature(&self, _: &Address, _: &Bytes32, _: &[u8]) -> bool {
        false
    }
}

/// Per-account state owned by the active verification module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignerState {
    /// Torn down, awaiting the incoming module's setup
    Uninitialized,
    Secp256k1 { owner: Address },
    MultiSig(MultiSigState),
}

/// The account's active (module, key material, capabilities) pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSigner {
    pub module: ModuleId,
    pub key_material: Vec<u8>,
    pub capabilities: Vec<Selector>,
    pub state: SignerState,
}

impl ActiveSigner {
    pub fn exposes(&self, selector: &Selector) -> bool {
        self.capabilities.contains(selector)
    }
}

/// An ownership-verification scheme
pub trait VerificationModule: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Capabilities the module exposes when installed
    fn capabilities(&self) -> Vec<Selector>;

    /// Format check on key material, run before any migration to this module
    fn is_valid_key_type(&self, key_material: &[u8]) -> bool;

    /// Setup hook: build signer state from key material
    fn init_signer(&self, key_material: &[u8]) -> Result<SignerState>;

    /// Teardown hook: clear signer state before the module is replaced
    fn uninit_signer(&self, state: &mut SignerState) -> Result<()>;

    /// Whether `signature` authorizes `hash` on behalf of the owner(s)
    fn validate_owner_signature(
        &self,
        state: &SignerState,
        hash: &Bytes32,
        signature: &[u8],
        contracts: &dyn ContractSignatureValidator,
    ) -> bool;
}

/// Single secp256k1 key; signatures cover the personal-message hash
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl VerificationModule for Secp256k1Verifier {
    fn name(&self) -> &'static str {
        "secp256k1"
    }

    fn capabilities(&self) -> Vec<Selector> {
        vec![
            selectors::init_signer(),
            selectors::uninit_signer(),
            selectors::is_valid_signature(),
            selectors::validate_owner_signature(),
        ]
    }

    fn is_valid_key_type(&self, key_material: &[u8]) -> bool {
        address_from_public_key(key_material).is_ok()
    }

    fn init_signer(&self, key_material: &[u8]) -> Result<SignerState> {
        let owner = address_from_public_key(key_material)?;
        Ok(SignerState::Secp256k1 { owner })
    }

    fn uninit_signer(&self, state: &mut SignerState) -> Result<()> {
        *state = SignerState::Uninitialized;
        Ok(())
    }

    fn validate_owner_signature(
        &self,
        state: &SignerState,
        hash: &Bytes32,
        signature: &[u8],
        _contracts: &dyn ContractSignatureValidator,
    ) -> bool {
        match state {
            SignerState::Secp256k1 { owner } => {
                is_signed_by(&personal_message_hash(hash), signature, owner)
            }
            _ => {
                debug!("secp256k1 module asked to validate foreign signer state");
                false
            }
        }
    }
}

/// Installed verification modules by id
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<ModuleId, Box<dyn VerificationModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ModuleId, module: Box<dyn VerificationModule>) {
        self.modules.insert(id, module);
    }

    pub fn get(&self, id: ModuleId) -> Result<&dyn VerificationModule> {
        self.modules
            .get(&id)
            .map(|m| m.as_ref())
            .ok_or(AccountError::UnknownModule(id))
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.modules.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::LocalSigner;

    #[test]
    fn test_allow_list_requires_subset() {
        let module = ModuleId::new(Address::new([0x10; 20]));
        let mut list = StaticAllowList::new();
        list.allow(module, Secp256k1Verifier.capabilities());

        assert!(list.is_registered(module, &Secp256k1Verifier.capabilities()));
        assert!(list.is_registered(module, &[selectors::init_signer()]));
        assert!(!list.is_registered(module, &[Selector::of("drain()")]));
        assert!(!list.is_registered(module, &[]));
        assert!(!list.is_registered(ModuleId::NONE, &[selectors::init_signer()]));

        list.revoke(module);
        assert!(!list.is_registered(module, &[selectors::init_signer()]));
    }

    #[test]
    fn test_secp256k1_module_lifecycle() {
        let signer = LocalSigner::from_bytes(&[0x21; 32]).unwrap();
        let module = Secp256k1Verifier;

        assert!(module.is_valid_key_type(&signer.public_key()));
        assert!(!module.is_valid_key_type(&[0x04; 20]));

        let mut state = module.init_signer(&signer.public_key()).unwrap();
        assert_eq!(
            state,
            SignerState::Secp256k1 {
                owner: signer.address()
            }
        );

        let hash = Bytes32::new([0x33; 32]);
        let sig = signer.sign_personal(&hash).unwrap();
        assert!(module.validate_owner_signature(&state, &hash, &sig, &NoContractSigners));

        let raw = signer.sign_hash(&hash).unwrap();
        assert!(!module.validate_owner_signature(&state, &hash, &raw, &NoContractSigners));

        module.uninit_signer(&mut state).unwrap();
        assert!(!module.validate_owner_signature(&state, &hash, &sig, &NoContractSigners));
    }

    #[test]
    fn test_registry_lookup() {
        let id = ModuleId::new(Address::new([0x10; 20]));
        let mut registry = ModuleRegistry::new();
        assert!(matches!(registry.get(id), Err(AccountError::UnknownModule(_))));

        registry.register(id, Box::new(Secp256k1Verifier));
        assert!(registry.contains(id));
        assert_eq!(registry.get(id).unwrap().name(), "secp256k1");
    }
}
