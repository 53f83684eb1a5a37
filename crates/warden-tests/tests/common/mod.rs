//! Shared fixtures for the workflow tests

#![allow(dead_code)]

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_account::{
    Call, MultiSigVerifier, Secp256k1Verifier, StaticAllowList, VerificationModule, Warden,
    WardenConfig,
};
use warden_core::{Address, LocalSigner, ModuleId, DAY};

pub const SECP: ModuleId = ModuleId(Address([0x10; 20]));
pub const MULTISIG: ModuleId = ModuleId(Address([0x11; 20]));

pub const ACCOUNT: Address = Address([0xaa; 20]);
pub const T0: u64 = 1_700_000_000;

/// Addition period of the default policy
pub const ADDITION_PERIOD: u64 = 3 * DAY;
/// Migration period of the default policy
pub const MIGRATION_PERIOD: u64 = 3 * DAY;
/// Approval validity of the default policy
pub const APPROVAL_VALIDITY: u64 = DAY;

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden_account=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn signer(seed: u8) -> LocalSigner {
    LocalSigner::from_bytes(&[seed; 32]).unwrap()
}

pub fn owner_key() -> LocalSigner {
    signer(0x42)
}

/// Engine with both verification modules registered and allow-listed
pub fn warden() -> Warden {
    init_tracing();
    let mut allow_list = StaticAllowList::new();
    allow_list.allow(SECP, Secp256k1Verifier.capabilities());
    allow_list.allow(MULTISIG, MultiSigVerifier.capabilities());

    let mut warden = Warden::new(&WardenConfig::default(), allow_list).unwrap();
    warden.register_module(SECP, Box::new(Secp256k1Verifier));
    warden.register_module(MULTISIG, Box::new(MultiSigVerifier));
    warden
}

/// Engine holding `ACCOUNT`, owned by `owner_key()` through the single-key module
pub fn warden_with_account() -> Warden {
    let mut warden = warden();
    warden
        .create_account(
            ACCOUNT,
            SECP,
            owner_key().public_key(),
            Secp256k1Verifier.capabilities(),
        )
        .unwrap();
    warden
}

/// Add `guardians` to `ACCOUNT`; returns the time the additions were confirmed
pub fn add_guardians(warden: &mut Warden, guardians: &[Address]) -> u64 {
    warden
        .request_guardian_additions(Call::new(ACCOUNT, T0), ACCOUNT, guardians)
        .unwrap();
    let confirmed_at = T0 + ADDITION_PERIOD;
    let anyone = Call::new(Address::new([0xee; 20]), confirmed_at);
    warden
        .confirm_guardian_additions(anyone, ACCOUNT, guardians)
        .unwrap();
    confirmed_at
}
