//! Multi-signature ownership verification
//!
//! Owners form a sentinel-headed singly linked set, so an owner can be
//! removed in O(1) given its predecessor while enumeration order stays
//! stable. Authorizations carry a container of per-owner signature tuples:
//!
//! ```text
//! owner (20) | type (1) | length (4, big-endian) | signature (length)
//! ```
//!
//! Each tuple names its own signature type, because owners may be plain
//! keys, accounts with their own verification scheme, or owners that can
//! only pre-approve hashes on-chain.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_core::{is_signed_by, personal_message_hash, Address, Bytes32, Selector};

use crate::error::{AccountError, Result};
use crate::module::{selectors, ContractSignatureValidator, SignerState, VerificationModule};

/// Width of the big-endian threshold prefix of an owner payload
pub const THRESHOLD_LEN: usize = 4;

/// Width of a signature tuple header (owner, type, length)
pub const TUPLE_HEADER_LEN: usize = Address::LEN + 1 + 4;

/// Linked owner set headed by [`Address::SENTINEL`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSet {
    next: HashMap<Address, Address>,
    count: usize,
}

impl Default for OwnerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerSet {
    pub fn new() -> Self {
        let mut next = HashMap::new();
        next.insert(Address::SENTINEL, Address::SENTINEL);
        Self { next, count: 0 }
    }

    /// Build a set enumerating `owners` in the given order
    pub fn from_owners(owners: &[Address]) -> Result<Self> {
        let mut set = Self::new();
        let mut tail = Address::SENTINEL;
        for owner in owners {
            set.check_new(owner)?;
            set.next.insert(tail, *owner);
            set.next.insert(*owner, Address::SENTINEL);
            tail = *owner;
            set.count += 1;
        }
        Ok(set)
    }

    pub fn contains(&self, owner: &Address) -> bool {
        !owner.is_reserved() && self.next.contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> OwnerIter<'_> {
        OwnerIter {
            set: self,
            cursor: Address::SENTINEL,
        }
    }

    pub fn to_vec(&self) -> Vec<Address> {
        self.iter().collect()
    }

    /// Whether `prev` directly precedes `owner`
    pub fn precedes(&self, prev: &Address, owner: &Address) -> bool {
        self.next.get(prev) == Some(owner)
    }

    /// Owner (or the sentinel) linking to `owner`
    pub fn predecessor(&self, owner: &Address) -> Option<Address> {
        if !self.contains(owner) {
            return None;
        }
        std::iter::once(Address::SENTINEL)
            .chain(self.iter())
            .find(|candidate| self.precedes(candidate, owner))
    }

    fn check_new(&self, owner: &Address) -> Result<()> {
        if owner.is_reserved() {
            return Err(AccountError::InvalidOwnerAddress(*owner));
        }
        if self.next.contains_key(owner) {
            return Err(AccountError::DuplicateOwner(*owner));
        }
        Ok(())
    }

    fn check_pair(&self, prev: &Address, owner: &Address) -> Result<()> {
        if owner.is_reserved() {
            return Err(AccountError::InvalidOwnerAddress(*owner));
        }
        if !self.precedes(prev, owner) {
            return Err(AccountError::InvalidOwnerPair {
                prev: *prev,
                owner: *owner,
            });
        }
        Ok(())
    }

    /// Insert at the head of the list
    pub fn insert(&mut self, owner: Address) -> Result<()> {
        self.check_new(&owner)?;
        let head = self
            .next
            .get(&Address::SENTINEL)
            .copied()
            .unwrap_or(Address::SENTINEL);
        self.next.insert(owner, head);
        self.next.insert(Address::SENTINEL, owner);
        self.count += 1;
        Ok(())
    }

    pub fn remove(&mut self, prev: Address, owner: Address) -> Result<()> {
        self.check_pair(&prev, &owner)?;
        let after = self.next.remove(&owner).unwrap_or(Address::SENTINEL);
        self.next.insert(prev, after);
        self.count -= 1;
        Ok(())
    }

    pub fn swap(&mut self, prev: Address, old: Address, new: Address) -> Result<()> {
        self.check_new(&new)?;
        self.check_pair(&prev, &old)?;
        let after = self.next.remove(&old).unwrap_or(Address::SENTINEL);
        self.next.insert(new, after);
        self.next.insert(prev, new);
        Ok(())
    }
}

/// Iterator following the owner links from the sentinel
pub struct OwnerIter<'a> {
    set: &'a OwnerSet,
    cursor: Address,
}

impl Iterator for OwnerIter<'_> {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        let next = *self.set.next.get(&self.cursor)?;
        if next == Address::SENTINEL {
            return None;
        }
        self.cursor = next;
        Some(next)
    }
}

/// Owners, threshold, and pre-approved hashes of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSigState {
    threshold: u32,
    owners: OwnerSet,
    approved_hashes: BTreeSet<(Address, Bytes32)>,
}

fn check_threshold(threshold: u32, owners: usize) -> Result<()> {
    if threshold == 0 || threshold as usize > owners {
        return Err(AccountError::InvalidThreshold { threshold, owners });
    }
    Ok(())
}

impl MultiSigState {
    pub fn new(threshold: u32, owners: &[Address]) -> Result<Self> {
        let owners = OwnerSet::from_owners(owners)?;
        check_threshold(threshold, owners.len())?;
        Ok(Self {
            threshold,
            owners,
            approved_hashes: BTreeSet::new(),
        })
    }

    /// Decode an initialization payload
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let (threshold, owners) = parse_owner_payload(payload)?;
        Self::new(threshold, &owners)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn owners(&self) -> &OwnerSet {
        &self.owners
    }

    pub fn is_owner(&self, who: &Address) -> bool {
        self.owners.contains(who)
    }

    pub fn is_hash_approved(&self, owner: &Address, hash: &Bytes32) -> bool {
        self.approved_hashes.contains(&(*owner, *hash))
    }

    pub fn add_owner(&mut self, owner: Address, threshold: u32) -> Result<()> {
        check_threshold(threshold, self.owners.len() + 1)?;
        self.owners.insert(owner)?;
        self.threshold = threshold;
        Ok(())
    }

    pub fn remove_owner(&mut self, prev: Address, owner: Address, threshold: u32) -> Result<()> {
        self.owners.check_pair(&prev, &owner)?;
        check_threshold(threshold, self.owners.len() - 1)?;
        self.owners.remove(prev, owner)?;
        self.approved_hashes.retain(|(o, _)| *o != owner);
        self.threshold = threshold;
        Ok(())
    }

    pub fn swap_owner(&mut self, prev: Address, old: Address, new: Address) -> Result<()> {
        self.owners.swap(prev, old, new)?;
        self.approved_hashes.retain(|(o, _)| *o != old);
        Ok(())
    }

    pub fn change_threshold(&mut self, threshold: u32) -> Result<()> {
        check_threshold(threshold, self.owners.len())?;
        self.threshold = threshold;
        Ok(())
    }

    /// Record `hash` as approved by `owner`, satisfying its type-2 tuples
    pub fn approve_hash(&mut self, owner: Address, hash: Bytes32) -> Result<()> {
        if !self.is_owner(&owner) {
            return Err(AccountError::CallerNotMultiSigOwner(owner));
        }
        self.approved_hashes.insert((owner, hash));
        Ok(())
    }

    /// Validate a signature container against `hash`
    ///
    /// Valid only when exactly `required` distinct owners each carry a valid
    /// tuple. A tuple from a non-owner, or a repeated owner, invalidates the
    /// whole container.
    pub fn check_signatures(
        &self,
        hash: &Bytes32,
        blob: &[u8],
        required: u32,
        contracts: &dyn ContractSignatureValidator,
    ) -> Result<SignatureValidation> {
        let mut seen = BTreeSet::new();
        let mut offset = 0;
        loop {
            let (tuple, next) = split_signatures(blob, offset)?;
            if !self.is_owner(&tuple.owner) {
                debug!(signer = %tuple.owner, "Signature from non-owner");
                return Ok(SignatureValidation::Invalid);
            }
            if !seen.insert(tuple.owner) {
                debug!(signer = %tuple.owner, "Repeated owner in signature container");
                return Ok(SignatureValidation::Invalid);
            }
            if !self.validate_tuple(hash, &tuple, contracts) {
                debug!(
                    signer = %tuple.owner,
                    sig_type = ?tuple.sig_type,
                    "Invalid owner signature"
                );
                return Ok(SignatureValidation::Invalid);
            }
            if next == 0 {
                break;
            }
            offset = next;
        }

        if seen.len() == required as usize {
            Ok(SignatureValidation::Valid)
        } else {
            Ok(SignatureValidation::Invalid)
        }
    }

    fn validate_tuple(
        &self,
        hash: &Bytes32,
        tuple: &SignatureTuple<'_>,
        contracts: &dyn ContractSignatureValidator,
    ) -> bool {
        match tuple.sig_type {
            SignatureType::Raw => {
                is_signed_by(hash, tuple.signature, &tuple.owner)
                    || contracts.is_valid_signature(&tuple.owner, hash, tuple.signature)
            }
            SignatureType::ApprovedHash => self.is_hash_approved(&tuple.owner, hash),
            SignatureType::PersonalMessage => {
                is_signed_by(&personal_message_hash(hash), tuple.signature, &tuple.owner)
            }
        }
    }
}

/// Outcome of [`MultiSigState::check_signatures`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureValidation {
    Valid,
    Invalid,
}

impl SignatureValidation {
    pub fn is_valid(&self) -> bool {
        *self == SignatureValidation::Valid
    }
}

/// Split an owner payload into its threshold and owner identities
pub fn parse_owner_payload(payload: &[u8]) -> Result<(u32, Vec<Address>)> {
    if payload.len() < THRESHOLD_LEN + Address::LEN {
        return Err(AccountError::InvalidOwnerPayload(format!(
            "payload of {} bytes is shorter than one threshold and owner",
            payload.len()
        )));
    }
    let (threshold, owners) = payload.split_at(THRESHOLD_LEN);
    if owners.len() % Address::LEN != 0 {
        return Err(AccountError::InvalidOwnerPayload(format!(
            "{} owner bytes is not a multiple of {}",
            owners.len(),
            Address::LEN
        )));
    }

    let mut prefix = [0u8; THRESHOLD_LEN];
    prefix.copy_from_slice(threshold);
    let owners = owners
        .chunks_exact(Address::LEN)
        .filter_map(Address::from_slice)
        .collect();
    Ok((u32::from_be_bytes(prefix), owners))
}

/// Encode an owner payload
pub fn encode_owner_payload(threshold: u32, owners: &[Address]) -> Vec<u8> {
    let mut out = Vec::with_capacity(THRESHOLD_LEN + owners.len() * Address::LEN);
    out.extend_from_slice(&threshold.to_be_bytes());
    for owner in owners {
        out.extend_from_slice(owner.as_bytes());
    }
    out
}

/// Per-tuple signature type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignatureType {
    /// Recoverable signature over the hash itself (or a nested account's signature)
    Raw = 1,
    /// Zero-length marker: consult the owner's on-chain approved hashes
    ApprovedHash = 2,
    /// Recoverable signature over the personal-message hash
    PersonalMessage = 3,
}

impl TryFrom<u8> for SignatureType {
    type Error = AccountError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(SignatureType::Raw),
            2 => Ok(SignatureType::ApprovedHash),
            3 => Ok(SignatureType::PersonalMessage),
            other => Err(AccountError::InvalidSignatureType(other)),
        }
    }
}

/// One decoded tuple, borrowing its signature bytes from the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureTuple<'a> {
    pub owner: Address,
    pub sig_type: SignatureType,
    pub signature: &'a [u8],
}

/// Decode the tuple at `offset`; the returned offset is `0` after the last tuple
pub fn split_signatures(blob: &[u8], offset: usize) -> Result<(SignatureTuple<'_>, usize)> {
    let body = offset
        .checked_add(TUPLE_HEADER_LEN)
        .filter(|end| *end <= blob.len())
        .ok_or(AccountError::InsufficientSignerLength(offset))?;

    let owner = Address::from_slice(&blob[offset..offset + Address::LEN])
        .ok_or(AccountError::InsufficientSignerLength(offset))?;
    let type_byte = blob[offset + Address::LEN];
    let sig_type = SignatureType::try_from(type_byte)?;

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&blob[offset + Address::LEN + 1..body]);
    let len = u32::from_be_bytes(len_bytes) as usize;

    let invalid_length = AccountError::InvalidSignatureLength {
        sig_type: type_byte,
        len,
    };
    let end = match body.checked_add(len) {
        Some(end) if end <= blob.len() => end,
        _ => return Err(invalid_length),
    };
    let length_ok = match sig_type {
        SignatureType::Raw => len > 0,
        SignatureType::ApprovedHash => len == 0,
        SignatureType::PersonalMessage => len == warden_core::crypto::RECOVERABLE_SIGNATURE_LEN,
    };
    if !length_ok {
        return Err(invalid_length);
    }

    let next = if end == blob.len() { 0 } else { end };
    Ok((
        SignatureTuple {
            owner,
            sig_type,
            signature: &blob[body..end],
        },
        next,
    ))
}

/// Builder for signature containers
#[derive(Debug, Clone, Default)]
pub struct SignatureContainer {
    bytes: Vec<u8>,
}

impl SignatureContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, owner: Address, sig_type: SignatureType, signature: &[u8]) -> Self {
        self.bytes.extend_from_slice(owner.as_bytes());
        self.bytes.push(sig_type as u8);
        self.bytes
            .extend_from_slice(&(signature.len() as u32).to_be_bytes());
        self.bytes.extend_from_slice(signature);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Multi-owner verification module
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiSigVerifier;

impl MultiSigVerifier {
    pub fn owner_management_capabilities() -> Vec<Selector> {
        vec![
            Selector::of("addOwner(address,uint256)"),
            Selector::of("removeOwner(address,address,uint256)"),
            Selector::of("swapOwner(address,address,address)"),
            Selector::of("changeThreshold(uint256)"),
            Selector::of("approveHash(bytes32)"),
        ]
    }
}

impl VerificationModule for MultiSigVerifier {
    fn name(&self) -> &'static str {
        "multisig"
    }

    fn capabilities(&self) -> Vec<Selector> {
        let mut caps = vec![
            selectors::init_signer(),
            selectors::uninit_signer(),
            selectors::is_valid_signature(),
            selectors::validate_owner_signature(),
        ];
        caps.extend(Self::owner_management_capabilities());
        caps
    }

    fn is_valid_key_type(&self, key_material: &[u8]) -> bool {
        MultiSigState::from_payload(key_material).is_ok()
    }

    fn init_signer(&self, key_material: &[u8]) -> Result<SignerState> {
        Ok(SignerState::MultiSig(MultiSigState::from_payload(
            key_material,
        )?))
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
        contracts: &dyn ContractSignatureValidator,
    ) -> bool {
        let SignerState::MultiSig(multisig) = state else {
            return false;
        };
        match multisig.check_signatures(hash, signature, multisig.threshold(), contracts) {
            Ok(result) => result.is_valid(),
            Err(e) => {
                debug!("Malformed signature container: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::NoContractSigners;
    use warden_core::LocalSigner;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn signer(seed: u8) -> LocalSigner {
        LocalSigner::from_bytes(&[seed; 32]).unwrap()
    }

    #[test]
    fn test_owner_set_order_and_links() {
        let set = OwnerSet::from_owners(&[addr(1), addr(2), addr(3)]).unwrap();
        assert_eq!(set.to_vec(), vec![addr(1), addr(2), addr(3)]);
        assert!(set.precedes(&Address::SENTINEL, &addr(1)));
        assert!(set.precedes(&addr(3), &Address::SENTINEL));
        assert_eq!(set.predecessor(&addr(3)), Some(addr(2)));
        assert_eq!(set.predecessor(&addr(9)), None);
        assert!(!set.contains(&Address::SENTINEL));
    }

    #[test]
    fn test_owner_set_insert_remove_swap() {
        let mut set = OwnerSet::from_owners(&[addr(1), addr(2)]).unwrap();
        set.insert(addr(3)).unwrap();
        assert_eq!(set.to_vec(), vec![addr(3), addr(1), addr(2)]);

        assert!(matches!(
            set.remove(addr(3), addr(2)),
            Err(AccountError::InvalidOwnerPair { .. })
        ));
        set.remove(addr(3), addr(1)).unwrap();
        assert_eq!(set.to_vec(), vec![addr(3), addr(2)]);

        set.swap(addr(3), addr(2), addr(4)).unwrap();
        assert_eq!(set.to_vec(), vec![addr(3), addr(4)]);
        assert!(matches!(
            set.swap(Address::SENTINEL, addr(3), addr(4)),
            Err(AccountError::DuplicateOwner(_))
        ));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_payload_validation() {
        assert!(matches!(
            MultiSigState::from_payload(&[0, 0, 0, 1]),
            Err(AccountError::InvalidOwnerPayload(_))
        ));
        let mut ragged = encode_owner_payload(1, &[addr(1)]);
        ragged.push(0xff);
        assert!(matches!(
            MultiSigState::from_payload(&ragged),
            Err(AccountError::InvalidOwnerPayload(_))
        ));
        assert!(matches!(
            MultiSigState::from_payload(&encode_owner_payload(0, &[addr(1)])),
            Err(AccountError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            MultiSigState::from_payload(&encode_owner_payload(3, &[addr(1), addr(2)])),
            Err(AccountError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            MultiSigState::from_payload(&encode_owner_payload(1, &[addr(1), Address::ZERO])),
            Err(AccountError::InvalidOwnerAddress(_))
        ));
        assert!(matches!(
            MultiSigState::from_payload(&encode_owner_payload(1, &[Address::SENTINEL])),
            Err(AccountError::InvalidOwnerAddress(_))
        ));
        assert!(matches!(
            MultiSigState::from_payload(&encode_owner_payload(1, &[addr(1), addr(1)])),
            Err(AccountError::DuplicateOwner(_))
        ));
        assert!(matches!(
            MultiSigState::from_payload(&encode_owner_payload(1, &[addr(1), addr(2), addr(2)])),
            Err(AccountError::DuplicateOwner(_))
        ));
        assert!(matches!(
            MultiSigState::from_payload(&encode_owner_payload(1, &[addr(1), addr(2), addr(1)])),
            Err(AccountError::DuplicateOwner(_))
        ));
        assert!(!MultiSigVerifier.is_valid_key_type(&encode_owner_payload(2, &[addr(1), addr(1)])));

        let state = MultiSigState::from_payload(&encode_owner_payload(2, &[addr(1), addr(2)]))
            .unwrap();
        assert_eq!(state.threshold(), 2);
        assert_eq!(state.owners().to_vec(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn test_threshold_management() {
        let mut state = MultiSigState::new(1, &[addr(1), addr(2)]).unwrap();
        state.add_owner(addr(3), 3).unwrap();
        assert_eq!(state.threshold(), 3);

        assert!(matches!(
            state.remove_owner(addr(3), addr(1), 3),
            Err(AccountError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            state.remove_owner(addr(1), addr(1), 2),
            Err(AccountError::InvalidOwnerPair { .. })
        ));
        state.remove_owner(addr(3), addr(1), 2).unwrap();
        assert_eq!(state.owners().len(), 2);

        assert!(state.change_threshold(0).is_err());
        assert!(state.change_threshold(3).is_err());
        state.change_threshold(1).unwrap();
        assert_eq!(state.threshold(), 1);
    }

    #[test]
    fn test_split_signatures_walks_tuples() {
        let blob = SignatureContainer::new()
            .push(addr(1), SignatureType::ApprovedHash, &[])
            .push(addr(2), SignatureType::Raw, &[7u8; 65])
            .into_bytes();

        let (first, next) = split_signatures(&blob, 0).unwrap();
        assert_eq!(first.owner, addr(1));
        assert_eq!(first.sig_type, SignatureType::ApprovedHash);
        assert!(first.signature.is_empty());
        assert_eq!(next, TUPLE_HEADER_LEN);

        let (second, next) = split_signatures(&blob, next).unwrap();
        assert_eq!(second.owner, addr(2));
        assert_eq!(second.signature.len(), 65);
        assert_eq!(next, 0);
    }

    #[test]
    fn test_split_signatures_errors() {
        assert!(matches!(
            split_signatures(&[0u8; 10], 0),
            Err(AccountError::InsufficientSignerLength(0))
        ));

        let mut bad_type = SignatureContainer::new()
            .push(addr(1), SignatureType::ApprovedHash, &[])
            .into_bytes();
        bad_type[20] = 9;
        assert!(matches!(
            split_signatures(&bad_type, 0),
            Err(AccountError::InvalidSignatureType(9))
        ));

        let marker_with_bytes = SignatureContainer::new()
            .push(addr(1), SignatureType::ApprovedHash, &[1])
            .into_bytes();
        assert!(matches!(
            split_signatures(&marker_with_bytes, 0),
            Err(AccountError::InvalidSignatureLength { sig_type: 2, .. })
        ));

        let mut overrun = SignatureContainer::new()
            .push(addr(1), SignatureType::Raw, &[1u8; 65])
            .into_bytes();
        overrun.truncate(60);
        assert!(matches!(
            split_signatures(&overrun, 0),
            Err(AccountError::InvalidSignatureLength { sig_type: 1, .. })
        ));

        let short_personal = SignatureContainer::new()
            .push(addr(1), SignatureType::PersonalMessage, &[1u8; 64])
            .into_bytes();
        assert!(matches!(
            split_signatures(&short_personal, 0),
            Err(AccountError::InvalidSignatureLength { sig_type: 3, .. })
        ));
    }

    #[test]
    fn test_two_of_two_valid_and_duplicate() {
        let (a, b) = (signer(1), signer(2));
        let state = MultiSigState::new(2, &[a.address(), b.address()]).unwrap();
        let hash = Bytes32::new([0x5a; 32]);

        let sig_a = a.sign_hash(&hash).unwrap();
        let sig_b = b.sign_personal(&hash).unwrap();

        let both = SignatureContainer::new()
            .push(a.address(), SignatureType::Raw, &sig_a)
            .push(b.address(), SignatureType::PersonalMessage, &sig_b)
            .into_bytes();
        assert_eq!(
            state.check_signatures(&hash, &both, 2, &NoContractSigners).unwrap(),
            SignatureValidation::Valid
        );

        let duplicated = SignatureContainer::new()
            .push(a.address(), SignatureType::Raw, &sig_a)
            .push(a.address(), SignatureType::Raw, &sig_a)
            .into_bytes();
        assert_eq!(
            state.check_signatures(&hash, &duplicated, 2, &NoContractSigners).unwrap(),
            SignatureValidation::Invalid
        );
    }

    #[test]
    fn test_required_count_must_match_exactly() {
        let (a, b) = (signer(1), signer(2));
        let state = MultiSigState::new(1, &[a.address(), b.address()]).unwrap();
        let hash = Bytes32::new([0x11; 32]);

        let one = SignatureContainer::new()
            .push(a.address(), SignatureType::Raw, &a.sign_hash(&hash).unwrap())
            .into_bytes();
        assert!(state.check_signatures(&hash, &one, 1, &NoContractSigners).unwrap().is_valid());
        assert!(!state.check_signatures(&hash, &one, 2, &NoContractSigners).unwrap().is_valid());
    }

    #[test]
    fn test_non_owner_and_wrong_signer_rejected() {
        let (a, b, c) = (signer(1), signer(2), signer(3));
        let state = MultiSigState::new(1, &[a.address(), b.address()]).unwrap();
        let hash = Bytes32::new([0x22; 32]);

        let stranger = SignatureContainer::new()
            .push(c.address(), SignatureType::Raw, &c.sign_hash(&hash).unwrap())
            .into_bytes();
        assert!(!state
            .check_signatures(&hash, &stranger, 1, &NoContractSigners)
            .unwrap()
            .is_valid());

        let mislabelled = SignatureContainer::new()
            .push(a.address(), SignatureType::Raw, &b.sign_hash(&hash).unwrap())
            .into_bytes();
        assert!(!state
            .check_signatures(&hash, &mislabelled, 1, &NoContractSigners)
            .unwrap()
            .is_valid());
    }

    #[test]
    fn test_approved_hash_tuple() {
        let (a, b) = (signer(1), signer(2));
        let mut state = MultiSigState::new(2, &[a.address(), b.address()]).unwrap();
        let hash = Bytes32::new([0x33; 32]);

        let blob = SignatureContainer::new()
            .push(a.address(), SignatureType::Raw, &a.sign_hash(&hash).unwrap())
            .push(b.address(), SignatureType::ApprovedHash, &[])
            .into_bytes();
        assert!(!state.check_signatures(&hash, &blob, 2, &NoContractSigners).unwrap().is_valid());

        assert!(matches!(
            state.approve_hash(signer(3).address(), hash),
            Err(AccountError::CallerNotMultiSigOwner(_))
        ));
        state.approve_hash(b.address(), hash).unwrap();
        assert!(state.check_signatures(&hash, &blob, 2, &NoContractSigners).unwrap().is_valid());
    }

    #[test]
    fn test_module_hooks() {
        let a = signer(1);
        let payload = encode_owner_payload(1, &[a.address()]);
        let module = MultiSigVerifier;

        assert!(module.is_valid_key_type(&payload));
        assert!(!module.is_valid_key_type(&payload[..10]));

        let mut state = module.init_signer(&payload).unwrap();
        let hash = Bytes32::new([0x44; 32]);
        let blob = SignatureContainer::new()
            .push(a.address(), SignatureType::PersonalMessage, &a.sign_personal(&hash).unwrap())
            .into_bytes();
        assert!(module.validate_owner_signature(&state, &hash, &blob, &NoContractSigners));
        assert!(!module.validate_owner_signature(&state, &hash, &blob[..30], &NoContractSigners));

        module.uninit_signer(&mut state).unwrap();
        assert_eq!(state, SignerState::Uninitialized);
    }
}
