#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use warden_account::{split_signatures, MultiSigState, NoContractSigners};
use warden_core::{Address, Bytes32};

#[derive(Debug, Arbitrary)]
struct Input {
    owners: Vec<[u8; 20]>,
    threshold: u32,
    hash: [u8; 32],
    blob: Vec<u8>,
}

fuzz_target!(|input: Input| {
    // Walk the container - must never panic or loop
    let mut offset = 0;
    let mut steps = 0;
    while let Ok((tuple, next)) = split_signatures(&input.blob, offset) {
        assert!(next == 0 || next > offset);
        assert!(tuple.signature.len() <= input.blob.len());
        steps += 1;
        if next == 0 {
            break;
        }
        offset = next;
    }
    assert!(steps <= input.blob.len());

    let owners: Vec<Address> = input.owners.iter().copied().map(Address::new).collect();
    if let Ok(state) = MultiSigState::new(input.threshold, &owners) {
        let hash = Bytes32::new(input.hash);
        let _ = state.check_signatures(&hash, &input.blob, state.threshold(), &NoContractSigners);
    }
});
