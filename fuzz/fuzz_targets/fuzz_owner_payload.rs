#![no_main]

use libfuzzer_sys::fuzz_target;
use warden_account::{encode_owner_payload, parse_owner_payload, MultiSigState};

fuzz_target!(|data: &[u8]| {
    // Parse payload - should not panic
    if let Ok((threshold, owners)) = parse_owner_payload(data) {
        // Round-trip should preserve data
        assert_eq!(encode_owner_payload(threshold, &owners), data);
    }

    // Accepted payloads always satisfy the threshold invariant
    if let Ok(state) = MultiSigState::from_payload(data) {
        assert!(state.threshold() >= 1);
        assert!(state.threshold() as usize <= state.owners().len());
    }
});
