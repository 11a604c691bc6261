// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for segment decoding

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail cleanly, never panic.
    if let Ok(actions) = georepl_log::decode_segment(data) {
        // Anything that decodes must encode and decode again.
        let bytes = georepl_log::encode_segment(&actions, 1).expect("re-encode decoded batch");
        let again = georepl_log::decode_segment(&bytes).expect("decode re-encoded batch");
        assert_eq!(again.len(), actions.len());
    }
});
