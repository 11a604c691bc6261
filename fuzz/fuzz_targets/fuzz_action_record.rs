// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for action record validation

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Plain JSON, bypassing gzip, so the fuzzer reaches record validation.
    if let Ok(actions) = georepl_log::action::decode_batch(data) {
        for action in &actions {
            let record = georepl_log::ActionRecord::from(action.clone());
            let back = georepl_log::Action::try_from(record).expect("valid action re-validates");
            assert_eq!(&back, action);
        }
    }
});
