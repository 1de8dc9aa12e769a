// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;
use scribe::services::extractor;

fuzz_target!(|data: &str| {
    // Extraction must never panic, whatever the model sent back.
    let _ = extractor::extract(data);
    let _ = extractor::extract_with_prefix(extractor::PARTIAL_COMPLETION_PREFIX, data);

    // Repair, when it fires, must leave braces balanced.
    if let Some(repaired) = extractor::repair_truncated_json(data) {
        assert_eq!(
            repaired.matches('{').count(),
            repaired.matches('}').count(),
        );
    }
});
