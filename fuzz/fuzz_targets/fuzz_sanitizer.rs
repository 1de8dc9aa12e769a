// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;
use scribe::services::template::sanitize_diff;

fuzz_target!(|data: &str| {
    let out = sanitize_diff(data);

    // No live template delimiter may survive sanitization.
    for pair in ["{{", "{%", "{#", "}}", "%}"] {
        assert!(!out.contains(pair), "delimiter {pair} survived");
    }

    // Idempotence: a second pass changes nothing (modulo re-truncation).
    if data.len() < 1024 {
        assert_eq!(sanitize_diff(&out), out);
    }
});
