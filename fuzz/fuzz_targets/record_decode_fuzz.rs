//! Fuzz test for the persisted record decoder
//!
//! Feeds arbitrary bytes to `decode_record`, which reads whatever a previous
//! run left on disk. It must reject bad input with an error, never a panic.
//!
//! Run with: cargo +nightly fuzz run record_decode_fuzz -- -max_total_time=60

#![no_main]

use confluence_storage::{decode_record, encode_record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = decode_record::<serde_json::Value>(data) else {
        return;
    };

    // Anything that decodes must survive a rewrite.
    let bytes = encode_record(&record.state, record.persisted_at)
        .expect("decoded state should encode");
    let again =
        decode_record::<serde_json::Value>(&bytes).expect("re-encoded record should decode");
    assert_eq!(again.persisted_at, record.persisted_at, "timestamp changed");
});
