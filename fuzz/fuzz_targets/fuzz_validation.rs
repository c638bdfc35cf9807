//! Fuzz testing for sync payload validation.
//!
//! Ensures the validators never panic on arbitrary input, including
//! multi-byte characters, control characters and oversized strings.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the validation fuzz target
//! cargo +nightly fuzz run fuzz_validation
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use trust_gate::models::SyncKeyRequest;
use trust_gate::validation::{validate_api_key, validate_service_name, validate_sync_request};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = validate_service_name(s);
        let _ = validate_api_key(s);
    }

    // Whole payloads, as the sync endpoint sees them
    if let Ok(request) = serde_json::from_slice::<SyncKeyRequest>(data) {
        if let Ok(identity) = validate_sync_request(request, chrono::Utc::now()) {
            assert!(!identity.name.is_empty());
            // Every accepted key must be presentable as a header value
            assert!(identity.api_key.expose().bytes().all(|b| b.is_ascii_graphic()));
        }
    }
});
