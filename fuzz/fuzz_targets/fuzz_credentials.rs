//! Fuzz testing for bearer token parsing and claim extraction.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_credentials
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use trust_gate::middleware::extract_bearer_token;
use trust_gate::middleware::user_auth::claims_from_map;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = std::str::from_utf8(data) {
        if let Some(token) = extract_bearer_token(header) {
            assert!(token.len() < header.len());
        }
    }

    if let Ok(claims) = serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(data) {
        if let Ok(user) = claims_from_map(claims) {
            assert!(!user.account_id.is_empty());
        }
    }
});
