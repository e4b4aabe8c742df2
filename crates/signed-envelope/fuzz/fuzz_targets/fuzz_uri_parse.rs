//! Fuzz target for URI envelope parsing.
//!
//! Feeds arbitrary strings to the query-string decoder and checks that a
//! successfully parsed envelope survives re-encoding.
//!
//! ## Running
//!
//! ```bash
//! cd crates/signed-envelope
//! cargo +nightly fuzz run fuzz_uri_parse
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use signed_envelope::Envelope;

fuzz_target!(|input: &str| {
    // Parsing must never panic, whatever the input
    let Ok(envelope) = Envelope::from_uri(input) else {
        return;
    };

    // Parsed envelopes are never verified
    assert!(!envelope.is_verified());

    // Re-encoding a parsed envelope is always parseable
    let reparsed = Envelope::from_uri(&envelope.to_uri()).expect("re-encoded URI parses");

    // Identity is defined exactly when a signature is present
    assert_eq!(
        reparsed.identity().is_ok(),
        reparsed.signature().is_some()
    );
});
