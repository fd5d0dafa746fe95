#![no_main]

use libfuzzer_sys::fuzz_target;
use wire::{decode_message, encode_message, WireLimits};

fuzz_target!(|data: &[u8]| {
    let limits = WireLimits::for_testing();

    // Arbitrary bytes must decode or error, never panic; whatever decodes
    // must re-encode and decode back to the same value.
    if let Ok(message) = decode_message(data, &limits) {
        let bytes = encode_message(&message, &limits).expect("decoded message re-encodes");
        let again = decode_message(&bytes, &limits).expect("re-encoded message decodes");
        assert_eq!(again, message);
    }
});
