//! Fuzz target for message decoding.
//!
//! Arbitrary bytes must never panic the decoder, and anything that does
//! decode must encode back to a message of the same length.

#![no_main]

use flowctl_wire::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = Message::decode(data) {
        // Re-encoding may refuse what the decoder accepted, but never panics.
        if let Ok(bytes) = msg.to_bytes() {
            assert_eq!(bytes.len(), msg.encoded_len());
        }
        let _ = msg.validate();
    }
});
