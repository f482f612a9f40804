//! Fuzz target for stream framing.
//!
//! Feeds the input in uneven chunks and decodes every frame produced.

#![no_main]

use flowctl_wire::{FrameReader, Message};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = FrameReader::new();
    for chunk in data.chunks(7) {
        reader.extend(chunk);
        loop {
            match reader.read_frame() {
                Ok(Some(frame)) => {
                    let _ = Message::decode(&frame);
                }
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});
