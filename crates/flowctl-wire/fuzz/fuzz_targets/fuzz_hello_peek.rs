//! Fuzz target for lenient hello parsing.

#![no_main]

use flowctl_wire::peek_hello;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = peek_hello(data);
});
