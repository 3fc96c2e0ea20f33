#![no_main]

use context_envelope::{aad, EncryptionContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = aad::parse_context(data);

    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(ctx) = EncryptionContext::parse(text) {
            if let Ok(canonical) = ctx.serialize() {
                assert_eq!(EncryptionContext::parse(&canonical).unwrap(), ctx);
            }
        }
    }
});
