#![no_main]

use context_envelope::{inspect, packet, EncryptionContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = inspect(data);
    let _ = packet::decode(data, None);

    let expected = EncryptionContext::from_entries([("table_name", None), ("key", Some("value"))]);
    if let Ok(expected) = expected {
        if let Ok((ctx, ct)) = packet::decode(data, Some(&expected)) {
            // anything accepted must re-encode and decode to the same parts
            let wire = packet::encode(ctx.as_ref(), &ct).unwrap();
            let (again, ct_again) = packet::decode(&wire, Some(&expected)).unwrap();
            assert_eq!(again, ctx);
            assert_eq!(ct_again, ct);
        }
    }
});
