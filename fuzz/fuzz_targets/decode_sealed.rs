#![no_main]

use context_envelope::sealed;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = sealed::deserialize(data, None::<[(&str, &str); 0]>);
    let _ = sealed::deserialize(data, Some([("tenant", "acme")]));
});
