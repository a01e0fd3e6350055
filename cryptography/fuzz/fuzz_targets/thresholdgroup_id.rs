#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_cryptography::bls12381::thresholdgroup::Id;

fuzz_target!(|input: &str| {
    let Ok(id) = Id::parse(input) else {
        return;
    };

    // The displayed form parses back to the same identifier
    assert_eq!(Id::parse(&id.to_string()).ok(), Some(id));
});
