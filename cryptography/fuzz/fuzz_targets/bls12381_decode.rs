#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relay_cryptography::bls12381::primitives::group::{Element, Scalar, G1, G2};

#[derive(Arbitrary, Debug)]
enum FuzzInput {
    Scalar(Vec<u8>),
    G1(Vec<u8>),
    G2(Vec<u8>),
}

fn decode<E: Element>(bytes: &[u8]) {
    let Some(element) = E::deserialize(bytes) else {
        return;
    };
    assert_eq!(bytes.len(), E::size());
    assert!(E::deserialize(&element.serialize()) == Some(element));
}

fuzz_target!(|input: FuzzInput| {
    match input {
        FuzzInput::Scalar(bytes) => decode::<Scalar>(&bytes),
        FuzzInput::G1(bytes) => decode::<G1>(&bytes),
        FuzzInput::G2(bytes) => decode::<G2>(&bytes),
    }
});
