#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rand::{rngs::StdRng, SeedableRng};
use relay_cryptography::bls12381::{
    primitives::group::Scalar,
    thresholdgroup::{Id, Local},
};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    seed: u64,
    participants: u8,
    threshold: u8,
    corrupt: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let participants = (input.participants % 8) as u64 + 2;
    let threshold = (input.threshold as u64 % participants) as u32 + 1;
    let mut rng = StdRng::seed_from_u64(input.seed);
    let ids = (1..=participants)
        .filter_map(Id::from_u64)
        .collect::<Vec<_>>();
    let members = ids
        .iter()
        .map(|id| {
            Local::new_from(&id.to_string(), threshold, &mut rng)
                .unwrap()
                .initialize_sharing(ids.iter().copied())
        })
        .collect::<Vec<_>>();

    // The first member receives from every other dealer (corrupt dealers send random shares)
    let mut receiver = members[0].clone();
    for (index, dealer) in members.iter().enumerate().skip(1) {
        receiver
            .add_commitments_from_id(dealer.id(), dealer.commitments().to_vec())
            .unwrap();
        let corrupt = input
            .corrupt
            .iter()
            .any(|i| *i as usize % members.len() == index);
        let share = if corrupt {
            Scalar::rand(&mut rng)
        } else {
            dealer.secret_share_for_id(receiver.id()).unwrap()
        };
        assert_eq!(receiver.add_share_from_id(dealer.id(), share), !corrupt);
    }
    assert!(receiver.commitments_complete());
    assert_eq!(receiver.shares_complete(), receiver.accused_ids().is_empty());
});
