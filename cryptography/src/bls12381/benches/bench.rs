use criterion::criterion_main;


criterion_main!(
    thresholdgroup::benches,
    threshold_recover::benches,
    signature_verification::benches,
    evaluate_point::benches,
);
