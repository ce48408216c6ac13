use std::time::Instant;

use criterion::{BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tokio::runtime::Runtime;
use yao_gc::{
    GarblingConfig,
    channel::SimpleChannel,
    ot::TrustedDealer,
    protocol::{evaluator, garbler},
};

use crate::garbling::random_circuit;

pub fn protocol_benchmark(c: &mut Criterion) {
    // Default runtime for "full" feature is multi-threaded
    let rt = Runtime::new().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(42);

    let mut g = c.benchmark_group("protocol");
    for gates in [1_000, 10_000] {
        let circuit = random_circuit(gates, &mut rng);
        let garbler_inputs: Vec<bool> = (0..64).map(|_| rng.random()).collect();
        let evaluator_inputs: Vec<bool> = (0..64).map(|_| rng.random()).collect();
        for config in [
            GarblingConfig::fixed_key_free_xor_half_gates(),
            GarblingConfig::no_fixed_key_four_to_two(),
        ] {
            let id = BenchmarkId::new(format!("2pc {:?}", config.variant), gates);
            g.bench_function(id, |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let circuit = &circuit;
                    let garbler_inputs = &garbler_inputs;
                    let evaluator_inputs = &evaluator_inputs;
                    async move {
                        let now = Instant::now();
                        for _ in 0..iters {
                            let (garbler_channel, evaluator_channel) = SimpleChannel::pair();
                            let (garbler_ot, evaluator_ot, _dealer) = TrustedDealer::spawn();
                            tokio::try_join!(
                                garbler(circuit, config, garbler_inputs, garbler_channel, garbler_ot),
                                evaluator(circuit, evaluator_inputs, evaluator_channel, evaluator_ot)
                            )
                            .expect("protocol failed");
                        }
                        now.elapsed()
                    }
                })
            });
        }
    }
    g.finish();
}
