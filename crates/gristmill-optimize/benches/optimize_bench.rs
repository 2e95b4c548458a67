use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gristmill_core::{indices, Computation, Factor, Range, Term};
use gristmill_optimize::{optimize, OptimizeOptions, Strategy};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// `n_eqs` matrix-chain equations of length `len` over a shared pool of
/// tensors, so that subchains repeat across equations.
fn random_chains(n_eqs: usize, len: usize, seed: u64) -> Vec<Computation> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let r = Range::zero_to("R", "n").with_estimate(20);
    let tensors = ["t0", "t1", "t2", "t3", "t4"];
    let dummies: Vec<String> = (0..=len).map(|i| format!("i{i}")).collect();

    (0..n_eqs)
        .map(|e| {
            let factors = (0..len)
                .map(|k| {
                    let base = tensors[rng.random_range(0..tensors.len())];
                    Factor::new(base, indices(&r, &[&dummies[k], &dummies[k + 1]]))
                })
                .collect();
            let sums: Vec<&str> = dummies[1..len].iter().map(String::as_str).collect();
            Computation::new(
                format!("r{e}"),
                indices(&r, &[&dummies[0], &dummies[len]]),
            )
            .with_term(Term::product(factors).summed(indices(&r, &sums)))
        })
        .collect()
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_chains");

    for &len in &[3, 5, 7] {
        let eqs = random_chains(8, len, 42);
        group.bench_with_input(BenchmarkId::new("optimal", len), &eqs, |b, eqs| {
            let opts = OptimizeOptions::optimal();
            b.iter(|| optimize(eqs, &opts).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("optimal_parallel", len), &eqs, |b, eqs| {
            let opts = OptimizeOptions::optimal().with_parallel(true);
            b.iter(|| optimize(eqs, &opts).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("greedy", len), &eqs, |b, eqs| {
            let opts = OptimizeOptions::default().with_strategy(Strategy::Greedy);
            b.iter(|| optimize(eqs, &opts).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_optimize);
criterion_main!(benches);
