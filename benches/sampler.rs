use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dpseg::config::PriorConfig;
use dpseg::model::{Cluster, Corpus, FrameStore};
use dpseg::sampler::Sampler;
use std::hint::black_box;

const DIM: usize = 39;

/// Deterministic pseudo-features so runs are comparable.
fn synthetic_frames(count: usize) -> Vec<f32> {
    (0..count * DIM)
        .map(|i| ((i * 7919) % 1000) as f32 / 500.0 - 1.0)
        .collect()
}

fn prior() -> PriorConfig {
    PriorConfig {
        dim: DIM,
        ..PriorConfig::default()
    }
}

fn bench_viterbi(c: &mut Criterion) {
    let mut group = c.benchmark_group("viterbi");
    let mut sampler = Sampler::new(prior(), Some(1));
    let cluster: Cluster = sampler.sample_cluster_from_base();

    for &len in &[10usize, 50, 200] {
        let mut store = FrameStore::new(DIM);
        store.extend(&synthetic_frames(len));
        let frames: Vec<usize> = (0..len).collect();

        group.bench_with_input(BenchmarkId::new("direct", len), &len, |b, _| {
            b.iter(|| black_box(cluster.compute_likelihood(&store, &frames)))
        });

        let mut cached = cluster.clone();
        cached.precompute(&store, 0..len);
        group.bench_with_input(BenchmarkId::new("precomputed", len), &len, |b, _| {
            b.iter(|| black_box(cached.compute_likelihood(&store, &frames)))
        });
    }
    group.finish();
}

/// One boundary sweep over a single utterance of `bounds` five-frame bounds.
fn bench_boundary_sweep(c: &mut Criterion) {
    let bounds = 40;
    let mut corpus = Corpus::new(DIM);
    let values = synthetic_frames(bounds * 5);
    for k in 0..bounds {
        let slice = &values[k * 5 * DIM..(k + 1) * 5 * DIM];
        corpus.push_bound(k * 5, k * 5 + 4, k + 1 == bounds, slice);
    }
    let mut sampler = Sampler::new(prior(), Some(2));
    for k in 0..bounds {
        corpus.bounds[k].phoneme_end = true;
        let segment = dpseg::model::Segment::new("bench", vec![k]);
        let assignment = sampler.sample_just_cluster(&corpus, &segment);
        if sampler.assign_and_decode(&mut corpus, segment, assignment).is_err() {
            return;
        }
    }

    c.bench_function("boundary_sweep_40_bounds", |b| {
        b.iter(|| {
            for bound in 0..bounds {
                if sampler.sample_boundary(&mut corpus, bound).is_err() {
                    break;
                }
            }
            black_box(corpus.segment_count())
        })
    });
}

criterion_group!(benches, bench_viterbi, bench_boundary_sweep);
criterion_main!(benches);
