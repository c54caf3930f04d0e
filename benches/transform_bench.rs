use audio_shm::pcm::generate_test_signal;
use audio_shm::transform::{process, process_into};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_soft_clip(c: &mut Criterion) {
    let input = generate_test_signal(44_100, 44_100, 2, 440.0);
    let mut out = vec![0.0f32; input.len()];

    c.bench_function("soft_clip_1s_stereo", |b| {
        b.iter(|| {
            process_into(black_box(&input), &mut out, black_box(1.5), false).unwrap();
            black_box(&out);
        })
    });

    c.bench_function("bypass_1s_stereo", |b| {
        b.iter(|| black_box(process(black_box(&input), 1.0, true)))
    });
}

criterion_group!(benches, bench_soft_clip);
criterion_main!(benches);
