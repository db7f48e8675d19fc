use chirp_engine::{engine, EngineConfig, NoiseColor, NoiseParams, ToneParams, VoiceConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn render_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_interleaved");
    for frames in [64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(frames), &frames, |b, &frames| {
            let voices = VoiceConfig {
                beep: ToneParams::default(),
                noise: NoiseParams { color: NoiseColor::Pink, seed: Some(1), ..NoiseParams::default() },
            };
            let (mut control, mut renderer) = engine(&EngineConfig::default(), voices).unwrap();
            control.start_beep().unwrap();
            control.start_white_noise().unwrap();
            let mut buf = vec![0.0_f32; frames * 2];
            b.iter(|| {
                renderer.render_interleaved(black_box(&mut buf), 2);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, render_block);
criterion_main!(benches);
