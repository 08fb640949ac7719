//! Hot-path benchmarks for the renderer: fade application, EQ, and the
//! effect kernels over one-second stereo buffers.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mixtape_common::fade_curves::CrossfadeCurve;
use mixtape_common::set::{EffectKind, TransitionEffect};
use mixtape_render::effects;
use mixtape_render::eq::ThreeBandEq;
use mixtape_render::SAMPLE_RATE;

fn one_second_stereo() -> Vec<f32> {
    (0..SAMPLE_RATE as usize)
        .flat_map(|n| {
            let v = (2.0 * std::f64::consts::PI * 440.0 * n as f64 / SAMPLE_RATE as f64).sin()
                as f32
                * 0.5;
            [v, v]
        })
        .collect()
}

fn bench_fade_curves(c: &mut Criterion) {
    let mut group = c.benchmark_group("fade_curves");
    for curve in [
        CrossfadeCurve::Linear,
        CrossfadeCurve::SCurve,
        CrossfadeCurve::Exponential,
    ] {
        group.bench_function(curve.as_str(), |b| {
            let buffer = one_second_stereo();
            b.iter(|| {
                let mut out = buffer.clone();
                let frames = out.len() / 2;
                for frame in 0..frames {
                    let factor = curve.fade_out(frame as f64 / frames as f64) as f32;
                    out[frame * 2] *= factor;
                    out[frame * 2 + 1] *= factor;
                }
                black_box(out)
            });
        });
    }
    group.finish();
}

fn bench_eq(c: &mut Criterion) {
    c.bench_function("three_band_eq", |b| {
        let buffer = one_second_stereo();
        b.iter(|| {
            let mut out = buffer.clone();
            let mut eq = ThreeBandEq::new(SAMPLE_RATE, 0.2, -0.1, 0.3);
            eq.process(&mut out);
            black_box(out)
        });
    });
}

fn bench_effect_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("effects");
    for kind in [
        EffectKind::FilterSweep,
        EffectKind::Echo,
        EffectKind::Reverb,
        EffectKind::Flanger,
        EffectKind::Scratch,
    ] {
        group.bench_function(kind.as_str(), |b| {
            let effect = TransitionEffect::new(kind, 0.0, 1.0, 0.5);
            let buffer = one_second_stereo();
            b.iter(|| {
                let mut out = buffer.clone();
                effects::apply(&effect, &mut out, SAMPLE_RATE);
                black_box(out)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fade_curves, bench_eq, bench_effect_kernels);
criterion_main!(benches);
