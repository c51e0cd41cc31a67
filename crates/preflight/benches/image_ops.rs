//! Image Operations Benchmarks
//!
//! Benchmarks for screenshot diffing, PNG encoding and contrast math.
//!
//! Run with: `cargo bench --bench image_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use preflight::visual_regression::{diff_images, encode_png};
use preflight::{Color, Linearization};

fn screen(width: u32, height: u32, shift: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let v = ((x + y) % 256) as u8;
        Rgba([v.wrapping_add(shift), v, 255 - v, 255])
    })
}

fn bench_diff_images(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_images");

    for (width, height) in [(375, 667), (768, 1024), (1920, 1080)] {
        let expected = screen(width, height, 0);
        let actual = screen(width, height, 40);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(actual, expected),
            |bench, (a, e)| {
                bench.iter(|| {
                    let diff = diff_images(black_box(a), black_box(e), 0.1, false);
                    black_box(diff.diff_pixels);
                });
            },
        );
    }

    group.finish();
}

fn bench_encode_png(c: &mut Criterion) {
    let img = screen(375, 667, 0);
    c.bench_function("encode_png_375x667", |bench| {
        bench.iter(|| {
            let bytes = encode_png(black_box(&img)).unwrap();
            black_box(bytes.len());
        });
    });
}

fn bench_contrast_ratio(c: &mut Criterion) {
    let mut group = c.benchmark_group("contrast_ratio");

    let pairs = [
        (Color::new(0, 0, 0), "black_white"),
        (Color::new(118, 118, 118), "grey118_white"),
        (Color::new(0, 128, 0), "green_white"),
    ];

    for curve in [Linearization::Gamma22, Linearization::Srgb] {
        for (fg, name) in pairs {
            group.bench_with_input(
                BenchmarkId::new(format!("{curve:?}"), name),
                &fg,
                |bench, fg: &Color| {
                    bench.iter(|| black_box(*fg).contrast_ratio(black_box(&Color::WHITE), curve));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_diff_images,
    bench_encode_png,
    bench_contrast_ratio
);
criterion_main!(benches);
