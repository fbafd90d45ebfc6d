use badge_portrait::{
    codec::{project_mask, resample_mask},
    geometry::{badge_crop, circle_crop, rect_crop},
    BoundingBox, Compositor, Mask, Normalization, ResizeMode, TensorCodec, TensorLayout,
    TensorSpec,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use ndarray::{ArrayD, IxDyn};

const SOURCE_SIZES: [(u32, u32); 3] = [(640, 480), (1280, 960), (3024, 4032)];

fn portrait(width: u32, height: u32) -> DynamicImage {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    DynamicImage::ImageRgba8(image)
}

fn bench_encode(c: &mut Criterion) {
    let codec = TensorCodec::default();
    let mut group = c.benchmark_group("encode");
    group.sample_size(10);

    for (width, height) in SOURCE_SIZES {
        let image = portrait(width, height);
        for (layout, resize, size) in [
            (TensorLayout::Chw, ResizeMode::Letterbox, 1024),
            (TensorLayout::Hwc, ResizeMode::Letterbox, 1024),
            (TensorLayout::Chw, ResizeMode::Stretch, 512),
        ] {
            let spec = TensorSpec::new(layout, size, Normalization::ImageNet, resize);
            group.bench_with_input(
                BenchmarkId::new(spec.to_string(), format!("{width}x{height}")),
                &image,
                |b, image| b.iter(|| codec.encode(black_box(image), &spec)),
            );
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let codec = TensorCodec::default();
    let output = ArrayD::from_elem(IxDyn(&[1, 1, 1024, 1024]), 0.5_f32);

    c.bench_function("decode_1024", |b| b.iter(|| codec.decode(black_box(&output))));
}

fn bench_mask_mapping(c: &mut Criterion) {
    let codec = TensorCodec::default();
    let mask = Mask::filled(1024, 1024, 0.75);
    let mut group = c.benchmark_group("mask_mapping");
    group.sample_size(20);

    for (width, height) in SOURCE_SIZES {
        let id = format!("{width}x{height}");
        group.bench_with_input(BenchmarkId::new("resample", &id), &mask, |b, mask| {
            b.iter(|| resample_mask(black_box(mask), width, height));
        });

        let rgb = portrait(width, height).to_rgb8();
        if let Ok((_, transform)) = codec.letterbox(&rgb, 1024) {
            group.bench_with_input(BenchmarkId::new("project", &id), &mask, |b, mask| {
                b.iter(|| project_mask(black_box(mask), &transform));
            });
        }
    }
    group.finish();
}

fn bench_geometry(c: &mut Criterion) {
    let face = BoundingBox::new(300.0, 150.0, 120.0, 160.0);
    let compositor = Compositor::default();
    let image = portrait(800, 600).to_rgba8();

    c.bench_function("crop_geometry", |b| {
        b.iter(|| {
            let face = black_box(&face);
            (
                rect_crop(face, 800, 600),
                circle_crop(face, 800, 600),
                badge_crop(face, 800, 600),
            )
        });
    });

    if let Ok(region) = circle_crop(&face, 800, 600) {
        c.bench_function("circle_crop_with_ring", |b| {
            b.iter(|| compositor.crop(black_box(&image), &region));
        });
    }
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_mask_mapping,
    bench_geometry
);
criterion_main!(benches);
