use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use surfmatch::{ImageView, KnnMatcher, ModelMatcher, SurfConfig, SurfDetector};

fn make_image(width: usize, height: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(0x2545_f491);
    let mut data = vec![128u8; width * height];
    for _ in 0..(width * height / 400) {
        let cx = rng.random_range(0..width);
        let cy = rng.random_range(0..height);
        let r = rng.random_range(3..11usize);
        let v: u8 = if rng.random_bool(0.5) { 30 } else { 220 };
        for y in cy.saturating_sub(r)..(cy + r).min(height) {
            for x in cx.saturating_sub(r)..(cx + r).min(width) {
                let (dx, dy) = (x.abs_diff(cx), y.abs_diff(cy));
                if dx * dx + dy * dy <= r * r {
                    data[y * width + x] = v;
                }
            }
        }
    }
    data
}

fn extract_patch(
    image: &[u8],
    img_width: usize,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = (y0 + y) * img_width;
        out.extend_from_slice(&image[row + x0..row + x0 + width]);
    }
    out
}

fn bench_pipeline(c: &mut Criterion) {
    let img_width = 512;
    let img_height = 512;
    let image = make_image(img_width, img_height);
    let image_view = ImageView::from_slice(&image, img_width, img_height).unwrap();

    let tpl_width = 192;
    let tpl_height = 160;
    let tpl = extract_patch(&image, img_width, 128, 96, tpl_width, tpl_height);
    let tpl_view = ImageView::from_slice(&tpl, tpl_width, tpl_height).unwrap();

    let detector = SurfDetector::new(SurfConfig::default()).unwrap();
    c.bench_function("surf_detect_and_compute_512", |b| {
        b.iter(|| black_box(detector.detect_and_compute(image_view)));
    });

    let model = detector.detect_and_compute(tpl_view);
    let observed = detector.detect_and_compute(image_view);
    c.bench_function("knn_match_bruteforce", |b| {
        let matcher = KnnMatcher::from_features(&model);
        b.iter(|| black_box(matcher.knn_match(&observed.descriptors).unwrap()));
    });

    let matcher = ModelMatcher::new(tpl_view).unwrap();
    c.bench_function("find_match_sequential", |b| {
        b.iter(|| black_box(matcher.match_observed(image_view).unwrap()));
    });

    #[cfg(feature = "rayon")]
    {
        use surfmatch::MatchConfig;
        let matcher = ModelMatcher::with_config(
            tpl_view,
            MatchConfig {
                parallel: true,
                ..MatchConfig::default()
            },
        )
        .unwrap();
        c.bench_function("find_match_parallel", |b| {
            b.iter(|| black_box(matcher.match_observed(image_view).unwrap()));
        });
    }
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
