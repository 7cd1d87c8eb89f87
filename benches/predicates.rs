use criterion::{criterion_group, criterion_main, Criterion};
use layoutprobe::geometry::{ElementFact, GeometryFact, Rect};
use layoutprobe::predicate::{Check, ImageAspect, Predicate};
use layoutprobe::probe::ProbePlan;
use layoutprobe::suite::{Filter, Suite};

fn image_heavy_fact(count: usize) -> GeometryFact {
    let images = (0..count)
        .map(|i| ElementFact::visible(Rect::new(0.0, i as f64 * 310.0, 400.0, 300.0)))
        .collect();
    GeometryFact::new(1440.0, 1440.0).with_elements("img:not(#lightbox-img)", images)
}

fn bench_image_aspect(c: &mut Criterion) {
    let fact = image_heavy_fact(500);
    let predicate = Predicate::ImageAspect(ImageAspect::default());
    c.bench_function("image_aspect_500_images", |b| {
        b.iter(|| {
            let _ = predicate.evaluate(&fact);
        })
    });
}

fn bench_parse_probe_output(c: &mut Criterion) {
    let raw = serde_json::to_string(&image_heavy_fact(500)).unwrap();
    c.bench_function("parse_probe_output", |b| {
        b.iter(|| {
            let _ = ProbePlan::parse(&raw).unwrap();
        })
    });
}

fn bench_expand_builtin_suite(c: &mut Criterion) {
    let suite = Suite::builtin();
    let base = url::Url::parse("http://localhost:4173/").unwrap();
    let filter = Filter::default();
    c.bench_function("expand_builtin_suite", |b| {
        b.iter(|| {
            let cases = suite.cases(&base, &filter).unwrap();
            for case in &cases {
                let _ = case.plan().script();
            }
        })
    });
}

criterion_group!(
    benches,
    bench_image_aspect,
    bench_parse_probe_output,
    bench_expand_builtin_suite
);
criterion_main!(benches);
