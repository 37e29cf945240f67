//! Benchmarks for markdown rendering.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use livemark::render::{ComrakRenderer, ExtensionSet, MarkdownCapability, render};

fn bench_render_simple(c: &mut Criterion) {
    let md = "# Hello\n\nWorld";
    c.bench_function("render_simple", |b| b.iter(|| render(black_box(md)).unwrap()));
}

fn bench_render_fixture(c: &mut Criterion) {
    let md = include_str!("../tests/fixtures/sample.md");
    c.bench_function("render_fixture_all_extensions", |b| {
        b.iter(|| render(black_box(md)).unwrap())
    });
    c.bench_function("render_fixture_plain", |b| {
        b.iter(|| {
            ComrakRenderer
                .render(black_box(md), ExtensionSet::empty())
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_render_simple, bench_render_fixture);
criterion_main!(benches);
