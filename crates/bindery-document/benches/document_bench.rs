// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the bindery-document engine. Exercises the merge
// pipeline and the page rasteriser on small synthetic documents.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use bindery_core::types::{ImageKind, OutputNaming, PixelBuffer, PixelLayout};
use bindery_document::{PdfComposer, PdfReader, merge, render_page};

/// Build a document of `pages` solid-colour image pages (200x150 points).
fn fixture_document(pages: usize) -> Vec<u8> {
    let data = [90u8, 120, 160]
        .iter()
        .copied()
        .cycle()
        .take(200 * 150 * 3)
        .collect();
    let buffer = PixelBuffer::new(200, 150, PixelLayout::Rgb, data).unwrap();

    let mut composer = PdfComposer::new();
    for _ in 0..pages {
        composer.append_image_page(&buffer, ImageKind::Png).unwrap();
    }
    composer.serialize().unwrap()
}

/// Benchmark merging two three-page documents, including both decodes and the
/// final serialisation — the full operation as the front end invokes it.
fn bench_merge(c: &mut Criterion) {
    let first = fixture_document(3);
    let second = fixture_document(3);
    let naming = OutputNaming::default();

    c.bench_function("merge (2 x 3 pages)", |b| {
        b.iter(|| {
            let output = merge(black_box(&[&first, &second]), &naming).unwrap();
            black_box(output.bytes);
        });
    });
}

/// Benchmark rasterising a single image page at the engine's default scale.
fn bench_render(c: &mut Criterion) {
    let bytes = fixture_document(1);
    let reader = PdfReader::decode(&bytes, None).unwrap();
    let page_id = reader.page_id(0).unwrap();

    c.bench_function("render_page (200x150 @ 2.0)", |b| {
        b.iter(|| {
            let buffer = render_page(black_box(reader.document()), page_id, 2.0).unwrap();
            black_box(buffer.into_data());
        });
    });
}

criterion_group!(benches, bench_merge, bench_render);
criterion_main!(benches);
