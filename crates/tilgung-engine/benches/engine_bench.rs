// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the overwrite pass loop in tilgung-engine.

use std::io::Cursor;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use tilgung_core::types::EraseMethod;
use tilgung_engine::overwrite::run_passes;
use tilgung_engine::{CancelToken, passes_for};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// One 4 MiB in-memory pass per method, using the default 1 MiB chunk.
///
/// Isolates pattern generation and chunking from disk sync cost.
fn bench_single_pass(c: &mut Criterion) {
    const LEN: usize = 4 * 1024 * 1024;
    let methods = [
        ("zero", EraseMethod::Zero),
        ("random", EraseMethod::Random),
    ];

    let mut group = c.benchmark_group("overwrite_pass");
    group.throughput(Throughput::Bytes(LEN as u64));
    for (label, method) in methods {
        group.bench_function(label, |b| {
            let mut sink = Cursor::new(vec![0u8; LEN]);
            let token = CancelToken::new();
            b.iter(|| {
                let out = run_passes(
                    &mut sink,
                    LEN as u64,
                    black_box(passes_for(method)),
                    1024 * 1024,
                    &token,
                    &(),
                );
                black_box(out.bytes_written);
            });
        });
    }
    group.finish();
}

/// The three-byte Gutmann patterns at an odd chunk size, to keep the phase
/// alignment path honest.
fn bench_multibyte_pattern(c: &mut Criterion) {
    const LEN: usize = 1024 * 1024;
    let gutmann = passes_for(EraseMethod::Gutmann);
    let fixed_only = &gutmann[4..31];

    c.bench_function("gutmann fixed passes (1 MiB, 64 KiB + 1 chunk)", |b| {
        let mut sink = Cursor::new(vec![0u8; LEN]);
        let token = CancelToken::new();
        b.iter(|| {
            let out = run_passes(
                &mut sink,
                LEN as u64,
                black_box(fixed_only),
                64 * 1024 + 1,
                &token,
                &(),
            );
            black_box(out.passes_completed);
        });
    });
}

criterion_group!(benches, bench_single_pass, bench_multibyte_pattern);
criterion_main!(benches);
