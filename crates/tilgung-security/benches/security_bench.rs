// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for artifact hashing, payload signing and audit
// logging in the tilgung-security crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tilgung_security::{
    AuditAction, AuditLog, IdentityOptions, SigningIdentity, hash_bytes, verify_signature,
};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// SHA-256 over sizes spanning a JSON record to a multi-page PDF report.
fn bench_integrity_hash(c: &mut Criterion) {
    let sizes: &[(&str, usize)] = &[
        ("1 KiB", 1024),
        ("10 KiB", 10 * 1024),
        ("100 KiB", 100 * 1024),
    ];

    let mut group = c.benchmark_group("integrity_hash_sha256");
    for &(label, size) in sizes {
        let data = vec![0xABu8; size];
        group.bench_function(label, |b| {
            b.iter(|| black_box(hash_bytes(black_box(&data))));
        });
    }
    group.finish();
}

/// Sign and verify a payload the size of a real canonical signed payload.
fn bench_sign_verify(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let identity = SigningIdentity::load_or_create(
        dir.path(),
        &IdentityOptions {
            validity_years: 1,
            passphrase: None,
            require_sealed: false,
        },
    )
    .expect("identity");
    let payload = concat!(
        r#"{"certificate_id":"CERT-20260101000000-0a1b2c3d","#,
        r#""created_at":"2026-01-01T00:00:00+00:00","#,
        r#""record_hash":"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855","#,
        r#""report_hash":"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"}"#,
    )
    .as_bytes();

    c.bench_function("ecdsa_p256 sign", |b| {
        b.iter(|| black_box(identity.sign(black_box(payload)).expect("sign")));
    });

    let signature = identity.sign(payload).expect("sign");
    c.bench_function("ecdsa_p256 verify", |b| {
        b.iter(|| {
            verify_signature(identity.public_key(), black_box(payload), &signature)
                .expect("verify");
        });
    });
}

/// Steady-state insertion into an in-memory audit log.
fn bench_audit_record(c: &mut Criterion) {
    c.bench_function("audit_record (in-memory SQLite)", |b| {
        let log = AuditLog::open_in_memory().expect("open in-memory audit log");
        b.iter(|| {
            log.record(
                black_box(AuditAction::Issue),
                black_box("CERT-20260101000000-0a1b2c3d"),
                black_box(true),
                black_box(Some("benchmark entry")),
            )
            .expect("record failed");
        });
    });
}

criterion_group!(benches, bench_integrity_hash, bench_sign_verify, bench_audit_record);
criterion_main!(benches);
