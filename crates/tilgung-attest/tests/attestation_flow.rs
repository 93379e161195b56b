// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End to end: erase a real file, certify the receipt, then verify and tamper.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tilgung_attest::{CertificateStore, Issuer, Verifier};
use tilgung_core::config::TilgungConfig;
use tilgung_core::error::TilgungError;
use tilgung_core::types::{
    Certificate, EraseMethod, OperationReceipt, Subject, Target, VerificationFailure,
};
use tilgung_engine::{EngineOptions, ErasureService};
use tilgung_platform::StaticGate;

fn config(root: &Path) -> TilgungConfig {
    TilgungConfig::for_data_dir(root)
}

fn erase(dir: &Path, authorized: bool, simulate: bool) -> OperationReceipt {
    let victim = dir.join("payroll.xlsx");
    fs::write(&victim, vec![0x5a; 8192]).unwrap();
    let service = ErasureService::new(Arc::new(StaticGate(authorized)), EngineOptions::default());
    service.erase(&Target::File(victim), EraseMethod::Dod522022M, simulate)
}

fn subject() -> Subject {
    Subject {
        user_id: "u-17".into(),
        user_name: "Records Office".into(),
        organization: "Stadtwerke".into(),
        device_serial: "WX-0001".into(),
        ..Default::default()
    }
}

fn certify(data: &Path) -> (TilgungConfig, Certificate) {
    let cfg = config(data);
    let receipt = erase(data, true, false);
    assert!(receipt.is_attestable(), "{:?}", receipt.error);
    let cert = Issuer::open(&cfg).unwrap().issue(&receipt, &subject()).unwrap();
    (cfg, cert)
}

#[test]
fn erased_file_yields_verifiable_certificate() {
    let data = tempfile::tempdir().unwrap();
    let (cfg, cert) = certify(data.path());

    assert!(!data.path().join("payroll.xlsx").exists());
    assert_eq!(cert.erasure.passes_completed, 3);
    assert_eq!(cert.erasure.size_bytes, 8192);

    let result = Verifier::new(&cfg.certificates_root).verify(&cert.id);
    assert!(result.valid, "{:?}", result.failure);

    let store = CertificateStore::open(&cfg.database_path).unwrap();
    store.insert(&cert).unwrap();
    assert!(store.mark_verified(&cert.id, result.verified_at).unwrap());
    assert_eq!(store.stats().unwrap().verified, 1);
}

#[test]
fn edited_record_is_detected() {
    let data = tempfile::tempdir().unwrap();
    let (cfg, cert) = certify(data.path());

    let mut record = fs::read(&cert.artifacts.record).unwrap();
    let last = record.len() - 2;
    record[last] ^= 0x01;
    fs::write(&cert.artifacts.record, record).unwrap();

    let result = Verifier::new(&cfg.certificates_root).verify(&cert.id);
    assert!(!result.valid);
    assert_eq!(result.failure, Some(VerificationFailure::RecordTampered));
}

#[test]
fn edited_report_is_detected() {
    let data = tempfile::tempdir().unwrap();
    let (cfg, cert) = certify(data.path());

    let mut report = fs::read(&cert.artifacts.report).unwrap();
    report.extend_from_slice(b"\n% appended\n");
    fs::write(&cert.artifacts.report, report).unwrap();

    let result = Verifier::new(&cfg.certificates_root).verify(&cert.id);
    assert_eq!(result.failure, Some(VerificationFailure::ReportTampered));
}

#[test]
fn missing_signature_is_reported() {
    let data = tempfile::tempdir().unwrap();
    let (cfg, cert) = certify(data.path());
    fs::remove_file(&cert.artifacts.signature).unwrap();

    let result = Verifier::new(&cfg.certificates_root).verify(&cert.id);
    assert_eq!(
        result.failure,
        Some(VerificationFailure::ArtifactMissing("signature".into()))
    );
}

#[test]
fn simulated_erasure_is_attestable_and_marked() {
    let data = tempfile::tempdir().unwrap();
    let cfg = config(data.path());
    let receipt = erase(data.path(), false, true);

    let cert = Issuer::open(&cfg).unwrap().issue(&receipt, &subject()).unwrap();
    assert!(cert.erasure.simulated);
    assert!(data.path().join("payroll.xlsx").exists());

    let record: serde_json::Value =
        serde_json::from_slice(&fs::read(&cert.artifacts.record).unwrap()).unwrap();
    assert_eq!(record["erasure"]["status"], "simulated");
    assert!(Verifier::new(&cfg.certificates_root).verify(&cert.id).valid);
}

#[test]
fn refused_erasure_cannot_be_certified() {
    let data = tempfile::tempdir().unwrap();
    let cfg = config(data.path());
    let receipt = erase(data.path(), false, false);
    assert!(!receipt.success);

    let err = Issuer::open(&cfg)
        .unwrap()
        .issue(&receipt, &subject())
        .unwrap_err();
    assert!(matches!(err, TilgungError::NotAttestable(_)));

    let leftovers: Vec<_> = fs::read_dir(&cfg.certificates_root)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() != "identity")
        .collect();
    assert!(leftovers.is_empty());
}
