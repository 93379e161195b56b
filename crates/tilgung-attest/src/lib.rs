// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tilgung Attest: turns a successful erasure receipt into a signed
// certificate and re-validates certificates from their artifacts.
//
// Each certificate is an artifact triad under `<certificates_root>/<id>/`:
// the structured record (`.record`, JSON), the human report (`.report`, PDF)
// and the detached signature (`.sig`, JSON).

pub mod issuer;
pub mod layout;
pub mod payload;
pub mod record;
pub mod report;
pub mod store;
pub mod verifier;

pub use issuer::Issuer;
pub use payload::{SignatureEnvelope, SignedPayload};
pub use record::CertificateRecord;
pub use store::{
    CertificateFilter, CertificateStats, CertificateStore, OperationSummary, StoredCertificate,
};
pub use verifier::Verifier;
