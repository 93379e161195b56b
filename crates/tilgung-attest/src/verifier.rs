// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certificate verification from the artifact triad alone.
//
// Both artifact hashes are recomputed from disk on every call; nothing
// cached at issuance is trusted.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use tilgung_core::types::{VerificationFailure, VerificationResult};
use tilgung_security::identity::{ALGORITHM, verify_signature};
use tilgung_security::hash_file;
use tracing::{debug, info, instrument, warn};

use crate::layout;
use crate::payload::{SignatureEnvelope, SignedPayload};
use crate::record::CertificateRecord;

/// Re-validates certificates stored under one certificates root.
#[derive(Debug, Clone)]
pub struct Verifier {
    root: PathBuf,
    /// When set, envelopes must carry exactly this public key.
    trusted_key: Option<Vec<u8>>,
}

impl Verifier {
    /// Accept any key embedded in the envelope.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            trusted_key: None,
        }
    }

    /// Only accept envelopes signed by `public_key`.
    pub fn trusting(root: &Path, public_key: &[u8]) -> Self {
        Self {
            root: root.to_path_buf(),
            trusted_key: Some(public_key.to_vec()),
        }
    }

    /// Verify certificate `id`.  Every failure is reported in the result.
    #[instrument(skip(self))]
    pub fn verify(&self, id: &str) -> VerificationResult {
        let result = match self.check(id) {
            Ok(result) => result,
            Err(failure) => VerificationResult::failed(id, failure),
        };
        match &result.failure {
            None => info!(expired = result.expired, "certificate verified"),
            Some(failure) => warn!(%failure, "certificate failed verification"),
        }
        result
    }

    fn check(&self, id: &str) -> Result<VerificationResult, VerificationFailure> {
        if !layout::is_certificate_id(id) {
            return Err(VerificationFailure::Malformed(format!(
                "not a certificate id: {id}"
            )));
        }

        let paths = layout::artifact_paths(&self.root, id);
        for (name, path) in [
            ("record", &paths.record),
            ("report", &paths.report),
            ("signature", &paths.signature),
        ] {
            if !path.is_file() {
                return Err(VerificationFailure::ArtifactMissing(name.into()));
            }
        }

        let envelope: SignatureEnvelope = fs::read(&paths.signature)
            .map_err(|e| VerificationFailure::ArtifactMissing(format!("signature: {e}")))
            .and_then(|raw| {
                serde_json::from_slice(&raw)
                    .map_err(|e| VerificationFailure::Malformed(format!("signature: {e}")))
            })?;

        if envelope.algorithm != ALGORITHM {
            return Err(VerificationFailure::UnsupportedAlgorithm(envelope.algorithm));
        }
        if envelope.signed_data.certificate_id != id {
            return Err(VerificationFailure::IdMismatch(
                envelope.signed_data.certificate_id,
            ));
        }

        let record_hash = hash_file(&paths.record)
            .map_err(|e| VerificationFailure::ArtifactMissing(format!("record: {e}")))?;
        let report_hash = hash_file(&paths.report)
            .map_err(|e| VerificationFailure::ArtifactMissing(format!("report: {e}")))?;
        let fresh = SignedPayload {
            certificate_id: id.to_owned(),
            created_at: envelope.signed_data.created_at.clone(),
            record_hash,
            report_hash,
        };
        let message = fresh
            .canonical_bytes()
            .map_err(|e| VerificationFailure::Malformed(e.to_string()))?;

        let signature = BASE64
            .decode(envelope.signature.as_bytes())
            .map_err(|e| VerificationFailure::Malformed(format!("signature encoding: {e}")))?;
        let public_key = BASE64
            .decode(envelope.public_key.as_bytes())
            .map_err(|e| VerificationFailure::Malformed(format!("public key encoding: {e}")))?;

        if let Some(trusted) = &self.trusted_key {
            if *trusted != public_key {
                return Err(VerificationFailure::UntrustedKey);
            }
        }

        if verify_signature(&public_key, &message, &signature).is_err() {
            // Attribute the failure to whichever artifact drifted.
            let signed = &envelope.signed_data;
            return Err(if signed.record_hash != fresh.record_hash {
                VerificationFailure::RecordTampered
            } else if signed.report_hash != fresh.report_hash {
                VerificationFailure::ReportTampered
            } else {
                VerificationFailure::SignatureInvalid
            });
        }
        debug!("signature verified");

        let record: CertificateRecord = fs::read(&paths.record)
            .map_err(|e| VerificationFailure::ArtifactMissing(format!("record: {e}")))
            .and_then(|raw| {
                serde_json::from_slice(&raw)
                    .map_err(|e| VerificationFailure::Malformed(format!("record: {e}")))
            })?;

        let verified_at = Utc::now();
        Ok(VerificationResult {
            certificate_id: id.to_owned(),
            valid: true,
            verified_at,
            algorithm: Some(envelope.algorithm),
            key_size: Some(envelope.key_size),
            expired: record.certificate.expires_at < verified_at,
            failure: None,
        })
    }
}
