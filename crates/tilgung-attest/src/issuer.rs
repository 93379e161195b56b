// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certificate issuance: receipt in, signed artifact triad out.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Duration, Utc};
use tilgung_core::config::TilgungConfig;
use tilgung_core::error::{Result, TilgungError};
use tilgung_core::types::{Certificate, ErasureSummary, OperationReceipt, Subject};
use tilgung_security::hash_file;
use tilgung_security::identity::{ALGORITHM, IdentityOptions, KEY_SIZE, SigningIdentity};
use tracing::{info, instrument, warn};

use crate::layout;
use crate::payload::{SignatureEnvelope, SignedPayload};
use crate::record::CertificateRecord;
use crate::report;

/// Mints certificates under one certificates root with one signing identity.
#[derive(Debug)]
pub struct Issuer {
    root: PathBuf,
    identity: Arc<SigningIdentity>,
    validity: Duration,
}

impl Issuer {
    /// Bootstrap the identity under `<certificates_root>/identity` and build
    /// an issuer from the configured validity.
    pub fn open(config: &TilgungConfig) -> Result<Self> {
        let opts = IdentityOptions {
            validity_years: config.identity_validity_years,
            passphrase: config.identity_passphrase(),
            require_sealed: config.identity_sealing_configured(),
        };
        let dir = layout::identity_dir(&config.certificates_root);
        let identity = SigningIdentity::load_or_create(&dir, &opts)?;
        Ok(Self::with_identity(
            &config.certificates_root,
            Arc::new(identity),
            config.certificate_validity_days,
        ))
    }

    pub fn with_identity(root: &Path, identity: Arc<SigningIdentity>, validity_days: i64) -> Self {
        Self {
            root: root.to_path_buf(),
            identity,
            validity: Duration::days(validity_days.max(1)),
        }
    }

    pub fn identity(&self) -> &Arc<SigningIdentity> {
        &self.identity
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Issue a certificate for a successful erasure.
    ///
    /// Nothing is left on disk if any step fails.
    #[instrument(skip_all, fields(operation_id = %receipt.operation_id))]
    pub fn issue(&self, receipt: &OperationReceipt, subject: &Subject) -> Result<Certificate> {
        if !receipt.is_attestable() {
            let why = receipt
                .error
                .as_ref()
                .map_or_else(|| "erasure did not succeed".to_owned(), |e| e.message.clone());
            return Err(TilgungError::NotAttestable(why));
        }

        let created_at = Utc::now();
        let id = layout::new_certificate_id(created_at)?;
        let artifacts = layout::artifact_paths(&self.root, &id);

        fs::create_dir_all(&self.root)?;
        fs::create_dir(&artifacts.directory).map_err(|e| {
            TilgungError::Certificate(format!(
                "cannot create {}: {e}",
                artifacts.directory.display()
            ))
        })?;

        let cert = Certificate {
            id,
            subject: subject.clone(),
            erasure: ErasureSummary::from(receipt),
            created_at,
            expires_at: created_at + self.validity,
            artifacts,
        };

        match self.write_artifacts(&cert) {
            Ok(()) => {
                info!(certificate_id = %cert.id, "certificate issued");
                Ok(cert)
            }
            Err(e) => {
                warn!(
                    certificate_id = %cert.id,
                    error = %e,
                    "issuance failed, removing partial artifacts"
                );
                let _ = fs::remove_dir_all(&cert.artifacts.directory);
                Err(e)
            }
        }
    }

    fn write_artifacts(&self, cert: &Certificate) -> Result<()> {
        let paths = &cert.artifacts;

        let record = CertificateRecord::build(cert);
        fs::write(&paths.record, record.to_json()?)?;
        info!(path = %paths.record.display(), "record written");

        fs::write(&paths.report, report::render(cert, &record))?;
        info!(path = %paths.report.display(), "report written");

        let payload = SignedPayload {
            certificate_id: cert.id.clone(),
            created_at: cert.created_at.to_rfc3339(),
            record_hash: hash_file(&paths.record)?,
            report_hash: hash_file(&paths.report)?,
        };
        let signature = self.identity.sign(&payload.canonical_bytes()?)?;

        let envelope = SignatureEnvelope {
            signature: BASE64.encode(signature),
            algorithm: ALGORITHM.into(),
            key_size: KEY_SIZE,
            signed_data: payload,
            public_key: self.identity.public_key_base64(),
            identity_certificate: self.identity.certificate_pem().to_owned(),
        };
        fs::write(&paths.signature, serde_json::to_vec_pretty(&envelope)?)?;
        info!(path = %paths.signature.display(), "signature written");
        Ok(())
    }
}
