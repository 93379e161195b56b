// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structured certificate record (the `.record` artifact).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tilgung_core::types::{Certificate, EraseMethod, OperationId};
use tilgung_security::hash_bytes;
use tilgung_security::identity::{ALGORITHM, AUTHORITY, KEY_SIZE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub certificate: CertificateSection,
    pub user: UserSection,
    pub device: DeviceSection,
    pub erasure: ErasureSection,
    pub verification: VerificationSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSection {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSection {
    pub id: String,
    pub name: String,
    pub organization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSection {
    pub serial: String,
    pub model: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErasureSection {
    pub operation_id: OperationId,
    pub method: EraseMethod,
    pub method_name: String,
    pub status: String,
    pub target_kind: String,
    pub target_path: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub passes_completed: usize,
    pub total_passes: usize,
    pub duration_seconds: f64,
    pub verification_hash: Option<String>,
    pub simulated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSection {
    pub certificate_hash: String,
    pub signature_algorithm: String,
    pub key_size: u32,
    pub certificate_authority: String,
}

impl CertificateRecord {
    pub fn build(cert: &Certificate) -> Self {
        let e = &cert.erasure;
        Self {
            certificate: CertificateSection {
                id: cert.id.clone(),
                created_at: cert.created_at,
                expires_at: cert.expires_at,
                status: "valid".into(),
            },
            user: UserSection {
                id: cert.subject.user_id.clone(),
                name: cert.subject.user_name.clone(),
                organization: cert.subject.organization.clone(),
            },
            device: DeviceSection {
                serial: cert.subject.device_serial.clone(),
                model: cert.subject.device_model.clone(),
                device_type: cert.subject.device_type.clone(),
            },
            erasure: ErasureSection {
                operation_id: e.operation_id,
                method: e.method,
                method_name: e.method.display_name().into(),
                status: if e.simulated { "simulated" } else { "completed" }.into(),
                target_kind: e.target.kind_name().into(),
                target_path: e.target.path().display().to_string(),
                size_bytes: e.size_bytes,
                size_human: format_size(e.size_bytes),
                passes_completed: e.passes_completed,
                total_passes: e.total_passes,
                duration_seconds: e.duration_seconds,
                verification_hash: e.verification_hash.clone(),
                simulated: e.simulated,
            },
            verification: VerificationSection {
                certificate_hash: content_hash(cert),
                signature_algorithm: ALGORITHM.into(),
                key_size: KEY_SIZE,
                certificate_authority: AUTHORITY.into(),
            },
        }
    }

    pub fn to_json(&self) -> tilgung_core::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// SHA-256 over the identifying fields of a certificate.
pub fn content_hash(cert: &Certificate) -> String {
    let joined = format!(
        "{}{}{}{}{}",
        cert.id,
        cert.subject.user_id,
        cert.subject.device_serial,
        cert.erasure.method.as_str(),
        cert.created_at.to_rfc3339()
    );
    hash_bytes(joined.as_bytes())
}

/// `1536` -> `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    if bytes == 0 {
        return "0 B".into();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
