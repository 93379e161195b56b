// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The signed payload and the `.sig` envelope that carries it.

use serde::{Deserialize, Serialize};
use tilgung_core::error::Result;

/// Exactly what gets signed.
///
/// Serialized as compact JSON in field declaration order, so the byte form
/// is a pure function of the four values.  Do not reorder the fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub certificate_id: String,
    /// RFC 3339, exactly as written at issuance.
    pub created_at: String,
    pub record_hash: String,
    pub report_hash: String,
}

impl SignedPayload {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Contents of `{id}.sig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    /// Base64 ASN.1 DER ECDSA signature over the canonical payload.
    pub signature: String,
    pub algorithm: String,
    pub key_size: u32,
    pub signed_data: SignedPayload,
    /// Base64 uncompressed SEC1 public key.
    pub public_key: String,
    /// PEM of the self-signed root that owns `public_key`.
    pub identity_certificate: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_compact_and_ordered() {
        let payload = SignedPayload {
            certificate_id: "CERT-20260101000000-0a1b2c3d".into(),
            created_at: "2026-01-01T00:00:00+00:00".into(),
            record_hash: "aa".into(),
            report_hash: "bb".into(),
        };
        let bytes = payload.canonical_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            concat!(
                r#"{"certificate_id":"CERT-20260101000000-0a1b2c3d","#,
                r#""created_at":"2026-01-01T00:00:00+00:00","#,
                r#""record_hash":"aa","report_hash":"bb"}"#,
            )
        );
    }
}
