// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tilgung-security: cryptographic foundation for erasure attestation.
//
// The signing identity (ECDSA P-256 key plus a self-signed root certificate),
// passphrase sealing of the private key at rest, SHA-256 integrity helpers,
// and the append-only audit trail.

pub mod audit;
pub mod identity;
pub mod integrity;
pub mod sealing;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use identity::{IdentityOptions, SigningIdentity, verify_signature};
pub use integrity::{hash_bytes, hash_file, verify_hash};
pub use sealing::PassphraseSeal;
