// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Tilgung erasure engine.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TilgungError};

/// Unique identifier for one erasure attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Erase methods
// ---------------------------------------------------------------------------

/// A named overwrite standard.  Pass counts and patterns live in the engine's
/// pattern registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EraseMethod {
    /// DoD 5220.22-M style triple overwrite.
    #[serde(rename = "dod_5220_22_m")]
    Dod522022M,
    /// NIST SP 800-88 "clear" single overwrite.
    #[serde(rename = "nist_800_88")]
    Nist80088,
    #[serde(rename = "single_pass")]
    SinglePass,
    /// Peter Gutmann's 35-pass sequence.
    #[serde(rename = "gutmann")]
    Gutmann,
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "zero")]
    Zero,
}

/// Every accepted spelling, canonical names first.  Legacy names from the
/// older job-log vocabulary resolve onto the closest overwrite standard.
const METHOD_NAMES: &[(&str, EraseMethod)] = &[
    ("dod_5220_22_m", EraseMethod::Dod522022M),
    ("nist_800_88", EraseMethod::Nist80088),
    ("single_pass", EraseMethod::SinglePass),
    ("gutmann", EraseMethod::Gutmann),
    ("random", EraseMethod::Random),
    ("zero", EraseMethod::Zero),
    ("dod", EraseMethod::Dod522022M),
    ("dod-5220.22-m", EraseMethod::Dod522022M),
    ("nist", EraseMethod::Nist80088),
    ("nist-800-88", EraseMethod::Nist80088),
    ("single-pass", EraseMethod::SinglePass),
    ("zeros", EraseMethod::Zero),
    ("secure_delete", EraseMethod::Dod522022M),
    ("overwrite", EraseMethod::SinglePass),
    ("shred", EraseMethod::Gutmann),
];

impl EraseMethod {
    pub const ALL: [EraseMethod; 6] = [
        Self::Dod522022M,
        Self::Nist80088,
        Self::SinglePass,
        Self::Gutmann,
        Self::Random,
        Self::Zero,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dod522022M => "dod_5220_22_m",
            Self::Nist80088 => "nist_800_88",
            Self::SinglePass => "single_pass",
            Self::Gutmann => "gutmann",
            Self::Random => "random",
            Self::Zero => "zero",
        }
    }

    /// Name used on certificates and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Dod522022M => "DoD 5220.22-M (3-pass)",
            Self::Nist80088 => "NIST SP 800-88 Clear",
            Self::SinglePass => "Single pass (zeros)",
            Self::Gutmann => "Gutmann (35-pass)",
            Self::Random => "Random data (1-pass)",
            Self::Zero => "Zero fill",
        }
    }
}

impl std::fmt::Display for EraseMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EraseMethod {
    type Err = TilgungError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        METHOD_NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, method)| *method)
            .ok_or_else(|| TilgungError::UnknownMethod(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// What is being erased.  Resolved once per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Target {
    File(PathBuf),
    Directory(PathBuf),
    BlockDevice(PathBuf),
}

impl Target {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) | Self::Directory(p) | Self::BlockDevice(p) => p,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Directory(_) => "directory",
            Self::BlockDevice(_) => "block_device",
        }
    }

    /// Inspect `path` once and pick the matching variant.
    ///
    /// Block and character devices resolve to `BlockDevice`; everything else
    /// that is not a directory is treated as a file.
    pub fn resolve(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TilgungError::TargetNotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        if meta.is_dir() {
            return Ok(Self::Directory(path));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            let ft = meta.file_type();
            if ft.is_block_device() || ft.is_char_device() {
                return Ok(Self::BlockDevice(path));
            }
        }

        Ok(Self::File(path))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind_name(), self.path().display())
    }
}

// ---------------------------------------------------------------------------
// Operation lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle states of an erasure operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// Cancellation was requested; the pass loop stops at the next chunk.
    Cancelled,
}

/// Failure taxonomy recorded in receipts and reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TargetNotFound,
    NotADirectory,
    NotAFile,
    PermissionDenied,
    IoFailure,
    Cancelled,
    UnknownMethod,
    IdentityUninitialized,
    ArtifactMissing,
    SignatureInvalid,
}

/// Error captured inside a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&TilgungError> for ReceiptError {
    fn from(err: &TilgungError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The factual record of what one erasure attempt did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReceipt {
    pub operation_id: OperationId,
    pub target: Target,
    pub method: EraseMethod,
    pub success: bool,
    /// Bytes in the target (summed over files for directories).
    pub size_bytes: u64,
    /// Bytes actually written across all passes.
    pub bytes_overwritten: u64,
    pub passes_completed: usize,
    pub total_passes: usize,
    pub duration: Duration,
    pub error: Option<ReceiptError>,
    /// SHA-256 of the final pass read back from the target.
    pub verification_hash: Option<String>,
    pub simulated: bool,
    pub started_at: DateTime<Utc>,
}

impl OperationReceipt {
    /// Whether the attestation layer may mint a certificate for this receipt.
    pub fn is_attestable(&self) -> bool {
        self.success && self.error.is_none()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

/// Device details supplied by the storage metadata collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    pub serial: String,
    pub device_type: String,
}

/// Who the certificate is issued to.  Opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub user_id: String,
    pub user_name: String,
    pub organization: String,
    pub device_serial: String,
    pub device_model: String,
    pub device_type: String,
}

impl Subject {
    /// Fill the device fields from a metadata lookup.
    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device_serial = device.serial;
        self.device_model = device.model;
        self.device_type = device.device_type;
        self
    }
}

/// The receipt fields embedded in a certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErasureSummary {
    pub operation_id: OperationId,
    pub method: EraseMethod,
    pub target: Target,
    pub size_bytes: u64,
    pub passes_completed: usize,
    pub total_passes: usize,
    pub duration_seconds: f64,
    pub verification_hash: Option<String>,
    pub simulated: bool,
}

impl From<&OperationReceipt> for ErasureSummary {
    fn from(r: &OperationReceipt) -> Self {
        Self {
            operation_id: r.operation_id,
            method: r.method,
            target: r.target.clone(),
            size_bytes: r.size_bytes,
            passes_completed: r.passes_completed,
            total_passes: r.total_passes,
            duration_seconds: r.duration_seconds(),
            verification_hash: r.verification_hash.clone(),
            simulated: r.simulated,
        }
    }
}

/// On-disk locations of the artifact triad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub directory: PathBuf,
    pub record: PathBuf,
    pub report: PathBuf,
    pub signature: PathBuf,
}

/// One issued proof-of-erasure certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub subject: Subject,
    pub erasure: ErasureSummary,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub artifacts: ArtifactPaths,
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Why a certificate failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum VerificationFailure {
    ArtifactMissing(String),
    Malformed(String),
    UnsupportedAlgorithm(String),
    IdMismatch(String),
    RecordTampered,
    ReportTampered,
    SignatureInvalid,
    /// Signature verifies, but under a key other than the trusted identity.
    UntrustedKey,
}

impl std::fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArtifactMissing(what) => write!(f, "artifact missing: {what}"),
            Self::Malformed(detail) => write!(f, "malformed artifact: {detail}"),
            Self::UnsupportedAlgorithm(alg) => write!(f, "unsupported algorithm: {alg}"),
            Self::IdMismatch(found) => write!(f, "signed payload names certificate {found}"),
            Self::RecordTampered => f.write_str("structured record does not match signed hash"),
            Self::ReportTampered => f.write_str("report does not match signed hash"),
            Self::SignatureInvalid => f.write_str("signature does not verify"),
            Self::UntrustedKey => f.write_str("signed by a key other than the local identity"),
        }
    }
}

/// Outcome of re-validating a certificate from its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub certificate_id: String,
    pub valid: bool,
    pub verified_at: DateTime<Utc>,
    pub algorithm: Option<String>,
    pub key_size: Option<u32>,
    /// Set when the signature is good but the certificate has passed its
    /// expiry.
    pub expired: bool,
    pub failure: Option<VerificationFailure>,
}

impl VerificationResult {
    pub fn failed(certificate_id: &str, failure: VerificationFailure) -> Self {
        Self {
            certificate_id: certificate_id.to_owned(),
            valid: false,
            verified_at: Utc::now(),
            algorithm: None,
            key_size: None,
            expired: false,
            failure: Some(failure),
        }
    }
}
