// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Tilgung.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ErrorKind;

/// Top-level error type for all Tilgung operations.
#[derive(Debug, Error)]
pub enum TilgungError {
    // -- Target errors --
    #[error("target not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("insufficient privileges: {0}")]
    PermissionDenied(String),

    #[error("unknown erase method: {0}")]
    UnknownMethod(String),

    // -- Erasure errors --
    #[error("pass {pass} failed: {source}")]
    PassFailed {
        pass: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled after {passes_completed} completed passes")]
    Cancelled { passes_completed: usize },

    // -- Attestation errors --
    #[error("signing identity unavailable: {0}")]
    IdentityUninitialized(String),

    #[error("certificate generation failed: {0}")]
    Certificate(String),

    #[error("receipt cannot be attested: {0}")]
    NotAttestable(String),

    #[error("artifact missing: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("report rendering failed: {0}")]
    Report(String),

    #[error("key sealing failed: {0}")]
    Sealing(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform --
    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl TilgungError {
    /// Classify this error into the receipt-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TargetNotFound(_) => ErrorKind::TargetNotFound,
            Self::NotADirectory(_) => ErrorKind::NotADirectory,
            Self::NotAFile(_) => ErrorKind::NotAFile,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::UnknownMethod(_) => ErrorKind::UnknownMethod,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::IdentityUninitialized(_) | Self::Certificate(_) | Self::Sealing(_) => {
                ErrorKind::IdentityUninitialized
            }
            Self::ArtifactMissing(_) => ErrorKind::ArtifactMissing,
            Self::SignatureInvalid(_) | Self::IntegrityMismatch { .. } => {
                ErrorKind::SignatureInvalid
            }
            Self::Io(io_err) | Self::PassFailed { source: io_err, .. } => match io_err.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::TargetNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
                _ => ErrorKind::IoFailure,
            },
            Self::NotAttestable(_)
            | Self::Report(_)
            | Self::Database(_)
            | Self::Config(_)
            | Self::Serialization(_)
            | Self::PlatformUnavailable => ErrorKind::IoFailure,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TilgungError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_target_not_found() {
        let err = TilgungError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.kind(), ErrorKind::TargetNotFound);
    }

    #[test]
    fn pass_failure_maps_to_io_failure() {
        let err = TilgungError::PassFailed {
            pass: 2,
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert_eq!(err.to_string(), "pass 2 failed: disk full");
    }

    #[test]
    fn cancelled_keeps_progress_in_message() {
        let err = TilgungError::Cancelled { passes_completed: 3 };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.to_string().contains('3'));
    }
}
