// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// On-disk layout and certificate identifiers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use tilgung_core::error::{Result, TilgungError};
use tilgung_core::types::ArtifactPaths;

pub const RECORD_EXT: &str = "record";
pub const REPORT_EXT: &str = "report";
pub const SIGNATURE_EXT: &str = "sig";

/// Subdirectory of the certificates root holding the signing identity.
pub const IDENTITY_DIR: &str = "identity";

pub fn identity_dir(root: &Path) -> PathBuf {
    root.join(IDENTITY_DIR)
}

/// `<root>/<id>/{id}.record|.report|.sig`
pub fn artifact_paths(root: &Path, id: &str) -> ArtifactPaths {
    let directory = root.join(id);
    ArtifactPaths {
        record: directory.join(format!("{id}.{RECORD_EXT}")),
        report: directory.join(format!("{id}.{REPORT_EXT}")),
        signature: directory.join(format!("{id}.{SIGNATURE_EXT}")),
        directory,
    }
}

/// `CERT-<UTC yyyymmddHHMMSS>-<8 hex>`
pub fn new_certificate_id(now: DateTime<Utc>) -> Result<String> {
    let mut suffix = [0u8; 4];
    SystemRandom::new()
        .fill(&mut suffix)
        .map_err(|_| TilgungError::Certificate("system random source failed".into()))?;
    Ok(format!(
        "CERT-{}-{}",
        now.format("%Y%m%d%H%M%S"),
        hex::encode(suffix)
    ))
}

/// Whether `id` has the shape of a certificate id.  Anything else is
/// rejected before it is joined onto a filesystem path.
pub fn is_certificate_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("CERT-") else {
        return false;
    };
    let Some((stamp, suffix)) = rest.split_once('-') else {
        return false;
    };
    stamp.len() == 14
        && stamp.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == 8
        && suffix.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn id_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let id = new_certificate_id(now).unwrap();
        assert!(id.starts_with("CERT-20260314150926-"), "{id}");
        assert!(is_certificate_id(&id));
        assert_ne!(id, new_certificate_id(now).unwrap());
    }

    #[test]
    fn rejects_path_like_ids() {
        for bad in [
            "",
            "CERT-",
            "../identity",
            "CERT-2026-abc",
            "CERT-20260314150926-ZZZZZZZZ",
            "CERT-20260314150926-0a1b2c3d/..",
        ] {
            assert!(!is_certificate_id(bad), "{bad}");
        }
    }

    #[test]
    fn paths_nest_under_id() {
        let p = artifact_paths(Path::new("/certs"), "CERT-20260101000000-deadbeef");
        assert_eq!(p.directory, Path::new("/certs/CERT-20260101000000-deadbeef"));
        assert_eq!(
            p.signature,
            Path::new("/certs/CERT-20260101000000-deadbeef/CERT-20260101000000-deadbeef.sig")
        );
    }
}
