// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::PathBuf;

use tilgung_core::error::Result;

/// Return the application data directory, creating it if needed.
///
/// `override_dir` wins; otherwise the XDG data directory is used.
pub fn data_dir(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = override_dir.unwrap_or_else(|| {
        base_dir(std::env::var("XDG_DATA_HOME").ok(), std::env::var("HOME").ok()).join("tilgung")
    });
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn base_dir(xdg: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(xdg) = xdg.filter(|s| !s.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = home.filter(|s| !s.is_empty()) {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdg_preferred_over_home() {
        assert_eq!(
            base_dir(Some("/x".into()), Some("/home/a".into())),
            PathBuf::from("/x")
        );
        assert_eq!(
            base_dir(Some(String::new()), Some("/home/a".into())),
            PathBuf::from("/home/a/.local/share")
        );
        assert_eq!(base_dir(None, None), std::env::temp_dir());
    }

    #[test]
    fn override_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let wanted = tmp.path().join("nested").join("data");
        assert_eq!(data_dir(Some(wanted.clone())).unwrap(), wanted);
        assert!(wanted.is_dir());
    }
}
