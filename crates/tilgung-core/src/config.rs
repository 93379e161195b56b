// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Name of the config file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Default overwrite chunk: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Persistent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilgungConfig {
    /// Root under which one subdirectory per certificate is created.  The
    /// signing identity lives in `<certificates_root>/identity`.
    pub certificates_root: PathBuf,
    /// SQLite database holding the certificate index and the audit trail.
    pub database_path: PathBuf,
    /// Bytes written per syscall during a pass.
    pub chunk_size: usize,
    /// Read the target back after the final pass and record its SHA-256.
    pub verify_after_erase: bool,
    pub certificate_validity_days: i64,
    pub identity_validity_years: i32,
    /// Environment variable holding a passphrase that seals the private key
    /// at rest.  Unset means the key is stored as plain PEM.  When set, a new
    /// key is never written unsealed: if the variable is missing or empty,
    /// identity creation fails.
    pub identity_passphrase_env: Option<String>,
    /// Enable audit trail logging.
    pub audit_enabled: bool,
}

impl TilgungConfig {
    /// Defaults rooted at `data_dir`.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            certificates_root: data_dir.join("certificates"),
            database_path: data_dir.join("tilgung.db"),
            ..Self::default()
        }
    }

    /// Load `config.json` from `data_dir`, falling back to defaults rooted
    /// there when the file is missing or unreadable.  Relative paths in the
    /// file are taken relative to `data_dir`.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(d) => d,
            Err(_) => return Self::for_data_dir(data_dir),
        };
        match serde_json::from_str::<Self>(&data) {
            Ok(cfg) => {
                debug!(path = %path.display(), "config loaded");
                cfg.rooted_at(data_dir)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed config");
                Self::for_data_dir(data_dir)
            }
        }
    }

    fn rooted_at(mut self, data_dir: &Path) -> Self {
        for path in [&mut self.certificates_root, &mut self.database_path] {
            if path.is_relative() {
                *path = data_dir.join(&*path);
            }
        }
        self
    }

    /// Write this config to `config.json` in `data_dir`.
    pub fn persist(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(data_dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    /// Passphrase for the sealed signing key, if configured and present.
    pub fn identity_passphrase(&self) -> Option<String> {
        self.identity_passphrase_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|s| !s.is_empty())
    }

    pub fn identity_sealing_configured(&self) -> bool {
        self.identity_passphrase_env.is_some()
    }
}

impl Default for TilgungConfig {
    fn default() -> Self {
        Self {
            certificates_root: PathBuf::from("certificates"),
            database_path: PathBuf::from("tilgung.db"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_after_erase: true,
            certificate_validity_days: 365,
            identity_validity_years: 10,
            identity_passphrase_env: None,
            audit_enabled: true,
        }
    }
}
