// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signing identity: an ECDSA P-256 key pair and the self-signed root
// certificate that vouches for it.
//
// `ring` generates the key and signs; `rcgen` builds the X.509 certificate
// around the same PKCS#8 key.  The identity is created once on first use and
// reloaded from `<certificates_root>/identity/` afterwards.  If only part of
// it is on disk the load fails; an existing identity is never replaced.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Datelike, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use ring::rand::SystemRandom;
use ring::signature::{
    ECDSA_P256_SHA256_ASN1, ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair,
    KeyPair as _, UnparsedPublicKey,
};
use tilgung_core::error::{Result, TilgungError};
use tracing::{debug, info, instrument, warn};

use crate::sealing::PassphraseSeal;

/// Signature scheme recorded in every `.sig` artifact.
pub const ALGORITHM: &str = "ECDSA-P256-SHA256";

/// Curve size in bits.
pub const KEY_SIZE: u32 = 256;

/// Common name and organisation of the self-signed root.
pub const AUTHORITY: &str = "Tilgung Erasure Authority";

const KEY_FILE: &str = "signing_key.pem";
const SEALED_KEY_FILE: &str = "signing_key.pem.age";
const CERT_FILE: &str = "identity_cert.pem";

/// How a new identity is minted and how an existing one is opened.
#[derive(Debug, Clone, Default)]
pub struct IdentityOptions {
    pub validity_years: i32,
    /// Seal the private key with this passphrase.  Required to open a sealed
    /// key.
    pub passphrase: Option<String>,
    /// Never write the private key unsealed.  Without a passphrase, creating
    /// an identity fails instead.
    pub require_sealed: bool,
}

/// The process-wide signing identity.
///
/// `EcdsaKeyPair` signs through `&self` and is `Send + Sync`, so one parsed
/// key is shared by reference for the lifetime of the issuer.
pub struct SigningIdentity {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
    certificate_pem: String,
    directory: PathBuf,
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("directory", &self.directory)
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl SigningIdentity {
    /// Load the identity from `dir`, generating and persisting a new one if
    /// the directory holds none.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load_or_create(dir: &Path, opts: &IdentityOptions) -> Result<Self> {
        let cert_path = dir.join(CERT_FILE);
        let key_path = dir.join(KEY_FILE);
        let sealed_path = dir.join(SEALED_KEY_FILE);

        let has_cert = cert_path.is_file();
        let has_key = key_path.is_file() || sealed_path.is_file();

        match (has_cert, has_key) {
            (true, true) => Self::load(dir, opts),
            (false, false) => Self::create(dir, opts),
            (true, false) => Err(TilgungError::IdentityUninitialized(format!(
                "{} has a certificate but no private key",
                dir.display()
            ))),
            (false, true) => Err(TilgungError::IdentityUninitialized(format!(
                "{} has a private key but no certificate",
                dir.display()
            ))),
        }
    }

    fn load(dir: &Path, opts: &IdentityOptions) -> Result<Self> {
        let certificate_pem = fs::read_to_string(dir.join(CERT_FILE))?;

        let sealed_path = dir.join(SEALED_KEY_FILE);
        let key_pem = if sealed_path.is_file() {
            let passphrase = opts.passphrase.as_deref().ok_or_else(|| {
                TilgungError::IdentityUninitialized(
                    "signing key is sealed and no passphrase was supplied".into(),
                )
            })?;
            let plain = PassphraseSeal::new(passphrase).unseal(&fs::read(&sealed_path)?)?;
            String::from_utf8(plain)
                .map_err(|_| TilgungError::Certificate("unsealed key is not PEM".into()))?
        } else {
            if opts.passphrase.is_some() {
                warn!("passphrase configured but signing key is stored unsealed");
            }
            fs::read_to_string(dir.join(KEY_FILE))?
        };

        let key = KeyPair::from_pem(&key_pem)
            .map_err(|e| TilgungError::Certificate(format!("key parse failed: {e}")))?;
        let identity = Self::from_pkcs8(&key.serialize_der(), certificate_pem, dir)?;
        debug!("signing identity loaded");
        Ok(identity)
    }

    fn create(dir: &Path, opts: &IdentityOptions) -> Result<Self> {
        if opts.require_sealed && opts.passphrase.is_none() {
            return Err(TilgungError::IdentityUninitialized(
                "key sealing is configured but no passphrase is available".into(),
            ));
        }

        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|e| TilgungError::Certificate(format!("key generation failed: {e}")))?;

        let key = KeyPair::try_from(pkcs8.as_ref())
            .map_err(|e| TilgungError::Certificate(format!("key import failed: {e}")))?;
        let certificate_pem = self_signed_root(&key, opts.validity_years.max(1))?;

        let key_pem = key.serialize_pem();
        let (key_path, key_bytes) = match opts.passphrase.as_deref() {
            Some(passphrase) => (
                dir.join(SEALED_KEY_FILE),
                PassphraseSeal::new(passphrase).seal(key_pem.as_bytes())?,
            ),
            None => (dir.join(KEY_FILE), key_pem.into_bytes()),
        };

        // Certificate first, rolled back if the key cannot be written.
        fs::create_dir_all(dir)?;
        let cert_path = dir.join(CERT_FILE);
        fs::write(&cert_path, &certificate_pem)?;
        if let Err(e) = write_private(&key_path, &key_bytes) {
            if let Err(cleanup) = fs::remove_file(&cert_path) {
                warn!(error = %cleanup, "could not roll back identity certificate");
            }
            return Err(e);
        }

        info!(
            sealed = opts.passphrase.is_some(),
            validity_years = opts.validity_years,
            "new signing identity created"
        );
        Self::from_pkcs8(pkcs8.as_ref(), certificate_pem, dir)
    }

    fn from_pkcs8(pkcs8: &[u8], certificate_pem: String, dir: &Path) -> Result<Self> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8, &rng)
            .map_err(|e| TilgungError::Certificate(format!("key load failed: {e}")))?;
        Ok(Self {
            key_pair,
            rng,
            certificate_pem,
            directory: dir.to_path_buf(),
        })
    }

    /// Sign `message` (ECDSA P-256 + SHA-256, ASN.1 DER signature).
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let sig = self
            .key_pair
            .sign(&self.rng, message)
            .map_err(|e| TilgungError::Certificate(format!("signing failed: {e}")))?;
        Ok(sig.as_ref().to_vec())
    }

    /// Uncompressed SEC1 public key (65 bytes).
    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.public_key())
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Verify an ASN.1 ECDSA P-256 signature against a raw SEC1 public key.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, public_key)
        .verify(message, signature)
        .map_err(|_| TilgungError::SignatureInvalid("ECDSA verification failed".into()))
}

fn self_signed_root(key: &KeyPair, validity_years: i32) -> Result<String> {
    let mut params = CertificateParams::new(Vec::<String>::new())
        .map_err(|e| TilgungError::Certificate(e.to_string()))?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, AUTHORITY);
    dn.push(DnType::OrganizationName, AUTHORITY);
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::DigitalSignature,
    ];

    let today = Utc::now().date_naive();
    // Day clamped to 28 so the expiry date exists in every year.
    let day = today.day().min(28) as u8;
    let month = today.month() as u8;
    params.not_before = rcgen::date_time_ymd(today.year(), month, day);
    params.not_after = rcgen::date_time_ymd(today.year() + validity_years, month, day);

    let cert = params
        .self_signed(key)
        .map_err(|e| TilgungError::Certificate(format!("self-signing failed: {e}")))?;
    Ok(cert.pem())
}

fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        fs::write(path, data)?;
        Ok(())
    }
}
