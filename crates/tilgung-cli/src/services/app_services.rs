// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: initialises every backend subsystem once and gives
// the command handlers one place to call.
//
// The rusqlite-backed `CertificateStore` and `AuditLog` are `Send` but not
// `Sync`, so they sit behind `Arc<Mutex<>>` like the rest of the shared
// state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tilgung_attest::{
    CertificateFilter, CertificateStats, CertificateStore, Issuer, OperationSummary,
    StoredCertificate, Verifier,
};
use tilgung_core::config::TilgungConfig;
use tilgung_core::error::Result;
use tilgung_core::types::{
    Certificate, EraseMethod, OperationId, OperationReceipt, Subject, Target, VerificationResult,
};
use tilgung_engine::{EngineOptions, ErasureService};
use tilgung_platform::{PlatformBridge, PrivilegeGate};
use tilgung_security::{AuditAction, AuditEntry, AuditLog};
use tracing::{error, info, warn};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Clone)]
pub struct AppServices {
    config: TilgungConfig,
    data_dir: PathBuf,
    bridge: Arc<dyn PlatformBridge>,
    engine: ErasureService,
    store: Arc<Mutex<CertificateStore>>,
    audit_log: Option<Arc<Mutex<AuditLog>>>,
}

impl AppServices {
    /// Open the databases and build the engine.  The signing identity is
    /// loaded lazily, the first time a certificate is issued.
    pub fn init(config: TilgungConfig, data_dir: &Path) -> Result<Self> {
        Self::with_bridge(config, data_dir, Arc::from(tilgung_platform::platform_bridge()))
    }

    pub fn with_bridge(
        config: TilgungConfig,
        data_dir: &Path,
        bridge: Arc<dyn PlatformBridge>,
    ) -> Result<Self> {
        info!(
            path = %data_dir.display(),
            platform = bridge.platform_name(),
            "initialising services"
        );

        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = CertificateStore::open(&config.database_path)?;
        let audit_log = if config.audit_enabled {
            Some(Arc::new(Mutex::new(AuditLog::open(&config.database_path)?)))
        } else {
            None
        };

        let gate: Arc<dyn PrivilegeGate> = Arc::new(Arc::clone(&bridge));
        info!(privileges = %gate.describe(), "privilege gate ready");
        let engine = ErasureService::new(gate, EngineOptions::from(&config));

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            bridge,
            engine,
            store: Arc::new(Mutex::new(store)),
            audit_log,
        })
    }

    pub fn config(&self) -> &TilgungConfig {
        &self.config
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.persist(&self.data_dir)
    }

    // -- Erasure -------------------------------------------------------------

    /// Run one erasure on the blocking pool.  Ctrl-C while it runs cancels
    /// the operation and waits for the engine to stop at the next chunk.
    ///
    /// Every receipt is written to the operation history.
    pub async fn erase(
        &self,
        target: Target,
        method: EraseMethod,
        simulate: bool,
    ) -> OperationReceipt {
        let id = OperationId::new();
        let subject = id.to_string();
        let task = self.engine.erase_async(id, target, method, simulate);
        tokio::pin!(task);

        let receipt = tokio::select! {
            receipt = &mut task => receipt,
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!(operation_id = %id, "interrupt received, cancelling erasure");
                let cancelled = self.engine.cancel(&id);
                self.audit(AuditAction::Cancel, &subject, cancelled, None);
                task.await
            }
        };

        let details = receipt
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| format!("{} {}", method, receipt.target));
        self.audit(AuditAction::Erase, &subject, receipt.success, Some(&details));
        if let Err(e) = lock(&self.store).record_operation(&receipt) {
            error!(operation_id = %id, error = %e, "failed to record operation");
        }
        receipt
    }

    /// Fill device fields from the platform when the caller left them blank.
    pub fn enrich_subject(&self, target: &Target, subject: Subject) -> Subject {
        if !matches!(target, Target::BlockDevice(_)) || !subject.device_serial.is_empty() {
            return subject;
        }
        match self.bridge.device_info(target.path()) {
            Ok(Some(info)) => subject.with_device(info),
            Ok(None) => subject,
            Err(e) => {
                warn!(error = %e, "device metadata lookup failed");
                subject
            }
        }
    }

    // -- Certificates --------------------------------------------------------

    /// Issue and index a certificate for `receipt`.
    pub fn certify(&self, receipt: &OperationReceipt, subject: &Subject) -> Result<Certificate> {
        let issued = Issuer::open(&self.config).and_then(|issuer| issuer.issue(receipt, subject));
        let cert = match issued {
            Ok(cert) => cert,
            Err(e) => {
                self.audit(
                    AuditAction::Issue,
                    &receipt.operation_id.to_string(),
                    false,
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        };
        {
            let store = lock(&self.store);
            store.insert(&cert)?;
            if !store.attach_certificate(&receipt.operation_id, &cert.id)? {
                warn!(
                    operation_id = %receipt.operation_id,
                    "certified operation has no history row"
                );
            }
        }
        self.audit(
            AuditAction::Issue,
            &cert.id,
            true,
            Some(&receipt.operation_id.to_string()),
        );
        Ok(cert)
    }

    pub fn verify(&self, id: &str, trust_local: bool) -> Result<VerificationResult> {
        let verifier = if trust_local {
            let issuer = Issuer::open(&self.config)?;
            Verifier::trusting(&self.config.certificates_root, issuer.identity().public_key())
        } else {
            Verifier::new(&self.config.certificates_root)
        };

        let result = verifier.verify(id);
        if result.valid {
            // Certificates issued elsewhere may not be indexed.
            if !lock(&self.store).mark_verified(id, result.verified_at)? {
                info!(certificate_id = id, "verified certificate is not in the index");
            }
        }
        let details = result.failure.as_ref().map(ToString::to_string);
        self.audit(AuditAction::Verify, id, result.valid, details.as_deref());
        Ok(result)
    }

    pub fn list(&self, filter: &CertificateFilter) -> Result<Vec<StoredCertificate>> {
        lock(&self.store).list(filter)
    }

    pub fn invalidate(&self, id: &str) -> Result<bool> {
        let changed = lock(&self.store).invalidate(id)?;
        self.audit(AuditAction::Invalidate, id, changed, None);
        Ok(changed)
    }

    pub fn stats(&self) -> Result<CertificateStats> {
        lock(&self.store).stats()
    }

    /// Erasure history, newest first.
    pub fn history(&self, limit: u32, failed_only: bool) -> Result<Vec<OperationSummary>> {
        lock(&self.store).operations(limit, failed_only)
    }

    // -- Audit ---------------------------------------------------------------

    fn audit(&self, action: AuditAction, subject: &str, success: bool, details: Option<&str>) {
        let Some(log) = &self.audit_log else {
            return;
        };
        if let Err(e) = lock(log).record(action, subject, success, details) {
            error!(error = %e, "failed to record audit entry");
        }
    }

    /// Recent audit entries, newest first.  Empty when auditing is off.
    pub fn recent_audit_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        match &self.audit_log {
            Some(log) => lock(log).recent_entries(limit),
            None => Ok(Vec::new()),
        }
    }
}
