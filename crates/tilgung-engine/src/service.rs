// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ErasureService: the entry point of the engine.
//
// Every call produces exactly one `OperationReceipt`.  Failures are recorded
// in the receipt rather than returned as `Err`, so callers always get the
// partial progress that was made.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tilgung_core::config::{DEFAULT_CHUNK_SIZE, TilgungConfig};
use tilgung_core::error::{Result, TilgungError};
use tilgung_core::types::{
    EraseMethod, OperationId, OperationReceipt, OperationState, ReceiptError, Target,
};
use tilgung_platform::PrivilegeGate;
use tracing::{error, info, instrument, warn};

use crate::patterns;
use crate::procedures::{self, Context, Outcome};
use crate::registry::{OperationRegistry, OperationStatus};

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub chunk_size: usize,
    pub verify_after_erase: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_after_erase: true,
        }
    }
}

impl From<&TilgungConfig> for EngineOptions {
    fn from(cfg: &TilgungConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size.max(1),
            verify_after_erase: cfg.verify_after_erase,
        }
    }
}

/// Performs erasures and tracks the ones in flight.
///
/// Cheap to clone; clones share the privilege gate and the registry.
#[derive(Clone)]
pub struct ErasureService {
    gate: Arc<dyn PrivilegeGate>,
    registry: Arc<OperationRegistry>,
    options: EngineOptions,
}

impl ErasureService {
    pub fn new(gate: Arc<dyn PrivilegeGate>, options: EngineOptions) -> Self {
        Self {
            gate,
            registry: Arc::new(OperationRegistry::new()),
            options,
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Erase `target` under a fresh operation id.
    pub fn erase(&self, target: &Target, method: EraseMethod, simulate: bool) -> OperationReceipt {
        self.erase_with_id(OperationId::new(), target, method, simulate)
    }

    /// Erase `target` under a caller-chosen id, so the caller can cancel it
    /// from another thread while it runs.
    #[instrument(skip(self), fields(operation_id = %id, target = %target, method = %method))]
    pub fn erase_with_id(
        &self,
        id: OperationId,
        target: &Target,
        method: EraseMethod,
        simulate: bool,
    ) -> OperationReceipt {
        let passes = patterns::passes_for(method);
        let started_at = Utc::now();
        let clock = Instant::now();
        let handle = self
            .registry
            .register(id, target.clone(), method, passes.len());

        let draft = Draft {
            id,
            target,
            method,
            total_passes: passes.len(),
            started_at,
        };

        if simulate {
            handle.set_state(OperationState::Completed);
            info!("simulated erasure");
            return draft.simulated(clock.elapsed());
        }

        if !self.gate.is_authorized() {
            handle.set_state(OperationState::Failed);
            let err = TilgungError::PermissionDenied(
                "destructive erasure requires elevated privileges".into(),
            );
            warn!(error = %err, "erasure refused");
            return draft.finish(Outcome::failed(err), clock.elapsed());
        }

        if let Err(err) = validate(target) {
            handle.set_state(OperationState::Failed);
            warn!(error = %err, "target rejected");
            return draft.finish(Outcome::failed(err), clock.elapsed());
        }

        handle.set_state(OperationState::InProgress);
        let ctx = Context {
            chunk_size: self.options.chunk_size.max(1),
            verify: self.options.verify_after_erase,
            cancel: handle.token(),
            progress: &handle,
        };
        let outcome = match target {
            Target::File(path) => procedures::erase_file(path, passes, &ctx),
            Target::Directory(path) => procedures::erase_directory(path, passes, &ctx),
            Target::BlockDevice(path) => procedures::erase_device(path, passes, &ctx),
        };

        let state = match &outcome.error {
            None => OperationState::Completed,
            Some(TilgungError::Cancelled { .. }) => OperationState::Cancelled,
            Some(_) => OperationState::Failed,
        };
        handle.set_state(state);

        let receipt = draft.finish(outcome, clock.elapsed());
        match &receipt.error {
            None => info!(
                bytes = receipt.bytes_overwritten,
                passes = receipt.passes_completed,
                "erasure complete"
            ),
            Some(e) => warn!(kind = ?e.kind, error = %e.message, "erasure failed"),
        }
        receipt
    }

    /// Run [`erase_with_id`](Self::erase_with_id) on the blocking pool.
    pub async fn erase_async(
        &self,
        id: OperationId,
        target: Target,
        method: EraseMethod,
        simulate: bool,
    ) -> OperationReceipt {
        let service = self.clone();
        let job_target = target.clone();
        let started_at = Utc::now();
        let joined = tokio::task::spawn_blocking(move || {
            service.erase_with_id(id, &job_target, method, simulate)
        })
        .await;

        match joined {
            Ok(receipt) => receipt,
            Err(join) => {
                error!(operation_id = %id, error = %join, "erasure task aborted");
                let draft = Draft {
                    id,
                    target: &target,
                    method,
                    total_passes: patterns::total_passes(method),
                    started_at,
                };
                let err = TilgungError::Io(std::io::Error::other(format!(
                    "erasure task aborted: {join}"
                )));
                draft.finish(Outcome::failed(err), Duration::ZERO)
            }
        }
    }

    /// Request cancellation of a running operation.
    pub fn cancel(&self, id: &OperationId) -> bool {
        self.registry.cancel(id)
    }

    pub fn active_operations(&self) -> Vec<OperationStatus> {
        self.registry.snapshot()
    }
}

/// Check existence and kind once per operation.
fn validate(target: &Target) -> Result<()> {
    let path = target.path();
    let meta = match target {
        // Never follow a symlinked root.
        Target::Directory(_) => fs::symlink_metadata(path),
        Target::File(_) | Target::BlockDevice(_) => fs::metadata(path),
    };
    let meta = match meta {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TilgungError::TargetNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    match target {
        Target::File(_) if !meta.is_file() => Err(TilgungError::NotAFile(path.to_path_buf())),
        Target::Directory(_) if !meta.is_dir() => {
            Err(TilgungError::NotADirectory(path.to_path_buf()))
        }
        Target::BlockDevice(_) if meta.is_dir() => {
            Err(TilgungError::NotAFile(path.to_path_buf()))
        }
        _ => Ok(()),
    }
}

/// The receipt fields known before any work starts.
struct Draft<'a> {
    id: OperationId,
    target: &'a Target,
    method: EraseMethod,
    total_passes: usize,
    started_at: DateTime<Utc>,
}

impl Draft<'_> {
    fn simulated(self, duration: Duration) -> OperationReceipt {
        OperationReceipt {
            operation_id: self.id,
            target: self.target.clone(),
            method: self.method,
            success: true,
            size_bytes: 0,
            bytes_overwritten: 0,
            passes_completed: self.total_passes,
            total_passes: self.total_passes,
            duration,
            error: None,
            verification_hash: None,
            simulated: true,
            started_at: self.started_at,
        }
    }

    fn finish(self, outcome: Outcome, duration: Duration) -> OperationReceipt {
        OperationReceipt {
            operation_id: self.id,
            target: self.target.clone(),
            method: self.method,
            success: outcome.error.is_none(),
            size_bytes: outcome.size_bytes,
            bytes_overwritten: outcome.bytes_overwritten,
            passes_completed: outcome.passes_completed,
            total_passes: self.total_passes,
            duration,
            error: outcome.error.as_ref().map(ReceiptError::from),
            verification_hash: outcome.verification_hash,
            simulated: false,
            started_at: self.started_at,
        }
    }
}
