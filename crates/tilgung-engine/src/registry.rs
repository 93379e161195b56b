// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Active-operation registry.
//
// Each erase call registers itself here for its lifetime.  The registry is
// shared between concurrent erasures and the front end, so every access goes
// through one mutex and every read-modify-write happens under a single lock
// acquisition.  Entries are removed when the owning `OperationHandle` drops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tilgung_core::types::{EraseMethod, OperationId, OperationState, Target};
use tracing::{debug, info};

use crate::overwrite::Progress;

/// Cooperative cancellation flag checked by the pass loop between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Point-in-time view of one registered operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationStatus {
    pub id: OperationId,
    pub target: Target,
    pub method: EraseMethod,
    pub state: OperationState,
    pub passes_completed: usize,
    pub total_passes: usize,
    pub bytes_done: u64,
    pub started_at: DateTime<Utc>,
}

struct Entry {
    status: OperationStatus,
    cancel: CancelToken,
}

/// Registry of in-flight erasures keyed by operation id.
#[derive(Default)]
pub struct OperationRegistry {
    entries: Mutex<HashMap<OperationId, Entry>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationId, Entry>> {
        // A panic while holding the lock leaves only counters half-updated;
        // keep serving the map rather than poisoning every later erase.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new operation in the `Pending` state.
    ///
    /// The returned handle removes the entry when dropped.
    pub fn register(
        &self,
        id: OperationId,
        target: Target,
        method: EraseMethod,
        total_passes: usize,
    ) -> OperationHandle<'_> {
        let cancel = CancelToken::new();
        let status = OperationStatus {
            id,
            target,
            method,
            state: OperationState::Pending,
            passes_completed: 0,
            total_passes,
            bytes_done: 0,
            started_at: Utc::now(),
        };
        self.lock().insert(
            id,
            Entry {
                status,
                cancel: cancel.clone(),
            },
        );
        debug!(operation_id = %id, "operation registered");
        OperationHandle {
            registry: self,
            id,
            cancel,
        }
    }

    /// Request cancellation.  Returns `false` if the id is unknown or the
    /// operation has already reached a terminal state.
    pub fn cancel(&self, id: &OperationId) -> bool {
        let mut entries = self.lock();
        match entries.get_mut(id) {
            Some(entry)
                if matches!(
                    entry.status.state,
                    OperationState::Pending | OperationState::InProgress
                ) =>
            {
                entry.status.state = OperationState::Cancelled;
                entry.cancel.cancel();
                info!(operation_id = %id, "cancellation requested");
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &OperationId) -> Option<OperationStatus> {
        self.lock().get(id).map(|e| e.status.clone())
    }

    /// All registered operations, oldest first.
    pub fn snapshot(&self) -> Vec<OperationStatus> {
        let mut all: Vec<_> = self.lock().values().map(|e| e.status.clone()).collect();
        all.sort_by_key(|s| s.started_at);
        all
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn update(&self, id: &OperationId, f: impl FnOnce(&mut OperationStatus)) {
        if let Some(entry) = self.lock().get_mut(id) {
            f(&mut entry.status);
        }
    }
}

/// Scoped registration of one operation.
pub struct OperationHandle<'a> {
    registry: &'a OperationRegistry,
    id: OperationId,
    cancel: CancelToken,
}

impl OperationHandle<'_> {
    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Move to `state`, unless cancellation already claimed the entry.
    pub fn set_state(&self, state: OperationState) {
        self.registry.update(&self.id, |s| {
            if s.state != OperationState::Cancelled || state == OperationState::Cancelled {
                s.state = state;
            }
        });
    }

}

impl Progress for OperationHandle<'_> {
    fn bytes_written(&self, bytes: u64) {
        self.registry.update(&self.id, |s| s.bytes_done += bytes);
    }

    fn pass_completed(&self, passes_completed: usize) {
        self.registry
            .update(&self.id, |s| s.passes_completed = passes_completed);
    }
}

impl Drop for OperationHandle<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.id);
        debug!(operation_id = %self.id, "operation deregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::File("/tmp/x".into())
    }

    #[test]
    fn handle_drop_removes_entry() {
        let reg = OperationRegistry::new();
        let id = OperationId::new();
        {
            let handle = reg.register(id, target(), EraseMethod::Zero, 1);
            handle.set_state(OperationState::InProgress);
            assert_eq!(reg.get(&id).unwrap().state, OperationState::InProgress);
            assert_eq!(reg.len(), 1);
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn cancel_trips_token_and_sticks() {
        let reg = OperationRegistry::new();
        let id = OperationId::new();
        let handle = reg.register(id, target(), EraseMethod::Gutmann, 35);

        assert!(reg.cancel(&id));
        assert!(handle.token().is_cancelled());

        // A later progress update must not resurrect the operation.
        handle.set_state(OperationState::InProgress);
        assert_eq!(reg.get(&id).unwrap().state, OperationState::Cancelled);

        // Already cancelled: second request is a no-op.
        assert!(!reg.cancel(&id));
    }

    #[test]
    fn cancel_unknown_id() {
        let reg = OperationRegistry::new();
        assert!(!reg.cancel(&OperationId::new()));
    }

    #[test]
    fn progress_is_tracked() {
        let reg = OperationRegistry::new();
        let id = OperationId::new();
        let handle = reg.register(id, target(), EraseMethod::Dod522022M, 3);
        handle.pass_completed(2);
        handle.bytes_written(100);
        handle.bytes_written(50);

        let status = reg.get(&id).unwrap();
        assert_eq!(status.passes_completed, 2);
        assert_eq!(status.bytes_done, 150);
        assert_eq!(status.total_passes, 3);
    }

    #[test]
    fn snapshot_lists_every_entry() {
        let reg = OperationRegistry::new();
        let _a = reg.register(OperationId::new(), target(), EraseMethod::Zero, 1);
        let _b = reg.register(OperationId::new(), target(), EraseMethod::Random, 1);
        assert_eq!(reg.snapshot().len(), 2);
    }
}
