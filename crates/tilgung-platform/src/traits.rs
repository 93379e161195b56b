// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the OS collaborators.

use std::path::Path;

use tilgung_core::error::Result;
use tilgung_core::types::DeviceInfo;

/// Groups every collaborator the engine and the front end need.
pub trait PlatformBridge: PrivilegeGate + DeviceMetadataSource {
    /// Human-readable platform name (e.g. "Linux", "Desktop (stub)").
    fn platform_name(&self) -> &str;
}

/// Decides whether the process may perform raw destructive I/O.
///
/// Consulted once per non-simulated erasure.  Implementations may cache, but
/// the engine never does.
pub trait PrivilegeGate: Send + Sync {
    fn is_authorized(&self) -> bool;

    /// Short explanation suitable for logs.
    fn describe(&self) -> String {
        if self.is_authorized() {
            "elevated privileges available".into()
        } else {
            "running without elevated privileges".into()
        }
    }
}

/// Looks up model / serial / type for a device path.
pub trait DeviceMetadataSource: Send + Sync {
    /// Returns `Ok(None)` when the path is not a device the platform knows.
    fn device_info(&self, path: &Path) -> Result<Option<DeviceInfo>>;
}

/// A gate with a fixed answer.  Used for tests and for operators who have
/// already established authority out of band.
#[derive(Debug, Clone, Copy)]
pub struct StaticGate(pub bool);

impl PrivilegeGate for StaticGate {
    fn is_authorized(&self) -> bool {
        self.0
    }
}

impl<T: PrivilegeGate + ?Sized> PrivilegeGate for std::sync::Arc<T> {
    fn is_authorized(&self) -> bool {
        (**self).is_authorized()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<T: PrivilegeGate + ?Sized> PrivilegeGate for Box<T> {
    fn is_authorized(&self) -> bool {
        (**self).is_authorized()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
