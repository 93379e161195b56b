// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for platforms without a native collaborator implementation.
//
// The privilege gate always refuses, so only simulated erasures run here.

use std::path::Path;

use tilgung_core::error::Result;
use tilgung_core::types::DeviceInfo;

use crate::traits::*;

/// No-op bridge returned on unsupported platforms.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl PrivilegeGate for StubBridge {
    fn is_authorized(&self) -> bool {
        tracing::warn!("PrivilegeGate::is_authorized called on stub bridge");
        false
    }
}

impl DeviceMetadataSource for StubBridge {
    fn device_info(&self, _path: &Path) -> Result<Option<DeviceInfo>> {
        Ok(None)
    }
}
