// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tilgung Engine: pattern registry, chunked multi-pass overwrite, per-kind
// erase procedures, and the operation registry that tracks in-flight work.
// `ErasureService` is the entry point; everything else is exposed for
// benches and for callers that want to drive a sink directly.

pub mod overwrite;
pub mod patterns;
pub mod procedures;
pub mod registry;
pub mod service;

pub use patterns::{PassPattern, passes_for, total_passes};
pub use registry::{CancelToken, OperationRegistry, OperationStatus};
pub use service::{EngineOptions, ErasureService};
