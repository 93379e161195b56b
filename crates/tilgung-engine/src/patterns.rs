// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pattern registry: erase method to ordered pass patterns.

use tilgung_core::types::EraseMethod;

/// What one pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPattern {
    /// A byte sequence repeated until the target is full.
    Fixed(&'static [u8]),
    /// Fresh random bytes for every chunk written.
    Random,
}

impl PassPattern {
    /// Short label for logs and reports, e.g. `0x00`, `0x924924`, `random`.
    pub fn label(&self) -> String {
        match self {
            Self::Fixed(bytes) => format!("0x{}", hex::encode_upper(bytes)),
            Self::Random => "random".into(),
        }
    }
}

use PassPattern::{Fixed, Random};

const DOD_5220_22_M: &[PassPattern] = &[Fixed(&[0x00]), Fixed(&[0xFF]), Fixed(&[0x00])];

const SINGLE_ZERO: &[PassPattern] = &[Fixed(&[0x00])];

const SINGLE_RANDOM: &[PassPattern] = &[Random];

/// Gutmann, "Secure Deletion of Data from Magnetic and Solid-State Memory"
/// (1996), table of 35 passes.
const GUTMANN: &[PassPattern] = &[
    Random,
    Random,
    Random,
    Random,
    Fixed(&[0x55]),
    Fixed(&[0xAA]),
    Fixed(&[0x92, 0x49, 0x24]),
    Fixed(&[0x49, 0x24, 0x92]),
    Fixed(&[0x24, 0x92, 0x49]),
    Fixed(&[0x00]),
    Fixed(&[0x11]),
    Fixed(&[0x22]),
    Fixed(&[0x33]),
    Fixed(&[0x44]),
    Fixed(&[0x55]),
    Fixed(&[0x66]),
    Fixed(&[0x77]),
    Fixed(&[0x88]),
    Fixed(&[0x99]),
    Fixed(&[0xAA]),
    Fixed(&[0xBB]),
    Fixed(&[0xCC]),
    Fixed(&[0xDD]),
    Fixed(&[0xEE]),
    Fixed(&[0xFF]),
    Fixed(&[0x92, 0x49, 0x24]),
    Fixed(&[0x49, 0x24, 0x92]),
    Fixed(&[0x24, 0x92, 0x49]),
    Fixed(&[0x6D, 0xB6, 0xDB]),
    Fixed(&[0xB6, 0xDB, 0x6D]),
    Fixed(&[0xDB, 0x6D, 0xB6]),
    Random,
    Random,
    Random,
    Random,
];

/// Ordered pass patterns for `method`.  Pure; no I/O.
pub fn passes_for(method: EraseMethod) -> &'static [PassPattern] {
    match method {
        EraseMethod::Dod522022M => DOD_5220_22_M,
        EraseMethod::Nist80088 | EraseMethod::SinglePass | EraseMethod::Zero => SINGLE_ZERO,
        EraseMethod::Gutmann => GUTMANN,
        EraseMethod::Random => SINGLE_RANDOM,
    }
}

pub fn total_passes(method: EraseMethod) -> usize {
    passes_for(method).len()
}
