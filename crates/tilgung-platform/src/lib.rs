// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tilgung Platform: collaborators.
//
// The erasure engine never asks the OS directly whether it may perform raw
// destructive I/O, how big a block device is, or what model a disk reports.
// Those questions go through the traits in `traits`, with a Unix
// implementation and a stub for everything else.

pub mod traits;

#[cfg(unix)]
pub mod unix;

#[cfg(not(unix))]
pub mod stub;

use std::fs::File;
use std::io::{Seek, SeekFrom};

pub use traits::{DeviceMetadataSource, PlatformBridge, PrivilegeGate, StaticGate};

/// Return the collaborator implementation for the running operating system.
pub fn platform_bridge() -> Box<dyn PlatformBridge> {
    #[cfg(unix)]
    {
        Box::new(unix::UnixBridge)
    }
    #[cfg(not(unix))]
    {
        Box::new(stub::StubBridge)
    }
}

/// Size in bytes of an opened target.
///
/// Regular files report their metadata length.  Block devices report zero
/// there, so Linux asks the kernel via `BLKGETSIZE64` and other platforms
/// fall back to seeking to the end.  The cursor is left at offset zero.
pub fn device_size(file: &mut File) -> std::io::Result<u64> {
    let meta = file.metadata()?;
    if meta.is_file() {
        return Ok(meta.len());
    }

    #[cfg(target_os = "linux")]
    if let Some(size) = unix::block_device_size(file) {
        return Ok(size);
    }

    let size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_file_size_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        let mut file = File::open(&path).unwrap();
        assert_eq!(device_size(&mut file).unwrap(), 4096);
    }

    #[test]
    fn bridge_has_a_name() {
        assert!(!platform_bridge().platform_name().is_empty());
    }
}
