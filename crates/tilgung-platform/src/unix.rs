// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unix collaborators: effective-uid privilege check, sysfs device metadata
// (Linux), and the BLKGETSIZE64 size query.

use std::path::Path;

use tilgung_core::error::Result;
use tilgung_core::types::DeviceInfo;
use tracing::debug;

use crate::traits::*;

pub struct UnixBridge;

impl PlatformBridge for UnixBridge {
    fn platform_name(&self) -> &str {
        if cfg!(target_os = "linux") {
            "Linux"
        } else if cfg!(target_os = "macos") {
            "macOS"
        } else {
            "Unix"
        }
    }
}

impl PrivilegeGate for UnixBridge {
    fn is_authorized(&self) -> bool {
        let euid = nix::unistd::geteuid();
        debug!(euid = euid.as_raw(), "privilege check");
        euid.is_root()
    }
}

impl DeviceMetadataSource for UnixBridge {
    #[cfg(target_os = "linux")]
    fn device_info(&self, path: &Path) -> Result<Option<DeviceInfo>> {
        Ok(sysfs::lookup(path))
    }

    #[cfg(not(target_os = "linux"))]
    fn device_info(&self, _path: &Path) -> Result<Option<DeviceInfo>> {
        Ok(None)
    }
}

#[cfg(target_os = "linux")]
mod ioctl {
    // The kernel header encodes size_t into the request even though the
    // value written is a u64.
    pub(super) const BLKGETSIZE64: nix::sys::ioctl::ioctl_num_type =
        nix::request_code_read!(0x12, 114, std::mem::size_of::<usize>());

    nix::ioctl_read_bad!(blkgetsize64, BLKGETSIZE64, u64);
}

/// Ask the kernel for the byte size of a block device.
#[cfg(target_os = "linux")]
pub(crate) fn block_device_size(file: &std::fs::File) -> Option<u64> {
    use std::os::unix::io::AsRawFd;

    let mut size: u64 = 0;
    // SAFETY: the fd is owned by `file` for the duration of the call and
    // `size` is a valid u64 the kernel writes into.
    match unsafe { ioctl::blkgetsize64(file.as_raw_fd(), &mut size) } {
        Ok(_) => Some(size),
        Err(errno) => {
            debug!(%errno, "BLKGETSIZE64 unavailable");
            None
        }
    }
}

#[cfg(target_os = "linux")]
mod sysfs {
    use std::path::{Path, PathBuf};

    use tilgung_core::types::DeviceInfo;

    /// Resolve `/dev/sdb1` style paths to sysfs and read model/serial.
    pub(super) fn lookup(path: &Path) -> Option<DeviceInfo> {
        let resolved = std::fs::canonicalize(path).ok()?;
        let name = resolved.strip_prefix("/dev").ok()?.to_str()?.to_owned();
        let base = disk_dir(&name)?;

        let model = read_attr(&base.join("device/model"))
            .or_else(|| read_attr(&base.join("device/name")))
            .unwrap_or_else(|| "unknown".into());
        let serial = read_attr(&base.join("device/serial"))
            .or_else(|| read_attr(&base.join("serial")))
            .unwrap_or_else(|| "unknown".into());

        let device_type = if name.starts_with("nvme") {
            "nvme".to_owned()
        } else {
            match read_attr(&base.join("queue/rotational")).as_deref() {
                Some("1") => "hdd".to_owned(),
                Some("0") => "ssd".to_owned(),
                _ => "block".to_owned(),
            }
        };

        Some(DeviceInfo {
            model,
            serial,
            device_type,
        })
    }

    /// The sysfs directory of the whole disk holding `name`.
    fn disk_dir(name: &str) -> Option<PathBuf> {
        let class = Path::new("/sys/class/block").join(name);
        if !class.exists() {
            return None;
        }
        // Partitions carry a `partition` attribute; their parent is the disk.
        if class.join("partition").exists() {
            let real = std::fs::canonicalize(&class).ok()?;
            return real.parent().map(Path::to_path_buf);
        }
        Some(class)
    }

    fn read_attr(path: &Path) -> Option<String> {
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64")
    ))]
    fn blkgetsize64_matches_kernel_request() {
        assert_eq!(ioctl::BLKGETSIZE64 as u32, 0x8008_1272);
    }

    #[test]
    fn regular_file_has_no_device_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"data").unwrap();
        assert_eq!(UnixBridge.device_info(&path).unwrap(), None);
    }

    #[test]
    fn privilege_matches_euid() {
        assert_eq!(
            UnixBridge.is_authorized(),
            nix::unistd::geteuid().is_root()
        );
    }
}
