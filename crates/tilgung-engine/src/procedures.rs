// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-kind erase procedures.
//
// These assume the target has already been validated and the privilege gate
// consulted; they only do the destructive work and report what happened.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use tilgung_core::error::TilgungError;
use tracing::{debug, info, warn};

use crate::overwrite::{self, Progress};
use crate::patterns::PassPattern;
use crate::registry::CancelToken;

/// Knobs and live state shared by every procedure in one operation.
pub struct Context<'a> {
    pub chunk_size: usize,
    pub verify: bool,
    pub cancel: &'a CancelToken,
    pub progress: &'a dyn Progress,
}

/// Raw result of a procedure, folded into the receipt by the service.
#[derive(Debug, Default)]
pub struct Outcome {
    pub size_bytes: u64,
    pub bytes_overwritten: u64,
    pub passes_completed: usize,
    pub verification_hash: Option<String>,
    pub error: Option<TilgungError>,
}

impl Outcome {
    pub(crate) fn failed(error: TilgungError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Overwrite a regular file with every pass, then delete it.
pub fn erase_file(path: &Path, patterns: &[PassPattern], ctx: &Context<'_>) -> Outcome {
    if let Err(e) = clear_readonly(path) {
        return Outcome::failed(e.into());
    }
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(e) => return Outcome::failed(e.into()),
    };
    let len = match file.metadata() {
        Ok(m) => m.len(),
        Err(e) => return Outcome::failed(e.into()),
    };

    let mut outcome = overwrite_open(&mut file, len, patterns, ctx);
    drop(file);

    if outcome.error.is_none() {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "file removed"),
            Err(e) => outcome.error = Some(e.into()),
        }
    }
    outcome
}

/// Overwrite a block device (or any pre-sized target) in place.  Nothing is
/// deleted.
pub fn erase_device(path: &Path, patterns: &[PassPattern], ctx: &Context<'_>) -> Outcome {
    let mut device = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(e) => return Outcome::failed(e.into()),
    };
    let len = match tilgung_platform::device_size(&mut device) {
        Ok(n) => n,
        Err(e) => return Outcome::failed(e.into()),
    };
    info!(path = %path.display(), size = len, "device opened");
    overwrite_open(&mut device, len, patterns, ctx)
}

fn overwrite_open(
    file: &mut File,
    len: u64,
    patterns: &[PassPattern],
    ctx: &Context<'_>,
) -> Outcome {
    let run = overwrite::run_passes(file, len, patterns, ctx.chunk_size, ctx.cancel, ctx.progress);
    let mut outcome = Outcome {
        size_bytes: len,
        bytes_overwritten: run.bytes_written,
        passes_completed: run.passes_completed,
        verification_hash: None,
        error: run.error,
    };
    if outcome.error.is_none() && ctx.verify {
        match overwrite::hash_contents(file, len) {
            Ok(hash) => outcome.verification_hash = Some(hash),
            Err(e) => outcome.error = Some(e.into()),
        }
    }
    outcome
}

#[derive(Default)]
struct Walk {
    size_bytes: u64,
    bytes_overwritten: u64,
    /// Minimum over every file visited; `None` until the first file.
    passes_completed: Option<usize>,
    failures: usize,
    cancelled: bool,
}

/// Erase every regular file below `root`, then remove the tree.
///
/// Best effort: a file that cannot be erased is logged and skipped, and the
/// outcome fails at the end if anything was skipped or the root remains.
pub fn erase_directory(root: &Path, patterns: &[PassPattern], ctx: &Context<'_>) -> Outcome {
    erase_tree(root, patterns, ctx, &erase_file)
}

/// Per-file procedure used by the directory walk.
type FileEraser<'f> = &'f dyn Fn(&Path, &[PassPattern], &Context<'_>) -> Outcome;

fn erase_tree(
    root: &Path,
    patterns: &[PassPattern],
    ctx: &Context<'_>,
    erase_one: FileEraser<'_>,
) -> Outcome {
    let mut walk = Walk::default();
    visit(root, patterns, ctx, erase_one, &mut walk);

    let passes_completed = match walk.passes_completed {
        Some(p) => p,
        None if walk.cancelled => 0,
        None => patterns.len(),
    };
    let mut outcome = Outcome {
        size_bytes: walk.size_bytes,
        bytes_overwritten: walk.bytes_overwritten,
        passes_completed,
        verification_hash: None,
        error: None,
    };

    if walk.cancelled {
        outcome.error = Some(TilgungError::Cancelled { passes_completed });
        return outcome;
    }

    let root_removed = match fs::remove_dir(root) {
        Ok(()) => true,
        Err(first) => {
            warn!(path = %root.display(), error = %first, "root removal failed, sweeping residue");
            sweep(root);
            fs::remove_dir_all(root).is_ok()
        }
    };

    if walk.failures > 0 {
        outcome.error = Some(TilgungError::Io(io::Error::other(format!(
            "{} entries under {} could not be erased",
            walk.failures,
            root.display()
        ))));
    } else if !root_removed {
        outcome.error = Some(TilgungError::Io(io::Error::other(format!(
            "directory {} could not be removed",
            root.display()
        ))));
    }
    outcome
}

fn visit(
    dir: &Path,
    patterns: &[PassPattern],
    ctx: &Context<'_>,
    erase_one: FileEraser<'_>,
    walk: &mut Walk,
) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot list directory");
            walk.failures += 1;
            return;
        }
    };

    for entry in entries {
        if ctx.cancel.is_cancelled() {
            walk.cancelled = true;
            return;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "unreadable directory entry");
                walk.failures += 1;
                continue;
            }
        };
        let path = entry.path();
        // file_type() does not follow symlinks.
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat entry");
                walk.failures += 1;
                continue;
            }
        };

        if file_type.is_dir() {
            visit(&path, patterns, ctx, erase_one, walk);
            if walk.cancelled {
                return;
            }
            if let Err(e) = fs::remove_dir(&path) {
                debug!(path = %path.display(), error = %e, "subdirectory left for sweep");
            }
        } else if file_type.is_file() {
            let out = erase_one(&path, patterns, ctx);
            walk.size_bytes += out.size_bytes;
            walk.bytes_overwritten += out.bytes_overwritten;
            walk.passes_completed = Some(
                walk.passes_completed
                    .map_or(out.passes_completed, |p| p.min(out.passes_completed)),
            );
            match out.error {
                None => {}
                Some(TilgungError::Cancelled { .. }) => {
                    walk.cancelled = true;
                    return;
                }
                Some(e) => {
                    warn!(path = %path.display(), error = %e, "file erase failed, continuing");
                    walk.failures += 1;
                }
            }
        } else {
            // Symlinks and special files are unlinked, never followed.
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "cannot unlink entry");
                walk.failures += 1;
            }
        }
    }
}

/// Clear read-only bits below `dir` so a retry of the root removal can
/// succeed.
fn sweep(dir: &Path) {
    let _ = clear_readonly(dir);
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(t) if t.is_dir() => sweep(&path),
            Ok(t) if t.is_file() => {
                let _ = clear_readonly(&path);
            }
            _ => {}
        }
    }
}

fn clear_readonly(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    if !perms.readonly() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
    }
    fs::set_permissions(path, perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::passes_for;
    use tilgung_core::types::EraseMethod;

    fn ctx(cancel: &CancelToken) -> Context<'_> {
        Context {
            chunk_size: 16,
            verify: true,
            cancel,
            progress: &(),
        }
    }

    #[test]
    fn file_is_overwritten_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.txt");
        fs::write(&path, vec![b'x'; 100]).unwrap();

        let token = CancelToken::new();
        let out = erase_file(&path, passes_for(EraseMethod::Dod522022M), &ctx(&token));

        assert!(out.error.is_none(), "{:?}", out.error);
        assert_eq!(out.size_bytes, 100);
        assert_eq!(out.bytes_overwritten, 300);
        assert_eq!(out.passes_completed, 3);
        // Final DoD pass is zeros.
        let zeros = overwrite::hash_contents(&mut io::Cursor::new(vec![0u8; 100]), 100).unwrap();
        assert_eq!(out.verification_hash.as_deref(), Some(zeros.as_str()));
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn readonly_file_is_still_erased() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.bin");
        fs::write(&path, b"locked").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o400)).unwrap();

        let token = CancelToken::new();
        let out = erase_file(&path, passes_for(EraseMethod::Zero), &ctx(&token));
        assert!(out.error.is_none(), "{:?}", out.error);
        assert!(!path.exists());
    }

    #[test]
    fn device_mode_keeps_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        fs::write(&path, vec![0xAB; 64]).unwrap();

        let token = CancelToken::new();
        let out = erase_device(&path, passes_for(EraseMethod::Zero), &ctx(&token));
        assert!(out.error.is_none());
        assert_eq!(out.size_bytes, 64);
        assert_eq!(fs::read(&path).unwrap(), vec![0u8; 64]);
    }

    #[cfg(unix)]
    #[test]
    fn directory_tree_is_removed_and_symlinks_not_followed() {
        let outside = tempfile::tempdir().unwrap();
        let keep = outside.path().join("keep.txt");
        fs::write(&keep, b"do not touch").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.txt"), b"1234").unwrap();
        fs::write(root.join("a/mid.txt"), b"12345678").unwrap();
        fs::write(root.join("a/b/deep.txt"), b"12").unwrap();
        std::os::unix::fs::symlink(&keep, root.join("a/link")).unwrap();

        let token = CancelToken::new();
        let out = erase_directory(&root, passes_for(EraseMethod::SinglePass), &ctx(&token));

        assert!(out.error.is_none(), "{:?}", out.error);
        assert_eq!(out.size_bytes, 14);
        assert_eq!(out.bytes_overwritten, 14);
        assert_eq!(out.passes_completed, 1);
        assert!(!root.exists());
        assert_eq!(fs::read(&keep).unwrap(), b"do not touch");
    }

    #[test]
    fn empty_directory_counts_all_passes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("empty");
        fs::create_dir(&root).unwrap();

        let token = CancelToken::new();
        let out = erase_directory(&root, passes_for(EraseMethod::Dod522022M), &ctx(&token));
        assert!(out.error.is_none());
        assert_eq!(out.passes_completed, 3);
        assert!(!root.exists());
    }

    #[test]
    fn cancelled_walk_leaves_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("f"), b"data").unwrap();

        let token = CancelToken::new();
        token.cancel();
        let out = erase_directory(&root, passes_for(EraseMethod::Zero), &ctx(&token));
        assert!(matches!(out.error, Some(TilgungError::Cancelled { .. })));
        assert!(root.exists());
    }

    #[test]
    fn failed_file_does_not_stop_the_walk() {
        use std::cell::RefCell;
        use std::path::PathBuf;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), vec![b'a'; 10]).unwrap();
        fs::write(root.join("stuck.bin"), vec![b's'; 7]).unwrap();
        fs::write(root.join("sub/b.txt"), vec![b'b'; 20]).unwrap();

        let erased: RefCell<Vec<(PathBuf, Option<String>)>> = RefCell::new(Vec::new());
        // Fails partway on one file and leaves it behind; erases the rest.
        let eraser: FileEraser<'_> = &|path, patterns, ctx| {
            if path.file_name().is_some_and(|n| n == "stuck.bin") {
                return Outcome {
                    size_bytes: 7,
                    bytes_overwritten: 7,
                    passes_completed: 1,
                    verification_hash: None,
                    error: Some(io::Error::other("device went away").into()),
                };
            }
            let out = erase_file(path, patterns, ctx);
            assert!(!path.exists(), "{} left behind", path.display());
            erased
                .borrow_mut()
                .push((path.to_path_buf(), out.verification_hash.clone()));
            out
        };

        let token = CancelToken::new();
        let out = erase_tree(
            &root,
            passes_for(EraseMethod::Dod522022M),
            &ctx(&token),
            eraser,
        );

        // Both siblings were fully overwritten (final DoD pass is zeros).
        let erased = erased.into_inner();
        assert_eq!(erased.len(), 2);
        for (path, hash) in &erased {
            let len = if path.ends_with("a.txt") { 10 } else { 20 };
            let zeros =
                overwrite::hash_contents(&mut io::Cursor::new(vec![0u8; len]), len as u64)
                    .unwrap();
            assert_eq!(hash.as_deref(), Some(zeros.as_str()), "{}", path.display());
        }
        assert_eq!(out.size_bytes, 37);
        assert_eq!(out.bytes_overwritten, 30 * 3 + 7);
        assert_eq!(out.passes_completed, 1);

        let err = out.error.expect("walk with a failed file must fail");
        assert_eq!(err.kind(), tilgung_core::types::ErrorKind::IoFailure);
        assert!(err.to_string().contains("1 entries"), "{err}");

        // The residue sweep removed the left-behind file with the root.
        assert!(!root.exists());
    }
}
