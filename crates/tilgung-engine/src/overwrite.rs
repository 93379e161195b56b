// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chunked multi-pass overwrite.
//
// One pass seeks to offset zero and writes `len` bytes of its pattern in
// chunks, then flushes and syncs.  Fixed patterns are laid out in a buffer
// whose length is a multiple of the pattern length, so a three-byte pattern
// keeps its phase across chunk boundaries.  Random passes draw fresh bytes
// from the system RNG for every chunk.  The cancellation token is checked
// before every chunk write.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use tilgung_core::error::TilgungError;
use tracing::{debug, info};

use crate::patterns::PassPattern;
use crate::registry::CancelToken;

/// Something a pass can be written to and read back from.
pub trait PassSink: Read + Write + Seek {
    /// Make a completed pass durable.
    fn sync_pass(&mut self) -> io::Result<()>;
}

impl PassSink for File {
    fn sync_pass(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl PassSink for Cursor<Vec<u8>> {
    fn sync_pass(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Receives live progress from the pass loop.
pub trait Progress {
    fn bytes_written(&self, bytes: u64);
    fn pass_completed(&self, passes_completed: usize);
}

impl Progress for () {
    fn bytes_written(&self, _bytes: u64) {}
    fn pass_completed(&self, _passes_completed: usize) {}
}

/// What a run of passes achieved.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Passes that were written, flushed and synced in full.
    pub passes_completed: usize,
    pub bytes_written: u64,
    /// `Cancelled` or `PassFailed`; `None` when every pass completed.
    pub error: Option<TilgungError>,
}

enum Interrupt {
    Cancelled,
    Io(io::Error),
}

impl From<io::Error> for Interrupt {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Apply `patterns` in order to the first `len` bytes of `sink`.
///
/// Stops at the first failed or cancelled pass; everything completed before
/// it is still reported.
pub fn run_passes<S: PassSink + ?Sized>(
    sink: &mut S,
    len: u64,
    patterns: &[PassPattern],
    chunk_size: usize,
    cancel: &CancelToken,
    progress: &dyn Progress,
) -> PassOutcome {
    let rng = SystemRandom::new();
    let mut buf = Vec::new();
    let mut outcome = PassOutcome::default();

    for (index, pattern) in patterns.iter().enumerate() {
        let pass = index + 1;
        let result = write_pass(
            sink,
            len,
            *pattern,
            chunk_size,
            &mut buf,
            &rng,
            cancel,
            progress,
            &mut outcome.bytes_written,
        );
        match result {
            Ok(()) => {
                outcome.passes_completed = pass;
                progress.pass_completed(pass);
                info!(pass, total = patterns.len(), pattern = %pattern.label(), "pass complete");
            }
            Err(Interrupt::Cancelled) => {
                info!(pass, "pass interrupted by cancellation");
                outcome.error = Some(TilgungError::Cancelled {
                    passes_completed: outcome.passes_completed,
                });
                break;
            }
            Err(Interrupt::Io(source)) => {
                outcome.error = Some(TilgungError::PassFailed { pass, source });
                break;
            }
        }
    }
    outcome
}

#[allow(clippy::too_many_arguments)]
fn write_pass<S: PassSink + ?Sized>(
    sink: &mut S,
    len: u64,
    pattern: PassPattern,
    chunk_size: usize,
    buf: &mut Vec<u8>,
    rng: &SystemRandom,
    cancel: &CancelToken,
    progress: &dyn Progress,
    written: &mut u64,
) -> Result<(), Interrupt> {
    let chunk_len = match pattern {
        PassPattern::Fixed(bytes) => {
            let aligned = (chunk_size / bytes.len()).max(1) * bytes.len();
            buf.clear();
            buf.extend(bytes.iter().copied().cycle().take(aligned));
            aligned
        }
        PassPattern::Random => {
            let n = chunk_size.max(1);
            buf.resize(n, 0);
            n
        }
    };

    sink.seek(SeekFrom::Start(0))?;
    let mut remaining = len;
    while remaining > 0 {
        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        let n = remaining.min(chunk_len as u64) as usize;
        if pattern == PassPattern::Random {
            rng.fill(&mut buf[..n])
                .map_err(|_| io::Error::other("system random source failed"))?;
        }
        sink.write_all(&buf[..n])?;
        remaining -= n as u64;
        *written += n as u64;
        progress.bytes_written(n as u64);
    }
    sink.flush()?;
    sink.sync_pass()?;
    debug!(len, chunk_len, "pass synced");
    Ok(())
}

/// SHA-256 (hex) of the first `len` bytes of `sink`.
pub fn hash_contents<S: PassSink + ?Sized>(sink: &mut S, len: u64) -> io::Result<String> {
    sink.seek(SeekFrom::Start(0))?;
    let mut hasher = Sha256::new();
    let mut reader = sink.take(len);
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
