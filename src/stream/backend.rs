//! Backend dispatch for the buffered stream.
//!
//! A stream handle delegates its actual I/O to exactly one byte provider at a
//! time: a plain OS file or a gzip reader/writer. The provider is modeled as
//! a sum type so the "at most one backend active" invariant is structural
//! rather than a convention over nullable fields.

use crate::error::{ResfileError, Result};
use crate::stream::gz::{GzReader, GzWriter};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// Transfer direction, fixed at open time for the lifetime of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Bytes flow from the backend to the caller
    Read,
    /// Bytes flow from the caller to the backend
    Write,
}

/// The active byte provider behind a stream handle.
pub(crate) enum Backend {
    /// Plain OS file, read or write
    Plain(File),
    /// Gzip decompressor
    GzRead(GzReader),
    /// Gzip compressor
    GzWrite(GzWriter),
}

impl Backend {
    /// Pull up to `buf.len()` bytes into `buf`.
    ///
    /// End of stream and backend errors both report 0 bytes obtained; the
    /// buffer layer turns an empty refill into a short-transfer failure.
    pub(crate) fn fill(&mut self, buf: &mut [u8]) -> usize {
        match self {
            Backend::Plain(file) => file.read(buf).unwrap_or(0),
            Backend::GzRead(gz) => gz.read_data(buf).unwrap_or(0),
            Backend::GzWrite(_) => 0,
        }
    }

    /// Push exactly `buf.len()` bytes. Short writes are failures.
    pub(crate) fn flush_from(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Backend::Plain(file) => file
                .write_all(buf)
                .map_err(|e| ResfileError::io_error("Failed to flush write buffer", e)),
            Backend::GzWrite(gz) => gz.write_data(buf),
            Backend::GzRead(_) => Err(ResfileError::mode_violation(
                "flush on a read backend",
            )),
        }
    }

    /// Reposition to the start of the stream.
    pub(crate) fn rewind(&mut self) -> Result<()> {
        match self {
            Backend::Plain(file) => file
                .seek(SeekFrom::Start(0))
                .map(|_| ())
                .map_err(|e| ResfileError::io_error("Failed to seek to start", e)),
            Backend::GzRead(gz) => gz.rewind(),
            Backend::GzWrite(_) => Err(ResfileError::mode_violation(
                "rewind on a write backend",
            )),
        }
    }

    /// Whether skipping can be done with a relative seek instead of
    /// reading through the skipped span.
    pub(crate) fn supports_seek(&self) -> bool {
        matches!(self, Backend::Plain(_))
    }

    /// Skip `offset` bytes with a single relative seek.
    ///
    /// Only valid when [`supports_seek`](Self::supports_seek) is true.
    pub(crate) fn seek_forward(&mut self, offset: u64) -> Result<()> {
        match self {
            Backend::Plain(file) => file
                .seek(SeekFrom::Current(offset as i64))
                .map(|_| ())
                .map_err(|e| ResfileError::io_error("Failed to skip forward", e)),
            _ => Err(ResfileError::mode_violation(
                "relative seek on a non-seekable backend",
            )),
        }
    }

    /// Total size of the underlying entry, cursor preserved.
    ///
    /// A gzip stream cannot answer this without decompressing, so only the
    /// plain variant supports the query.
    pub(crate) fn entry_size(&mut self) -> Result<u64> {
        match self {
            Backend::Plain(file) => {
                let pos = file
                    .stream_position()
                    .map_err(|e| ResfileError::io_error("Failed to read cursor position", e))?;
                let end = file
                    .seek(SeekFrom::End(0))
                    .map_err(|e| ResfileError::io_error("Failed to seek to end", e))?;
                file.seek(SeekFrom::Start(pos))
                    .map_err(|e| ResfileError::io_error("Failed to restore cursor position", e))?;
                Ok(end)
            }
            _ => Err(ResfileError::mode_violation(
                "entry size is not available for compressed streams",
            )),
        }
    }

    /// Release the backend. For gzip writers this emits the stream trailer.
    pub(crate) fn finish(self) -> Result<()> {
        match self {
            Backend::Plain(_) | Backend::GzRead(_) => Ok(()),
            Backend::GzWrite(gz) => gz.finish(),
        }
    }
}
