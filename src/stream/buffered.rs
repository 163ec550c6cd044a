//! The buffered stream handle.
//!
//! [`BufferedFile`] batches caller reads and writes of arbitrary size into
//! backend transfers of at most [`BUF_SIZE`] bytes. The same handle serves
//! plain files and gzip streams; callers pick the backend at open time and
//! use one read/write/skip surface from then on.
//!
//! A handle owns a single mutable buffer and cursor, so it is meant for
//! single-threaded use; share it across threads only behind external
//! synchronization.

use crate::error::{ResfileError, Result};
use crate::stream::backend::{Backend, StreamMode};
use crate::stream::gz::{self, GzReader, GzWriter};
use crate::stream::validation::validate_path;
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Capacity of the internal transfer buffer in bytes.
///
/// Caller reads and writes of any size are batched into backend transfers
/// of at most this many bytes.
pub const BUF_SIZE: usize = 4096;

/// Buffered stream over a plain or gzip-compressed file.
///
/// Constructed closed; one of [`create`](Self::create),
/// [`create_executable`](Self::create_executable), [`append`](Self::append)
/// or [`open`](Self::open) attaches a backend. [`close`](Self::close)
/// flushes pending writes and detaches it; dropping the handle closes it
/// too. Opening over an already-open handle closes the previous backend
/// first.
pub struct BufferedFile {
    /// Path of the open entry; empty while closed
    path: PathBuf,
    /// Transfer direction; meaningful only while a backend is open
    mode: StreamMode,
    /// Active byte provider, if any
    backend: Option<Backend>,
    /// Fixed-size transfer buffer
    buffer: Box<[u8; BUF_SIZE]>,
    /// Count of valid bytes in `buffer`
    load: usize,
    /// Read cursor into `buffer` (read mode only)
    pos: usize,
}

impl BufferedFile {
    /// Create a handle in the closed state.
    pub fn new() -> Self {
        Self {
            path: PathBuf::new(),
            mode: StreamMode::Read,
            backend: None,
            buffer: Box::new([0u8; BUF_SIZE]),
            load: 0,
            pos: 0,
        }
    }

    /// Open `path` for truncating write, optionally as a gzip stream.
    pub fn create<P: AsRef<Path>>(&mut self, path: P, compressed: bool) -> Result<()> {
        let path = path.as_ref();
        self.implicit_close();
        validate_path(path)?;
        let backend = if compressed {
            Backend::GzWrite(GzWriter::create(path)?)
        } else {
            let file = File::create(path).map_err(|e| {
                ResfileError::open_error(format!("Failed to create file: {}", path.display()), e)
            })?;
            Backend::Plain(file)
        };
        self.install(backend, StreamMode::Write, path);
        Ok(())
    }

    /// Open `path` for truncating write with executable permission bits.
    ///
    /// Plain files only; the bits are applied at creation time. On
    /// non-Unix platforms this is an ordinary create.
    pub fn create_executable<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.implicit_close();
        validate_path(path)?;
        let file = open_executable(path)?;
        self.install(Backend::Plain(file), StreamMode::Write, path);
        Ok(())
    }

    /// Open `path` for appending, creating it if missing. Plain files only.
    pub fn append<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.implicit_close();
        validate_path(path)?;
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| {
                ResfileError::open_error(
                    format!("Failed to open file for append: {}", path.display()),
                    e,
                )
            })?;
        self.install(Backend::Plain(file), StreamMode::Write, path);
        Ok(())
    }

    /// Open `path` for reading, optionally as a gzip stream.
    ///
    /// The compressed variant validates the gzip magic eagerly, so a
    /// non-gzip file fails here rather than on the first read.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, compressed: bool) -> Result<()> {
        let path = path.as_ref();
        self.implicit_close();
        validate_path(path)?;
        let backend = if compressed {
            Backend::GzRead(GzReader::open(path)?)
        } else {
            let file = File::open(path).map_err(|e| {
                ResfileError::open_error(format!("Failed to open file: {}", path.display()), e)
            })?;
            Backend::Plain(file)
        };
        self.install(backend, StreamMode::Read, path);
        Ok(())
    }

    /// Flush pending writes and release the backend.
    ///
    /// The backend is always released, even when the flush fails; the
    /// first failure is the one reported. Closing a closed handle is a
    /// no-op that returns `Ok`.
    pub fn close(&mut self) -> Result<()> {
        if self.backend.is_none() {
            self.clear_buffer();
            return Ok(());
        }

        let mut first_failure = None;
        if self.mode == StreamMode::Write && self.load > 0 {
            if let Err(err) = self.save_buffer() {
                warn!("flush on close failed for {}: {err}", self.path.display());
                first_failure = Some(err);
            }
        }
        if let Some(backend) = self.backend.take() {
            if let Err(err) = backend.finish() {
                first_failure.get_or_insert(err);
            }
        }
        debug!("closed {}", self.path.display());
        self.path = PathBuf::new();
        self.clear_buffer();

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Whether a backend is currently open.
    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Path of the open entry, `None` while closed.
    pub fn path(&self) -> Option<&Path> {
        self.backend.is_some().then_some(self.path.as_path())
    }

    /// Transfer direction of the open backend, `None` while closed.
    pub fn mode(&self) -> Option<StreamMode> {
        self.backend.is_some().then_some(self.mode)
    }

    /// Fill `dest` completely from the stream.
    ///
    /// Bytes are served from the internal buffer, refilled from the
    /// backend in [`BUF_SIZE`] chunks. Running out of stream before
    /// `dest` is full fails with a short-transfer error carrying the
    /// count actually delivered; partial delivery is never success.
    pub fn read_exact(&mut self, dest: &mut [u8]) -> Result<()> {
        if self.backend.is_none() {
            return Err(ResfileError::mode_violation("read on a closed stream"));
        }
        if self.mode == StreamMode::Write {
            return Err(ResfileError::mode_violation("read on a write-mode stream"));
        }

        let mut filled = 0;
        while filled < dest.len() {
            if self.load > self.pos {
                let transfer = (self.load - self.pos).min(dest.len() - filled);
                dest[filled..filled + transfer]
                    .copy_from_slice(&self.buffer[self.pos..self.pos + transfer]);
                self.pos += transfer;
                filled += transfer;
            } else if self.load_buffer() == 0 {
                return Err(ResfileError::short_transfer(dest.len() as u64, filled as u64));
            }
        }
        Ok(())
    }

    /// Accept all of `src` into the stream.
    ///
    /// Bytes accumulate in the internal buffer; backend I/O happens only
    /// when the buffer fills (or at close).
    pub fn write_all(&mut self, src: &[u8]) -> Result<()> {
        if self.backend.is_none() {
            return Err(ResfileError::mode_violation("write on a closed stream"));
        }
        if self.mode == StreamMode::Read {
            return Err(ResfileError::mode_violation("write on a read-mode stream"));
        }

        let mut written = 0;
        while written < src.len() {
            if self.load < BUF_SIZE {
                let transfer = (BUF_SIZE - self.load).min(src.len() - written);
                self.buffer[self.load..self.load + transfer]
                    .copy_from_slice(&src[written..written + transfer]);
                self.load += transfer;
                written += transfer;
            } else {
                self.save_buffer()?;
            }
        }
        Ok(())
    }

    /// Write the raw bytes of `text` followed by a CRLF terminator.
    ///
    /// The two-byte `0x0D 0x0A` terminator is a fixed file convention,
    /// not adapted to the host platform.
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        self.write_all(text.as_bytes())?;
        self.write_all(&[0x0D, 0x0A])
    }

    /// Discard buffered read-ahead and reposition to the start of the
    /// stream. Read mode only.
    pub fn rewind(&mut self) -> Result<()> {
        if self.mode == StreamMode::Write {
            return Err(ResfileError::mode_violation("rewind on a write-mode stream"));
        }
        let Some(backend) = self.backend.as_mut() else {
            return Err(ResfileError::mode_violation("rewind on a closed stream"));
        };
        self.load = 0;
        self.pos = 0;
        backend.rewind()
    }

    /// Skip `offset` bytes without returning their content. Read mode only.
    ///
    /// Buffered bytes are consumed first. Past the buffer, a plain
    /// backend skips the whole remainder with one relative seek; a gzip
    /// stream cannot seek and reads through the skipped span instead.
    pub fn advance(&mut self, offset: u64) -> Result<()> {
        if self.backend.is_none() {
            return Err(ResfileError::mode_violation("advance on a closed stream"));
        }
        if self.mode == StreamMode::Write {
            return Err(ResfileError::mode_violation("advance on a write-mode stream"));
        }

        let mut remaining = offset;
        while remaining > 0 {
            if self.load > self.pos {
                let transfer = ((self.load - self.pos) as u64).min(remaining);
                self.pos += transfer as usize;
                remaining -= transfer;
            } else {
                let can_seek = self.backend.as_ref().is_some_and(Backend::supports_seek);
                if can_seek {
                    return match self.backend.as_mut() {
                        Some(backend) => backend.seek_forward(remaining),
                        None => Err(ResfileError::mode_violation("advance on a closed stream")),
                    };
                }
                if self.load_buffer() == 0 {
                    return Err(ResfileError::short_transfer(offset, offset - remaining));
                }
            }
        }
        Ok(())
    }

    /// Total size of the underlying entry, leaving the cursor untouched.
    ///
    /// Plain backends only; a gzip stream fails the query instead of
    /// reporting a fabricated size.
    pub fn entry_size(&mut self) -> Result<u64> {
        match self.backend.as_mut() {
            Some(backend) => backend.entry_size(),
            None => Err(ResfileError::mode_violation("entry size on a closed stream")),
        }
    }

    /// Refill the buffer from the backend.
    ///
    /// End of stream and backend errors both report 0 bytes obtained.
    fn load_buffer(&mut self) -> usize {
        self.load = match self.backend.as_mut() {
            Some(backend) => backend.fill(&mut self.buffer[..]),
            None => 0,
        };
        self.pos = 0;
        self.load
    }

    /// Flush exactly `load` buffered bytes to the backend.
    ///
    /// On failure the buffered bytes stay in place; on success the buffer
    /// is empty again.
    fn save_buffer(&mut self) -> Result<()> {
        if self.load > 0 {
            let Some(backend) = self.backend.as_mut() else {
                return Err(ResfileError::mode_violation("flush on a closed stream"));
            };
            backend.flush_from(&self.buffer[..self.load])?;
        }
        self.load = 0;
        Ok(())
    }

    /// Close the previous backend before a reopen, keeping only a log
    /// record of any failure.
    fn implicit_close(&mut self) {
        if self.backend.is_some() {
            if let Err(err) = self.close() {
                warn!("implicit close before reopen failed: {err}");
            }
        }
    }

    fn install(&mut self, backend: Backend, mode: StreamMode, path: &Path) {
        debug!("opened {} ({mode:?} mode)", path.display());
        self.backend = Some(backend);
        self.mode = mode;
        self.path = path.to_path_buf();
        self.clear_buffer();
    }

    fn clear_buffer(&mut self) {
        self.load = 0;
        self.pos = 0;
    }
}

impl Default for BufferedFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BufferedFile {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("close on drop failed: {err}");
        }
    }
}

#[cfg(unix)]
fn open_executable(path: &Path) -> Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o777)
        .open(path)
        .map_err(|e| {
            ResfileError::open_error(
                format!("Failed to create executable file: {}", path.display()),
                e,
            )
        })
}

#[cfg(not(unix))]
fn open_executable(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| {
        ResfileError::open_error(
            format!("Failed to create executable file: {}", path.display()),
            e,
        )
    })
}

/// Write `data` to `path` in one shot: create, write, close.
pub fn save<P: AsRef<Path>>(path: P, data: &[u8], compressed: bool) -> Result<()> {
    if data.is_empty() {
        return Err(ResfileError::size_error("refusing to save an empty payload"));
    }
    let mut stream = BufferedFile::new();
    stream.create(path, compressed)?;
    stream.write_all(data)?;
    stream.close()
}

/// Read the whole entry at `path`, appending `zero_pad` zero bytes.
///
/// The payload length is taken from the gzip trailer when `compressed`,
/// from the on-disk size otherwise; the returned vector holds
/// payload + padding. Fails without a partial buffer if the size query,
/// any read, or the close fails.
pub fn load<P: AsRef<Path>>(path: P, zero_pad: usize, compressed: bool) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let size = if compressed {
        gz::uncompressed_file_size(path)?
    } else {
        file_size(path)?
    };
    if size < 1 {
        return Err(ResfileError::size_error(format!(
            "entry is empty: {}",
            path.display()
        )));
    }

    let mut stream = BufferedFile::new();
    stream.open(path, compressed)?;
    let mut data = vec![0u8; size as usize + zero_pad];
    stream.read_exact(&mut data[..size as usize])?;
    stream.close()?;
    Ok(data)
}

/// On-disk size of a plain file.
pub fn file_size<P: AsRef<Path>>(path: P) -> Result<u64> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| {
        ResfileError::size_error(format!("Failed to stat {}: {e}", path.display()))
    })?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_handle_is_closed() {
        let handle = BufferedFile::new();
        assert!(!handle.is_open());
        assert!(handle.path().is_none());
        assert!(handle.mode().is_none());
    }

    #[test]
    fn test_read_on_write_mode_fails_without_losing_data() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.bin");

        let mut stream = BufferedFile::new();
        stream.create(&target, false).unwrap();
        stream.write_all(b"abc").unwrap();

        let mut scratch = [0u8; 2];
        let err = stream.read_exact(&mut scratch).unwrap_err();
        assert!(matches!(err, ResfileError::ModeViolation { .. }));

        // The failed read must not have disturbed the pending write buffer
        stream.write_all(b"def").unwrap();
        stream.close().unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"abcdef");
    }

    #[test]
    fn test_write_on_read_mode_fails() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("in.bin");
        std::fs::write(&target, b"payload").unwrap();

        let mut stream = BufferedFile::new();
        stream.open(&target, false).unwrap();
        let err = stream.write_all(b"nope").unwrap_err();
        assert!(matches!(err, ResfileError::ModeViolation { .. }));

        let mut out = [0u8; 7];
        stream.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"payload");
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut stream = BufferedFile::new();
        assert!(stream.close().is_ok());
        assert!(stream.close().is_ok());

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.bin");
        stream.create(&target, false).unwrap();
        stream.write_all(b"x").unwrap();
        assert!(stream.close().is_ok());
        assert!(stream.close().is_ok());
    }

    #[test]
    fn test_operations_on_closed_handle_fail() {
        let mut stream = BufferedFile::new();
        let mut scratch = [0u8; 1];

        assert!(matches!(
            stream.read_exact(&mut scratch).unwrap_err(),
            ResfileError::ModeViolation { .. }
        ));
        assert!(matches!(
            stream.write_all(b"x").unwrap_err(),
            ResfileError::ModeViolation { .. }
        ));
        assert!(matches!(
            stream.rewind().unwrap_err(),
            ResfileError::ModeViolation { .. }
        ));
        assert!(matches!(
            stream.advance(1).unwrap_err(),
            ResfileError::ModeViolation { .. }
        ));
        assert!(matches!(
            stream.entry_size().unwrap_err(),
            ResfileError::ModeViolation { .. }
        ));
    }

    #[test]
    fn test_reopen_implicitly_closes_previous_stream() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.bin");
        let second = dir.path().join("second.bin");

        let mut stream = BufferedFile::new();
        stream.create(&first, false).unwrap();
        // Small enough to still sit in the buffer, unflushed
        stream.write_all(b"pending bytes").unwrap();

        stream.create(&second, false).unwrap();
        stream.write_all(b"other").unwrap();
        stream.close().unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), b"pending bytes");
        assert_eq!(std::fs::read(&second).unwrap(), b"other");
    }

    #[test]
    fn test_append_extends_existing_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("log.txt");
        std::fs::write(&target, b"one\r\n").unwrap();

        let mut stream = BufferedFile::new();
        stream.append(&target).unwrap();
        stream.write_line("two").unwrap();
        stream.close().unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"one\r\ntwo\r\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_create_executable_sets_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("tool.sh");

        let mut stream = BufferedFile::new();
        stream.create_executable(&target).unwrap();
        stream.write_line("#!/bin/sh").unwrap();
        stream.close().unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0, "expected at least one executable bit");
    }

    #[test]
    fn test_save_rejects_empty_payload() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("empty.bin");
        let err = save(&target, b"", false).unwrap_err();
        assert!(matches!(err, ResfileError::SizeError { .. }));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = load("/no/such/entry.bin", 0, false).unwrap_err();
        assert!(matches!(err, ResfileError::SizeError { .. }));
    }
}
