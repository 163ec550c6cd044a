//! Gzip-compressed stream capability for resource files.
//!
//! This module wraps `flate2` behind the small surface the buffered stream
//! layer consumes: constructors that fail with a distinguishable error when
//! the target cannot be opened, chunked read/write, a decoder restart, and
//! the uncompressed-size query. All `flate2` failures are converted to
//! [`ResfileError`] here; nothing from the compression crate leaks further up.

use crate::error::{ResfileError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Gzip magic number (RFC 1952)
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Minimum well-formed gzip file: 10-byte header plus 8-byte trailer
const GZIP_MIN_LEN: u64 = 18;

/// Decompressing reader over a gzip resource file.
#[derive(Debug)]
pub struct GzReader {
    decoder: GzDecoder<BufReader<File>>,
    /// Kept for restarts and the trailer probe
    path: PathBuf,
}

impl GzReader {
    /// Open `path` for decompression.
    ///
    /// The gzip magic bytes are checked eagerly so a non-gzip file fails
    /// here rather than on the first read.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            ResfileError::open_error(
                format!("Failed to open compressed file: {}", path.display()),
                e,
            )
        })?;

        let mut magic = [0u8; 2];
        file.read_exact(&mut magic).map_err(|_| {
            ResfileError::compression(format!(
                "File too short for a gzip stream: {}",
                path.display()
            ))
        })?;
        if magic != GZIP_MAGIC {
            return Err(ResfileError::compression(format!(
                "Not a gzip stream: {}",
                path.display()
            )));
        }
        file.seek(SeekFrom::Start(0))
            .map_err(|e| ResfileError::io_error("Failed to rewind after magic check", e))?;

        Ok(Self {
            decoder: GzDecoder::new(BufReader::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Pull up to `buf.len()` decompressed bytes.
    ///
    /// Returns the number of bytes obtained, 0 at end of stream.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.decoder
            .read(buf)
            .map_err(|e| ResfileError::compression(format!("Gzip read failed: {e}")))
    }

    /// Restart decompression from the beginning of the stream.
    ///
    /// Gzip streams cannot seek, so the decoder is rebuilt over a fresh
    /// handle to the same file.
    pub fn rewind(&mut self) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| {
            ResfileError::open_error(
                format!("Failed to reopen compressed file: {}", self.path.display()),
                e,
            )
        })?;
        self.decoder = GzDecoder::new(BufReader::new(file));
        Ok(())
    }

    /// Uncompressed payload size as declared by the gzip trailer.
    ///
    /// Reads the ISIZE field (RFC 1952, size modulo 2^32) through an
    /// independent file handle, so the decoder state is untouched.
    pub fn uncompressed_size(&self) -> Result<u64> {
        isize_from_trailer(&self.path)
    }
}

/// Compressing writer producing a gzip resource file.
pub struct GzWriter {
    encoder: GzEncoder<File>,
    path: PathBuf,
}

impl GzWriter {
    /// Create (truncate) `path` as a gzip stream.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            ResfileError::open_error(
                format!("Failed to create compressed file: {}", path.display()),
                e,
            )
        })?;
        Ok(Self {
            encoder: GzEncoder::new(file, Compression::default()),
            path: path.to_path_buf(),
        })
    }

    /// Compress and write all of `buf`. Short writes are failures.
    pub fn write_data(&mut self, buf: &[u8]) -> Result<()> {
        self.encoder.write_all(buf).map_err(|e| {
            ResfileError::compression(format!(
                "Gzip write failed for {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Finish the stream, emitting the gzip trailer.
    ///
    /// Must be called before the writer is dropped or the file is left
    /// without a valid trailer.
    pub fn finish(self) -> Result<()> {
        let path = self.path;
        self.encoder
            .finish()
            .map(|_| ())
            .map_err(|e| {
                ResfileError::compression(format!("Gzip finish failed for {}: {e}", path.display()))
            })
    }
}

/// Uncompressed size of the gzip file at `path`.
///
/// Opens the compressed stream solely to ask its declared size, then
/// discards it.
pub fn uncompressed_file_size<P: AsRef<Path>>(path: P) -> Result<u64> {
    let reader = GzReader::open(path.as_ref())?;
    reader.uncompressed_size()
}

fn isize_from_trailer(path: &Path) -> Result<u64> {
    let mut file = File::open(path).map_err(|e| {
        ResfileError::open_error(
            format!("Failed to open compressed file: {}", path.display()),
            e,
        )
    })?;
    let len = file
        .metadata()
        .map_err(|e| ResfileError::io_error("Failed to read compressed file metadata", e))?
        .len();
    if len < GZIP_MIN_LEN {
        return Err(ResfileError::compression(format!(
            "Truncated gzip stream: {}",
            path.display()
        )));
    }

    file.seek(SeekFrom::End(-4))
        .map_err(|e| ResfileError::io_error("Failed to seek to gzip trailer", e))?;
    let mut trailer = [0u8; 4];
    file.read_exact(&mut trailer)
        .map_err(|e| ResfileError::io_error("Failed to read gzip trailer", e))?;
    Ok(u64::from(u32::from_le_bytes(trailer)))
}
