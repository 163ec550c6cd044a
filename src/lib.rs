//! # resfile - Buffered Resource File I/O
//!
//! A small, synchronous file-stream layer for game resource files: one
//! handle type that batches reads and writes through a fixed-size buffer
//! and works identically over plain files and gzip-compressed streams.
//!
//! ## Features
//!
//! - **One surface, two backends**: callers pick plain or gzip at open
//!   time and use the same read/write/skip calls from then on
//! - **Buffered transfers**: arbitrary-size caller I/O is batched into
//!   [`BUF_SIZE`](stream::BUF_SIZE)-byte backend transfers
//! - **Whole-file helpers**: [`save`] and [`load`] round-trip a byte
//!   payload in one call, compressed or not
//! - **No panics across the API**: every failure is a [`ResfileError`]
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`stream`] - The buffered stream handle, backend dispatch, gzip
//!   capability and path validation
//!
//! Everything is blocking and runs on the caller's thread; a handle is
//! not safe for unsynchronized sharing across threads.

// Core modules
pub mod error;
pub mod stream;

// Re-export commonly used types for convenience
pub use error::{ResfileError, Result};

// Public API surface for external usage
pub use stream::{
    file_size, load, save, uncompressed_file_size, BufferedFile, StreamMode, BUF_SIZE,
    MAX_PATH_LEN,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
