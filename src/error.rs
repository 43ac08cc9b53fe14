use std::path::PathBuf;

use snafu::Snafu;

/// Unified error taxonomy for the session directory.
///
/// Some variants are non-fatal and only ever reach callers through an
/// [`ErrorSink`] (`CorruptSector`, `MalformedRecord`, `OutOfSpace`); others are
/// fatal and are returned directly from the operation that detected them
/// (`WrongBufferKind`, `ResetWithAuth`). They share one enum so that a sink
/// implementation can match on the same set of variants a caller would see.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DirectoryError {
    /// CRC mismatch while loading a sector. Load continues past it.
    #[snafu(display(
        "sector at offset {sector_start} failed checksum validation: stored {stored:#010x}, computed {computed:#010x}"
    ))]
    CorruptSector {
        sector_start: u64,
        stored: u32,
        computed: u32,
    },

    /// The identity strategy could not parse the composite key tail of a record.
    #[snafu(display("record at offset {offset} has a malformed composite key tail"))]
    MalformedRecord { offset: u64 },

    /// The sector framer or identity strategy ran out of room to persist a record.
    #[snafu(display("no space remains to persist session {session_id}"))]
    OutOfSpace { session_id: u64 },

    /// The mapped region is not backed by a plain file.
    #[snafu(display("{path:?} is not a byte-buffer-backed mapped file"))]
    WrongBufferKind { path: PathBuf },

    /// `reset` was called while sessions were still authenticated.
    #[snafu(display("reset refused: {authenticated_count} session(s) still authenticated"))]
    ResetWithAuth { authenticated_count: usize },

    /// Underlying I/O failure against the mapped file.
    #[snafu(display("I/O error on {path:?}: {source}"))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Receives non-fatal errors detected by the engine.
///
/// Construction-time and precondition failures (`WrongBufferKind`,
/// `ResetWithAuth`) are always returned directly as `Err`, never routed
/// through the sink.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: DirectoryError);
}

/// Default sink: logs every reported error through `tracing` at a severity
/// matching how disruptive the condition is.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: DirectoryError) {
        match &error {
            DirectoryError::CorruptSector { .. } | DirectoryError::MalformedRecord { .. } => {
                tracing::warn!(error = %error, "session directory load encountered recoverable corruption");
            }
            DirectoryError::OutOfSpace { .. } => {
                tracing::error!(error = %error, "session directory is out of space");
            }
            DirectoryError::WrongBufferKind { .. } | DirectoryError::ResetWithAuth { .. } => {
                tracing::error!(error = %error, "session directory fatal condition reported to sink");
            }
            DirectoryError::Io { .. } => {
                tracing::error!(error = %error, "session directory I/O error");
            }
        }
    }
}

/// A sink that never logs, useful for quiet test runs.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NullErrorSink;

#[cfg(test)]
impl ErrorSink for NullErrorSink {
    fn report(&self, _error: DirectoryError) {}
}
