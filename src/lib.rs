//! A persistent, crash-tolerant directory that assigns stable numeric
//! identities to counterparty sessions for a FIX-style messaging gateway.
//!
//! The directory is a single memory-mapped file divided into fixed-size
//! sectors, each protected by a trailing CRC32. Records never straddle a
//! sector's checksum slot. Loading the file replays every record to rebuild
//! the in-memory indices, tolerating a zero-padded tail left by a process
//! that crashed mid-write.
//!
//! The wire layout of a record ([`RecordCodec`]) and the serialization of a
//! session's composite key ([`IdentityStrategy`]) are both injected as
//! generic parameters on [`DirectoryEngine`] rather than hardcoded, so
//! callers can adapt the on-disk schema without touching the sector-framing
//! or durability logic.
//!
//! ```no_run
//! use std::sync::Arc;
//! use session_directory::{
//!     CompositeKey, CompositeKeyStrategy, DirectoryConfig, DirectoryEngine,
//!     FixedRecordCodec, TracingErrorSink,
//! };
//!
//! # fn main() -> Result<(), session_directory::DirectoryError> {
//! let config = DirectoryConfig::from_path("sessions.dat").build();
//! let mut engine: DirectoryEngine<FixedRecordCodec, CompositeKeyStrategy> =
//!     DirectoryEngine::open(config, CompositeKeyStrategy, Arc::new(TracingErrorSink))?;
//!
//! let key = CompositeKey::new("SENDER", "TARGET", "");
//! let outcome = engine.on_logon(key, "FIX.4.2");
//! assert!(!outcome.is_duplicate());
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod engine;
mod error;
mod identity;
mod mapped_region;
mod record;
mod sector;

#[cfg(test)]
mod tests;

pub use config::{
    DirectoryConfig, DirectoryConfigBuilder, CHECKSUM_SIZE, DEFAULT_HEADER_SIZE,
    DEFAULT_SECTOR_SIZE, LOWEST_VALID_SESSION_ID, OUT_OF_SPACE, UNKNOWN_SEQUENCE_INDEX,
    UNKNOWN_TIME,
};
pub use context::{LogonOutcome, SessionContext, SessionInfo};
pub use engine::DirectoryEngine;
pub use error::{DirectoryError, ErrorSink, TracingErrorSink};
pub use identity::{CompositeKey, CompositeKeyStrategy, IdentityStrategy, INSUFFICIENT_SPACE};
pub use mapped_region::MappedRegion;
pub use record::{FixedRecordCodec, RecordCodec, RecordFields};
pub use sector::SectorFramer;
