use std::sync::Arc;

use crate::config::{OUT_OF_SPACE, UNKNOWN_SEQUENCE_INDEX, UNKNOWN_TIME};

/// In-memory state for one assigned session identity.
///
/// Holds only a `file_position` relation back to its on-disk record, never a
/// back-pointer to the owning engine — mutation is always driven by calling
/// `DirectoryEngine::update_saved_data` with this context's `file_position`
/// (see Design Notes in `SPEC_FULL.md`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext<K> {
    pub composite_key: K,
    pub session_id: u64,
    pub sequence_index: i32,
    pub last_logon_time: i64,
    pub last_sequence_reset_time: i64,
    /// Byte offset of this record's prefix, or `OUT_OF_SPACE` if the context
    /// was never successfully persisted.
    pub file_position: i32,
    /// Opaque tag naming the protocol variant used at last logon.
    pub dictionary: Arc<str>,
}

impl<K> SessionContext<K> {
    pub(crate) fn fresh(composite_key: K, session_id: u64, dictionary: Arc<str>) -> Self {
        Self {
            composite_key,
            session_id,
            sequence_index: UNKNOWN_SEQUENCE_INDEX,
            last_logon_time: UNKNOWN_TIME,
            last_sequence_reset_time: UNKNOWN_TIME,
            file_position: OUT_OF_SPACE,
            dictionary,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.file_position != OUT_OF_SPACE
    }
}

/// A read-only view of one known session, handed out through
/// `DirectoryEngine::all_sessions`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo<K> {
    pub composite_key: K,
    pub session_id: u64,
    pub sequence_index: i32,
    pub last_logon_time: i64,
    pub last_sequence_reset_time: i64,
    pub dictionary: Arc<str>,
}

impl<K: Clone> From<&SessionContext<K>> for SessionInfo<K> {
    fn from(ctx: &SessionContext<K>) -> Self {
        Self {
            composite_key: ctx.composite_key.clone(),
            session_id: ctx.session_id,
            sequence_index: ctx.sequence_index,
            last_logon_time: ctx.last_logon_time,
            last_sequence_reset_time: ctx.last_sequence_reset_time,
            dictionary: Arc::clone(&ctx.dictionary),
        }
    }
}

/// Result of `on_logon`.
///
/// Replaces the poisoned `DUPLICATE_SESSION` singleton of the source (which
/// could not be represented in a `u64` session id) with a tagged variant, so
/// every `SessionContext` the API hands out is well-formed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogonOutcome<K> {
    /// The session was (already, or newly) assigned this context and is now
    /// marked authenticated.
    Assigned(SessionContext<K>),
    /// The identity was already authenticated; the logon is rejected.
    Duplicate,
}

impl<K> LogonOutcome<K> {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LogonOutcome::Duplicate)
    }

    pub fn assigned(self) -> Option<SessionContext<K>> {
        match self {
            LogonOutcome::Assigned(ctx) => Some(ctx),
            LogonOutcome::Duplicate => None,
        }
    }
}
