//! Serializes and parses the composite identity key used as a session's
//! logical name. The engine treats the blob as opaque; only the strategy
//! understands its structure.

/// Sentinel returned by [`IdentityStrategy::save`] when `scratch_buffer`
/// cannot hold the serialized key.
pub const INSUFFICIENT_SPACE: usize = usize::MAX;

/// Serializes and parses a composite identity key.
pub trait IdentityStrategy {
    type Key: Clone + Eq + std::hash::Hash + Send + Sync + 'static;

    /// Serializes `key` into `scratch_buffer` starting at `offset`, returning
    /// the number of bytes written, or [`INSUFFICIENT_SPACE`] if the buffer
    /// is too small.
    fn save(&self, key: &Self::Key, scratch_buffer: &mut [u8], offset: usize) -> usize;

    /// Parses a key out of `buffer[offset..offset + length]`. Returns `None`
    /// if the tail is malformed.
    fn load(&self, buffer: &[u8], offset: usize, length: usize) -> Option<Self::Key>;
}

/// The classic FIX composite key: sender, target, and an optional qualifier
/// used to disambiguate multiple sessions between the same two parties.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub sender_comp_id: String,
    pub target_comp_id: String,
    pub session_qualifier: String,
}

impl CompositeKey {
    pub fn new(
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
        session_qualifier: impl Into<String>,
    ) -> Self {
        Self {
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            session_qualifier: session_qualifier.into(),
        }
    }
}

/// `\u{1}`-delimited ASCII serialization of [`CompositeKey`], following the
/// SOH-delimited field convention used for composite keys in FIX session
/// stores.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositeKeyStrategy;

const DELIMITER: u8 = 0x01;

impl IdentityStrategy for CompositeKeyStrategy {
    type Key = CompositeKey;

    fn save(&self, key: &Self::Key, scratch_buffer: &mut [u8], offset: usize) -> usize {
        let mut encoded = Vec::with_capacity(
            key.sender_comp_id.len() + key.target_comp_id.len() + key.session_qualifier.len() + 2,
        );
        encoded.extend_from_slice(key.sender_comp_id.as_bytes());
        encoded.push(DELIMITER);
        encoded.extend_from_slice(key.target_comp_id.as_bytes());
        encoded.push(DELIMITER);
        encoded.extend_from_slice(key.session_qualifier.as_bytes());

        if offset + encoded.len() > scratch_buffer.len() {
            return INSUFFICIENT_SPACE;
        }

        scratch_buffer[offset..offset + encoded.len()].copy_from_slice(&encoded);
        encoded.len()
    }

    fn load(&self, buffer: &[u8], offset: usize, length: usize) -> Option<Self::Key> {
        let tail = buffer.get(offset..offset + length)?;
        let mut fields = tail.split(|&b| b == DELIMITER);
        let sender_comp_id = std::str::from_utf8(fields.next()?).ok()?;
        let target_comp_id = std::str::from_utf8(fields.next()?).ok()?;
        let session_qualifier = std::str::from_utf8(fields.next()?).ok()?;
        if fields.next().is_some() {
            // Extra delimiter: malformed tail.
            return None;
        }

        Some(CompositeKey::new(
            sender_comp_id,
            target_comp_id,
            session_qualifier,
        ))
    }
}
