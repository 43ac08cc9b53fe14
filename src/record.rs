//! The per-record wire layout is delegated to an injected codec; the engine
//! only depends on the fixed set of fields below and the contract that
//! decoding an all-zero prefix yields `session_id == 0`.

use crate::config::{UNKNOWN_SEQUENCE_INDEX, UNKNOWN_TIME};

/// The fields every record carries, independent of how the codec lays them
/// out on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFields {
    pub session_id: u64,
    pub sequence_index: i32,
    pub logon_time: i64,
    pub last_sequence_reset_time: i64,
    pub composite_key_length: u16,
    pub last_dictionary_name: String,
}

impl RecordFields {
    pub fn empty_slot() -> Self {
        Self {
            session_id: 0,
            sequence_index: UNKNOWN_SEQUENCE_INDEX,
            logon_time: UNKNOWN_TIME,
            last_sequence_reset_time: UNKNOWN_TIME,
            composite_key_length: 0,
            last_dictionary_name: String::new(),
        }
    }
}

/// Encodes and decodes the fixed-prefix-plus-variable-tail record body.
///
/// Implementations own the on-disk schema identifiers; the engine treats
/// them as opaque and only uses them to populate the file header.
pub trait RecordCodec {
    /// Byte length of the fixed-prefix portion of a record, not including the
    /// variable-length dictionary name and composite key blob.
    const BLOCK_LENGTH: usize;
    const SCHEMA_ID: u16;
    const TEMPLATE_ID: u16;
    const SCHEMA_VERSION: u16;

    /// Minimum header size, in bytes, this codec needs to store its schema
    /// identifiers. The engine's configured `header_size` must be at least
    /// this large.
    const MIN_HEADER_SIZE: usize;

    /// Minimum number of bytes that must remain in the buffer at a
    /// candidate offset for [`decode_at`](RecordCodec::decode_at) to safely
    /// read the fixed prefix, including whatever length-prefix field tells
    /// it how long the variable-length tail is. The engine never calls
    /// `decode_at` at a position with fewer than this many bytes remaining.
    const MIN_DECODE_LEN: usize;

    /// Writes the codec's schema identifiers into the file header at
    /// `offset` (always 0 in practice). The header layout is exclusively the
    /// codec's concern; the engine never interprets these bytes itself.
    fn encode_header_at(buf: &mut [u8], offset: usize);

    /// Total encoded length of `fields`, including the variable tail but not
    /// the composite key blob itself (the caller appends that separately).
    fn encoded_len(fields: &RecordFields) -> usize;

    /// Encodes `fields` at `offset` within `buf`. Does not write the
    /// composite key blob; the caller copies it immediately after.
    fn encode_at(buf: &mut [u8], offset: usize, fields: &RecordFields);

    /// Decodes the fixed prefix plus variable tail at `offset`. Returns
    /// `Some(RecordFields::empty_slot())` (with `session_id == 0`) when
    /// reading an all-zero region, and `None` if `buf` does not hold enough
    /// bytes at `offset` to decode a well-formed record — either too short
    /// for the fixed prefix, or the variable-length tail (sized by a field
    /// inside that prefix) runs past the end of `buf`. Implementations must
    /// never panic on out-of-range input; a corrupt or truncated on-disk
    /// record is reported as `MalformedRecord`, not a crash.
    fn decode_at(
        buf: &[u8],
        offset: usize,
        acting_block_length: usize,
        acting_version: u16,
    ) -> Option<RecordFields>;
}

/// Reference [`RecordCodec`] used by the default configuration and the test
/// suite: a 30-byte fixed prefix (`u64 + i32 + i64 + i64 + u16`) followed by a
/// `u16`-length-prefixed ASCII dictionary name.
pub struct FixedRecordCodec;

impl FixedRecordCodec {
    const SESSION_ID_OFFSET: usize = 0;
    const SEQUENCE_INDEX_OFFSET: usize = 8;
    const LOGON_TIME_OFFSET: usize = 12;
    const RESET_TIME_OFFSET: usize = 20;
    const KEY_LENGTH_OFFSET: usize = 28;
    const DICTIONARY_LENGTH_OFFSET: usize = 30;
    const DICTIONARY_NAME_OFFSET: usize = 32;
}

impl RecordCodec for FixedRecordCodec {
    const BLOCK_LENGTH: usize = 30;
    const SCHEMA_ID: u16 = 1;
    const TEMPLATE_ID: u16 = 1;
    const SCHEMA_VERSION: u16 = 1;
    const MIN_HEADER_SIZE: usize = 8;
    const MIN_DECODE_LEN: usize = Self::DICTIONARY_NAME_OFFSET;

    fn encode_header_at(buf: &mut [u8], offset: usize) {
        buf[offset..offset + 2].copy_from_slice(&Self::SCHEMA_ID.to_le_bytes());
        buf[offset + 2..offset + 4].copy_from_slice(&Self::TEMPLATE_ID.to_le_bytes());
        buf[offset + 4..offset + 6].copy_from_slice(&Self::SCHEMA_VERSION.to_le_bytes());
        buf[offset + 6..offset + 8].copy_from_slice(&(Self::BLOCK_LENGTH as u16).to_le_bytes());
    }

    fn encoded_len(fields: &RecordFields) -> usize {
        Self::DICTIONARY_NAME_OFFSET + fields.last_dictionary_name.len()
    }

    fn encode_at(buf: &mut [u8], offset: usize, fields: &RecordFields) {
        let put_u64 = |buf: &mut [u8], at: usize, v: u64| {
            buf[offset + at..offset + at + 8].copy_from_slice(&v.to_le_bytes());
        };
        let put_i32 = |buf: &mut [u8], at: usize, v: i32| {
            buf[offset + at..offset + at + 4].copy_from_slice(&v.to_le_bytes());
        };
        let put_i64 = |buf: &mut [u8], at: usize, v: i64| {
            buf[offset + at..offset + at + 8].copy_from_slice(&v.to_le_bytes());
        };
        let put_u16 = |buf: &mut [u8], at: usize, v: u16| {
            buf[offset + at..offset + at + 2].copy_from_slice(&v.to_le_bytes());
        };

        put_u64(buf, Self::SESSION_ID_OFFSET, fields.session_id);
        put_i32(buf, Self::SEQUENCE_INDEX_OFFSET, fields.sequence_index);
        put_i64(buf, Self::LOGON_TIME_OFFSET, fields.logon_time);
        put_i64(buf, Self::RESET_TIME_OFFSET, fields.last_sequence_reset_time);
        put_u16(buf, Self::KEY_LENGTH_OFFSET, fields.composite_key_length);

        let name_bytes = fields.last_dictionary_name.as_bytes();
        put_u16(buf, Self::DICTIONARY_LENGTH_OFFSET, name_bytes.len() as u16);
        let name_start = offset + Self::DICTIONARY_NAME_OFFSET;
        buf[name_start..name_start + name_bytes.len()].copy_from_slice(name_bytes);
    }

    fn decode_at(
        buf: &[u8],
        offset: usize,
        _acting_block_length: usize,
        _acting_version: u16,
    ) -> Option<RecordFields> {
        // Every fixed-width field below lives within the first
        // `MIN_DECODE_LEN` bytes, so one bounds check up front makes every
        // read that follows safe.
        let prefix = buf.get(offset..offset + Self::MIN_DECODE_LEN)?;

        let get_u64 = |at: usize| u64::from_le_bytes(prefix[at..at + 8].try_into().unwrap());
        let get_i32 = |at: usize| i32::from_le_bytes(prefix[at..at + 4].try_into().unwrap());
        let get_i64 = |at: usize| i64::from_le_bytes(prefix[at..at + 8].try_into().unwrap());
        let get_u16 = |at: usize| u16::from_le_bytes(prefix[at..at + 2].try_into().unwrap());

        let session_id = get_u64(Self::SESSION_ID_OFFSET);
        if session_id == 0 {
            return Some(RecordFields::empty_slot());
        }

        let sequence_index = get_i32(Self::SEQUENCE_INDEX_OFFSET);
        let logon_time = get_i64(Self::LOGON_TIME_OFFSET);
        let last_sequence_reset_time = get_i64(Self::RESET_TIME_OFFSET);
        let composite_key_length = get_u16(Self::KEY_LENGTH_OFFSET);
        let dictionary_length = get_u16(Self::DICTIONARY_LENGTH_OFFSET) as usize;

        // `dictionary_length` came straight off the wire and may be
        // arbitrarily corrupt; bounds-check it against `buf` before slicing.
        let name_start = offset + Self::DICTIONARY_NAME_OFFSET;
        let name_bytes = buf.get(name_start..name_start + dictionary_length)?;
        let last_dictionary_name = String::from_utf8_lossy(name_bytes).into_owned();

        Some(RecordFields {
            session_id,
            sequence_index,
            logon_time,
            last_sequence_reset_time,
            composite_key_length,
            last_dictionary_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_decodes_to_empty_slot() {
        let buf = [0u8; 64];
        let fields = FixedRecordCodec::decode_at(&buf, 0, FixedRecordCodec::BLOCK_LENGTH, 1).unwrap();
        assert_eq!(fields.session_id, 0);
    }

    #[test]
    fn round_trips_fields() {
        let mut buf = [0u8; 64];
        let fields = RecordFields {
            session_id: 42,
            sequence_index: 3,
            logon_time: 1_000,
            last_sequence_reset_time: 2_000,
            composite_key_length: 5,
            last_dictionary_name: "FIX.4.2".to_string(),
        };
        FixedRecordCodec::encode_at(&mut buf, 0, &fields);
        let decoded = FixedRecordCodec::decode_at(&buf, 0, FixedRecordCodec::BLOCK_LENGTH, 1).unwrap();
        assert_eq!(decoded, fields);
    }

    #[test]
    fn decode_at_returns_none_when_buffer_too_short_for_fixed_prefix() {
        let buf = [0u8; 10];
        assert!(FixedRecordCodec::decode_at(&buf, 0, FixedRecordCodec::BLOCK_LENGTH, 1).is_none());
    }

    #[test]
    fn decode_at_returns_none_when_dictionary_length_overruns_buffer() {
        let mut buf = [0u8; 40];
        let fields = RecordFields {
            session_id: 7,
            sequence_index: 0,
            logon_time: 0,
            last_sequence_reset_time: 0,
            composite_key_length: 0,
            last_dictionary_name: String::new(),
        };
        FixedRecordCodec::encode_at(&mut buf, 0, &fields);

        // Simulate a bit-flipped dictionary-length field claiming far more
        // bytes than the buffer actually holds.
        let at = FixedRecordCodec::DICTIONARY_LENGTH_OFFSET;
        buf[at..at + 2].copy_from_slice(&1_000u16.to_le_bytes());

        assert!(FixedRecordCodec::decode_at(&buf, 0, FixedRecordCodec::BLOCK_LENGTH, 1).is_none());
    }
}
