//! The directory engine: the core of this crate. Loads the on-disk
//! directory, rebuilds the in-memory index, assigns fresh numeric session
//! ids, mutates records in place, maintains per-sector checksums, and
//! exposes membership queries to the surrounding session layer.

use std::{collections::HashMap, hash::Hash, marker::PhantomData, path::Path, sync::Arc};

use arc_swap::ArcSwap;
use dashmap::DashSet;

use crate::{
    config::{DirectoryConfig, CHECKSUM_SIZE, OUT_OF_SPACE},
    context::{LogonOutcome, SessionContext, SessionInfo},
    error::{DirectoryError, ErrorSink},
    identity::{IdentityStrategy, INSUFFICIENT_SPACE},
    mapped_region::MappedRegion,
    record::{RecordCodec, RecordFields},
    sector::SectorFramer,
};

/// Assigns stable numeric identities to counterparty sessions and persists
/// the assignment table to a sector-framed, checksum-protected
/// memory-mapped file.
///
/// Generic over the injected [`RecordCodec`] (`C`) and [`IdentityStrategy`]
/// (`S`), per the component design: the engine owns sector framing and
/// durability, and delegates per-record wire layout and composite-key
/// serialization to these two collaborators.
///
/// All mutating operations take `&mut self`, enforcing the single-writer
/// scheduling model at the type level. `authenticated` and `all_sessions`
/// are readable concurrently by other threads via cloned handles.
pub struct DirectoryEngine<C, S>
where
    S: IdentityStrategy,
{
    config: DirectoryConfig,
    framer: SectorFramer,
    region: MappedRegion,
    identity: S,
    error_sink: Arc<dyn ErrorSink>,

    by_key: HashMap<S::Key, SessionContext<S::Key>>,
    by_id: HashMap<u64, S::Key>,
    authenticated: Arc<DashSet<u64>>,
    snapshot: Arc<ArcSwap<Vec<SessionInfo<S::Key>>>>,

    counter: u64,
    append_cursor: u64,
    scratch: Vec<u8>,

    _codec: PhantomData<fn() -> C>,
}

impl<C, S> DirectoryEngine<C, S>
where
    C: RecordCodec,
    S: IdentityStrategy,
    S::Key: Clone + Eq + Hash,
{
    /// Opens (creating if necessary) the directory file described by
    /// `config`, loads its contents, and rebuilds the in-memory index.
    pub fn open(
        config: DirectoryConfig,
        identity: S,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Result<Self, DirectoryError> {
        assert!(
            config.header_size() >= C::MIN_HEADER_SIZE,
            "configured header_size is too small for this record codec"
        );

        let region = MappedRegion::open_or_create(config.path(), config.capacity())?;
        let framer = SectorFramer::new(config.sector_size(), CHECKSUM_SIZE, region.len());
        let scratch = vec![0u8; config.sector_data_length()];

        let mut engine = Self {
            counter: crate::config::LOWEST_VALID_SESSION_ID,
            append_cursor: config.header_size() as u64,
            config,
            framer,
            region,
            identity,
            error_sink,
            by_key: HashMap::new(),
            by_id: HashMap::new(),
            authenticated: Arc::new(DashSet::new()),
            snapshot: Arc::new(ArcSwap::from_pointee(Vec::new())),
            scratch,
            _codec: PhantomData,
        };

        engine.load()?;
        Ok(engine)
    }

    /// A cloneable, concurrently-readable handle onto the set of currently
    /// authenticated session ids.
    pub fn authenticated_handle(&self) -> Arc<DashSet<u64>> {
        Arc::clone(&self.authenticated)
    }

    fn header_is_empty(&self) -> bool {
        self.region.as_slice()[..self.config.header_size()]
            .iter()
            .all(|&b| b == 0)
    }

    fn write_header(&mut self) {
        {
            let buf = self.region.as_mut_slice();
            C::encode_header_at(buf, 0);
        }
        self.recompute_and_force(0);
    }

    /// Recomputes the CRC32 over the sector containing `position` and forces
    /// the mapped region to stable storage. Order matters: encode, then
    /// checksum, then force (§5 ordering guarantee).
    fn recompute_and_force(&mut self, position: u64) {
        let sector_start = self.framer.sector_start(position);
        let data_len = self.config.sector_data_length() as u64;
        let crc = self.region.crc32_region(sector_start, data_len);
        self.region.put_u32(self.framer.checksum_offset(position), crc);
        if let Err(source) = self.region.force() {
            self.error_sink.report(DirectoryError::Io {
                path: self.config.path().to_path_buf(),
                source,
            });
        }
    }

    fn validate_sector(&self, sector_start: u64) {
        let data_len = self.config.sector_data_length() as u64;
        let checksum_offset = sector_start + data_len;
        let stored = self.region.get_u32(checksum_offset);
        let computed = self.region.crc32_region(sector_start, data_len);
        if stored != computed {
            self.error_sink.report(DirectoryError::CorruptSector {
                sector_start,
                stored,
                computed,
            });
        }
    }

    /// Loads the directory file, rebuilding `by_key`/`by_id`/`counter`, and
    /// publishes the initial snapshot. Tolerant of zero-padded sector tails
    /// and of CRC mismatches (§4.5.1).
    fn load(&mut self) -> Result<(), DirectoryError> {
        let _span = tracing::debug_span!("directory_load", path = %self.config.path().display()).entered();

        if self.header_is_empty() {
            self.write_header();
        }

        let capacity = self.region.len();
        let header_size = self.config.header_size() as u64;
        let mut pos = header_size;
        let mut last_validated_sector: Option<u64> = None;

        while pos + C::MIN_DECODE_LEN as u64 <= capacity {
            let sector_start = self.framer.sector_start(pos);
            if last_validated_sector != Some(sector_start) {
                self.validate_sector(sector_start);
                last_validated_sector = Some(sector_start);
            }

            let fields = match C::decode_at(
                self.region.as_slice(),
                pos as usize,
                C::BLOCK_LENGTH,
                C::SCHEMA_VERSION,
            ) {
                Some(fields) => fields,
                None => {
                    self.error_sink
                        .report(DirectoryError::MalformedRecord { offset: pos });
                    break;
                }
            };

            if fields.session_id == 0 {
                let next_sector_start = sector_start + self.config.sector_size() as u64;
                if next_sector_start + C::MIN_DECODE_LEN as u64 > capacity {
                    break;
                }

                let next_fields = match C::decode_at(
                    self.region.as_slice(),
                    next_sector_start as usize,
                    C::BLOCK_LENGTH,
                    C::SCHEMA_VERSION,
                ) {
                    Some(next_fields) => next_fields,
                    None => {
                        self.error_sink.report(DirectoryError::MalformedRecord {
                            offset: next_sector_start,
                        });
                        break;
                    }
                };
                if next_fields.session_id == 0 {
                    break;
                }

                pos = next_sector_start;
                continue;
            }

            let key_offset = pos + C::encoded_len(&fields) as u64;
            let key_length = fields.composite_key_length as usize;
            let key = match self.identity.load(self.region.as_slice(), key_offset as usize, key_length) {
                Some(key) => key,
                None => {
                    self.error_sink
                        .report(DirectoryError::MalformedRecord { offset: pos });
                    break;
                }
            };

            let ctx = SessionContext {
                composite_key: key.clone(),
                session_id: fields.session_id,
                sequence_index: fields.sequence_index,
                last_logon_time: fields.logon_time,
                last_sequence_reset_time: fields.last_sequence_reset_time,
                file_position: pos as i32,
                dictionary: Arc::from(fields.last_dictionary_name.as_str()),
            };

            self.counter = self.counter.max(fields.session_id + 1);
            self.by_id.insert(fields.session_id, key.clone());
            self.by_key.insert(key, ctx);

            pos = key_offset + key_length as u64;
        }

        self.append_cursor = pos;
        self.publish_snapshot();
        tracing::debug!(sessions = self.by_key.len(), counter = self.counter, "directory load complete");
        Ok(())
    }

    fn publish_snapshot(&self) {
        let infos: Vec<SessionInfo<S::Key>> = self.by_key.values().map(SessionInfo::from).collect();
        self.snapshot.store(Arc::new(infos));
    }

    /// Looks up or creates a [`SessionContext`] for `composite_key`, without
    /// touching the authenticated set.
    pub fn new_session_context(
        &mut self,
        composite_key: S::Key,
        dictionary: &str,
    ) -> SessionContext<S::Key> {
        if let Some(existing) = self.by_key.get(&composite_key) {
            return existing.clone();
        }

        let session_id = self.counter;
        self.counter += 1;

        let mut ctx = SessionContext::fresh(composite_key.clone(), session_id, Arc::from(dictionary));
        ctx.sequence_index = self.config.initial_sequence_index();
        self.assign_session_id(&mut ctx);

        self.by_id.insert(session_id, composite_key.clone());
        self.by_key.insert(composite_key, ctx.clone());
        self.publish_snapshot();

        ctx
    }

    /// Persists a freshly-allocated session context's first record (§4.5.2,
    /// `assign_session_id`). On any failure the context remains in memory
    /// with `file_position == OUT_OF_SPACE`.
    fn assign_session_id(&mut self, ctx: &mut SessionContext<S::Key>) {
        let key_length = self
            .identity
            .save(&ctx.composite_key, &mut self.scratch, 0);
        if key_length == INSUFFICIENT_SPACE {
            self.error_sink.report(DirectoryError::OutOfSpace {
                session_id: ctx.session_id,
            });
            return;
        }
        let key_bytes = self.scratch[..key_length].to_vec();

        let fields = RecordFields {
            session_id: ctx.session_id,
            sequence_index: ctx.sequence_index,
            logon_time: ctx.last_logon_time,
            last_sequence_reset_time: ctx.last_sequence_reset_time,
            composite_key_length: key_length as u16,
            last_dictionary_name: ctx.dictionary.to_string(),
        };

        let record_length = C::encoded_len(&fields) as u64 + key_length as u64;
        let position = match self.framer.claim(self.append_cursor, record_length) {
            Some(position) => position,
            None => {
                self.error_sink.report(DirectoryError::OutOfSpace {
                    session_id: ctx.session_id,
                });
                return;
            }
        };

        let prefix_len = C::encoded_len(&fields) as u64;
        {
            let buf = self.region.as_mut_slice();
            C::encode_at(buf, position as usize, &fields);
        }
        self.region.put_bytes(position + prefix_len, &key_bytes);
        self.recompute_and_force(position);

        self.append_cursor = position + record_length;
        ctx.file_position = position as i32;
    }

    /// Logs on `composite_key`, assigning a fresh session id if unseen.
    /// Rejects the logon with [`LogonOutcome::Duplicate`] if the identity is
    /// already authenticated.
    #[tracing::instrument(level = "debug", skip(self, composite_key, dictionary))]
    pub fn on_logon(
        &mut self,
        composite_key: S::Key,
        dictionary: &str,
    ) -> LogonOutcome<S::Key> {
        let ctx = self.new_session_context(composite_key, dictionary);
        if self.authenticated.insert(ctx.session_id) {
            tracing::debug!(session_id = ctx.session_id, "session authenticated");
            LogonOutcome::Assigned(ctx)
        } else {
            tracing::debug!(session_id = ctx.session_id, "rejected duplicate logon");
            LogonOutcome::Duplicate
        }
    }

    /// Removes `session_id` from the authenticated set. Idempotent; does
    /// not touch disk.
    pub fn on_disconnect(&mut self, session_id: u64) {
        tracing::debug!(session_id, "session disconnected");
        self.authenticated.remove(&session_id);
    }

    /// Rewrites `last_sequence_reset_time` for the context with `session_id`
    /// in place, if known. Unknown ids are silently ignored.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn sequence_reset(&mut self, session_id: u64, reset_time: i64) {
        let Some(key) = self.by_id.get(&session_id).cloned() else {
            return;
        };
        let Some(ctx) = self.by_key.get(&key).cloned() else {
            return;
        };

        self.update_saved_data(
            ctx.file_position,
            ctx.sequence_index,
            ctx.last_logon_time,
            reset_time,
        );

        if let Some(ctx_mut) = self.by_key.get_mut(&key) {
            ctx_mut.last_sequence_reset_time = reset_time;
        }
        self.publish_snapshot();
    }

    /// In-place rewrite of the three mutable prefix fields of the record at
    /// `file_position`. A no-op when `file_position == OUT_OF_SPACE` (§7).
    pub fn update_saved_data(
        &mut self,
        file_position: i32,
        sequence_index: i32,
        logon_time: i64,
        last_sequence_reset_time: i64,
    ) {
        if file_position == OUT_OF_SPACE {
            return;
        }
        let position = file_position as u64;

        let mut fields = match C::decode_at(
            self.region.as_slice(),
            position as usize,
            C::BLOCK_LENGTH,
            C::SCHEMA_VERSION,
        ) {
            Some(fields) => fields,
            None => {
                self.error_sink
                    .report(DirectoryError::MalformedRecord { offset: position });
                return;
            }
        };
        fields.sequence_index = sequence_index;
        fields.logon_time = logon_time;
        fields.last_sequence_reset_time = last_sequence_reset_time;

        {
            let buf = self.region.as_mut_slice();
            C::encode_at(buf, position as usize, &fields);
        }
        self.recompute_and_force(position);
    }

    /// Clears the entire directory. Fails unless `authenticated` is empty.
    #[tracing::instrument(level = "debug", skip(self, backup_location))]
    pub fn reset(&mut self, backup_location: Option<&Path>) -> Result<(), DirectoryError> {
        if !self.authenticated.is_empty() {
            return Err(DirectoryError::ResetWithAuth {
                authenticated_count: self.authenticated.len(),
            });
        }
        tracing::warn!("resetting session directory");

        if let Some(backup) = backup_location {
            self.region.transfer_to(backup)?;
        }

        self.by_key.clear();
        self.by_id.clear();
        self.counter = crate::config::LOWEST_VALID_SESSION_ID;
        self.append_cursor = self.config.header_size() as u64;

        self.region.zero_fill();
        self.write_header();
        self.publish_snapshot();

        Ok(())
    }

    pub fn lookup_session_id(&self, composite_key: &S::Key) -> Option<u64> {
        self.by_key.get(composite_key).map(|ctx| ctx.session_id)
    }

    pub fn is_authenticated(&self, session_id: u64) -> bool {
        self.authenticated.contains(&session_id)
    }

    pub fn is_known_session_id(&self, session_id: u64) -> bool {
        self.by_id.contains_key(&session_id)
    }

    /// A consistent, concurrently-readable snapshot of every known session.
    pub fn all_sessions(&self) -> Arc<Vec<SessionInfo<S::Key>>> {
        self.snapshot.load_full()
    }

    /// Total number of session identities ever assigned, authenticated or not.
    pub fn session_count(&self) -> usize {
        self.by_key.len()
    }
}
