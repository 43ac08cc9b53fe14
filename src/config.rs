use std::path::{Path, PathBuf};

/// Default sector size, in bytes. Must be a power of two and larger than
/// [`CHECKSUM_SIZE`].
pub const DEFAULT_SECTOR_SIZE: usize = 4096;

/// Number of trailing bytes in every sector reserved for its CRC32.
pub const CHECKSUM_SIZE: usize = 4;

/// Default size of the fixed file header, in bytes.
pub const DEFAULT_HEADER_SIZE: usize = 8;

/// Sentinel `sequence_index` meaning "no wire-level sequence generation known yet".
pub const UNKNOWN_SEQUENCE_INDEX: i32 = -1;

/// Sentinel timestamp meaning "no wall-clock value known yet". Chosen so that
/// it can never collide with a real millisecond-since-epoch value.
pub const UNKNOWN_TIME: i64 = i64::MIN;

/// Sentinel `file_position` meaning "this context was never persisted".
pub const OUT_OF_SPACE: i32 = -1;

/// The first session id ever handed out.
pub const LOWEST_VALID_SESSION_ID: u64 = 1;

/// Configuration for a [`crate::DirectoryEngine`].
///
/// Mirrors the builder shape used throughout the corpus for buffer/store
/// configuration: a handful of documented, independently-overridable knobs,
/// validated once in `build()`.
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    pub(crate) path: PathBuf,
    pub(crate) capacity: u64,
    pub(crate) sector_size: usize,
    pub(crate) header_size: usize,
    pub(crate) initial_sequence_index: i32,
}

impl DirectoryConfig {
    /// Starts building a configuration for the directory file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> DirectoryConfigBuilder {
        DirectoryConfigBuilder {
            path: path.as_ref().to_path_buf(),
            capacity: None,
            sector_size: None,
            header_size: None,
            initial_sequence_index: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn sector_data_length(&self) -> usize {
        self.sector_size - CHECKSUM_SIZE
    }

    pub fn initial_sequence_index(&self) -> i32 {
        self.initial_sequence_index
    }
}

/// Builder for [`DirectoryConfig`].
pub struct DirectoryConfigBuilder {
    path: PathBuf,
    capacity: Option<u64>,
    sector_size: Option<usize>,
    header_size: Option<usize>,
    initial_sequence_index: Option<i32>,
}

impl DirectoryConfigBuilder {
    /// Sets the total, fixed size of the backing file.
    ///
    /// The directory never grows the file past this size (per the non-goal
    /// of online schema migration / compaction); once every sector is full,
    /// further assignments become unpersisted, out-of-space contexts.
    ///
    /// Defaults to 16 MiB.
    pub fn capacity(mut self, bytes: u64) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Sets the sector size, in bytes. Must be a power of two greater than
    /// [`CHECKSUM_SIZE`].
    ///
    /// Defaults to [`DEFAULT_SECTOR_SIZE`] (4096).
    pub fn sector_size(mut self, bytes: usize) -> Self {
        self.sector_size = Some(bytes);
        self
    }

    /// Sets the size of the fixed file header.
    ///
    /// Defaults to [`DEFAULT_HEADER_SIZE`] (8).
    pub fn header_size(mut self, bytes: usize) -> Self {
        self.header_size = Some(bytes);
        self
    }

    /// Sets the `sequence_index` a freshly-assigned session starts with
    /// before any wire-level sequence reset has been observed.
    ///
    /// Defaults to [`UNKNOWN_SEQUENCE_INDEX`].
    pub fn initial_sequence_index(mut self, value: i32) -> Self {
        self.initial_sequence_index = Some(value);
        self
    }

    /// Consumes the builder and constructs a [`DirectoryConfig`].
    ///
    /// # Panics
    ///
    /// Panics if `sector_size` is not a power of two greater than
    /// `CHECKSUM_SIZE`, or if `header_size` does not fit within one sector's
    /// data region.
    pub fn build(self) -> DirectoryConfig {
        let sector_size = self.sector_size.unwrap_or(DEFAULT_SECTOR_SIZE);
        assert!(
            sector_size > CHECKSUM_SIZE && sector_size.is_power_of_two(),
            "sector_size must be a power of two greater than {CHECKSUM_SIZE}"
        );

        let header_size = self.header_size.unwrap_or(DEFAULT_HEADER_SIZE);
        assert!(
            header_size <= sector_size - CHECKSUM_SIZE,
            "header_size must fit within the first sector's data region"
        );

        let capacity = self.capacity.unwrap_or(16 * 1024 * 1024);
        let initial_sequence_index = self
            .initial_sequence_index
            .unwrap_or(UNKNOWN_SEQUENCE_INDEX);

        DirectoryConfig {
            path: self.path,
            capacity,
            sector_size,
            header_size,
            initial_sequence_index,
        }
    }
}
