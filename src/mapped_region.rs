//! A fixed-capacity, memory-mapped byte window backing the session directory
//! file.

use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use memmap2::MmapMut;

use crate::error::DirectoryError;

/// Owns the backing file and its memory mapping, and exposes random-access
/// reads/writes plus the durability operations the engine needs.
pub struct MappedRegion {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
    mmap: MmapMut,
}

impl MappedRegion {
    /// Opens `path`, creating and zero-filling it to `capacity` bytes if it
    /// does not yet exist, then memory-maps it for read/write access.
    pub fn open_or_create(path: impl AsRef<Path>, capacity: u64) -> Result<Self, DirectoryError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| DirectoryError::Io {
                path: path.clone(),
                source,
            })?;

        let metadata = file.metadata().map_err(|source| DirectoryError::Io {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(DirectoryError::WrongBufferKind { path });
        }

        if metadata.len() != capacity {
            file.set_len(capacity).map_err(|source| DirectoryError::Io {
                path: path.clone(),
                source,
            })?;
        }

        // SAFETY: the file is exclusively owned by this `MappedRegion` for
        // its lifetime; no other process is expected to mutate it underneath
        // us (multi-process concurrent writers are explicitly out of scope).
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| DirectoryError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, file, mmap })
    }

    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    /// Reads a little-endian `u16` at `offset`.
    pub fn get_u16(&self, offset: u64) -> u16 {
        let offset = offset as usize;
        u16::from_le_bytes(self.mmap[offset..offset + 2].try_into().unwrap())
    }

    /// Writes a little-endian `u16` at `offset`.
    pub fn put_u16(&mut self, offset: u64, value: u16) {
        let offset = offset as usize;
        self.mmap[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Reads a little-endian `u32` at `offset`.
    pub fn get_u32(&self, offset: u64) -> u32 {
        let offset = offset as usize;
        u32::from_le_bytes(self.mmap[offset..offset + 4].try_into().unwrap())
    }

    /// Writes a little-endian `u32` at `offset`.
    pub fn put_u32(&mut self, offset: u64, value: u32) {
        let offset = offset as usize;
        self.mmap[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, offset: u64, bytes: &[u8]) {
        let offset = offset as usize;
        self.mmap[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn get_bytes(&self, offset: u64, len: usize) -> &[u8] {
        let offset = offset as usize;
        &self.mmap[offset..offset + len]
    }

    /// Computes CRC32 over `[start, start + len)`.
    pub fn crc32_region(&self, start: u64, len: u64) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.get_bytes(start, len as usize));
        hasher.finalize()
    }

    /// Flushes all dirty pages to stable storage.
    pub fn force(&self) -> io::Result<()> {
        self.mmap.flush()
    }

    /// Zeroes the entire mapped region (used by `reset`).
    pub fn zero_fill(&mut self) {
        self.mmap.fill(0);
    }

    /// Copies the backing file, as it currently stands on disk, to `dest`.
    pub fn transfer_to(&self, dest: impl AsRef<Path>) -> Result<(), DirectoryError> {
        // Force first so the snapshot reflects the latest in-memory state.
        self.force().map_err(|source| DirectoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        std::fs::copy(&self.path, dest.as_ref()).map_err(|source| DirectoryError::Io {
            path: dest.as_ref().to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn creates_zero_filled_file_of_requested_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("directory.dat");
        let region = MappedRegion::open_or_create(&path, 4096).unwrap();
        assert_eq!(region.len(), 4096);
        assert_eq!(region.as_slice(), &[0u8; 4096][..]);
    }

    #[test]
    fn put_and_get_u32_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("directory.dat");
        let mut region = MappedRegion::open_or_create(&path, 4096).unwrap();
        region.put_u32(100, 0xdead_beef);
        assert_eq!(region.get_u32(100), 0xdead_beef);
    }

    #[test]
    fn reopening_existing_file_preserves_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("directory.dat");
        {
            let mut region = MappedRegion::open_or_create(&path, 4096).unwrap();
            region.put_u32(0, 42);
            region.force().unwrap();
        }
        let region = MappedRegion::open_or_create(&path, 4096).unwrap();
        assert_eq!(region.get_u32(0), 42);
    }

    #[test]
    fn zero_fill_clears_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("directory.dat");
        let mut region = MappedRegion::open_or_create(&path, 4096).unwrap();
        region.put_u32(0, 42);
        region.zero_fill();
        assert_eq!(region.get_u32(0), 0);
    }

    #[test]
    fn transfer_to_copies_current_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("directory.dat");
        let backup = dir.path().join("backup.dat");
        let mut region = MappedRegion::open_or_create(&path, 4096).unwrap();
        region.put_u32(0, 7);
        region.transfer_to(&backup).unwrap();
        let contents = std::fs::read(&backup).unwrap();
        assert_eq!(&contents[0..4], &7u32.to_le_bytes());
    }
}
