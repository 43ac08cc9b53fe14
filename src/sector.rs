//! Allocates contiguous record space within a flat byte region without ever
//! letting a record straddle the trailing checksum slot of a sector.

/// Divides a fixed-capacity byte region into fixed-size sectors, each ending
/// in a `CHECKSUM_SIZE`-byte CRC32 slot, and hands out non-straddling byte
/// ranges within it.
#[derive(Clone, Copy, Debug)]
pub struct SectorFramer {
    sector_size: u64,
    data_length: u64,
    capacity: u64,
}

impl SectorFramer {
    pub fn new(sector_size: usize, checksum_size: usize, capacity: u64) -> Self {
        Self {
            sector_size: sector_size as u64,
            data_length: (sector_size - checksum_size) as u64,
            capacity,
        }
    }

    /// The byte offset of the start of the sector containing `pos`.
    pub fn sector_start(&self, pos: u64) -> u64 {
        (pos / self.sector_size) * self.sector_size
    }

    /// The byte offset of the 4-byte checksum slot for the sector containing `pos`.
    pub fn checksum_offset(&self, pos: u64) -> u64 {
        self.sector_start(pos) + self.data_length
    }

    /// Attempts to claim `length` contiguous bytes starting at or after
    /// `current_position`, without crossing into a checksum slot.
    ///
    /// Returns the position at which the claimed range begins, or `None` if
    /// there is no room left in the mapped region (`OUT_OF_SPACE`).
    pub fn claim(&self, current_position: u64, length: u64) -> Option<u64> {
        let sector_start = self.sector_start(current_position);
        let data_end = sector_start + self.data_length;

        if current_position + length <= data_end {
            return Some(current_position);
        }

        // Doesn't fit in the remainder of this sector; skip to the next one's data area.
        let next_sector_start = sector_start + self.sector_size;
        if next_sector_start + self.sector_size > self.capacity {
            return None;
        }

        let next_data_end = next_sector_start + self.data_length;
        if next_sector_start + length <= next_data_end {
            Some(next_sector_start)
        } else {
            // The record itself is larger than a whole sector's data region;
            // no placement could ever satisfy it.
            None
        }
    }
}
