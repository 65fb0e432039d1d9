//! Byte-addressed data memory backed by word storage.
//!
//! Storage is a vector of 32-bit words, but addresses are byte offsets.
//! Word accesses need not be aligned: an unaligned access spans two
//! adjacent stored words.
//!
//! Byte order is little-endian within a word: byte `k` of word `i` is
//! memory byte `4 * i + k` and lives in bits `8k..8k + 8`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per word.
pub const WORD_SIZE: usize = 4;

/// Default memory size in bytes.
pub const DEFAULT_CAPACITY: usize = 2048;

/// Word-backed, byte-addressed memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSpace {
    words: Vec<u32>,
}

impl AddressSpace {
    /// Create a zeroed memory of [`DEFAULT_CAPACITY`] bytes.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a zeroed memory of `capacity` bytes.
    ///
    /// # Panics
    /// Panics unless `capacity` is a multiple of [`WORD_SIZE`] holding at
    /// least two words.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity % WORD_SIZE == 0 && capacity >= 2 * WORD_SIZE,
            "memory capacity {} must be a multiple of {} and at least {} bytes",
            capacity,
            WORD_SIZE,
            2 * WORD_SIZE
        );
        Self {
            words: vec![0; capacity / WORD_SIZE],
        }
    }

    /// Total size in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.words.len() * WORD_SIZE
    }

    /// Raw word storage.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Read a word at any in-bounds byte address.
    ///
    /// # Panics
    /// Panics if `addr >= capacity - WORD_SIZE`.
    pub fn read_word(&self, addr: usize) -> u32 {
        self.try_read_word(addr).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Write a word at any in-bounds byte address.
    ///
    /// # Panics
    /// Panics if `addr >= capacity - WORD_SIZE`. Nothing is written.
    pub fn write_word(&mut self, addr: usize, value: u32) {
        self.try_write_word(addr, value)
            .unwrap_or_else(|e| panic!("{}", e))
    }

    /// Read a word, reporting a bounds violation instead of panicking.
    pub fn try_read_word(&self, addr: usize) -> Result<u32, MemoryError> {
        let (index, r_bytes) = self.locate(addr)?;
        if r_bytes == 0 {
            return Ok(self.words[index]);
        }

        // High `WORD_SIZE - r_bytes` bytes of the first word become the low
        // bytes of the result; low `r_bytes` bytes of the next word fill the top.
        let low_shift = 8 * r_bytes;
        let high_shift = 8 * (WORD_SIZE - r_bytes);
        let low = self.words[index] >> low_shift;
        let high = self.words[index + 1] << high_shift;
        Ok(low | high)
    }

    /// Write a word, reporting a bounds violation instead of panicking.
    ///
    /// On error memory is left untouched.
    pub fn try_write_word(&mut self, addr: usize, value: u32) -> Result<(), MemoryError> {
        let (index, r_bytes) = self.locate(addr)?;
        if r_bytes == 0 {
            self.words[index] = value;
            return Ok(());
        }

        let low_shift = 8 * r_bytes;
        let high_shift = 8 * (WORD_SIZE - r_bytes);

        // First word keeps its low `r_bytes` bytes.
        let keep_low = (1u32 << low_shift) - 1;
        self.words[index] = (self.words[index] & keep_low) | (value << low_shift);

        // Second word keeps everything above its low `r_bytes` bytes.
        let keep_high = !keep_low;
        self.words[index + 1] = (self.words[index + 1] & keep_high) | (value >> high_shift);
        Ok(())
    }

    /// Read a single byte, for dumps.
    ///
    /// # Panics
    /// Panics if `addr >= capacity`.
    pub fn read_byte(&self, addr: usize) -> u8 {
        assert!(
            addr < self.capacity(),
            "byte address {:#x} out of range (capacity {:#x})",
            addr,
            self.capacity()
        );
        (self.words[addr / WORD_SIZE] >> (8 * (addr % WORD_SIZE))) as u8
    }

    /// Store consecutive words starting at byte address `addr`.
    pub fn load_words(&mut self, addr: usize, values: &[u32]) -> Result<(), MemoryError> {
        let last = addr + values.len().saturating_sub(1) * WORD_SIZE;
        if !values.is_empty() {
            // Check the whole span first so a failed load writes nothing.
            self.locate(last)?;
        }
        for (i, &value) in values.iter().enumerate() {
            self.try_write_word(addr + i * WORD_SIZE, value)?;
        }
        Ok(())
    }

    /// Zero all of memory.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Validate `addr` and split it into word index and byte offset.
    fn locate(&self, addr: usize) -> Result<(usize, usize), MemoryError> {
        if addr >= self.capacity() - WORD_SIZE {
            return Err(MemoryError::OutOfRange {
                addr,
                capacity: self.capacity(),
            });
        }
        Ok((addr / WORD_SIZE, addr % WORD_SIZE))
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.words.iter().filter(|w| **w != 0).count();

        f.debug_struct("AddressSpace")
            .field("non_zero_words", &non_zero)
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The word at `addr` would not fit inside memory.
    #[error("memory access at {addr:#x} out of range (capacity {capacity:#x})")]
    OutOfRange { addr: usize, capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_aligned_read_write() {
        let mut mem = AddressSpace::new();
        mem.write_word(0, 9);
        mem.write_word(4, 5);
        assert_eq!(mem.read_word(0), 9);
        assert_eq!(mem.read_word(4), 5);
        assert_eq!(mem.words()[0], 9);
        assert_eq!(mem.words()[1], 5);
    }

    #[test]
    fn test_unaligned_write_partitions_bytes() {
        let mut mem = AddressSpace::new();
        mem.write_word(2, 0xAABB_CCDD);

        assert_eq!(mem.read_word(2), 0xAABB_CCDD);
        assert_eq!(mem.words()[0], 0xCCDD_0000);
        assert_eq!(mem.words()[1], 0x0000_AABB);
    }

    #[test]
    fn test_unaligned_read_concatenates_neighbours() {
        let mut mem = AddressSpace::new();
        mem.write_word(0, 0x4433_2211);
        mem.write_word(4, 0x8877_6655);

        assert_eq!(mem.read_word(1), 0x5544_3322);
        assert_eq!(mem.read_word(2), 0x6655_4433);
        assert_eq!(mem.read_word(3), 0x7766_5544);
    }

    #[test]
    fn test_unaligned_write_preserves_neighbours() {
        let mut mem = AddressSpace::new();
        mem.write_word(0, 0x4433_2211);
        mem.write_word(4, 0x8877_6655);

        mem.write_word(1, 0xDDCC_BBAA);

        assert_eq!(mem.words()[0], 0xCCBB_AA11);
        assert_eq!(mem.words()[1], 0x8877_66DD);
    }

    #[test]
    fn test_read_byte() {
        let mut mem = AddressSpace::new();
        mem.write_word(4, 0x0403_0201);
        assert_eq!(mem.read_byte(4), 0x01);
        assert_eq!(mem.read_byte(7), 0x04);
    }

    #[test]
    fn test_bounds() {
        let mut mem = AddressSpace::new();
        let last_ok = DEFAULT_CAPACITY - WORD_SIZE - 1;

        assert!(mem.try_read_word(last_ok).is_ok());
        assert!(mem.try_write_word(last_ok, 1).is_ok());
        assert_eq!(
            mem.try_read_word(DEFAULT_CAPACITY - WORD_SIZE),
            Err(MemoryError::OutOfRange {
                addr: DEFAULT_CAPACITY - WORD_SIZE,
                capacity: DEFAULT_CAPACITY,
            })
        );
        assert!(mem.try_read_word(DEFAULT_CAPACITY - WORD_SIZE + 1).is_err());
    }

    #[test]
    fn test_failed_write_changes_nothing() {
        let mut mem = AddressSpace::new();
        let before = mem.clone();
        assert!(mem.try_write_word(DEFAULT_CAPACITY - 1, 0xFFFF_FFFF).is_err());
        assert_eq!(mem, before);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_read_past_end_panics() {
        let mem = AddressSpace::new();
        mem.read_word(DEFAULT_CAPACITY - 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_write_past_end_panics() {
        let mut mem = AddressSpace::new();
        mem.write_word(DEFAULT_CAPACITY - WORD_SIZE + 1, 0);
    }

    #[test]
    fn test_load_words() {
        let mut mem = AddressSpace::with_capacity(64);
        mem.load_words(8, &[1, 2, 3]).unwrap();
        assert_eq!(mem.read_word(8), 1);
        assert_eq!(mem.read_word(12), 2);
        assert_eq!(mem.read_word(16), 3);

        let before = mem.clone();
        assert!(mem.load_words(52, &[7, 7, 7]).is_err());
        assert_eq!(mem, before);
    }

    #[test]
    #[should_panic(expected = "multiple of")]
    fn test_bad_capacity_panics() {
        AddressSpace::with_capacity(10);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(addr in 0usize..DEFAULT_CAPACITY - WORD_SIZE, value: u32) {
            let mut mem = AddressSpace::new();
            mem.write_word(addr, value);
            prop_assert_eq!(mem.read_word(addr), value);
        }

        #[test]
        fn prop_write_leaves_other_bytes(addr in 8usize..64, fill: u32, value: u32) {
            let mut mem = AddressSpace::with_capacity(128);
            for i in 0..31 {
                mem.write_word(i * WORD_SIZE, fill);
            }
            let before: Vec<u8> = (0..mem.capacity()).map(|a| mem.read_byte(a)).collect();

            mem.write_word(addr, value);

            for a in 0..mem.capacity() {
                if a < addr || a >= addr + WORD_SIZE {
                    prop_assert_eq!(mem.read_byte(a), before[a]);
                } else {
                    let expected = (value >> (8 * (a - addr))) as u8;
                    prop_assert_eq!(mem.read_byte(a), expected);
                }
            }
        }
    }
}
