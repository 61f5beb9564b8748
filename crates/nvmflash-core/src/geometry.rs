//! Flash geometry and address translation
//!
//! The flash array is addressed linearly from `base_address`. It is divided
//! into rows (the erase unit), each row into pages (the program unit), and
//! the controller maps it into memory as a sequence of machine words.
//!
//! ```text
//!   base_address
//!   |<------------------ row 0 ------------------>|<--- row 1 ...
//!   | page 0     | page 1     | page 2 | page 3   | page 0 ...
//!   |w0|w1|..|wN |
//! ```
//!
//! All functions here are pure arithmetic over addresses that the caller has
//! already validated with [`FlashGeometry::check_range`] (or that are known
//! to lie inside the array).

use crate::error::{Error, Result};

/// Largest row the engine supports (size of the row shadow buffer)
pub const MAX_ROW_SIZE: usize = 4096;

/// Value of a byte immediately after erase (all bits set)
pub const ERASED_BYTE: u8 = 0xFF;

/// Value of a word immediately after erase (all bits set)
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Physical layout of an NVM flash array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Page size in bytes (smallest programmable unit)
    pub page_size: u32,
    /// Pages per row (a row is the smallest erasable unit)
    pub pages_per_row: u32,
    /// Width of a flash word in bytes (at most 4)
    pub word_size: u32,
    /// Total flash size in bytes
    pub flash_size: u32,
    /// Address of the first byte of the array
    pub base_address: u32,
    /// Smallest accepted write length in bytes
    pub min_program_size: u32,
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self::SAMD21G18A
    }
}

impl FlashGeometry {
    /// ATSAMD21G18A main array: 4096 pages of 64 bytes, 4 pages per row
    pub const SAMD21G18A: FlashGeometry = FlashGeometry {
        page_size: 64,
        pages_per_row: 4,
        word_size: 4,
        flash_size: 256 * 1024,
        base_address: 0,
        min_program_size: 4,
    };

    /// Check that the geometry is self-consistent and supported
    ///
    /// The end address of the array must itself fit in 32 bits, so an
    /// array may not reach the very top of the address space.
    pub fn validate(&self) -> Result<()> {
        let sizes_valid = self.page_size != 0
            && self.pages_per_row != 0
            && self.word_size != 0
            && self.flash_size != 0
            && self.page_size.is_power_of_two()
            && self.word_size.is_power_of_two()
            && self.word_size <= 4
            && self.page_size % self.word_size == 0;
        if !sizes_valid {
            return Err(Error::InvalidGeometry);
        }

        let row_size = self
            .page_size
            .checked_mul(self.pages_per_row)
            .ok_or(Error::InvalidGeometry)?;
        if row_size as usize > MAX_ROW_SIZE
            || self.pages_per_row > u8::MAX as u32
            || self.page_size > u16::MAX as u32
            || self.flash_size % row_size != 0
            || self.base_address % row_size != 0
            || self.base_address.checked_add(self.flash_size).is_none()
        {
            return Err(Error::InvalidGeometry);
        }

        Ok(())
    }

    /// Row size in bytes
    pub fn row_size(&self) -> u32 {
        self.page_size * self.pages_per_row
    }

    /// Number of rows in the array
    pub fn row_count(&self) -> u32 {
        self.flash_size / self.row_size()
    }

    /// Words per page
    pub fn words_per_page(&self) -> u32 {
        self.page_size / self.word_size
    }

    /// One past the last valid address
    pub fn end_address(&self) -> u64 {
        self.base_address as u64 + self.flash_size as u64
    }

    /// Check if an address is inside the array
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base_address && (addr as u64) < self.end_address()
    }

    /// Validate a write request before any hardware access
    ///
    /// Rejects empty requests, requests shorter than the minimum program
    /// size, and requests longer than the whole array with
    /// `InvalidByteCount`; a destination outside the array or an end
    /// address past the array with `InvalidAddress`.
    pub fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        if len == 0 || len < self.min_program_size as usize || len > self.flash_size as usize {
            return Err(Error::InvalidByteCount);
        }
        if !self.contains(addr) {
            return Err(Error::InvalidAddress);
        }
        if addr as u64 + len as u64 > self.end_address() {
            return Err(Error::InvalidAddress);
        }
        Ok(())
    }

    /// Byte offset of `addr` from the start of the array
    pub fn offset_of(&self, addr: u32) -> u32 {
        addr - self.base_address
    }

    /// Resolve a linear address into (row, page, byte) coordinates
    pub fn to_coordinate(&self, addr: u32) -> Coordinate {
        let offset = self.offset_of(addr);
        let row_size = self.row_size();
        Coordinate {
            row: offset / row_size,
            page_in_row: ((offset % row_size) / self.page_size) as u8,
            byte_offset_in_page: (offset % self.page_size) as u16,
        }
    }

    /// Rebuild the linear address of a coordinate
    pub fn from_coordinate(&self, coord: Coordinate) -> u32 {
        self.base_address
            + coord.row * self.row_size()
            + coord.page_in_row as u32 * self.page_size
            + coord.byte_offset_in_page as u32
    }

    /// Index of the flash word containing `addr`
    pub fn to_word_index(&self, addr: u32) -> u32 {
        self.offset_of(addr) / self.word_size
    }

    /// Address of the first byte of the word with the given index
    pub fn word_address(&self, word_index: u32) -> u32 {
        self.base_address + word_index * self.word_size
    }

    /// Address of the first byte of the page containing `addr`
    pub fn page_base_address(&self, addr: u32) -> u32 {
        addr - self.offset_of(addr) % self.page_size
    }

    /// Address of the first byte of the row containing `addr`
    pub fn row_base_address(&self, addr: u32) -> u32 {
        addr - self.offset_of(addr) % self.row_size()
    }

    /// Address of the first byte of a row
    pub fn row_address(&self, row: u32) -> u32 {
        self.base_address + row * self.row_size()
    }

    /// Whether `addr` is the first byte of a row
    pub fn is_row_aligned(&self, addr: u32) -> bool {
        self.offset_of(addr) % self.row_size() == 0
    }
}

/// Position of a byte within the flash array
///
/// Derived from a linear address, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coordinate {
    /// Row number, counted from the start of the array
    pub row: u32,
    /// Page within the row
    pub page_in_row: u8,
    /// Byte offset within the page
    pub byte_offset_in_page: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> FlashGeometry {
        FlashGeometry {
            page_size: 64,
            pages_per_row: 4,
            word_size: 4,
            flash_size: 16 * 256,
            base_address: 0,
            min_program_size: 4,
        }
    }

    #[test]
    fn test_samd21_preset_is_valid() {
        let geo = FlashGeometry::SAMD21G18A;
        assert!(geo.validate().is_ok());
        assert_eq!(geo.row_size(), 256);
        assert_eq!(geo.row_count(), 1024);
        assert_eq!(geo.words_per_page(), 16);
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let mut geo = small();
        geo.page_size = 48;
        assert_eq!(geo.validate(), Err(Error::InvalidGeometry));

        let mut geo = small();
        geo.flash_size = 1000;
        assert_eq!(geo.validate(), Err(Error::InvalidGeometry));

        let mut geo = small();
        geo.base_address = 0x80;
        assert_eq!(geo.validate(), Err(Error::InvalidGeometry));

        let mut geo = small();
        geo.pages_per_row = 128;
        assert_eq!(geo.validate(), Err(Error::InvalidGeometry));
    }

    #[test]
    fn test_validate_top_of_address_space() {
        let mut geo = small();
        geo.flash_size = 1024;
        geo.base_address = 0xFFFF_FC00;
        assert_eq!(geo.validate(), Err(Error::InvalidGeometry));

        geo.base_address = 0xFFFF_F800;
        assert!(geo.validate().is_ok());
        assert_eq!(geo.end_address(), 0xFFFF_FC00);
    }

    #[test]
    fn test_to_coordinate() {
        let geo = small();
        let c = geo.to_coordinate(0x128);
        assert_eq!(c.row, 1);
        assert_eq!(c.page_in_row, 0);
        assert_eq!(c.byte_offset_in_page, 0x28);

        let c = geo.to_coordinate(0x2FF);
        assert_eq!(c.row, 2);
        assert_eq!(c.page_in_row, 3);
        assert_eq!(c.byte_offset_in_page, 63);
    }

    #[test]
    fn test_coordinate_round_trip() {
        let mut geo = small();
        geo.base_address = 0x2000;
        for addr in (geo.base_address..geo.base_address + geo.flash_size).step_by(7) {
            let c = geo.to_coordinate(addr);
            assert!((c.byte_offset_in_page as u32) < geo.page_size);
            assert!((c.page_in_row as u32) < geo.pages_per_row);
            assert_eq!(geo.from_coordinate(c), addr);
        }
    }

    #[test]
    fn test_word_and_page_addresses() {
        let mut geo = small();
        geo.base_address = 0x400;
        assert_eq!(geo.to_word_index(0x400), 0);
        assert_eq!(geo.to_word_index(0x407), 1);
        assert_eq!(geo.word_address(2), 0x408);
        assert_eq!(geo.page_base_address(0x47F), 0x440);
        assert_eq!(geo.row_base_address(0x5FF), 0x500);
        assert_eq!(geo.row_address(3), 0x700);
        assert!(geo.is_row_aligned(0x600));
        assert!(!geo.is_row_aligned(0x640));
    }

    #[test]
    fn test_check_range() {
        let geo = small();
        assert_eq!(geo.check_range(0, 0), Err(Error::InvalidByteCount));
        assert_eq!(geo.check_range(0, 3), Err(Error::InvalidByteCount));
        assert_eq!(geo.check_range(0, 4097), Err(Error::InvalidByteCount));
        assert_eq!(geo.check_range(4096, 4), Err(Error::InvalidAddress));
        assert_eq!(geo.check_range(4090, 8), Err(Error::InvalidAddress));
        assert!(geo.check_range(4092, 4).is_ok());
        assert!(geo.check_range(0, 4096).is_ok());

        let mut geo = small();
        geo.base_address = 0x1000;
        assert_eq!(geo.check_range(0x0FFC, 4), Err(Error::InvalidAddress));
    }
}
