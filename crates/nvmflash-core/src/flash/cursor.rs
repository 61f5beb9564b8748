//! Write splitting across page boundaries
//!
//! A write request of arbitrary length and offset is cut into chunks that
//! each stay inside one page. [`WriteCursor`] carries the continuation state
//! between chunks:
//!
//! ```text
//!            start()             next_chunk() [remaining > 0]
//!   Idle ──────────────► Writing ◄──────────────┐
//!    ▲                      │                    │
//!    └──────────────────────┴────────────────────┘
//!         next_chunk() [remaining == 0] resets to the zero state
//! ```

use core::ops::Range;

use crate::geometry::FlashGeometry;

/// Cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    /// No write in progress
    #[default]
    Idle,
    /// A write has chunks left to issue
    Writing,
}

/// One page-local slice of a write request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChunk {
    /// Destination address of the first byte
    pub address: u32,
    /// Offset of the first byte within the source buffer
    pub source_offset: usize,
    /// Number of bytes, never past the end of the page
    pub len: u32,
    /// Offset of `address` within its page
    pub offset_in_page: u32,
}

impl PageChunk {
    /// Range of the source buffer covered by this chunk
    pub fn source_range(&self) -> Range<usize> {
        self.source_offset..self.source_offset + self.len as usize
    }
}

/// Continuation state of a multi-page write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteCursor {
    state: CursorState,
    destination: u32,
    source_offset: usize,
    offset_in_page: u32,
    bytes_in_current_page: u32,
    remaining: u32,
}

impl WriteCursor {
    /// Create an idle cursor
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a write of `len` bytes at `destination`
    pub fn start(&mut self, destination: u32, len: u32) {
        *self = Self {
            state: if len > 0 {
                CursorState::Writing
            } else {
                CursorState::Idle
            },
            destination,
            remaining: len,
            ..Self::default()
        };
    }

    /// Size the next page-local transfer
    ///
    /// Resolves the offset of `destination` within its page, sets the
    /// transfer size to `min(remaining, page_size - offset_in_page)` and
    /// returns what is left after it.
    pub fn begin_or_continue(
        &mut self,
        geometry: &FlashGeometry,
        destination: u32,
        remaining: u32,
    ) -> u32 {
        let coord = geometry.to_coordinate(destination);
        self.destination = destination;
        self.offset_in_page = coord.byte_offset_in_page as u32;

        let free_in_page = geometry.page_size - self.offset_in_page;
        self.bytes_in_current_page = remaining.min(free_in_page);
        remaining - self.bytes_in_current_page
    }

    /// Produce the next chunk, or return to `Idle` when done
    pub fn next_chunk(&mut self, geometry: &FlashGeometry) -> Option<PageChunk> {
        if self.state == CursorState::Idle || self.remaining == 0 {
            self.reset();
            return None;
        }

        let remaining = self.begin_or_continue(geometry, self.destination, self.remaining);
        let chunk = PageChunk {
            address: self.destination,
            source_offset: self.source_offset,
            len: self.bytes_in_current_page,
            offset_in_page: self.offset_in_page,
        };

        self.remaining = remaining;
        self.source_offset += chunk.len as usize;
        if remaining > 0 {
            self.destination += chunk.len;
        }

        Some(chunk)
    }

    /// Return to the zero `Idle` state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Bytes not yet handed out as chunks
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Size of the chunk most recently handed out
    pub fn bytes_in_current_page(&self) -> u32 {
        self.bytes_in_current_page
    }
}

/// Iterator over the page chunks of a write request
pub struct PageChunks<'a> {
    geometry: &'a FlashGeometry,
    cursor: WriteCursor,
}

impl<'a> PageChunks<'a> {
    /// Split `len` bytes at `destination`
    pub fn new(geometry: &'a FlashGeometry, destination: u32, len: u32) -> Self {
        let mut cursor = WriteCursor::new();
        cursor.start(destination, len);
        Self { geometry, cursor }
    }
}

impl Iterator for PageChunks<'_> {
    type Item = PageChunk;

    fn next(&mut self) -> Option<PageChunk> {
        self.cursor.next_chunk(self.geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> FlashGeometry {
        FlashGeometry {
            page_size: 64,
            pages_per_row: 4,
            word_size: 4,
            flash_size: 64 * 1024,
            base_address: 0,
            min_program_size: 4,
        }
    }

    #[test]
    fn test_split_tail_and_partial_page() {
        let geo = geo();
        let mut cursor = WriteCursor::new();
        cursor.start(40, 100);
        assert_eq!(cursor.state(), CursorState::Writing);

        let first = cursor.next_chunk(&geo).unwrap();
        assert_eq!(first.address, 40);
        assert_eq!(first.len, 24);
        assert_eq!(first.offset_in_page, 40);
        assert_eq!(first.source_range(), 0..24);

        let second = cursor.next_chunk(&geo).unwrap();
        assert_eq!(second.address, 64);
        assert_eq!(second.len, 64);
        assert_eq!(second.offset_in_page, 0);

        let third = cursor.next_chunk(&geo).unwrap();
        assert_eq!(third.address, 128);
        assert_eq!(third.len, 12);
        assert_eq!(third.source_range(), 88..100);

        assert_eq!(cursor.next_chunk(&geo), None);
        assert_eq!(cursor.state(), CursorState::Idle);
        assert_eq!(cursor, WriteCursor::default());
    }

    #[test]
    fn test_begin_or_continue() {
        let geo = geo();
        let mut cursor = WriteCursor::new();
        assert_eq!(cursor.begin_or_continue(&geo, 40, 100), 76);
        assert_eq!(cursor.bytes_in_current_page(), 24);
        assert_eq!(cursor.begin_or_continue(&geo, 64, 76), 12);
        assert_eq!(cursor.bytes_in_current_page(), 64);
        assert_eq!(cursor.begin_or_continue(&geo, 128, 12), 0);
        assert_eq!(cursor.bytes_in_current_page(), 12);
    }

    #[test]
    fn test_single_chunk_inside_page() {
        let geo = geo();
        let chunks: heapless::Vec<PageChunk, 4> = PageChunks::new(&geo, 0x104, 8).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].address, 0x104);
        assert_eq!(chunks[0].len, 8);
    }

    #[test]
    fn test_chunks_cover_request_and_respect_pages() {
        let geo = geo();
        for &(dest, len) in &[(0u32, 4u32), (60, 8), (63, 130), (256, 256), (1000, 3000)] {
            let mut total = 0u32;
            let mut next_addr = dest;
            let mut next_src = 0usize;
            for chunk in PageChunks::new(&geo, dest, len) {
                assert_eq!(chunk.address, next_addr);
                assert_eq!(chunk.source_offset, next_src);
                assert!(chunk.len > 0);
                assert!(chunk.len <= geo.page_size - chunk.address % geo.page_size);
                total += chunk.len;
                next_addr += chunk.len;
                next_src += chunk.len as usize;
            }
            assert_eq!(total, len);
        }
    }

    #[test]
    fn test_empty_request_stays_idle() {
        let geo = geo();
        let mut cursor = WriteCursor::new();
        cursor.start(0, 0);
        assert_eq!(cursor.state(), CursorState::Idle);
        assert_eq!(cursor.next_chunk(&geo), None);
    }
}
