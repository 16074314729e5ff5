//! Seek index mapping decoded sample positions to compressed byte offsets.
//!
//! Built once by walking every frame of a seekable stream. Each entry
//! records where a frame starts and how many samples per channel precede
//! it, which is enough to map a PCM byte position back to the frame that
//! produces it.

use log::debug;

use crate::process::scan::{FrameScanner, ScanMode};
use crate::structs::header::FrameHeader;
use crate::utils::errors::StreamError;
use crate::utils::source::{ByteSource, SourceCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndexEntry {
    /// Absolute offset of the frame header.
    pub offset: u64,
    /// Samples per channel decoded before this frame.
    pub sample_index: u64,
    pub frame_len: u32,
}

/// Ordered frame table with a playback cursor.
///
/// Offsets and sample indices strictly increase from entry to entry. The
/// playback cursor names the next frame to be decoded and equals
/// [`FrameIndex::len`] only at end of stream.
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    entries: Vec<FrameIndexEntry>,
    total_samples: u64,
    total_bytes: u64,
    playback_cursor: usize,
}

impl FrameIndex {
    /// Indexes every complete frame from the cursor position to the end of
    /// the source. Leaves the cursor at the end.
    pub fn build<S: ByteSource>(
        cursor: &mut SourceCursor<S>,
        scanner: &mut FrameScanner,
    ) -> Result<Self, StreamError> {
        let mut index = Self::default();

        while let Some(located) = scanner.locate(cursor, ScanMode::Frame)? {
            index.push(located.offset, &located.header);
        }

        debug!(
            "Indexed {} frames: {} samples, {} bytes",
            index.len(),
            index.total_samples,
            index.total_bytes
        );

        Ok(index)
    }

    /// Appends a frame located after every frame already indexed.
    pub fn push(&mut self, offset: u64, header: &FrameHeader) {
        debug_assert!(self.entries.last().is_none_or(|last| last.offset < offset));

        self.entries.push(FrameIndexEntry {
            offset,
            sample_index: self.total_samples,
            frame_len: header.frame_len,
        });
        self.total_samples += header.samples_per_frame as u64;
        self.total_bytes += header.frame_len as u64;
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FrameIndexEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&FrameIndexEntry> {
        self.entries.get(index)
    }

    /// Samples per channel over all indexed frames.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Compressed bytes over all indexed frames.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Offset one past the last indexed frame.
    pub fn end_offset(&self) -> Option<u64> {
        self.entries
            .last()
            .map(|last| last.offset + last.frame_len as u64)
    }

    pub fn playback_cursor(&self) -> usize {
        self.playback_cursor
    }

    pub fn set_playback_cursor(&mut self, cursor: usize) {
        self.playback_cursor = cursor.min(self.entries.len());
    }

    /// Moves the playback cursor past the frame that starts at `offset`.
    pub fn advance_past(&mut self, offset: u64) {
        self.playback_cursor = self.entries.partition_point(|entry| entry.offset <= offset);
    }

    /// Maps a PCM byte position to the frame containing it.
    ///
    /// The target is clamped to `[0, total_samples * block_align]`. Returns
    /// the frame offset and its entry index, and moves the playback cursor
    /// there. A target at or past the end yields the end offset and
    /// [`FrameIndex::len`]. `None` only for an empty index.
    pub fn translate(&mut self, target: u64, block_align: u64) -> Option<(u64, usize)> {
        let end = self.end_offset()?;
        let total = self.total_samples * block_align;

        if target >= total {
            self.playback_cursor = self.entries.len();
            return Some((end, self.entries.len()));
        }

        let index = self
            .entries
            .partition_point(|entry| entry.sample_index * block_align <= target)
            .saturating_sub(1);

        self.playback_cursor = index;
        Some((self.entries[index].offset, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{vbr_stream, vbr_stream_len};
    use std::io::Cursor;

    fn vbr_index(frames: usize) -> Result<FrameIndex, StreamError> {
        let mut cursor = SourceCursor::new(Cursor::new(vbr_stream(frames)))?;
        FrameIndex::build(&mut cursor, &mut FrameScanner::default())
    }

    #[test]
    fn build_is_monotonic() -> Result<(), StreamError> {
        let index = vbr_index(12)?;

        assert_eq!(index.len(), 12);
        assert_eq!(index.total_samples(), 12 * 1152);
        assert_eq!(index.total_bytes(), vbr_stream_len(12) as u64);
        assert_eq!(index.end_offset(), Some(vbr_stream_len(12) as u64));

        for pair in index.entries().windows(2) {
            assert!(pair[0].offset < pair[1].offset);
            assert!(pair[0].sample_index < pair[1].sample_index);
            assert_eq!(pair[0].offset + pair[0].frame_len as u64, pair[1].offset);
        }
        Ok(())
    }

    #[test]
    fn translate_never_overshoots() -> Result<(), StreamError> {
        let mut index = vbr_index(9)?;
        let block_align = 4;
        let frame_bytes = block_align * 1152;

        for target in (0..index.total_samples() * block_align).step_by(997) {
            let (offset, i) = index.translate(target, block_align).ok_or(StreamError::NoSyncFound)?;
            let entry = index.entries()[i];
            let landed = entry.sample_index * block_align;

            assert_eq!(entry.offset, offset);
            assert_eq!(index.playback_cursor(), i);
            assert!(landed <= target);
            assert!(target - landed < frame_bytes);
        }
        Ok(())
    }

    #[test]
    fn translate_clamps_to_end() -> Result<(), StreamError> {
        let mut index = vbr_index(3)?;
        let total = index.total_samples() * 4;

        assert_eq!(
            index.translate(total, 4),
            Some((vbr_stream_len(3) as u64, 3))
        );
        assert_eq!(index.playback_cursor(), index.len());
        assert_eq!(
            index.translate(u64::MAX / 8, 4),
            Some((vbr_stream_len(3) as u64, 3))
        );

        assert_eq!(index.translate(0, 4), Some((0, 0)));
        assert_eq!(FrameIndex::default().translate(0, 4), None);
        Ok(())
    }

    #[test]
    fn playback_cursor_follows_offsets() -> Result<(), StreamError> {
        let mut index = vbr_index(4)?;
        let second = index.entries()[1].offset;

        index.advance_past(0);
        assert_eq!(index.playback_cursor(), 1);
        index.advance_past(second);
        assert_eq!(index.playback_cursor(), 2);

        index.set_playback_cursor(100);
        assert_eq!(index.playback_cursor(), 4);
        Ok(())
    }
}
