use log::debug;

use crate::log_or_err;
use crate::process::scan::{FrameScanner, ScanMode};
use crate::structs::header::{FrameHeader, HEADER_LEN, Layer, MAX_FRAME_LEN};
use crate::structs::index::FrameIndex;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::crc::MPEG_FRAME_CRC;
use crate::utils::errors::StreamError;
use crate::utils::source::{ByteSource, SourceCursor};

/// A complete frame borrowed from the reader, header bytes included.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub header: FrameHeader,
    /// Absolute offset of the frame header.
    pub offset: u64,
    pub data: &'a [u8],
}

impl AsRef<[u8]> for Frame<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

/// Pull-based frame reader over a byte source.
///
/// Each call to [`StreamingFrameReader::next_frame`] consumes exactly one
/// frame (plus any junk in front of it) and lends out its bytes until the
/// next call. Damaged regions are resynchronized by the scanner instead of
/// failing the stream.
///
/// When a [`FrameIndex`] is attached, its playback cursor is kept pointing
/// at the frame after the one most recently delivered.
///
/// # Example
///
/// ```rust,no_run
/// use mpa::process::reader::StreamingFrameReader;
///
/// let file = std::fs::File::open("stream.mp3")?;
/// let mut reader = StreamingFrameReader::new(file)?;
///
/// while let Some(frame) = reader.next_frame()? {
///     println!(
///         "{} {} kbps frame at {}",
///         frame.header.layer,
///         frame.header.bit_rate / 1000,
///         frame.offset
///     );
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct StreamingFrameReader<S: ByteSource> {
    cursor: SourceCursor<S>,
    scanner: FrameScanner,
    index: Option<FrameIndex>,
    buffer: Vec<u8>,
    last: Option<(FrameHeader, u64)>,
    replay: bool,
    verify_crc: bool,
    frames_read: u64,
    eof: bool,
}

impl<S: ByteSource> StreamingFrameReader<S> {
    pub fn new(source: S) -> Result<Self, StreamError> {
        Ok(Self::with_scanner(
            SourceCursor::new(source)?,
            FrameScanner::default(),
        ))
    }

    pub fn with_scanner(cursor: SourceCursor<S>, scanner: FrameScanner) -> Self {
        Self {
            cursor,
            scanner,
            index: None,
            buffer: Vec::with_capacity(MAX_FRAME_LEN as usize),
            last: None,
            replay: false,
            verify_crc: false,
            frames_read: 0,
            eof: false,
        }
    }

    /// Check the CRC-16 of protected Layer III frames.
    pub fn set_verify_crc(&mut self, verify: bool) {
        self.verify_crc = verify;
    }

    pub fn scanner(&self) -> &FrameScanner {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut FrameScanner {
        &mut self.scanner
    }

    pub fn set_index(&mut self, index: FrameIndex) {
        self.index = Some(index);
    }

    pub fn index(&self) -> Option<&FrameIndex> {
        self.index.as_ref()
    }

    pub fn cursor(&self) -> &SourceCursor<S> {
        &self.cursor
    }

    pub(crate) fn cursor_mut(&mut self) -> &mut SourceCursor<S> {
        &mut self.cursor
    }

    /// Frames delivered so far, replays included.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Whether the last read ran into the end of the source.
    pub fn is_eof(&self) -> bool {
        self.eof && !self.replay
    }

    /// Reads the next frame. `Ok(None)` marks the end of the stream; a
    /// trailing frame cut short by the end of the source is dropped.
    pub fn next_frame(&mut self) -> Result<Option<Frame<'_>>, StreamError> {
        if self.replay {
            self.replay = false;
            if let Some((header, offset)) = self.last {
                return Ok(Some(self.deliver(header, offset)));
            }
        }

        let Some(located) = self.scanner.locate(&mut self.cursor, ScanMode::Header)? else {
            self.finish();
            return Ok(None);
        };

        let header = located.header;
        let len = header.frame_len as usize;

        self.buffer.clear();
        self.buffer.extend_from_slice(&located.bytes);
        self.buffer.resize(len, 0);

        let read = self.cursor.read_exact_or_eof(&mut self.buffer[HEADER_LEN..])?;
        if read < len - HEADER_LEN {
            debug!(
                "Final frame at {} truncated: {} of {} bytes present",
                located.offset,
                read + HEADER_LEN,
                len
            );
            self.finish();
            return Ok(None);
        }

        if self.verify_crc {
            self.check_crc(&header, located.offset)?;
        }

        Ok(Some(self.deliver(header, located.offset)))
    }

    /// Arranges for the most recently delivered frame to be delivered again
    /// by the next [`StreamingFrameReader::next_frame`]. Works on sources
    /// that cannot seek. Returns `false` when there is no frame to replay.
    pub fn rewind(&mut self) -> bool {
        if self.last.is_none() || self.replay {
            return false;
        }

        self.replay = true;
        if let Some(index) = &mut self.index {
            let cursor = index.playback_cursor();
            index.set_playback_cursor(cursor.saturating_sub(1));
        }
        true
    }

    /// Header of the frame the next read will deliver, without consuming it.
    pub fn peek_header(&mut self) -> Result<Option<FrameHeader>, StreamError> {
        if self.replay {
            return Ok(self.last.map(|(header, _)| header));
        }

        Ok(self
            .scanner
            .locate(&mut self.cursor, ScanMode::Peek)?
            .map(|located| located.header))
    }

    /// Repositions to the frame containing the PCM byte `target` and
    /// returns the PCM byte position that frame starts at.
    pub fn seek_to_pcm_byte(&mut self, target: u64, block_align: u64) -> Result<u64, StreamError> {
        let Some(index) = &mut self.index else {
            return Err(StreamError::Unseekable("seek without a frame index"));
        };

        let Some((offset, entry)) = index.translate(target, block_align) else {
            return Err(StreamError::Unseekable("seek on an empty frame index"));
        };

        let landed = match index.get(entry) {
            Some(entry) => entry.sample_index * block_align,
            None => index.total_samples() * block_align,
        };

        self.cursor.seek_to(offset)?;
        self.last = None;
        self.replay = false;
        self.eof = false;

        Ok(landed)
    }

    fn deliver(&mut self, header: FrameHeader, offset: u64) -> Frame<'_> {
        self.last = Some((header, offset));
        self.frames_read += 1;

        if let Some(index) = &mut self.index {
            index.advance_past(offset);
        }

        Frame {
            header,
            offset,
            data: &self.buffer,
        }
    }

    fn finish(&mut self) {
        self.eof = true;
        self.last = None;

        if let Some(index) = &mut self.index {
            let len = index.len();
            index.set_playback_cursor(len);
        }
    }

    fn check_crc(&self, header: &FrameHeader, offset: u64) -> Result<(), StreamError> {
        if header.protection_absent || header.layer != Layer::Layer3 {
            return Ok(());
        }

        let side_info_bits = (header.side_info_len() as u64) << 3;
        let frame = &self.buffer[..];
        let expected = u16::from_be_bytes([frame[4], frame[5]]);

        // Header bytes 2..4, then the side information after the checksum.
        let mut reader = BsIoSliceReader::from_slice(frame);
        let crc = reader.crc16_update(&MPEG_FRAME_CRC, MPEG_FRAME_CRC.init, 16, 16)?;
        let computed = reader.crc16_update(&MPEG_FRAME_CRC, crc, 48, side_info_bits)?;

        if computed != expected {
            log_or_err!(
                self.scanner,
                log::Level::Warn,
                StreamError::CrcMismatch {
                    offset,
                    expected,
                    computed,
                }
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{CBR_HEADER, cbr_stream, frame, vbr_stream, vbr_stream_len};
    use crate::utils::source::ReadOnlySource;
    use std::io::Cursor;

    #[test]
    fn delivers_whole_frames() -> Result<(), StreamError> {
        let data = vbr_stream(6);
        let mut reader = StreamingFrameReader::new(Cursor::new(data.clone()))?;

        let mut offset = 0usize;
        while let Some(frame) = reader.next_frame()? {
            let len = frame.header.frame_len as usize;
            assert_eq!(frame.offset, offset as u64);
            assert_eq!(frame.data, &data[offset..offset + len]);
            offset += len;
            assert_eq!(reader.cursor().position(), offset as u64);
        }

        assert_eq!(offset, vbr_stream_len(6));
        assert_eq!(reader.frames_read(), 6);
        assert!(reader.is_eof());
        Ok(())
    }

    #[test]
    fn resyncs_after_garbage_between_frames() -> Result<(), StreamError> {
        let mut data = cbr_stream(2);
        data.extend_from_slice(&[0x55; 37]);
        data.extend(cbr_stream(2));
        let mut reader = StreamingFrameReader::new(Cursor::new(data))?;

        let mut offsets = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            offsets.push(frame.offset);
        }
        assert_eq!(offsets, [0, 417, 834 + 37, 1251 + 37]);
        Ok(())
    }

    #[test]
    fn garbage_inside_a_frame_costs_that_frame_only() -> Result<(), StreamError> {
        let mut data = frame(CBR_HEADER, 0);
        data.extend_from_slice(&[0x20; 10]);
        data.extend(frame(CBR_HEADER, 1));
        data.extend(frame(CBR_HEADER, 2));
        // Move the garbage into the middle of the first frame.
        data[200..427].rotate_right(10);

        let mut reader = StreamingFrameReader::new(Cursor::new(data.clone()))?;
        let first = reader.next_frame()?.map(|f| f.data.to_vec());
        assert_ne!(first.as_deref(), Some(&frame(CBR_HEADER, 0)[..]));

        let second = reader.next_frame()?.map(|f| (f.offset, f.data.to_vec()));
        assert_eq!(second, Some((427, frame(CBR_HEADER, 1))));
        assert!(reader.next_frame()?.is_some());
        assert!(reader.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn rewind_replays_without_seeking() -> Result<(), StreamError> {
        let data = cbr_stream(3);
        let mut reader = StreamingFrameReader::new(ReadOnlySource::new(&data[..]))?;

        let first = reader.next_frame()?.map(|f| f.data.to_vec());
        assert!(reader.rewind());
        assert!(!reader.rewind());
        assert_eq!(reader.peek_header()?.map(|h| h.frame_len), Some(417));

        let again = reader.next_frame()?.map(|f| f.data.to_vec());
        assert_eq!(first, again);
        assert_eq!(reader.next_frame()?.map(|f| f.offset), Some(417));
        assert_eq!(reader.frames_read(), 3);
        Ok(())
    }

    #[test]
    fn peek_and_seek_need_support() -> Result<(), StreamError> {
        let data = cbr_stream(2);
        let mut reader = StreamingFrameReader::new(ReadOnlySource::new(&data[..]))?;

        assert!(matches!(
            reader.peek_header(),
            Err(StreamError::Unseekable(_))
        ));
        assert!(matches!(
            reader.seek_to_pcm_byte(0, 4),
            Err(StreamError::Unseekable(_))
        ));
        Ok(())
    }

    #[test]
    fn seek_follows_index() -> Result<(), StreamError> {
        let data = vbr_stream(6);
        let mut reader = StreamingFrameReader::new(Cursor::new(data))?;
        let index = FrameIndex::build(reader.cursor_mut(), &mut FrameScanner::default())?;
        reader.cursor_mut().seek_to(0)?;
        reader.set_index(index);

        let landed = reader.seek_to_pcm_byte(3 * 4608 + 100, 4)?;
        assert_eq!(landed, 3 * 4608);
        assert_eq!(reader.index().map(|i| i.playback_cursor()), Some(3));

        let offset = reader.next_frame()?.map(|f| f.offset);
        assert_eq!(offset, Some(vbr_stream_len(3) as u64));
        assert_eq!(reader.index().map(|i| i.playback_cursor()), Some(4));

        assert_eq!(reader.seek_to_pcm_byte(u64::MAX / 8, 4)?, 6 * 4608);
        assert!(reader.next_frame()?.is_none());
        Ok(())
    }

    fn protected_frame() -> Vec<u8> {
        let mut data = frame([0xFF, 0xFA, 0x90, 0x64], 5);
        let crc = MPEG_FRAME_CRC.update(MPEG_FRAME_CRC.checksum(&data[2..4]), &data[6..38]);
        data[4..6].copy_from_slice(&crc.to_be_bytes());
        data
    }

    #[test]
    fn crc_checks_protected_frames() -> Result<(), StreamError> {
        let mut data = protected_frame();
        let mut reader = StreamingFrameReader::new(Cursor::new(data.clone()))?;
        reader.set_verify_crc(true);
        reader.scanner_mut().set_fail_level(log::Level::Warn);
        assert!(reader.next_frame()?.is_some());

        data[10] ^= 0x01;

        // Delivered with a warning by default.
        let mut reader = StreamingFrameReader::new(Cursor::new(data.clone()))?;
        reader.set_verify_crc(true);
        assert!(reader.next_frame()?.is_some());

        let mut reader = StreamingFrameReader::new(Cursor::new(data))?;
        reader.set_verify_crc(true);
        reader.scanner_mut().set_fail_level(log::Level::Warn);
        assert!(matches!(
            reader.next_frame(),
            Err(StreamError::CrcMismatch { offset: 0, .. })
        ));
        Ok(())
    }
}
