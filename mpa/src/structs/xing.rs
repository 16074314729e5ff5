//! Xing VBR tag.
//!
//! Encoders producing variable bit rate streams commonly place a tag in the
//! payload of the first frame, right after the Layer III side information.
//! The tag frame carries no audio and is skipped during playback.
//!
//! ```text
//! "Xing" | flags (u32 BE) | [frames u32] | [bytes u32] | [toc 100 B] | [quality u32]
//! ```
//!
//! Optional fields appear only when their flag is set and always in this
//! order, so the position of each depends on the ones before it.

use std::io;

use bitflags::bitflags;
use log::debug;

use crate::structs::header::{FrameHeader, HEADER_LEN};
use crate::utils::bitstream_io::BsIoSliceReader;

pub const XING_ID: &[u8; 4] = b"Xing";

/// Entries in the seek table of contents.
pub const TOC_LEN: usize = 100;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct XingFlags: u32 {
        const FRAMES  = 1 << 0;
        const BYTES   = 1 << 1;
        const TOC     = 1 << 2;
        const QUALITY = 1 << 3;
    }
}

/// Parsed Xing tag.
///
/// # Example
///
/// ```rust,no_run
/// use mpa::structs::header::FrameHeader;
/// use mpa::structs::xing::XingHeader;
///
/// # let frame: Vec<u8> = std::fs::read("first_frame.bin")?;
/// let header = FrameHeader::parse([frame[0], frame[1], frame[2], frame[3]])?;
///
/// if let Some(xing) = XingHeader::from_frame(&header, &frame) {
///     println!("{:?} frames", xing.frames);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XingHeader {
    pub flags: XingFlags,
    pub frames: Option<u32>,
    pub bytes: Option<u32>,
    pub toc: Option<[u8; TOC_LEN]>,
    pub quality: Option<u32>,
    /// Offset of the tag id within the frame.
    pub start: usize,
    /// Offset one past the last tag byte within the frame.
    pub end: usize,
}

impl XingHeader {
    /// Looks for a tag in `frame`, which holds the whole frame starting with
    /// its header.
    ///
    /// Returns `None` when the tag id is absent or the tag is cut short by
    /// the end of the frame.
    pub fn from_frame(header: &FrameHeader, frame: &[u8]) -> Option<Self> {
        let start = Self::offset(header);
        let tag = frame.get(start..)?;

        if tag.get(..XING_ID.len())? != XING_ID {
            return None;
        }

        match Self::read(tag) {
            Ok((mut xing, len)) => {
                xing.start = start;
                xing.end = start + len;
                Some(xing)
            }
            Err(e) => {
                debug!("Ignoring truncated Xing tag: {e}");
                None
            }
        }
    }

    /// Offset of the tag within its frame: header plus Layer III side
    /// information.
    #[inline(always)]
    pub fn offset(header: &FrameHeader) -> usize {
        HEADER_LEN + header.side_info_len()
    }

    fn read(tag: &[u8]) -> io::Result<(Self, usize)> {
        let mut reader = BsIoSliceReader::from_slice(tag);

        reader.skip_n(32)?;
        let flags = XingFlags::from_bits_retain(reader.get_n(32)?);

        let frames = if flags.contains(XingFlags::FRAMES) {
            Some(reader.get_n::<u32>(32)?)
        } else {
            None
        };

        let bytes = if flags.contains(XingFlags::BYTES) {
            Some(reader.get_n::<u32>(32)?)
        } else {
            None
        };

        let toc = if flags.contains(XingFlags::TOC) {
            let mut toc = [0u8; TOC_LEN];
            reader.get_bytes(&mut toc)?;
            Some(toc)
        } else {
            None
        };

        let quality = if flags.contains(XingFlags::QUALITY) {
            Some(reader.get_n::<u32>(32)?)
        } else {
            None
        };

        let len = (reader.position()? >> 3) as usize;

        Ok((
            Self {
                flags,
                frames,
                bytes,
                toc,
                quality,
                start: 0,
                end: 0,
            },
            len,
        ))
    }

    /// Total samples per channel announced by the tag, excluding the tag
    /// frame itself.
    pub fn total_samples(&self, samples_per_frame: u16) -> Option<u64> {
        self.frames
            .map(|frames| frames as u64 * samples_per_frame as u64)
    }

    /// Approximate byte offset for a playback percentage, read straight from
    /// the table of contents without interpolation.
    pub fn toc_offset(&self, percent: f64) -> Option<u64> {
        let toc = self.toc.as_ref()?;
        let bytes = self.bytes? as u64;

        let index = (percent.clamp(0.0, 99.0)) as usize;
        Some(toc[index] as u64 * bytes / 256)
    }
}
