//! Decoding sessions over a whole stream.
//!
//! [`probe`] locates the first frame, inspects it for a Xing tag and
//! optionally indexes the stream; [`Session`] adds a [`Decoder`] on top and
//! exposes the stream as seekable PCM bytes.

use std::io;

use log::{debug, info};

use crate::process::decode::{DecodeBufferManager, DecodeCarry, Decoder};
use crate::process::reader::StreamingFrameReader;
use crate::process::scan::FrameScanner;
use crate::structs::header::{FrameHeader, Layer};
use crate::structs::index::FrameIndex;
use crate::structs::xing::XingHeader;
use crate::utils::errors::StreamError;
use crate::utils::source::{ByteSource, SourceCursor};

/// Options controlling how a stream is opened.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Index every frame up front. Enables seeking and total length, and
    /// requires a seekable source.
    pub prescan: bool,
    /// Accept only frames of this layer.
    pub layer: Option<Layer>,
    /// Fail a sync search after skipping this many bytes.
    pub max_resync_bytes: Option<u64>,
    /// Check the CRC-16 of protected Layer III frames.
    pub verify_crc: bool,
    /// Recoverable conditions at or above this level become errors.
    /// `Warn` gives strict behavior.
    pub fail_level: log::Level,
    /// Bits per decoded sample.
    pub bits_per_sample: u16,
    /// Bytes at the end of the source that are not audio, such as an
    /// ID3v1 tag. Only affects the average bit rate.
    pub trailing_bytes: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            prescan: true,
            layer: None,
            max_resync_bytes: None,
            verify_crc: false,
            fail_level: log::Level::Error,
            bits_per_sample: 16,
            trailing_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Bytes per sample across all channels.
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// What [`probe`] learned about a stream.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Header of the first valid frame.
    pub first_header: FrameHeader,
    /// Offset of the first valid frame.
    pub first_offset: u64,
    pub xing: Option<XingHeader>,
    /// Offset of the first audio frame; past the tag frame when a Xing tag
    /// is present.
    pub data_start: u64,
    /// Audio bytes from `data_start` to the end of the source, when the
    /// source length is known.
    pub data_len: Option<u64>,
    pub pcm: PcmFormat,
}

/// Opens a stream for frame reading.
///
/// The returned reader is positioned so that its next frame is the first
/// audio frame. With `config.prescan` set, the reader also carries a
/// [`FrameIndex`] covering the audio frames.
///
/// # Errors
///
/// [`StreamError::NoSyncFound`] when the source holds no valid frame, and
/// [`StreamError::Unseekable`] when a prescan is requested on a source that
/// cannot seek or does not know its length.
pub fn probe<S: ByteSource>(
    source: S,
    config: &StreamConfig,
) -> Result<(StreamingFrameReader<S>, StreamInfo), StreamError> {
    let cursor = SourceCursor::new(source)?;

    if config.prescan && (!cursor.is_seekable() || cursor.byte_len().is_none()) {
        return Err(StreamError::Unseekable("prescan"));
    }

    let mut scanner = FrameScanner::default();
    scanner.set_layer(config.layer);
    scanner.set_max_resync_bytes(config.max_resync_bytes);
    scanner.set_fail_level(config.fail_level);

    let mut reader = StreamingFrameReader::with_scanner(cursor, scanner.clone());
    reader.set_verify_crc(config.verify_crc);

    let (first_header, first_offset, xing) = match reader.next_frame()? {
        Some(frame) => (
            frame.header,
            frame.offset,
            XingHeader::from_frame(&frame.header, frame.data),
        ),
        None => return Err(StreamError::NoSyncFound),
    };

    let data_start = if xing.is_some() {
        debug!("Xing tag in frame at {first_offset}");
        first_offset + first_header.frame_len as u64
    } else {
        reader.rewind();
        first_offset
    };

    let data_len = reader
        .cursor()
        .byte_len()
        .map(|len| len.saturating_sub(data_start + config.trailing_bytes));

    if config.prescan {
        let resume = reader.cursor().position();
        reader.cursor_mut().seek_to(data_start)?;
        let index = FrameIndex::build(reader.cursor_mut(), &mut scanner)?;
        reader.cursor_mut().seek_to(resume)?;
        reader.set_index(index);
    }

    let pcm = PcmFormat {
        sample_rate: first_header.sample_rate,
        channels: first_header.channels() as u16,
        bits_per_sample: config.bits_per_sample,
    };

    info!(
        "{} {}, {} Hz, {}, {} kbps",
        first_header.version,
        first_header.layer,
        first_header.sample_rate,
        first_header.channel_mode,
        first_header.bit_rate / 1000
    );

    Ok((
        reader,
        StreamInfo {
            first_header,
            first_offset,
            xing,
            data_start,
            data_len,
            pcm,
        },
    ))
}

/// A stream presented as PCM bytes.
///
/// Positions and lengths count decoded bytes, `block_align` per sample.
/// Seeking and length need a prescanned stream. Not internally
/// synchronized; wrap in a `Mutex` to share.
///
/// # Example
///
/// ```rust,no_run
/// use mpa::process::decode::Decoder;
/// use mpa::process::session::{Session, StreamConfig};
///
/// # fn run(decoder: impl Decoder) -> Result<(), Box<dyn std::error::Error>> {
/// let file = std::fs::File::open("stream.mp3")?;
/// let mut session = Session::open(file, decoder, &StreamConfig::default())?;
///
/// println!("{} bytes of PCM", session.length()?);
///
/// // Skip the first second.
/// let second = session.pcm_format().byte_rate() as u64;
/// session.set_position(second)?;
///
/// let mut buf = vec![0u8; 4096];
/// while session.read(&mut buf)? > 0 {
///     // consume buf
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session<S: ByteSource, D: Decoder> {
    reader: StreamingFrameReader<S>,
    manager: DecodeBufferManager<D>,
    info: StreamInfo,
    position: u64,
}

impl<S: ByteSource, D: Decoder> Session<S, D> {
    pub fn open(source: S, decoder: D, config: &StreamConfig) -> Result<Self, StreamError> {
        let (reader, info) = probe(source, config)?;
        let manager = DecodeBufferManager::new(decoder, info.pcm.block_align() as usize);

        Ok(Self {
            reader,
            manager,
            info,
            position: 0,
        })
    }

    /// Fills `buf` with PCM. Returns 0 only at the end of the stream.
    ///
    /// A frame the decoder rejects is reported as [`StreamError::Decoder`]
    /// after the output before it; reading again continues with the next
    /// frame.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let result = self.manager.read(&mut self.reader, buf);
        self.position += self.manager.take_skipped();
        let n = result?;
        self.position += n as u64;
        Ok(n)
    }

    /// PCM bytes delivered since the start, or since the last seek plus the
    /// position it landed on. Frames the decoder rejected count with the
    /// length they would have decoded to.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves playback to the start of the frame containing the PCM byte
    /// `position`, clamped to the stream length, and returns the position
    /// actually reached. It never lies past the request and is less than
    /// one frame before it.
    pub fn set_position(&mut self, position: u64) -> Result<u64, StreamError> {
        if self.reader.index().is_none() {
            return Err(StreamError::Unseekable("set_position"));
        }

        let landed = self
            .reader
            .seek_to_pcm_byte(position, self.block_align())?;
        self.manager.reset();
        self.position = landed;

        Ok(landed)
    }

    /// Total PCM bytes in the stream.
    pub fn length(&self) -> Result<u64, StreamError> {
        self.reader
            .index()
            .map(|index| index.total_samples() * self.block_align())
            .ok_or(StreamError::Unseekable("length"))
    }

    pub fn sample_rate(&self) -> u32 {
        self.info.pcm.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.info.pcm.channels
    }

    /// Bit rate of the first frame in bits per second.
    pub fn bit_rate(&self) -> u32 {
        self.info.first_header.bit_rate
    }

    /// Audio bytes over playback time, falling back to the first frame's
    /// bit rate without a prescan.
    pub fn average_bit_rate(&self) -> f64 {
        let total_samples = self.reader.index().map(|index| index.total_samples());

        match (self.info.data_len, total_samples) {
            (Some(bytes), Some(samples)) if samples > 0 => {
                bytes as f64 * 8.0 / (samples as f64 / self.sample_rate() as f64)
            }
            _ => self.bit_rate() as f64,
        }
    }

    /// Playback time from the index, or from the Xing frame count.
    pub fn duration_secs(&self) -> Option<f64> {
        let samples = match self.reader.index() {
            Some(index) => Some(index.total_samples()),
            None => self.info.xing.as_ref().and_then(|xing| {
                xing.total_samples(self.info.first_header.samples_per_frame)
            }),
        }?;

        Some(samples as f64 / self.sample_rate() as f64)
    }

    pub fn xing_header(&self) -> Option<&XingHeader> {
        self.info.xing.as_ref()
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn pcm_format(&self) -> PcmFormat {
        self.info.pcm
    }

    pub fn index(&self) -> Option<&FrameIndex> {
        self.reader.index()
    }

    pub fn frames_read(&self) -> u64 {
        self.reader.frames_read()
    }

    pub fn decoder(&self) -> &D {
        self.manager.decoder()
    }

    pub fn is_eof(&self) -> bool {
        self.reader.is_eof() && self.manager.carry() == DecodeCarry::Idle
    }

    fn block_align(&self) -> u64 {
        self.info.pcm.block_align() as u64
    }
}

impl<S: ByteSource, D: Decoder> io::Read for Session<S, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Session::read(self, buf).map_err(|e| match e {
            StreamError::Io(e) => e,
            e => io::Error::other(e),
        })
    }
}
