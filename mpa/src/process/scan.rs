use log::{debug, trace};

use crate::log_or_err;
use crate::structs::header::{FrameHeader, HEADER_LEN, Layer};
use crate::utils::errors::StreamError;
use crate::utils::source::{ByteSource, SourceCursor};

/// Where the cursor is left after a header has been located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Back at the first header byte. Needs a seekable source.
    Peek,
    /// Just past the four header bytes, ready for the payload.
    Header,
    /// Past the whole frame. A frame cut short by the end of the stream
    /// counts as not found.
    Frame,
}

/// A header found by [`FrameScanner::locate`].
#[derive(Debug, Clone, Copy)]
pub struct LocatedHeader {
    pub header: FrameHeader,
    /// Absolute offset of the first header byte.
    pub offset: u64,
    pub bytes: [u8; HEADER_LEN],
    /// Bytes passed over before the header.
    pub skipped: u64,
}

/// Byte-granular frame synchronizer.
///
/// Slides a four-byte window over the source one byte at a time until the
/// window decodes as a valid header. Sync words may sit at any alignment
/// after tags or damaged regions, so no chunked search is attempted.
///
/// Junk in front of the first frame (tags, padding) is expected and only
/// logged at debug level. Junk found once the stream is in sync means
/// frames were lost; that is logged as a warning, or returned as
/// [`StreamError::LostSync`] when the fail level is `Warn`.
///
/// # Example
///
/// ```rust,no_run
/// use mpa::process::scan::{FrameScanner, ScanMode};
/// use mpa::utils::source::SourceCursor;
///
/// let file = std::fs::File::open("stream.mp3")?;
/// let mut cursor = SourceCursor::new(file)?;
/// let mut scanner = FrameScanner::default();
///
/// while let Some(located) = scanner.locate(&mut cursor, ScanMode::Frame)? {
///     println!("{} byte frame at {}", located.header.frame_len, located.offset);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct FrameScanner {
    layer: Option<Layer>,
    max_resync_bytes: Option<u64>,
    synced: bool,
    pub(crate) fail_level: log::Level,
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self {
            layer: None,
            max_resync_bytes: None,
            synced: false,
            fail_level: log::Level::Error,
        }
    }
}

impl FrameScanner {
    /// Only accept frames of the given layer. Headers of other layers are
    /// treated like any other non-matching window.
    pub fn set_layer(&mut self, layer: Option<Layer>) {
        self.layer = layer;
    }

    /// Give up with [`StreamError::ResyncLimit`] after passing over this
    /// many bytes in a single search.
    pub fn set_max_resync_bytes(&mut self, limit: Option<u64>) {
        self.max_resync_bytes = limit;
    }

    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    /// Whether at least one frame has been located since the last
    /// [`FrameScanner::reset_sync`].
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Treats the next search as a fresh start, e.g. after a seek.
    pub fn reset_sync(&mut self) {
        self.synced = false;
    }

    /// Searches forward from the current cursor position for the next valid
    /// header. `Ok(None)` means the source ran out first.
    pub fn locate<S: ByteSource>(
        &mut self,
        cursor: &mut SourceCursor<S>,
        mode: ScanMode,
    ) -> Result<Option<LocatedHeader>, StreamError> {
        if mode == ScanMode::Peek && !cursor.is_seekable() {
            return Err(StreamError::Unseekable("peek"));
        }

        let start = cursor.position();

        let mut window = [0u8; HEADER_LEN];
        if cursor.read_exact_or_eof(&mut window)? < HEADER_LEN {
            return Ok(None);
        }

        let header = loop {
            match FrameHeader::parse(window) {
                Ok(header) if self.layer.is_none_or(|layer| layer == header.layer) => {
                    break header;
                }
                Ok(header) => {
                    trace!(
                        "Skipping {} frame at {}",
                        header.layer,
                        cursor.position() - HEADER_LEN as u64
                    )
                }
                Err(_) => {}
            }

            let skipped = cursor.position() - HEADER_LEN as u64 + 1 - start;
            if let Some(limit) = self.max_resync_bytes {
                if skipped > limit {
                    return Err(StreamError::ResyncLimit {
                        offset: start,
                        skipped: skipped - 1,
                    });
                }
            }

            let Some(byte) = cursor.read_byte()? else {
                if self.synced {
                    debug!(
                        "Discarded {} trailing bytes at end of stream",
                        cursor.position() - start
                    );
                }
                return Ok(None);
            };

            window.rotate_left(1);
            window[HEADER_LEN - 1] = byte;
        };

        let offset = cursor.position() - HEADER_LEN as u64;
        let skipped = offset - start;

        if skipped > 0 {
            if self.synced {
                log_or_err!(
                    self,
                    log::Level::Warn,
                    StreamError::LostSync { offset, skipped }
                );
            } else {
                debug!("Skipped {skipped} bytes before the first frame at {offset}");
            }
        }

        match mode {
            ScanMode::Peek => cursor.seek_to(offset)?,
            ScanMode::Header => {}
            ScanMode::Frame => {
                let remaining = (header.frame_len as usize - HEADER_LEN) as u64;
                if cursor.skip(remaining)? < remaining {
                    debug!(
                        "Final frame at {offset} truncated: {} of {} bytes present",
                        cursor.position() - offset,
                        header.frame_len
                    );
                    return Ok(None);
                }
            }
        }

        self.synced = true;

        Ok(Some(LocatedHeader {
            header,
            offset,
            bytes: window,
            skipped,
        }))
    }
}
