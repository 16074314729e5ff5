//! Bridges per-frame decoding to caller-sized reads.
//!
//! A decoder turns one frame into a fixed amount of PCM (1152 samples per
//! channel for most Layer III streams), while callers ask for arbitrary
//! byte counts. Output that does not fit the caller's buffer is carried
//! over and handed out first on the next read.

use crate::process::reader::StreamingFrameReader;
use crate::structs::header::MAX_SAMPLES_PER_FRAME;
use crate::utils::errors::StreamError;
use crate::utils::source::ByteSource;

/// Frame-to-PCM conversion step.
///
/// Implementations receive each complete frame, header included, and write
/// interleaved PCM into `out`, returning the number of bytes produced.
/// `out` always holds at least two frames' worth of output.
pub trait Decoder {
    fn convert(&mut self, frame: &[u8], out: &mut [u8]) -> anyhow::Result<usize>;

    /// Drops any state carried between frames. Called after seeking.
    fn reset(&mut self) {}
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn convert(&mut self, frame: &[u8], out: &mut [u8]) -> anyhow::Result<usize> {
        (**self).convert(frame, out)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Decoded bytes still owed to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeCarry {
    #[default]
    Idle,
    /// `len` undelivered bytes starting at `offset` in the PCM buffer.
    Carrying { offset: usize, len: usize },
}

#[derive(Debug)]
pub struct DecodeBufferManager<D: Decoder> {
    decoder: D,
    carry: DecodeCarry,
    pcm: Vec<u8>,
    block_align: usize,
    decoded_frames: u64,
    /// Decoder failure held back until the output produced before it has
    /// been delivered.
    pending: Option<anyhow::Error>,
    /// PCM bytes of rejected frames not yet reported by [`Self::take_skipped`].
    skipped: u64,
}

impl<D: Decoder> DecodeBufferManager<D> {
    /// `block_align` is the size in bytes of one sample across all channels.
    pub fn new(decoder: D, block_align: usize) -> Self {
        Self {
            decoder,
            carry: DecodeCarry::Idle,
            pcm: vec![0; 2 * MAX_SAMPLES_PER_FRAME * block_align],
            block_align,
            decoded_frames: 0,
            pending: None,
            skipped: 0,
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn carry(&self) -> DecodeCarry {
        self.carry
    }

    pub fn decoded_frames(&self) -> u64 {
        self.decoded_frames
    }

    /// PCM bytes the rejected frames would have produced since the last
    /// call. The frames are consumed, so stream positions move past them.
    pub fn take_skipped(&mut self) -> u64 {
        std::mem::take(&mut self.skipped)
    }

    /// Fills `buf` with decoded PCM, pulling frames from `reader` as needed.
    ///
    /// Returns fewer bytes than requested only when the stream ends or a
    /// frame fails to decode, and 0 only at a clean end of stream. A decoder
    /// error is returned as [`StreamError::Decoder`] once the bytes decoded
    /// before it have been handed out; the next read resumes after the
    /// failed frame.
    pub fn read<S: ByteSource>(
        &mut self,
        reader: &mut StreamingFrameReader<S>,
        buf: &mut [u8],
    ) -> Result<usize, StreamError> {
        if let Some(e) = self.pending.take() {
            return Err(StreamError::Decoder(e));
        }

        let mut written = 0;

        if let DecodeCarry::Carrying { offset, len } = self.carry {
            let n = len.min(buf.len());
            buf[..n].copy_from_slice(&self.pcm[offset..offset + n]);
            written = n;

            self.carry = if n < len {
                DecodeCarry::Carrying {
                    offset: offset + n,
                    len: len - n,
                }
            } else {
                DecodeCarry::Idle
            };
        }

        while written < buf.len() {
            let Some(frame) = reader.next_frame()? else {
                break;
            };

            let frame_pcm_len = frame.header.samples_per_frame as u64 * self.block_align as u64;
            let produced = match self.decoder.convert(frame.data, &mut self.pcm) {
                Ok(n) => n.min(self.pcm.len()),
                Err(e) => {
                    self.carry = DecodeCarry::Idle;
                    self.skipped += frame_pcm_len;
                    if written > 0 {
                        self.pending = Some(e);
                        return Ok(written);
                    }
                    return Err(StreamError::Decoder(e));
                }
            };
            self.decoded_frames += 1;

            let n = produced.min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&self.pcm[..n]);
            written += n;

            if produced > n {
                self.carry = DecodeCarry::Carrying {
                    offset: n,
                    len: produced - n,
                };
            }
        }

        Ok(written)
    }

    /// Discards carried output and pending errors, and resets the decoder.
    pub fn reset(&mut self) {
        self.carry = DecodeCarry::Idle;
        self.pending = None;
        self.skipped = 0;
        self.decoder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{FailingDecoder, PatternDecoder, vbr_stream};
    use std::io::Cursor;

    fn expected_pcm(data: &[u8]) -> Result<Vec<u8>, StreamError> {
        let mut reader = StreamingFrameReader::new(Cursor::new(data.to_vec()))?;
        let mut pcm = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            pcm.extend(PatternDecoder::expected(frame.data, 4));
        }
        Ok(pcm)
    }

    fn read_all(data: &[u8], chunk: usize) -> Result<Vec<u8>, StreamError> {
        let mut reader = StreamingFrameReader::new(Cursor::new(data.to_vec()))?;
        let mut manager = DecodeBufferManager::new(PatternDecoder::default(), 4);
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];

        loop {
            let n = manager.read(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }

    #[test]
    fn chunk_size_does_not_change_output() -> Result<(), StreamError> {
        let data = vbr_stream(4);
        let expected = expected_pcm(&data)?;
        assert_eq!(expected.len(), 4 * 4608);

        for chunk in [1, 3, 1000, 4608, 4609, 100_000] {
            assert_eq!(read_all(&data, chunk)?, expected, "chunk size {chunk}");
        }
        Ok(())
    }

    #[test]
    fn carry_tracks_undelivered_output() -> Result<(), StreamError> {
        let mut reader = StreamingFrameReader::new(Cursor::new(vbr_stream(2)))?;
        let mut manager = DecodeBufferManager::new(PatternDecoder::default(), 4);
        let mut buf = vec![0u8; 1000];

        assert_eq!(manager.read(&mut reader, &mut buf)?, 1000);
        assert_eq!(
            manager.carry(),
            DecodeCarry::Carrying {
                offset: 1000,
                len: 3608
            }
        );

        let mut big = vec![0u8; 4000];
        assert_eq!(manager.read(&mut reader, &mut big)?, 4000);
        assert_eq!(
            manager.carry(),
            DecodeCarry::Carrying {
                offset: 392,
                len: 4216
            }
        );
        assert_eq!(manager.decoded_frames(), 2);

        let mut rest = vec![0u8; 10_000];
        assert_eq!(manager.read(&mut reader, &mut rest)?, 4216);
        assert_eq!(manager.carry(), DecodeCarry::Idle);
        assert_eq!(manager.read(&mut reader, &mut rest)?, 0);
        Ok(())
    }

    #[test]
    fn decoder_failure_clears_carry() -> Result<(), StreamError> {
        let mut reader = StreamingFrameReader::new(Cursor::new(vbr_stream(3)))?;
        let decoder = FailingDecoder {
            inner: PatternDecoder::default(),
            fail_at: 1,
        };
        let mut manager = DecodeBufferManager::new(decoder, 4);

        let mut buf = vec![0u8; 100];
        assert_eq!(manager.read(&mut reader, &mut buf)?, 100);
        assert_ne!(manager.carry(), DecodeCarry::Idle);

        // The rest of the first frame is delivered before the failure.
        let mut big = vec![0u8; 8000];
        assert_eq!(manager.read(&mut reader, &mut big)?, 4508);
        assert_eq!(manager.carry(), DecodeCarry::Idle);
        assert_eq!(manager.take_skipped(), 4608);
        assert_eq!(manager.take_skipped(), 0);

        assert!(matches!(
            manager.read(&mut reader, &mut big),
            Err(StreamError::Decoder(_))
        ));

        // The stream continues with the next frame.
        let mut frame = vec![0u8; 4608];
        assert_eq!(manager.read(&mut reader, &mut frame)?, 4608);
        Ok(())
    }

    #[test]
    fn failure_on_empty_read_is_immediate() -> Result<(), StreamError> {
        let mut reader = StreamingFrameReader::new(Cursor::new(vbr_stream(2)))?;
        let decoder = FailingDecoder {
            inner: PatternDecoder::default(),
            fail_at: 0,
        };
        let mut manager = DecodeBufferManager::new(decoder, 4);

        let mut buf = vec![0u8; 100];
        assert!(matches!(
            manager.read(&mut reader, &mut buf),
            Err(StreamError::Decoder(_))
        ));
        assert_eq!(manager.take_skipped(), 4608);
        assert_eq!(manager.read(&mut reader, &mut buf)?, 100);
        Ok(())
    }

    #[test]
    fn reset_drops_carry() -> Result<(), StreamError> {
        let mut reader = StreamingFrameReader::new(Cursor::new(vbr_stream(1)))?;
        let mut manager = DecodeBufferManager::new(PatternDecoder::default(), 4);

        let mut buf = vec![0u8; 10];
        manager.read(&mut reader, &mut buf)?;
        manager.reset();

        assert_eq!(manager.carry(), DecodeCarry::Idle);
        assert_eq!(manager.decoder().resets, 1);
        assert_eq!(manager.read(&mut reader, &mut buf)?, 0);
        Ok(())
    }
}
