use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use mpad_macros::{ToBytes, riff_chunk};

use crate::byteorder::join_bytes_le;

const WAVE_FORMAT_PCM: u16 = 1;

/// Largest data chunk a 32-bit RIFF size field can describe.
const MAX_DATA_LEN: u64 = u32::MAX as u64 - 36;

pub trait RiffChunk {
    fn chunk_id(&self) -> &[u8; 4];
    fn chunk_data(&self) -> Vec<u8>;

    /// Id, little-endian size and data, padded to an even length.
    fn to_chunk(&self) -> Vec<u8> {
        let data = self.chunk_data();
        let mut chunk = join_bytes_le!(*self.chunk_id(), data.len() as u32);
        chunk.extend_from_slice(&data);
        if data.len() % 2 == 1 {
            chunk.push(0);
        }
        chunk
    }
}

#[riff_chunk(b"fmt ")]
#[derive(Debug, Clone, ToBytes)]
pub struct FormatChunk {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FormatChunk {
    pub fn pcm(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        let block_align = channels * bits_per_sample / 8;
        Self {
            format_tag: WAVE_FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample,
        }
    }
}

/// RIFF WAVE writer for interleaved little-endian PCM.
///
/// Sizes are written as zero up front and patched by [`WavWriter::finish`].
pub struct WavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    riff_size_position: u64,
    data_size_position: u64,
    data_written: u64,
}

impl<W: Write + Seek> WavWriter<W> {
    /// Writes the RIFF, fmt and data chunk headers.
    pub fn new(writer: W, format: FormatChunk) -> io::Result<Self> {
        let mut writer = BufWriter::new(writer);

        let riff_size_position = writer.stream_position()? + 4;
        writer.write_all(&join_bytes_le!(*b"RIFF", 0u32, *b"WAVE"))?;
        writer.write_all(&format.to_chunk())?;

        let data_size_position = writer.stream_position()? + 4;
        writer.write_all(&join_bytes_le!(*b"data", 0u32))?;

        Ok(Self {
            writer,
            riff_size_position,
            data_size_position,
            data_written: 0,
        })
    }

    pub fn write_samples(&mut self, pcm: &[u8]) -> io::Result<()> {
        self.writer.write_all(pcm)?;
        self.data_written += pcm.len() as u64;
        Ok(())
    }

    /// Patches the chunk sizes and flushes.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.data_written % 2 == 1 {
            self.writer.write_all(&[0])?;
        }

        let current_pos = self.writer.stream_position()?;

        if self.data_written > MAX_DATA_LEN {
            log::warn!(
                "{} bytes of audio exceed the WAV size limit, header sizes are clamped",
                self.data_written
            );
        }
        let data_len = self.data_written.min(MAX_DATA_LEN) as u32;
        let riff_len = (current_pos - 8).min(u32::MAX as u64) as u32;

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer.write_all(&data_len.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.riff_size_position))?;
        self.writer.write_all(&riff_len.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(current_pos))?;
        self.writer.flush()
    }

    #[cfg(test)]
    pub fn data_written(&self) -> u64 {
        self.data_written
    }

    #[cfg(test)]
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fmt_chunk_layout() {
        let chunk = FormatChunk::pcm(44100, 2, 16).to_chunk();

        assert_eq!(&chunk[..4], b"fmt ");
        assert_eq!(u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]), 16);
        assert_eq!(chunk.len(), 24);
        // byte rate
        assert_eq!(
            u32::from_le_bytes([chunk[16], chunk[17], chunk[18], chunk[19]]),
            176_400
        );
        assert_eq!(&chunk[20..24], &[4, 0, 16, 0]);
    }

    #[test]
    fn sizes_patched_on_finish() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()), FormatChunk::pcm(48000, 1, 16))?;
        writer.write_samples(&[1, 2, 3, 4, 5, 6])?;
        assert_eq!(writer.data_written(), 6);
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();
        assert_eq!(buffer.len(), 44 + 6);
        assert_eq!(&buffer[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]), 42);
        assert_eq!(&buffer[8..12], b"WAVE");
        assert_eq!(&buffer[36..40], b"data");
        assert_eq!(u32::from_le_bytes([buffer[40], buffer[41], buffer[42], buffer[43]]), 6);
        assert_eq!(&buffer[44..], &[1, 2, 3, 4, 5, 6]);
        Ok(())
    }

    #[test]
    fn odd_data_is_padded() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()), FormatChunk::pcm(8000, 1, 8))?;
        writer.write_samples(&[7, 7, 7])?;
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();
        assert_eq!(buffer.len(), 44 + 4);
        assert_eq!(u32::from_le_bytes([buffer[40], buffer[41], buffer[42], buffer[43]]), 3);
        Ok(())
    }
}
