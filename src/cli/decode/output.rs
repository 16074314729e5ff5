use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mpa::process::session::PcmFormat;

use super::super::command::AudioFormat;
use crate::wav::{FormatChunk, WavWriter};

/// `base_path` with `expected_ext` appended unless it already ends in it.
pub fn create_path_with_extension(base_path: &Path, expected_ext: &str) -> PathBuf {
    match base_path.extension() {
        Some(existing_ext) if existing_ext == expected_ext => base_path.to_path_buf(),
        Some(_) => {
            let mut name = base_path.as_os_str().to_os_string();
            name.push(".");
            name.push(expected_ext);
            PathBuf::from(name)
        }
        None => base_path.with_extension(expected_ext),
    }
}

pub enum AudioWriter {
    Pcm(BufWriter<File>),
    Wav(WavWriter<File>),
}

impl AudioWriter {
    pub fn create(base_path: &Path, format: AudioFormat, pcm: PcmFormat) -> Result<Self> {
        let ext = match format {
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        };
        let path = create_path_with_extension(base_path, ext);
        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;

        log::info!("Writing {} Hz, {} channel audio to {}", pcm.sample_rate, pcm.channels, path.display());

        Ok(match format {
            AudioFormat::Pcm => AudioWriter::Pcm(BufWriter::new(file)),
            AudioFormat::Wav => AudioWriter::Wav(WavWriter::new(
                file,
                FormatChunk::pcm(pcm.sample_rate, pcm.channels, pcm.bits_per_sample),
            )?),
        })
    }

    pub fn write_pcm(&mut self, pcm: &[u8]) -> Result<()> {
        match self {
            AudioWriter::Pcm(pcm_writer) => pcm_writer.write_all(pcm)?,
            AudioWriter::Wav(wav_writer) => wav_writer.write_samples(pcm)?,
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        match self {
            AudioWriter::Pcm(pcm_writer) => pcm_writer.flush()?,
            AudioWriter::Wav(wav_writer) => wav_writer.finish()?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_added_once() {
        assert_eq!(
            create_path_with_extension(Path::new("out"), "wav"),
            PathBuf::from("out.wav")
        );
        assert_eq!(
            create_path_with_extension(Path::new("out.wav"), "wav"),
            PathBuf::from("out.wav")
        );
        assert_eq!(
            create_path_with_extension(Path::new("dir/track.mp3"), "pcm"),
            PathBuf::from("dir/track.mp3.pcm")
        );
    }
}
