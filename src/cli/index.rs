use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;

use super::command::{Cli, IndexArgs};
use crate::input::InputReader;
use mpa::process::session::{StreamInfo, probe};
use mpa::structs::index::FrameIndex;

/// Seek table document written by `mpad index`.
#[derive(Debug, Serialize)]
struct IndexDocument {
    format: String,
    sample_rate: u32,
    channels: u16,
    samples_per_frame: u16,
    data_start: u64,
    total_samples: u64,
    total_bytes: u64,
    duration_secs: f64,
    frames: Vec<IndexEntry>,
}

#[derive(Debug, Serialize)]
struct IndexEntry {
    offset: u64,
    sample: u64,
    length: u32,
}

impl IndexDocument {
    fn new(info: &StreamInfo, index: &FrameIndex) -> Self {
        let header = &info.first_header;

        Self {
            format: format!("{} {}", header.version, header.layer),
            sample_rate: header.sample_rate,
            channels: info.pcm.channels,
            samples_per_frame: header.samples_per_frame,
            data_start: info.data_start,
            total_samples: index.total_samples(),
            total_bytes: index.total_bytes(),
            duration_secs: index.total_samples() as f64 / header.sample_rate as f64,
            frames: index
                .entries()
                .iter()
                .map(|entry| IndexEntry {
                    offset: entry.offset,
                    sample: entry.sample_index,
                    length: entry.frame_len,
                })
                .collect(),
        }
    }
}

pub fn cmd_index(args: &IndexArgs, cli: &Cli) -> Result<()> {
    let input = InputReader::new(&args.input)?;
    if input.is_pipe() {
        bail!("Indexing requires a seekable input, not stdin");
    }

    let (reader, info) = probe(input.into_source(), &cli.stream_config(true))?;
    let Some(index) = reader.index() else {
        bail!("Stream was not indexed");
    };

    log::info!(
        "Indexed {} frames in {}",
        index.len(),
        args.input.display()
    );

    let document = IndexDocument::new(&info, index);

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    serde_yaml_ng::to_writer(&mut writer, &document)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpa::process::session::StreamConfig;
    use std::io::Cursor;

    const HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];

    #[test]
    fn document_lists_every_frame() -> Result<()> {
        let mut data = vec![0u8; 6];
        for _ in 0..3 {
            let mut frame = vec![0x11u8; 417];
            frame[..4].copy_from_slice(&HEADER);
            data.extend(frame);
        }

        let (reader, info) = probe(Cursor::new(data), &StreamConfig::default())?;
        let index = reader.index().context("no index")?;
        let document = IndexDocument::new(&info, index);

        assert_eq!(document.format, "MPEG-1 Layer III");
        assert_eq!(document.data_start, 6);
        assert_eq!(document.total_samples, 3 * 1152);
        assert_eq!(document.frames.len(), 3);
        assert_eq!(document.frames[2].offset, 6 + 2 * 417);
        assert_eq!(document.frames[2].sample, 2 * 1152);

        let yaml = serde_yaml_ng::to_string(&document)?;
        assert!(yaml.contains("sample_rate: 44100"));
        assert!(yaml.contains("- offset: 423"));
        Ok(())
    }
}
