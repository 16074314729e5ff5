use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use mpa::process::session::{PcmFormat, Session, StreamConfig};
use mpa::utils::errors::StreamError;
use mpa::utils::source::ByteSource;

use crate::codec::SymphoniaDecoder;
use crate::input::InputReader;

pub enum DecodeEvent {
    /// Sent once, before any audio.
    Started {
        format: PcmFormat,
        samples_per_frame: u16,
        /// Audio frames in the stream, when it was indexed.
        total_frames: Option<u64>,
        /// PCM byte position decoding starts from.
        position: u64,
    },
    Pcm {
        data: Vec<u8>,
        /// PCM byte position after `data`.
        position: u64,
    },
}

pub struct DecoderThreadConfig {
    pub input_path: PathBuf,
    pub stream_config: StreamConfig,
    /// Start time in seconds.
    pub start: Option<f64>,
    pub chunk_size: usize,
    pub strict_mode: bool,
    pub tx: mpsc::Sender<DecodeEvent>,
}

pub struct DecodeSummary {
    pub frames: u64,
    pub bytes: u64,
    pub concealed: u64,
}

pub fn spawn_decoder_thread(config: DecoderThreadConfig) -> thread::JoinHandle<Result<DecodeSummary>> {
    thread::spawn(move || -> Result<DecodeSummary> {
        let DecoderThreadConfig {
            input_path,
            stream_config,
            start,
            chunk_size,
            strict_mode,
            tx,
        } = config;

        let source = InputReader::new(&input_path)?.into_source();
        let mut session = Session::open(source, SymphoniaDecoder::default(), &stream_config)?;
        let format = session.pcm_format();

        let position = match start {
            Some(secs) => {
                let target = (secs * format.sample_rate as f64) as u64 * format.block_align() as u64;
                let landed = session.set_position(target)?;
                log::info!(
                    "Seeking to {secs:.3}s landed at {:.3}s",
                    landed as f64 / format.byte_rate() as f64
                );
                landed
            }
            None => 0,
        };

        let started = DecodeEvent::Started {
            format,
            samples_per_frame: session.info().first_header.samples_per_frame,
            total_frames: session.index().map(|index| index.len() as u64),
            position,
        };
        if tx.send(started).is_err() {
            return Ok(summary(&session, 0));
        }

        let mut bytes = 0u64;
        let mut buf = vec![0u8; chunk_size.max(1)];

        loop {
            let n = match session.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(StreamError::Decoder(e)) if !strict_mode => {
                    log::error!("Decode error after {} frames: {e:#}", session.frames_read());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            bytes += n as u64;
            let event = DecodeEvent::Pcm {
                data: buf[..n].to_vec(),
                position: session.position(),
            };

            // Receiver gone: the writer side failed and reports its own error.
            if tx.send(event).is_err() {
                break;
            }
        }

        let summary = summary(&session, bytes);
        log::info!(
            "Processing complete: {} frames, {} bytes of PCM",
            summary.frames,
            summary.bytes
        );
        Ok(summary)
    })
}

fn summary(session: &Session<Box<dyn ByteSource>, SymphoniaDecoder>, bytes: u64) -> DecodeSummary {
    DecodeSummary {
        frames: session.frames_read(),
        bytes,
        concealed: session.decoder().concealed(),
    }
}
