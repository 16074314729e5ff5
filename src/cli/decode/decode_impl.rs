use std::sync::mpsc;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar};

use super::decoder_thread::{DecodeEvent, DecoderThreadConfig, spawn_decoder_thread};
use super::output::AudioWriter;
use super::progress::{create_progress_bar, finalize_progress_bar};
use crate::cli::command::{Cli, DecodeArgs};
use crate::timestamp::{parse_time, time_str};

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Decoding MPEG audio stream: {} (strict mode: {})",
        args.input.display(),
        cli.strict
    );

    let is_pipe = args.input.to_string_lossy() == "-";
    let start = args.start.as_deref().map(parse_time).transpose()?;

    let prescan = !args.no_scan && !is_pipe;
    if !prescan {
        if start.is_some() {
            anyhow::bail!("--start needs a seekable input that is indexed");
        }
        log::debug!("Skipping stream index; progress is shown as a frame count");
    }

    if let Some(ref path) = args.output_path {
        log::info!("Output path specified: {}", path.display());
    }

    let (tx, rx) = mpsc::channel();
    let decode_thread = spawn_decoder_thread(DecoderThreadConfig {
        input_path: args.input.clone(),
        stream_config: cli.stream_config(prescan),
        start,
        chunk_size: args.chunk_size,
        strict_mode: cli.strict,
        tx,
    });

    let start_time = std::time::Instant::now();
    let mut writer: Option<AudioWriter> = None;
    let mut pb: Option<ProgressBar> = None;
    let mut frame_bytes = 1u64;
    let mut first_position = 0u64;
    let mut last_position = 0u64;
    let mut byte_rate = 1u64;

    let written = (|| -> Result<()> {
        while let Ok(event) = rx.recv() {
            match event {
                DecodeEvent::Started {
                    format,
                    samples_per_frame,
                    total_frames,
                    position,
                } => {
                    frame_bytes = (samples_per_frame as u64 * format.block_align() as u64).max(1);
                    byte_rate = (format.byte_rate() as u64).max(1);
                    first_position = position;
                    last_position = position;

                    if let Some(multi) = multi {
                        let bar = create_progress_bar(multi, total_frames)?;
                        bar.set_position(position / frame_bytes);
                        pb = Some(bar);
                    }

                    if let Some(ref path) = args.output_path {
                        writer = Some(AudioWriter::create(path, args.format, format)?);
                    }
                }
                DecodeEvent::Pcm { data, position } => {
                    if let Some(ref mut writer) = writer {
                        writer.write_pcm(&data)?;
                    }
                    last_position = position;

                    if let Some(ref pb) = pb {
                        pb.set_position(position / frame_bytes);
                        pb.set_message(format!(
                            "timestamp: {}",
                            time_str(position as f64 / byte_rate as f64)
                        ));
                    }
                }
            }
        }

        if let Some(ref mut writer) = writer {
            writer.finish()?;
        }
        Ok(())
    })();

    // Dropping the receiver stops the decoder thread on a write failure.
    drop(rx);

    let joined = decode_thread.join();

    if let Err(e) = written {
        if let Some(pb) = pb {
            pb.finish_with_message("decode failed");
        }
        return Err(e);
    }

    match joined {
        Ok(Ok(summary)) => {
            let decoded_secs = (last_position - first_position) as f64 / byte_rate as f64;
            if let Some(ref pb) = pb {
                finalize_progress_bar(pb, prescan, decoded_secs, start_time);
            }
            if summary.concealed > 0 {
                log::warn!("{} frames could not be decoded and were replaced with silence", summary.concealed);
            }
            log::info!(
                "Decoding completed successfully: {} of audio",
                time_str(decoded_secs)
            );
        }
        Ok(Err(e)) => {
            if let Some(pb) = pb {
                pb.finish_with_message("decode failed");
            }
            return Err(e);
        }
        Err(_) => {
            if let Some(pb) = pb {
                pb.finish_with_message("decode thread panicked");
            }
            return Err(anyhow::anyhow!("Decode thread panicked"));
        }
    }

    Ok(())
}
