use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, InfoArgs};
use crate::input::InputReader;
use crate::timestamp::time_str;
use mpa::process::session::{StreamInfo, probe};
use mpa::structs::header::{Emphasis, FrameHeader};
use mpa::structs::xing::XingHeader;
use mpa::utils::errors::StreamError;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing MPEG audio stream: {}", args.input.display());

    let source = InputReader::new(&args.input)?.into_source();

    let (mut reader, info) = match probe(source, &cli.stream_config(false)) {
        Ok(probed) => probed,
        Err(StreamError::NoSyncFound) => {
            println!("No MPEG audio frame found in the input.");
            println!("This doesn't appear to be a valid MPEG audio stream.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_message("Analyzing frames...");
            Some(pb)
        }
        None => None,
    };

    match &pb {
        Some(pb) => pb.suspend(|| display_stream_info(&info)),
        None => display_stream_info(&info),
    }

    let mut stats = FrameStats::default();
    while let Some(frame) = reader.next_frame()? {
        stats.add(&frame.header);

        if stats.frames.is_multiple_of(100) {
            if let Some(ref pb) = pb {
                pb.set_message(format!("Analyzing frames...       {}", stats.frames));
                pb.tick();
            }
        }
    }

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    display_summary(&info, &stats, reader.cursor().position());

    Ok(())
}

#[derive(Default)]
struct FrameStats {
    frames: u64,
    samples: u64,
    bytes: u64,
    min_bit_rate: Option<u32>,
    max_bit_rate: Option<u32>,
}

impl FrameStats {
    fn add(&mut self, header: &FrameHeader) {
        self.frames += 1;
        self.samples += header.samples_per_frame as u64;
        self.bytes += header.frame_len as u64;
        self.min_bit_rate = Some(
            self.min_bit_rate
                .map_or(header.bit_rate, |rate| rate.min(header.bit_rate)),
        );
        self.max_bit_rate = Some(
            self.max_bit_rate
                .map_or(header.bit_rate, |rate| rate.max(header.bit_rate)),
        );
    }

    fn variable_rate(&self) -> bool {
        self.min_bit_rate != self.max_bit_rate
    }
}

fn emphasis_str(emphasis: Emphasis) -> &'static str {
    match emphasis {
        Emphasis::None => "None",
        Emphasis::Ms50_15 => "50/15 ms",
        Emphasis::Reserved => "Reserved",
        Emphasis::CcittJ17 => "CCITT J.17",
    }
}

fn display_stream_info(info: &StreamInfo) {
    let header = &info.first_header;

    println!();
    println!("MPEG Audio Stream Information");
    println!("=============================");
    println!();
    println!("Stream Information");
    println!("  Format                    {} {}", header.version, header.layer);
    println!("  Sampling rate             {} Hz", header.sample_rate);
    println!("  Channel mode              {}", header.channel_mode);
    println!("  Samples per frame         {}", header.samples_per_frame);
    println!("  Bit rate (first frame)    {} kbps", header.bit_rate / 1000);
    println!("  CRC protected             {}", !header.protection_absent);
    println!("  Copyright                 {}", header.copyright);
    println!("  Original                  {}", header.original);
    println!("  Emphasis                  {}", emphasis_str(header.emphasis));
    println!("  First frame offset        {}", info.first_offset);
    println!();

    if let Some(xing) = &info.xing {
        display_xing_info(xing, header);
    }
}

fn display_xing_info(xing: &XingHeader, header: &FrameHeader) {
    println!("Xing Tag");
    if let Some(frames) = xing.frames {
        println!("  Frames                    {frames}");
    }
    if let Some(samples) = xing.total_samples(header.samples_per_frame) {
        let duration = samples as f64 / header.sample_rate as f64;
        println!("  Announced duration        {}", time_str(duration));
    }
    if let Some(bytes) = xing.bytes {
        println!("  Bytes                     {bytes}");
    }
    println!("  Table of contents         {}", xing.toc.is_some());
    if let Some(quality) = xing.quality {
        println!("  Quality                   {quality}");
    }
    println!();
}

fn display_summary(info: &StreamInfo, stats: &FrameStats, end: u64) {
    println!("Analysis Summary");
    println!("  Frames processed          {}", stats.frames);

    let size_mb = stats.bytes as f64 / 1_000_000.0;
    println!(
        "  Audio size                {size_mb:.2} MB ({} bytes)",
        stats.bytes
    );

    let skipped = end.saturating_sub(info.data_start + stats.bytes);
    if skipped > 0 {
        println!("  Skipped bytes             {skipped}");
    }

    println!("  Variable rate             {}", stats.variable_rate());

    let duration_secs = stats.samples as f64 / info.first_header.sample_rate as f64;
    println!("  Duration                  {}", time_str(duration_secs));

    if duration_secs > 0.0 {
        let avg_data_rate_kbps = (stats.bytes as f64 * 8.0) / (duration_secs * 1000.0);
        println!("  Average data rate         {avg_data_rate_kbps:.1} kbps");
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_detect_variable_rate() -> Result<()> {
        let mut stats = FrameStats::default();
        let cbr = FrameHeader::parse([0xFF, 0xFB, 0x90, 0x64])?;
        let vbr = FrameHeader::parse([0xFF, 0xFB, 0xB0, 0x64])?;

        stats.add(&cbr);
        stats.add(&cbr);
        assert!(!stats.variable_rate());

        stats.add(&vbr);
        assert!(stats.variable_rate());
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.samples, 3 * 1152);
        assert_eq!(stats.bytes, 417 + 417 + 626);
        assert_eq!(stats.max_bit_rate, Some(192_000));
        Ok(())
    }
}
