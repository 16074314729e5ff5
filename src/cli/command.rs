use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use mpa::process::session::StreamConfig;
use mpa::structs::header::Layer;

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"), " (mpa ", env!("MPA_VERSION"), ", built ", env!("BUILD_TIMESTAMP"), ")"
    ),
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting, indexing and decoding MPEG audio elementary streams",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first lost sync or CRC mismatch).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Accept only frames of this layer.
    #[arg(long, global = true, value_enum)]
    pub layer: Option<LayerArg>,

    /// Verify the CRC of protected Layer III frames.
    #[arg(long, global = true)]
    pub verify_crc: bool,

    /// Give up after skipping this many bytes while searching for a frame.
    #[arg(long, global = true, value_name = "BYTES")]
    pub max_resync: Option<u64>,

    /// Bytes at the end of the input that are not audio, such as a 128-byte ID3v1 tag.
    #[arg(long, global = true, value_name = "BYTES", default_value_t = 0)]
    pub trailing_bytes: u64,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Stream options shared by every command.
    pub fn stream_config(&self, prescan: bool) -> StreamConfig {
        StreamConfig {
            prescan,
            layer: self.layer.map(Layer::from),
            max_resync_bytes: self.max_resync,
            verify_crc: self.verify_crc,
            fail_level: if self.strict {
                log::Level::Warn
            } else {
                log::Level::Error
            },
            trailing_bytes: self.trailing_bytes,
            ..Default::default()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decode the specified stream into PCM audio.
    Decode(DecodeArgs),

    /// Write the frame seek table of a stream as YAML.
    Index(IndexArgs),

    /// Print stream information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Input MPEG audio stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output path for the decoded audio.
    #[arg(long, value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// Audio format for output.
    #[arg(long, value_enum, default_value_t = AudioFormat::Wav)]
    pub format: AudioFormat,

    /// Start decoding at this time (seconds or [[HH:]MM:]SS[.mmm]). Needs a seekable input.
    #[arg(long, value_name = "TIME")]
    pub start: Option<String>,

    /// Bytes of PCM requested per read.
    #[arg(long, value_name = "BYTES", default_value_t = 65536)]
    pub chunk_size: usize,

    /// Skip indexing the input up front. Disables seeking and progress estimation.
    #[arg(long)]
    pub no_scan: bool,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Input MPEG audio stream. Must be seekable.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Write the index here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input MPEG audio stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum AudioFormat {
    /// RIFF WAVE.
    Wav,
    /// Raw PCM format (16-bit little-endian).
    Pcm,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum LayerArg {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
    #[value(name = "3")]
    Three,
}

impl From<LayerArg> for Layer {
    fn from(arg: LayerArg) -> Self {
        match arg {
            LayerArg::One => Layer::Layer1,
            LayerArg::Two => Layer::Layer2,
            LayerArg::Three => Layer::Layer3,
        }
    }
}
