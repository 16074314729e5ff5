use std::io;

/// Logs a recoverable condition at `$level`, or returns it as an error when
/// `$level` is at or above the `fail_level` of `$state`.
#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

/// Reasons a 4-byte window is not a usable frame header.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Frame sync pattern not found: {0:#06X}")]
    BadSync(u16),

    #[error("Reserved MPEG version")]
    ReservedVersion,

    #[error("Reserved layer")]
    ReservedLayer,

    #[error("Unusable bit rate index {0:#X}")]
    BadBitRate(u8),

    #[error("Reserved sample rate index")]
    BadSampleRate,

    #[error("Frame length {0} outside (4, 16384]")]
    FrameLength(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("No valid MPEG audio frame found in stream")]
    NoSyncFound,

    #[error("Operation requires a seekable, indexed stream: {0}")]
    Unseekable(&'static str),

    #[error("Lost sync at byte {offset}: skipped {skipped} bytes before the next frame")]
    LostSync { offset: u64, skipped: u64 },

    #[error("Gave up resynchronizing at byte {offset} after {skipped} bytes")]
    ResyncLimit { offset: u64, skipped: u64 },

    #[error("CRC mismatch in frame at byte {offset}: stored {expected:#06X}, computed {computed:#06X}")]
    CrcMismatch {
        offset: u64,
        expected: u16,
        computed: u16,
    },

    #[error(transparent)]
    Decoder(anyhow::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
