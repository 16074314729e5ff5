#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Framing layer for MPEG-1, MPEG-2 and MPEG-2.5 audio elementary streams
//! (Layers I, II and III).
//!
//! ### Stream Organization
//!
//! A stream is a plain concatenation of frames. Each frame starts with a
//! 32-bit header from which its length follows, so frames are found by
//! scanning for a header and then stepping frame by frame. There is no
//! container; tags and damaged regions are skipped by resynchronizing on the
//! next valid header.
//!
//! ### Variable Bit Rate
//!
//! The bit rate may change per frame. Encoders usually announce this with a
//! Xing tag in the first frame, which then carries no audio.
//!
//! ### Seeking
//!
//! Frame length varies with bit rate and padding, so byte offsets cannot be
//! computed from a time. Seekable streams are indexed once up front.
//!
//! ## Quick Start
//!
//! 1. Open a [`process::session::Session`] over a byte source with a
//!    [`process::decode::Decoder`] implementation
//! 2. Read PCM bytes; seek with [`process::session::Session::set_position`]
//!
//! For lower level access, [`process::reader::StreamingFrameReader`] yields
//! raw frames without decoding:
//!
//! ```rust,no_run
//! use mpa::process::session::{probe, StreamConfig};
//!
//! let file = std::fs::File::open("stream.mp3")?;
//! let (mut reader, info) = probe(file, &StreamConfig::default())?;
//!
//! println!("{} Hz, {} channels", info.pcm.sample_rate, info.pcm.channels);
//!
//! while let Some(frame) = reader.next_frame()? {
//!     // Hand frame.data to a decoder
//!     let _bytes: &[u8] = frame.data;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Processing functionality for audio streams.
///
/// 1. **Scanning** ([`process::scan`]): Byte-wise frame synchronization.
///
/// 2. **Reading** ([`process::reader`]): Frame-by-frame stream reading.
///
/// 3. **Decoding** ([`process::decode`]): Decoder bridging and output
///    buffering.
///
/// 4. **Sessions** ([`process::session`]): Stream probing and PCM access.
pub mod process;

/// Data structures representing stream components.
///
/// - **Frame Headers** ([`structs::header`]): Header fields and frame length
/// - **Xing Tags** ([`structs::xing`]): VBR metadata
/// - **Frame Index** ([`structs::index`]): Seek table
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Byte Sources** ([`utils::source`]): Input abstraction
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **CRC Validation** ([`utils::crc`]): Frame protection checks
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
