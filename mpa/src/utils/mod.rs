//! Utility functions and supporting infrastructure.
//!
//! Provides byte sources, bitstream reading, CRC validation and error
//! handling.

pub mod bitstream_io;
pub mod crc;
pub mod errors;
pub mod source;
