//! MPEG audio frame header.
//!
//! ## Layout
//!
//! Every frame starts with a 32-bit big-endian header:
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! ```
//!
//! - **A** (11): frame sync, all ones
//! - **B** (2): version (00 = 2.5, 01 = reserved, 10 = 2, 11 = 1)
//! - **C** (2): layer (00 = reserved, 01 = III, 10 = II, 11 = I)
//! - **D** (1): protection absent (0 = CRC-16 follows the header)
//! - **E** (4): bit rate index
//! - **F** (2): sample rate index
//! - **G** (1): padding
//! - **H** (1): private
//! - **I** (2): channel mode
//! - **J** (2): mode extension
//! - **K**, **L** (1 each): copyright, original
//! - **M** (2): emphasis
//!
//! Free-format streams (bit rate index 0) are not supported since their frame
//! length cannot be derived from the header alone.

use std::fmt;

use crate::utils::errors::HeaderError;

/// Size of a frame header in bytes.
pub const HEADER_LEN: usize = 4;

/// Upper bound on the length of a single frame.
pub const MAX_FRAME_LEN: u32 = 16384;

/// Most samples a single frame can carry per channel.
pub const MAX_SAMPLES_PER_FRAME: usize = 1152;

/// Bit rates in kbps indexed by `[version class][layer][index]`.
///
/// Version class 0 is MPEG-1, class 1 covers MPEG-2 and MPEG-2.5.
const BIT_RATES: [[[u16; 15]; 3]; 2] = [
    [
        [
            0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
        ],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
    ],
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    ],
];

/// Sample rates in Hz indexed by `[version][index]`.
const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000],
    [22050, 24000, 16000],
    [11025, 12000, 8000],
];

/// Samples per frame indexed by `[version class][layer]`.
const SAMPLES_PER_FRAME: [[u16; 3]; 2] = [[384, 1152, 1152], [384, 1152, 576]];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpegVersion {
    V1,
    V2,
    V2_5,
}

impl MpegVersion {
    const fn index(self) -> usize {
        match self {
            Self::V1 => 0,
            Self::V2 => 1,
            Self::V2_5 => 2,
        }
    }

    /// Index into tables shared by MPEG-2 and MPEG-2.5.
    const fn class(self) -> usize {
        match self {
            Self::V1 => 0,
            Self::V2 | Self::V2_5 => 1,
        }
    }
}

impl fmt::Display for MpegVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V1 => "MPEG-1",
            Self::V2 => "MPEG-2",
            Self::V2_5 => "MPEG-2.5",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Layer1,
    Layer2,
    Layer3,
}

impl Layer {
    const fn index(self) -> usize {
        match self {
            Self::Layer1 => 0,
            Self::Layer2 => 1,
            Self::Layer3 => 2,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Layer1 => "Layer I",
            Self::Layer2 => "Layer II",
            Self::Layer3 => "Layer III",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stereo => "Stereo",
            Self::JointStereo => "Joint stereo",
            Self::DualChannel => "Dual channel",
            Self::Mono => "Mono",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emphasis {
    None,
    Ms50_15,
    Reserved,
    CcittJ17,
}

/// Decoded frame header.
///
/// Obtained from [`FrameHeader::parse`]; every value here has passed
/// validation, so a `FrameHeader` always describes a frame whose length lies
/// in `(4, 16384]`.
///
/// # Example
///
/// ```rust,no_run
/// use mpa::structs::header::{FrameHeader, Layer};
///
/// let header = FrameHeader::parse([0xFF, 0xFB, 0x90, 0x64])?;
///
/// assert_eq!(header.layer, Layer::Layer3);
/// assert_eq!(header.bit_rate, 128_000);
/// assert_eq!(header.frame_len, 417);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    /// Bits per second.
    pub bit_rate: u32,
    /// Hz.
    pub sample_rate: u32,
    pub channel_mode: ChannelMode,
    pub mode_extension: u8,
    pub padding: bool,
    pub protection_absent: bool,
    pub private: bool,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: Emphasis,
    pub samples_per_frame: u16,
    /// Whole frame in bytes, header included.
    pub frame_len: u32,
}

impl FrameHeader {
    /// Validates and decodes four header bytes.
    pub fn parse(bytes: [u8; 4]) -> Result<Self, HeaderError> {
        let word = u32::from_be_bytes(bytes);

        if word & 0xFFE0_0000 != 0xFFE0_0000 {
            return Err(HeaderError::BadSync((word >> 16) as u16));
        }

        let version = match (word >> 19) & 0x3 {
            0b00 => MpegVersion::V2_5,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return Err(HeaderError::ReservedVersion),
        };

        let layer = match (word >> 17) & 0x3 {
            0b01 => Layer::Layer3,
            0b10 => Layer::Layer2,
            0b11 => Layer::Layer1,
            _ => return Err(HeaderError::ReservedLayer),
        };

        let protection_absent = word & 0x1_0000 != 0;

        let bit_rate_index = ((word >> 12) & 0xF) as u8;
        if bit_rate_index == 0 || bit_rate_index == 0xF {
            return Err(HeaderError::BadBitRate(bit_rate_index));
        }
        let bit_rate = BIT_RATES[version.class()][layer.index()][bit_rate_index as usize] as u32
            * 1000;

        let sample_rate = match (word >> 10) & 0x3 {
            0b11 => return Err(HeaderError::BadSampleRate),
            index => SAMPLE_RATES[version.index()][index as usize],
        };

        let padding = word & 0x200 != 0;
        let private = word & 0x100 != 0;

        let channel_mode = match (word >> 6) & 0x3 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        let mode_extension = ((word >> 4) & 0x3) as u8;
        let copyright = word & 0x8 != 0;
        let original = word & 0x4 != 0;

        let emphasis = match word & 0x3 {
            0b00 => Emphasis::None,
            0b01 => Emphasis::Ms50_15,
            0b10 => Emphasis::Reserved,
            _ => Emphasis::CcittJ17,
        };

        let samples_per_frame = SAMPLES_PER_FRAME[version.class()][layer.index()];
        let frame_len = frame_len(layer, samples_per_frame, bit_rate, sample_rate, padding);

        if frame_len <= HEADER_LEN as u32 || frame_len > MAX_FRAME_LEN {
            return Err(HeaderError::FrameLength(frame_len));
        }

        Ok(Self {
            version,
            layer,
            bit_rate,
            sample_rate,
            channel_mode,
            mode_extension,
            padding,
            protection_absent,
            private,
            copyright,
            original,
            emphasis,
            samples_per_frame,
            frame_len,
        })
    }

    #[inline(always)]
    pub fn channels(&self) -> usize {
        if self.channel_mode == ChannelMode::Mono {
            1
        } else {
            2
        }
    }

    /// Length of the Layer III side information that follows the header
    /// (and the CRC, when present).
    pub fn side_info_len(&self) -> usize {
        match (self.version, self.channel_mode) {
            (MpegVersion::V1, ChannelMode::Mono) => 17,
            (MpegVersion::V1, _) => 32,
            (_, ChannelMode::Mono) => 9,
            (_, _) => 17,
        }
    }

    /// Bytes between the start of the frame and the first byte covered by
    /// neither header nor CRC.
    #[inline(always)]
    pub fn crc_len(&self) -> usize {
        if self.protection_absent { 0 } else { 2 }
    }

    /// Playback time covered by one frame.
    pub fn duration_secs(&self) -> f64 {
        self.samples_per_frame as f64 / self.sample_rate as f64
    }
}

/// Frame length in bytes.
///
/// Layer I counts 4-byte slots, so its padding adds a whole slot.
const fn frame_len(
    layer: Layer,
    samples_per_frame: u16,
    bit_rate: u32,
    sample_rate: u32,
    padding: bool,
) -> u32 {
    let pad = padding as u32;
    let bit_rate = bit_rate as u64;
    let sample_rate = sample_rate as u64;

    match layer {
        Layer::Layer1 => {
            let slots = (samples_per_frame as u64 / 32) * bit_rate / sample_rate;
            (slots as u32 + pad) * 4
        }
        _ => ((samples_per_frame as u64 / 8) * bit_rate / sample_rate) as u32 + pad,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(b1: u8, b2: u8, b3: u8) -> Result<FrameHeader, HeaderError> {
        FrameHeader::parse([0xFF, b1, b2, b3])
    }

    #[test]
    fn layer3_reference_lengths() -> Result<(), HeaderError> {
        let h = header(0xFB, 0x90, 0x64)?;
        assert_eq!(h.version, MpegVersion::V1);
        assert_eq!(h.layer, Layer::Layer3);
        assert!(h.protection_absent);
        assert_eq!(h.bit_rate, 128_000);
        assert_eq!(h.sample_rate, 44100);
        assert_eq!(h.channel_mode, ChannelMode::JointStereo);
        assert!(h.original);
        assert_eq!(h.samples_per_frame, 1152);
        assert_eq!(h.frame_len, 417);
        assert_eq!(h.channels(), 2);
        assert_eq!(h.side_info_len(), 32);

        assert_eq!(header(0xFB, 0x92, 0x64)?.frame_len, 418);

        // 320 kbps at 48 kHz
        assert_eq!(header(0xFB, 0xE4, 0x00)?.frame_len, 960);
        // 32 kbps at 32 kHz, mono
        let h = header(0xFB, 0x18, 0xC0)?;
        assert_eq!(h.frame_len, 144);
        assert_eq!(h.channels(), 1);
        assert_eq!(h.side_info_len(), 17);
        Ok(())
    }

    #[test]
    fn lower_sample_rate_versions() -> Result<(), HeaderError> {
        // MPEG-2 Layer III, 64 kbps, 22.05 kHz
        let h = header(0xF3, 0x80, 0x40)?;
        assert_eq!(h.version, MpegVersion::V2);
        assert_eq!(h.samples_per_frame, 576);
        assert_eq!(h.frame_len, 208);
        assert_eq!(h.side_info_len(), 17);

        // MPEG-2.5 Layer III, 8 kbps, 8 kHz, mono
        let h = header(0xE3, 0x18, 0xC0)?;
        assert_eq!(h.version, MpegVersion::V2_5);
        assert_eq!(h.sample_rate, 8000);
        assert_eq!(h.frame_len, 72);
        assert_eq!(h.side_info_len(), 9);
        Ok(())
    }

    #[test]
    fn layer1_counts_slots() -> Result<(), HeaderError> {
        // 32 kbps at 44.1 kHz
        let h = header(0xFF, 0x10, 0x00)?;
        assert_eq!(h.layer, Layer::Layer1);
        assert_eq!(h.samples_per_frame, 384);
        assert_eq!(h.frame_len, 32);
        assert_eq!(header(0xFF, 0x12, 0x00)?.frame_len, 36);

        // 448 kbps at 32 kHz
        assert_eq!(header(0xFF, 0xE8, 0x00)?.frame_len, 672);
        Ok(())
    }

    #[test]
    fn layer2_length() -> Result<(), HeaderError> {
        // 192 kbps at 48 kHz
        let h = header(0xFD, 0xA4, 0x00)?;
        assert_eq!(h.layer, Layer::Layer2);
        assert!(h.protection_absent);
        assert_eq!(h.frame_len, 576);
        Ok(())
    }

    #[test]
    fn every_valid_combination_has_reference_length() -> Result<(), HeaderError> {
        // (version bits, sample rates)
        let versions = [
            (0b11u32, [44100u32, 48000, 32000]),
            (0b10, [22050, 24000, 16000]),
            (0b00, [11025, 12000, 8000]),
        ];
        // kbps for bit rate indices 1..=14
        let mpeg1: [[u32; 14]; 3] = [
            [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
            [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
            [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
        ];
        let mpeg2_layer1 = [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
        let mpeg2_layer23 = [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

        let mut checked = 0;
        for (version_bits, rates) in versions {
            // layer bits 11 = I, 10 = II, 01 = III
            for (layer_bits, layer) in [(0b11u32, 0usize), (0b10, 1), (0b01, 2)] {
                for bit_rate_index in 1..=14u32 {
                    let kbps = match (version_bits, layer) {
                        (0b11, _) => mpeg1[layer][bit_rate_index as usize - 1],
                        (_, 0) => mpeg2_layer1[bit_rate_index as usize - 1],
                        _ => mpeg2_layer23[bit_rate_index as usize - 1],
                    };
                    for (rate_index, sample_rate) in rates.into_iter().enumerate() {
                        for padding in [0u32, 1] {
                            let word = 0xFFE0_0000
                                | version_bits << 19
                                | layer_bits << 17
                                | 1 << 16
                                | bit_rate_index << 12
                                | (rate_index as u32) << 10
                                | padding << 9;
                            let h = FrameHeader::parse(word.to_be_bytes())?;

                            let expected = match (layer, version_bits) {
                                (0, _) => (12_000 * kbps / sample_rate + padding) * 4,
                                (2, 0b10 | 0b00) => 72_000 * kbps / sample_rate + padding,
                                _ => 144_000 * kbps / sample_rate + padding,
                            };
                            assert_eq!(h.bit_rate, kbps * 1000, "header {word:08X}");
                            assert_eq!(h.sample_rate, sample_rate, "header {word:08X}");
                            assert_eq!(h.frame_len, expected, "header {word:08X}");
                            checked += 1;
                        }
                    }
                }
            }
        }
        assert_eq!(checked, 3 * 3 * 14 * 3 * 2);
        Ok(())
    }

    #[test]
    fn rejects_invalid_fields() {
        assert_eq!(
            FrameHeader::parse([0xFE, 0xFB, 0x90, 0x64]),
            Err(HeaderError::BadSync(0xFEFB))
        );
        assert_eq!(
            FrameHeader::parse([0xFF, 0x1B, 0x90, 0x64]),
            Err(HeaderError::BadSync(0xFF1B))
        );
        assert_eq!(header(0xEB, 0x90, 0x64), Err(HeaderError::ReservedVersion));
        assert_eq!(header(0xF9, 0x90, 0x64), Err(HeaderError::ReservedLayer));
        assert_eq!(header(0xFB, 0x00, 0x64), Err(HeaderError::BadBitRate(0)));
        assert_eq!(header(0xFB, 0xF0, 0x64), Err(HeaderError::BadBitRate(0xF)));
        assert_eq!(header(0xFB, 0x9C, 0x64), Err(HeaderError::BadSampleRate));
    }

    #[test]
    fn decodes_flag_bits() -> Result<(), HeaderError> {
        let h = header(0xFA, 0x93, 0x7E)?;
        assert!(!h.protection_absent);
        assert_eq!(h.crc_len(), 2);
        assert!(h.padding);
        assert!(h.private);
        assert_eq!(h.channel_mode, ChannelMode::JointStereo);
        assert_eq!(h.mode_extension, 3);
        assert!(h.copyright);
        assert!(h.original);
        assert_eq!(h.emphasis, Emphasis::Reserved);
        Ok(())
    }
}
