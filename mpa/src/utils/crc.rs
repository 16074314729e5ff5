//! CRC-16 used by MPEG audio frames that carry error protection.
//!
//! When the protection bit of a header is cleared, the two bytes following
//! the header hold a CRC-16 (polynomial 0x8005, initial value 0xFFFF, MSB
//! first, no reflection) over the last two header bytes and the side
//! information that follows the checksum.

/// CRC algorithm specification with polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16 algorithm for MPEG audio frame protection.
pub const CRC_MPEG_FRAME_ALG: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0xFFFF,
};

/// Feeds the `len` low bits of `value` into `crc`, most significant bit first.
#[inline(always)]
pub const fn crc16_bits(poly: u16, mut crc: u16, value: u16, len: usize) -> u16 {
    let mut i = len;
    while i > 0 {
        i -= 1;
        let bit = (value >> i) & 1;
        let top = (crc >> 15) ^ bit;
        crc <<= 1;
        if top != 0 {
            crc ^= poly;
        }
    }

    crc
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16_bits(poly, 0, i as u16, 8);
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = self.table_entry((crc >> 8) ^ bytes[i] as u16) ^ (crc << 8);
            i += 1;
        }

        crc
    }

    #[inline(always)]
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

/// Shared table for frame CRC checks.
pub static MPEG_FRAME_CRC: Crc16 = Crc16::new(&CRC_MPEG_FRAME_ALG);

#[test]
fn check_value() {
    assert_eq!(MPEG_FRAME_CRC.checksum(b"123456789"), 0xAEE7);
}

#[test]
fn bitwise_matches_table() {
    let data = [0x12u8, 0x34, 0xAB, 0xCD, 0x00, 0xFF];
    let mut crc = MPEG_FRAME_CRC.init;
    for byte in data {
        crc = crc16_bits(MPEG_FRAME_CRC.poly, crc, byte as u16, 8);
    }
    assert_eq!(crc, MPEG_FRAME_CRC.checksum(&data));
}
