//! Bitstream reading over in-memory frame data.
//!
//! Thin wrapper around `bitstream_io` with bounds-checked reads, used for
//! the fixed-layout structures that live inside a frame payload (VBR tags,
//! protected side information).

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

use crate::utils::crc::{Crc16, crc16_bits};

const STACK_BUF_SIZE: usize = 256;

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        let avail = self.available()?;
        if n as u64 > avail {
            return Err(self.out_of_bounds("get_n", n as u64));
        }

        self.bs.read_unsigned_var(n)
    }

    /// Reads `buf.len()` whole bytes.
    #[inline(always)]
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let bits = (buf.len() as u64) << 3;
        if bits > self.available()? {
            return Err(self.out_of_bounds("get_bytes", bits));
        }

        self.bs.read_bytes(buf)
    }

    #[inline(always)]
    pub fn seek(&mut self, offset: i64) -> io::Result<u64> {
        if (offset < 0 && self.position()? as i64 + offset >= 0)
            || (offset >= 0 && self.available()? as i64 >= offset)
        {
            return self.bs.seek_bits(SeekFrom::Current(offset));
        }

        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "seek({}): out of bounds bits at {}",
                offset,
                self.position()?
            ),
        ))
    }

    /// Continues `checksum` over `len` bits starting at bit `start`, leaving
    /// the read position untouched.
    #[inline(always)]
    pub fn crc16_update(
        &mut self,
        crc: &Crc16,
        mut checksum: u16,
        start: u64,
        len: u64,
    ) -> io::Result<u16> {
        let position = self.position()?;

        if start + len > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "crc16_update: out of bounds bits",
            ));
        }

        self.bs.seek_bits(SeekFrom::Start(start))?;

        let prefix_len = ((8 - (start & 7)) & 7).min(len);
        let suffix_len = (len - prefix_len) & 7;
        let middle_len = len - prefix_len - suffix_len;

        if prefix_len != 0 {
            let prefix: u16 = self.bs.read_var(prefix_len as u32)?;
            checksum = crc16_bits(crc.poly, checksum, prefix, prefix_len as usize);
        }

        let bytes_len = (middle_len >> 3) as usize;
        if bytes_len <= STACK_BUF_SIZE {
            let mut stack_buf = [0u8; STACK_BUF_SIZE];
            let buf = &mut stack_buf[..bytes_len];
            self.bs.read_bytes(buf)?;
            checksum = crc.update(checksum, buf);
        } else {
            let mut heap_buf = vec![0; bytes_len];
            self.bs.read_bytes(&mut heap_buf)?;
            checksum = crc.update(checksum, &heap_buf);
        };

        if suffix_len != 0 {
            let suffix: u16 = self.bs.read_var(suffix_len as u32)?;
            checksum = crc16_bits(crc.poly, checksum, suffix, suffix_len as usize);
        }

        self.bs.seek_bits(SeekFrom::Start(position))?;

        Ok(checksum)
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        let avail = self.available()?;
        if n as u64 > avail {
            return Err(self.out_of_bounds("skip_n", n as u64));
        }

        self.bs.skip(n)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    #[cold]
    fn out_of_bounds(&mut self, op: &str, n: u64) -> io::Error {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "{}({}): out of bounds bits at {}",
                op,
                n,
                self.bs.position_in_bits().unwrap_or(0)
            ),
        )
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

#[test]
fn bounded_reads() -> io::Result<()> {
    let data = [0xA5u8, 0x0F, 0xF0];
    let mut bs = BsIoSliceReader::from_slice(&data);

    assert!(bs.get()?);
    assert_eq!(bs.get_n::<u8>(7)?, 0x25);
    bs.skip_n(4)?;
    assert_eq!(bs.get_n::<u16>(12)?, 0xFF0);
    assert_eq!(bs.available()?, 0);
    assert!(bs.get_n::<u8>(1).is_err());

    bs.seek(-24)?;
    let mut buf = [0u8; 2];
    bs.get_bytes(&mut buf)?;
    assert_eq!(buf, [0xA5, 0x0F]);
    Ok(())
}

#[test]
fn unaligned_crc_matches_bytewise() -> io::Result<()> {
    use crate::utils::crc::MPEG_FRAME_CRC;

    let data = [0x3Cu8, 0x12, 0x34, 0x56, 0x78];
    let mut bs = BsIoSliceReader::from_slice(&data);

    let whole = bs.crc16_update(&MPEG_FRAME_CRC, MPEG_FRAME_CRC.init, 8, 32)?;
    assert_eq!(whole, MPEG_FRAME_CRC.checksum(&data[1..]));

    // Same range split at a non-byte boundary.
    let head = bs.crc16_update(&MPEG_FRAME_CRC, MPEG_FRAME_CRC.init, 8, 13)?;
    let split = bs.crc16_update(&MPEG_FRAME_CRC, head, 21, 19)?;
    assert_eq!(split, whole);
    assert_eq!(bs.position()?, 0);
    Ok(())
}
