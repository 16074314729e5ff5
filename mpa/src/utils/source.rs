//! Byte sources for compressed streams.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::utils::errors::StreamError;

/// A readable stream of compressed bytes that may also support seeking.
///
/// Seeking support and a known length are what make prescan, random access
/// and total length available on a session. Sources that cannot seek are
/// still playable front to back.
pub trait ByteSource: Read + Seek {
    /// Returns whether the source can be repositioned.
    fn is_seekable(&self) -> bool;

    /// Returns the total length of the source in bytes, if known.
    fn byte_len(&self) -> Option<u64>;
}

impl ByteSource for File {
    fn is_seekable(&self) -> bool {
        // Pipes and character devices report as files but cannot seek.
        match self.metadata() {
            Ok(metadata) => metadata.is_file(),
            _ => false,
        }
    }

    fn byte_len(&self) -> Option<u64> {
        match self.metadata() {
            Ok(metadata) if metadata.is_file() => Some(metadata.len()),
            _ => None,
        }
    }
}

impl<T: AsRef<[u8]>> ByteSource for io::Cursor<T> {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.get_ref().as_ref().len() as u64)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn byte_len(&self) -> Option<u64> {
        (**self).byte_len()
    }
}

/// Wraps any [`Read`]er as a forward-only [`ByteSource`].
#[derive(Debug)]
pub struct ReadOnlySource<R: Read> {
    inner: R,
}

impl<R: Read> ReadOnlySource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for ReadOnlySource<R> {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

impl<R: Read> Read for ReadOnlySource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Seek for ReadOnlySource<R> {
    fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "source does not support seeking",
        ))
    }
}

/// Buffered cursor over a [`ByteSource`] that tracks the absolute byte
/// position of everything consumed so far.
#[derive(Debug)]
pub struct SourceCursor<S: ByteSource> {
    inner: BufReader<S>,
    pos: u64,
    seekable: bool,
    len: Option<u64>,
}

impl<S: ByteSource> SourceCursor<S> {
    pub fn new(mut source: S) -> io::Result<Self> {
        let seekable = source.is_seekable();
        let len = if seekable { source.byte_len() } else { None };
        let pos = if seekable { source.stream_position()? } else { 0 };

        Ok(Self {
            inner: BufReader::with_capacity(64 * 1024, source),
            pos,
            seekable,
            len,
        })
    }

    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline(always)]
    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    #[inline(always)]
    pub fn byte_len(&self) -> Option<u64> {
        self.len
    }

    /// Reads one byte, or `None` at end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.pos += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Fills as much of `buf` as the source allows. A short count means the
    /// source is exhausted.
    pub fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        self.pos += filled as u64;
        Ok(filled)
    }

    /// Advances by up to `n` bytes and returns how many were actually passed.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        if self.seekable {
            let n = match self.len {
                Some(len) => n.min(len.saturating_sub(self.pos)),
                None => n,
            };
            self.inner.seek_relative(n as i64)?;
            self.pos += n;
            return Ok(n);
        }

        let skipped = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        self.pos += skipped;
        Ok(skipped)
    }

    /// Repositions to an absolute byte offset.
    pub fn seek_to(&mut self, pos: u64) -> Result<(), StreamError> {
        if !self.seekable {
            return Err(StreamError::Unseekable("seek"));
        }

        if pos != self.pos {
            self.inner.seek(SeekFrom::Start(pos))?;
            self.pos = pos;
        }
        Ok(())
    }
}
