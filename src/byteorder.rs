//! Byte serialization used for file headers.

pub trait WriteBytesLe {
    fn write_le(&self, dst: &mut Vec<u8>);
}

macro_rules! impl_num_le {
    ($($t:ty),+) => { $(
        impl WriteBytesLe for $t { #[inline] fn write_le(&self, dst: &mut Vec<u8>) { dst.extend_from_slice(&self.to_le_bytes()); }}
    )+ }
}

impl_num_le!(u8, u16, u32);

impl<T: WriteBytesLe, const N: usize> WriteBytesLe for [T; N] {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }
}

/// Concatenates the little-endian encodings of each value.
#[macro_export]
macro_rules! join_bytes_le {
    ( $($value:expr),+ $(,)? ) => {{
        let mut vec = Vec::<u8>::new();
        $( $crate::byteorder::WriteBytesLe::write_le(&$value, &mut vec); )+
        vec
    }};
}

pub use join_bytes_le;

#[cfg(test)]
mod tests {
    use crate::byteorder::WriteBytesLe;
    use mpad_macros::ToBytes;

    #[derive(ToBytes)]
    struct ChunkHeader {
        id: [u8; 4],
        size: u32,
        tag: u16,
    }

    #[test]
    fn derived_fields_follow_declaration_order() {
        let header = ChunkHeader {
            id: *b"data",
            size: 0x0001_0203,
            tag: 0xABCD,
        };

        let mut le = Vec::new();
        header.write_le(&mut le);

        assert_eq!(le, [b'd', b'a', b't', b'a', 0x03, 0x02, 0x01, 0x00, 0xCD, 0xAB]);
    }

    #[test]
    fn join_mixes_widths() {
        let bytes = join_bytes_le!(*b"RIFF", 36u32, 1u16);
        assert_eq!(bytes, [b'R', b'I', b'F', b'F', 36, 0, 0, 0, 1, 0]);
    }
}
