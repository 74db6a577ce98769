//! ## Endianness Module
//! This module provides some structs to better resolve the data in specific endianness rules
//!
//! All the types declared here implements [EndianData<T>],
//! which defines [EndianData<T>::value] function to parse the data into the endianness of the current arch

///[u32] in Big Endianness
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigEndian32(u32);

///[u64] in Big Endianness
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigEndian64(u64);

/// This trait defines a packed data in memory with some specific endianness.
pub trait EndianData<T>: Copy + Clone {
    /// Parse the value into the endianness of the current architecture.
    fn value(&self) -> T;

    /// Store a native value in this endianness.
    fn from_value(value: T) -> Self;
}

/// Implement an [EndianData<T>] for a specific type, and explain the data in big endianess
macro_rules! impl_converter_big {
    ($type: tt, $tval: tt) => {
        impl EndianData<$tval> for $type {
            #[inline(always)]
            fn value(&self) -> $tval {
                $tval::from_be(self.0)
            }
            #[inline(always)]
            fn from_value(value: $tval) -> Self {
                $type(value.to_be())
            }
        }

        impl $type {
            /// Decode from the first bytes of `bytes`, `None` if it is too short.
            pub fn read_from(bytes: &[u8]) -> Option<$tval> {
                let raw = bytes.get(..size_of::<$tval>())?;
                Some($tval::from_be_bytes(raw.try_into().ok()?))
            }
        }
    };
}

impl_converter_big!(BigEndian32, u32);
impl_converter_big!(BigEndian64, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_words_decode_from_memory_order() {
        let raw = [0xd0, 0x0d, 0xfe, 0xed, 0x00];
        assert_eq!(BigEndian32::read_from(&raw), Some(0xd00dfeed));
        assert_eq!(BigEndian32::read_from(&raw[2..]), None);
        assert_eq!(BigEndian32::from_value(0x11223344).value(), 0x11223344);
    }
}
