use snafu::{ensure, Snafu};

use crate::{byte_array_type_define, byte_array_type_impl_base32_str};

byte_array_type_define!(
    /// A user id
    ///
    /// Logically a byte string of up to 32 bytes with lexicographic
    /// ordering; stored right-aligned in a fixed 32-byte array so that the
    /// encoded form sorts the same way and composes into fixed-offset
    /// database keys.
    struct Fid, 32
);
byte_array_type_impl_base32_str!(Fid);

#[derive(Debug, Snafu)]
#[snafu(display("fid is {len} bytes, over the 32 byte limit"))]
pub struct FidTooLongError {
    len: usize,
}

impl Fid {
    /// Build a fid from its variable-length byte form, left-padding with
    /// zeros.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, FidTooLongError> {
        ensure!(bytes.len() <= Self::LEN, FidTooLongSnafu { len: bytes.len() });
        let mut padded = [0u8; Self::LEN];
        padded[Self::LEN - bytes.len()..].copy_from_slice(bytes);
        Ok(Self(padded))
    }
}

impl From<u64> for Fid {
    fn from(value: u64) -> Self {
        Self::try_from_slice(&value.to_be_bytes()).expect("8 bytes always fit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fid_padding_preserves_numeric_order() {
        let small = Fid::from(3u64);
        let large = Fid::from(0x1_0000u64);

        assert!(small < large);
        assert_eq!(small, Fid::try_from_slice(&[3]).expect("fits"));
    }

    #[test]
    fn fid_rejects_overlong_input() {
        assert!(Fid::try_from_slice(&[0xff; 33]).is_err());
        assert!(Fid::try_from_slice(&[0xff; 32]).is_ok());
    }
}
