//! Byte encodings for values and integer arguments.
//!
//! Integers are 8-byte big-endian so that packed integer subkeys sort numerically for
//! non-negative values. Byte strings are stored verbatim.

use bytes::{BufMut, Bytes, BytesMut};

const INT_LEN: usize = 8;

/// Anything that can be turned into a stored value or packed argument list.
pub trait Pack {
    fn pack_into(&self, dst: &mut BytesMut);

    fn pack(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.pack_into(&mut dst);
        dst.freeze()
    }
}

impl Pack for i64 {
    fn pack_into(&self, dst: &mut BytesMut) {
        dst.put_i64(*self);
    }
}

impl Pack for bool {
    fn pack_into(&self, dst: &mut BytesMut) {
        dst.put_u8(u8::from(*self));
    }
}

impl Pack for [u8] {
    fn pack_into(&self, dst: &mut BytesMut) {
        dst.put_slice(self);
    }
}

impl<const N: usize> Pack for [u8; N] {
    fn pack_into(&self, dst: &mut BytesMut) {
        dst.put_slice(self);
    }
}

impl Pack for Vec<u8> {
    fn pack_into(&self, dst: &mut BytesMut) {
        dst.put_slice(self);
    }
}

impl Pack for Bytes {
    fn pack_into(&self, dst: &mut BytesMut) {
        dst.put_slice(self);
    }
}

impl Pack for str {
    fn pack_into(&self, dst: &mut BytesMut) {
        dst.put_slice(self.as_bytes());
    }
}

impl Pack for String {
    fn pack_into(&self, dst: &mut BytesMut) {
        dst.put_slice(self.as_bytes());
    }
}

impl<T: Pack + ?Sized> Pack for &T {
    fn pack_into(&self, dst: &mut BytesMut) {
        (**self).pack_into(dst);
    }
}

impl<A: Pack, B: Pack> Pack for (A, B) {
    fn pack_into(&self, dst: &mut BytesMut) {
        self.0.pack_into(dst);
        self.1.pack_into(dst);
    }
}

impl<A: Pack, B: Pack, C: Pack, D: Pack> Pack for (A, B, C, D) {
    fn pack_into(&self, dst: &mut BytesMut) {
        self.0.pack_into(dst);
        self.1.pack_into(dst);
        self.2.pack_into(dst);
        self.3.pack_into(dst);
    }
}

pub fn int_to_bytes(value: i64) -> Bytes {
    value.pack()
}

/// Decodes the integer at the start of `bytes`, or 0 when fewer than eight bytes are present.
pub fn bytes_to_int(bytes: &[u8]) -> i64 {
    bytes
        .get(..INT_LEN)
        .and_then(|head| head.try_into().ok())
        .map(i64::from_be_bytes)
        .unwrap_or(0)
}

/// Decodes a packed list of integers. Anything but a non-empty multiple of eight bytes is `None`.
pub fn bytes_to_int_list(bytes: &[u8]) -> Option<Vec<i64>> {
    if bytes.is_empty() || bytes.len() % INT_LEN != 0 {
        return None;
    }

    Some(bytes.chunks_exact(INT_LEN).map(bytes_to_int).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(&int_to_bytes(1)[..], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(bytes_to_int(&int_to_bytes(-42)), -42);
        assert_eq!(bytes_to_int(&int_to_bytes(i64::MAX)), i64::MAX);
        assert_eq!(bytes_to_int(b""), 0);
        assert_eq!(bytes_to_int(b"short"), 0);
    }

    #[test]
    fn integer_lists() {
        let packed = (10i64, 3i64).pack();
        assert_eq!(bytes_to_int_list(&packed), Some(vec![10, 3]));

        let packed = (1i64, 2i64, -5i64, 7i64).pack();
        assert_eq!(bytes_to_int_list(&packed), Some(vec![1, 2, -5, 7]));

        assert_eq!(bytes_to_int_list(b""), None);
        assert_eq!(bytes_to_int_list(&[0; 12]), None);
    }

    #[test]
    fn byte_strings_and_tuples() {
        assert_eq!("abc".pack(), Bytes::from("abc"));
        assert_eq!(true.pack(), Bytes::from_static(&[1]));
        assert_eq!(false.pack(), Bytes::from_static(&[0]));

        let packed = (7i64, "x").pack();
        assert_eq!(packed.len(), 9);
        assert_eq!(bytes_to_int(&packed), 7);
        assert_eq!(packed[8], b'x');
    }
}
