//! Composite keys: `[1 + len(primary)][primary][subkey]`.
//!
//! The leading byte records where the primary key ends, so the primary key (which decides the
//! owning node) can always be recovered, even from a key with a subkey appended. All members of a
//! hash share the prefix produced by [`composite`] with no subkey.

use bytes::{BufMut, Bytes, BytesMut};

/// Upper bound on a composite key. Longer keys are truncated, never rejected.
pub const MAX_KEY_LEN: usize = 512;

/// Longest primary key whose length still fits the one-byte prefix.
pub const MAX_PRIMARY_LEN: usize = u8::MAX as usize - 1;

/// The part of a primary key that is stored, and therefore the part that picks the owning node.
pub fn route_key(primary: &[u8]) -> &[u8] {
    &primary[..primary.len().min(MAX_PRIMARY_LEN)]
}

/// Builds the composite key for `primary` and an optional `subkey`.
///
/// Primary keys longer than [`MAX_PRIMARY_LEN`] are truncated so that the prefix byte stays
/// accurate.
pub fn composite(primary: &[u8], subkey: Option<&[u8]>) -> Bytes {
    let primary = route_key(primary);
    let subkey = subkey.unwrap_or_default();

    let mut key = BytesMut::with_capacity((1 + primary.len() + subkey.len()).min(MAX_KEY_LEN));
    key.put_u8((1 + primary.len()) as u8);
    key.put_slice(primary);
    key.put_slice(subkey);
    key.truncate(MAX_KEY_LEN);

    key.freeze()
}

/// Recovers the primary key. `None` for an empty key or one whose prefix byte points past its end.
pub fn primary(composite: &[u8]) -> Option<&[u8]> {
    let end = usize::from(*composite.first()?);
    if end == 0 {
        return None;
    }

    composite.get(1..end)
}

/// Returns the subkey part of a member key below `prefix`, if the key really is a member.
pub fn member<'a>(key: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    key.strip_prefix(prefix).filter(|subkey| !subkey.is_empty())
}
