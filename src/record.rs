use bytes::Bytes;
use std::cmp::Ordering;

/// A hash member together with its stored value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub key: Bytes,
    pub value: Bytes,
}

/// A sorted-set member and its score.
///
/// Records order by descending score; equal scores fall back to ascending key bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZRecord {
    pub key: Bytes,
    pub score: i64,
}

impl ZRecord {
    pub fn new(key: impl Into<Bytes>, score: i64) -> ZRecord {
        ZRecord {
            key: key.into(),
            score,
        }
    }
}

impl Ord for ZRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for ZRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
