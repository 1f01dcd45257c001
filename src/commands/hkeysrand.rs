use bytes::Bytes;
use rand::Rng;

use crate::commands::executable::Executable;
use crate::commands::{for_each_member, CommandParser};
use crate::engine::Engine;
use crate::message::Message;
use crate::record::ZRecord;
use crate::Error;

/// Members returned when the request does not carry a limit.
pub const DEFAULT_LIMIT: i64 = 100;

/// A random sample of at most `limit` member subkeys of the hash at `key`.
///
/// Every member gets a random score and the highest scores win. The whole hash is scanned.
#[derive(Debug, PartialEq)]
pub struct HKeysRand {
    pub key: Bytes,
    pub limit: i64,
}

impl Executable for HKeysRand {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        if self.limit < 1 {
            return Ok(Some(Message::with_list(vec![])));
        }

        let mut rng = rand::thread_rng();
        let mut records = Vec::new();

        for_each_member(&**engine.store().lock(), &self.key, &mut |subkey, _| {
            records.push(ZRecord::new(
                Bytes::copy_from_slice(subkey),
                rng.gen_range(0..i64::MAX),
            ));
            true
        });

        records.sort();
        records.truncate(usize::try_from(self.limit).unwrap_or(usize::MAX));

        let list = records.into_iter().map(|record| record.key).collect();
        Ok(Some(Message::with_list(list)))
    }
}

impl TryFrom<&mut CommandParser> for HKeysRand {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;
        let limit = if parser.has_int_value() {
            parser.int_value()
        } else {
            DEFAULT_LIMIT
        };

        Ok(Self { key, limit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::key::composite;
    use crate::message::Code;
    use crate::pack::Pack;
    use std::collections::HashSet;

    fn engine_with_members(count: usize) -> Engine {
        let engine = Engine::default();
        {
            let mut store = engine.store().lock();
            for i in 0..count {
                store.set(
                    composite(b"hash", Some(format!("m{i}").as_bytes())),
                    Bytes::from("x"),
                );
            }
        }
        engine
    }

    fn sample(engine: &Engine, limit: Option<i64>) -> Vec<Bytes> {
        let mut msg = Message::new(Code::CHKeysRand).key(composite(b"hash", None));
        if let Some(limit) = limit {
            msg = msg.value(limit.pack());
        }

        let res = Command::try_from(msg).unwrap().exec(engine).unwrap();
        res.unwrap().list
    }

    #[test]
    fn sample_is_a_bounded_subset() {
        let engine = engine_with_members(20);
        let members: HashSet<Bytes> = (0..20).map(|i| Bytes::from(format!("m{i}"))).collect();

        let picked = sample(&engine, Some(5));

        assert_eq!(picked.len(), 5);
        assert!(picked.iter().all(|key| members.contains(key)));
        assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 5);
    }

    #[test]
    fn small_hash_is_returned_whole() {
        let engine = engine_with_members(3);

        assert_eq!(sample(&engine, Some(10)).len(), 3);
        assert_eq!(sample(&engine, None).len(), 3);
    }

    #[test]
    fn default_limit() {
        let engine = engine_with_members(150);

        assert_eq!(sample(&engine, None).len(), DEFAULT_LIMIT as usize);
    }

    #[test]
    fn non_positive_limit() {
        let engine = engine_with_members(3);

        assert!(sample(&engine, Some(0)).is_empty());
    }
}
