use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::key;
use crate::message::{Code, Message};
use crate::Error;

/// Deletes every member of the hash (or sorted set) at `key`, replicating each delete.
///
/// Shared by `HKILL`, `ZKILL` and their `C_` variants, which reply `ivalue = 1` when `sync` is set.
#[derive(Debug, PartialEq)]
pub struct HKill {
    pub code: Code,
    pub key: Bytes,
    pub sync: bool,
}

impl Executable for HKill {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let mut store = engine.store().lock();

        let mut members = Vec::new();
        store.for_each(&self.key, false, &mut |key, _| {
            if key::member(key, &self.key).is_some() {
                members.push(Bytes::copy_from_slice(key));
            }
            true
        });

        for member in members {
            store.del(&member);
            engine.replicate(member, None);
        }

        let reply = self.code.honours_sync() && self.sync;
        Ok(reply.then(|| Message::with_ivalue(1)))
    }
}

impl TryFrom<&mut CommandParser> for HKill {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;

        Ok(Self {
            code: parser.code(),
            key,
            sync: parser.sync(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::key::composite;
    use crate::replication::Replicator;
    use crate::store::Store;

    #[test]
    fn removes_members_only() {
        let (replicator, mut log) = Replicator::channel();
        let engine = Engine::new(Store::memory(), replicator);
        {
            let mut store = engine.store().lock();
            store.set(composite(b"hash", None), Bytes::from("bare"));
            store.set(composite(b"hash", Some(b"a")), Bytes::from("1"));
            store.set(composite(b"hash", Some(b"b")), Bytes::from("2"));
            store.set(composite(b"hashy", Some(b"a")), Bytes::from("3"));
        }

        let msg = Message::new(Code::CHKill)
            .key(composite(b"hash", None))
            .sync(true);
        let res = Command::try_from(msg).unwrap().exec(&engine).unwrap();

        assert_eq!(res, Some(Message::with_ivalue(1)));

        let store = engine.store().lock();
        assert_eq!(store.len(), 2);
        assert!(store.has(&composite(b"hash", None)));
        assert!(store.has(&composite(b"hashy", Some(b"a"))));

        let deleted: Vec<Bytes> = std::iter::from_fn(|| log.try_recv().ok())
            .map(|entry| entry.key)
            .collect();
        assert_eq!(
            deleted,
            vec![composite(b"hash", Some(b"a")), composite(b"hash", Some(b"b"))]
        );
    }

    #[test]
    fn legacy_zkill_has_no_reply() {
        let engine = Engine::default();
        engine
            .store()
            .lock()
            .set(composite(b"zset", Some(b"a")), Bytes::from("1"));

        let msg = Message::new(Code::ZKill)
            .key(composite(b"zset", None))
            .sync(true);
        let res = Command::try_from(msg).unwrap().exec(&engine).unwrap();

        assert_eq!(res, None);
        assert!(engine.store().lock().is_empty());
    }
}
