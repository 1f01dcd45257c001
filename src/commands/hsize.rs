use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{for_each_member, CommandParser};
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::int_to_bytes;
use crate::Error;

/// Number of members in the hash at `key`.
#[derive(Debug, PartialEq)]
pub struct HSize {
    pub code: Code,
    pub key: Bytes,
}

impl Executable for HSize {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let mut count = 0i64;

        for_each_member(&**engine.store().lock(), &self.key, &mut |_, _| {
            count += 1;
            true
        });

        let res = match self.code {
            Code::HKeysTotal => Message::with_value(int_to_bytes(count)),
            _ => Message::with_ivalue(count),
        };

        Ok(Some(res))
    }
}

impl TryFrom<&mut CommandParser> for HSize {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;

        Ok(Self {
            code: parser.code(),
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::key::composite;

    #[test]
    fn counts_members_only() {
        let engine = Engine::default();
        {
            let mut store = engine.store().lock();
            store.set(composite(b"hash", None), Bytes::from("bare"));
            store.set(composite(b"hash", Some(b"a")), Bytes::from("1"));
            store.set(composite(b"hash", Some(b"b")), Bytes::from("2"));
            store.set(composite(b"other", Some(b"a")), Bytes::from("3"));
        }

        let msg = Message::new(Code::CHSize).key(composite(b"hash", None));
        let res = Command::try_from(msg).unwrap().exec(&engine).unwrap();
        assert_eq!(res, Some(Message::with_ivalue(2)));

        let msg = Message::new(Code::HKeysTotal).key(composite(b"hash", None));
        let res = Command::try_from(msg).unwrap().exec(&engine).unwrap();
        assert_eq!(res, Some(Message::with_value(int_to_bytes(2))));
    }
}
