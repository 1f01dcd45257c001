use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::{bytes_to_int, int_to_bytes};
use crate::Error;

/// Decrements the integer stored at `key`, never going below zero.
///
/// The amount is read the same way as for [`super::incr::Incr`].
#[derive(Debug, PartialEq)]
pub struct Decr {
    pub code: Code,
    pub key: Bytes,
    pub by: i64,
    pub sync: bool,
}

impl Executable for Decr {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let value = {
            let mut store = engine.store().lock();
            let mut value = store.get(&self.key).map_or(0, |v| bytes_to_int(&v));

            if self.by > 0 {
                value = value.saturating_sub(self.by).max(0);
            }

            store.set(self.key.clone(), int_to_bytes(value));
            value
        };

        engine.replicate(self.key, Some(int_to_bytes(value)));

        let res = match self.code {
            Code::Decr => Some(Message::with_value(int_to_bytes(value))),
            Code::CDec if self.sync => Some(Message::with_ivalue(value)),
            _ => None,
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Decr {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;
        let by = match parser.code() {
            Code::CDec => parser.ivalue(),
            Code::DecBy => parser.int_value(),
            _ => 1,
        };

        Ok(Self {
            code: parser.code(),
            key,
            by,
            sync: parser.sync(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::key::composite;

    fn command(code: Code, by: i64) -> Command {
        let msg = Message::new(code)
            .key(composite(b"key1", None))
            .ivalue(by)
            .value(int_to_bytes(by))
            .sync(true);

        Command::try_from(msg).unwrap()
    }

    #[test]
    fn existing_key() {
        let engine = Engine::default();
        engine
            .store()
            .lock()
            .set(composite(b"key1", None), int_to_bytes(10));

        assert_eq!(
            command(Code::CDec, 3).exec(&engine).unwrap(),
            Some(Message::with_ivalue(7))
        );
    }

    #[test]
    fn clamps_at_zero() {
        let engine = Engine::default();

        assert_eq!(
            command(Code::CDec, 1).exec(&engine).unwrap(),
            Some(Message::with_ivalue(0))
        );

        command(Code::CInc, 2).exec(&engine).unwrap();
        assert_eq!(
            command(Code::CDec, 5).exec(&engine).unwrap(),
            Some(Message::with_ivalue(0))
        );

        command(Code::DecBy, 100).exec(&engine).unwrap();
        assert_eq!(
            engine.store().lock().get(&composite(b"key1", None)),
            Some(int_to_bytes(0))
        );
    }

    #[test]
    fn legacy_variants() {
        let engine = Engine::default();
        engine
            .store()
            .lock()
            .set(composite(b"key1", None), int_to_bytes(3));

        assert_eq!(command(Code::Dec, 0).exec(&engine).unwrap(), None);
        assert_eq!(
            command(Code::Decr, 0).exec(&engine).unwrap(),
            Some(Message::with_value(int_to_bytes(1)))
        );
    }
}
