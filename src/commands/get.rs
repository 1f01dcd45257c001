use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::bytes_to_int;
use crate::Error;

/// Get the value of `key`. A missing key replies with an empty value; `C_GETINT` replies with the
/// value decoded as an integer instead.
#[derive(Debug, PartialEq)]
pub struct Get {
    pub code: Code,
    pub key: Bytes,
}

impl Executable for Get {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let value = engine.store().lock().get(&self.key).unwrap_or_default();

        let res = match self.code {
            Code::CGetInt => Message::with_ivalue(bytes_to_int(&value)),
            _ => Message::with_value(value),
        };

        Ok(Some(res))
    }
}

impl TryFrom<&mut CommandParser> for Get {
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
    use crate::pack::int_to_bytes;

    #[test]
    fn existing_key() {
        let msg = Message::new(Code::CGet).key(composite(b"key1", None));
        let cmd = Command::try_from(msg).unwrap();

        assert_eq!(
            cmd,
            Command::Get(Get {
                code: Code::CGet,
                key: composite(b"key1", None)
            })
        );

        let engine = Engine::default();
        engine
            .store()
            .lock()
            .set(composite(b"key1", None), Bytes::from("1"));

        let res = cmd.exec(&engine).unwrap();

        assert_eq!(res, Some(Message::with_value(Bytes::from("1"))));
    }

    #[test]
    fn missing_key() {
        let engine = Engine::default();

        let msg = Message::new(Code::Get).key(composite(b"key1", None));
        let res = Command::try_from(msg).unwrap().exec(&engine).unwrap();

        assert_eq!(res, Some(Message::with_value(Bytes::new())));
    }

    #[test]
    fn integer_value() {
        let engine = Engine::default();
        engine
            .store()
            .lock()
            .set(composite(b"counter", None), int_to_bytes(42));

        let msg = Message::new(Code::CGetInt).key(composite(b"counter", None));
        let res = Command::try_from(msg).unwrap().exec(&engine).unwrap();
        assert_eq!(res, Some(Message::with_ivalue(42)));

        let msg = Message::new(Code::CGetInt).key(composite(b"missing", None));
        let res = Command::try_from(msg).unwrap().exec(&engine).unwrap();
        assert_eq!(res, Some(Message::with_ivalue(0)));
    }
}
