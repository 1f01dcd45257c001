use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::Pack;
use crate::Error;

#[derive(Debug, PartialEq)]
pub struct Has {
    pub code: Code,
    pub key: Bytes,
}

impl Executable for Has {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let found = engine.store().lock().has(&self.key);

        let res = match self.code {
            Code::CHas => Message::with_ivalue(i64::from(found)),
            _ => Message::with_value(found.pack()),
        };

        Ok(Some(res))
    }
}

impl TryFrom<&mut CommandParser> for Has {
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

    fn has(code: Code, key: &[u8]) -> Command {
        Command::try_from(Message::new(code).key(composite(key, None))).unwrap()
    }

    #[test]
    fn reply_shapes() {
        let engine = Engine::default();
        engine
            .store()
            .lock()
            .set(composite(b"key1", None), Bytes::from("1"));

        assert_eq!(
            has(Code::CHas, b"key1").exec(&engine).unwrap(),
            Some(Message::with_ivalue(1))
        );
        assert_eq!(
            has(Code::CHas, b"key2").exec(&engine).unwrap(),
            Some(Message::with_ivalue(0))
        );
        assert_eq!(
            has(Code::Has, b"key1").exec(&engine).unwrap(),
            Some(Message::with_value(Bytes::from_static(&[1])))
        );
        assert_eq!(
            has(Code::Has, b"key2").exec(&engine).unwrap(),
            Some(Message::with_value(Bytes::from_static(&[0])))
        );
    }
}
