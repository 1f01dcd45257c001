use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::int_to_bytes;
use crate::Error;

/// Number of keys stored on this node, hash members included.
#[derive(Debug, PartialEq)]
pub struct KeyTotal {
    pub code: Code,
}

impl Executable for KeyTotal {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let total = engine.store().lock().len() as i64;

        let res = match self.code {
            Code::KeyTotal => Message::with_value(int_to_bytes(total)),
            _ => Message::with_ivalue(total),
        };

        Ok(Some(res))
    }
}

impl TryFrom<&mut CommandParser> for KeyTotal {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self {
            code: parser.code(),
        })
    }
}
