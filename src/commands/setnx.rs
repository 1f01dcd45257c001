use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::Pack;
use crate::Error;

/// Set `key` to hold `value` only if the key does not exist yet.
///
/// The reply value is a single byte, 1 when the value was stored and 0 otherwise. `SETNX` always
/// replies, `C_SETNX` only when `sync` is set.
#[derive(Debug, PartialEq)]
pub struct SetNx {
    pub code: Code,
    pub key: Bytes,
    pub value: Bytes,
    pub sync: bool,
}

impl Executable for SetNx {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let stored = {
            let mut store = engine.store().lock();
            let absent = !store.has(&self.key);
            if absent {
                store.set(self.key.clone(), self.value.clone());
            }
            absent
        };

        if stored {
            engine.replicate(self.key, Some(self.value));
        }

        let res = match self.code {
            Code::CSetNx if !self.sync => None,
            _ => Some(Message::with_value(stored.pack())),
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for SetNx {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;
        let value = parser.value();

        Ok(Self {
            code: parser.code(),
            key,
            value,
            sync: parser.sync(),
        })
    }
}
