use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::int_to_bytes;
use crate::Error;

/// Stores `value` under `key`. An empty value deletes the key, the same way a replica applies it.
///
/// `SET` never replies, `SETR` always replies with the integer 1 as its value and `C_SET` replies
/// `ivalue = 1` when `sync` is set.
#[derive(Debug, PartialEq)]
pub struct Set {
    pub code: Code,
    pub key: Bytes,
    pub value: Bytes,
    pub sync: bool,
}

impl Executable for Set {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        {
            let mut store = engine.store().lock();
            if self.value.is_empty() {
                store.del(&self.key);
            } else {
                store.set(self.key.clone(), self.value.clone());
            }
        }

        let value = Some(self.value).filter(|value| !value.is_empty());
        engine.replicate(self.key, value);

        let res = match self.code {
            Code::SetR => Some(Message::with_value(int_to_bytes(1))),
            Code::CSet if self.sync => Some(Message::with_ivalue(1)),
            _ => None,
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Set {
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
