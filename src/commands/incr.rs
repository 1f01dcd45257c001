use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::{bytes_to_int, int_to_bytes};
use crate::Error;

/// Increments the integer stored at `key`; a missing key counts as 0.
///
/// `C_INC` adds `ivalue`, `INCBY` adds the integer packed in the value, `INC` and `INCR` add one.
/// Amounts that are not positive leave the counter unchanged.
#[derive(Debug, PartialEq)]
pub struct Incr {
    pub code: Code,
    pub key: Bytes,
    pub by: i64,
    pub sync: bool,
}

impl Executable for Incr {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let value = {
            let mut store = engine.store().lock();
            let mut value = store.get(&self.key).map_or(0, |v| bytes_to_int(&v));

            if self.by > 0 {
                value = value.saturating_add(self.by);
            }

            store.set(self.key.clone(), int_to_bytes(value));
            value
        };

        engine.replicate(self.key, Some(int_to_bytes(value)));

        let res = match self.code {
            Code::Incr => Some(Message::with_value(int_to_bytes(value))),
            Code::CInc if self.sync => Some(Message::with_ivalue(value)),
            _ => None,
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Incr {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;
        let by = match parser.code() {
            Code::CInc => parser.ivalue(),
            Code::IncBy => parser.int_value(),
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
