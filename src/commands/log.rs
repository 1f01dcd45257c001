use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::Message;
use crate::replication::APPLY;
use crate::Error;

/// A replication entry received from a primary. Applied verbatim, never replicated further and
/// never answered.
#[derive(Debug, PartialEq)]
pub struct Log {
    pub key: Bytes,
    pub value: Bytes,
    pub counter: i32,
}

impl Executable for Log {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        if self.counter != APPLY {
            return Ok(None);
        }

        let mut store = engine.store().lock();
        if self.value.is_empty() {
            store.del(&self.key);
        } else {
            store.set(self.key, self.value);
        }

        Ok(None)
    }
}

impl TryFrom<&mut CommandParser> for Log {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;
        let value = parser.value();

        Ok(Self {
            key,
            value,
            counter: parser.counter(),
        })
    }
}
