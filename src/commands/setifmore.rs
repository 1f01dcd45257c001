use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::Message;
use crate::pack::{bytes_to_int, int_to_bytes};
use crate::Error;

/// Raises the integer at `key` to `value` if `value` is greater. Replies with the resulting
/// integer when `sync` is set.
#[derive(Debug, PartialEq)]
pub struct SetIfMore {
    pub key: Bytes,
    pub value: i64,
    pub sync: bool,
}

impl Executable for SetIfMore {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let (current, stored) = {
            let mut store = engine.store().lock();
            let existing = store.get(&self.key).map(|v| bytes_to_int(&v));
            let current = existing.unwrap_or(0);

            if self.value > current {
                store.set(self.key.clone(), int_to_bytes(self.value));
                (self.value, true)
            } else {
                (current, existing.is_some())
            }
        };

        // The replica gets the current maximum even when nothing changed, which repairs a replica
        // that missed an earlier entry.
        if stored {
            engine.replicate(self.key, Some(int_to_bytes(current)));
        }

        Ok(self.sync.then(|| Message::with_ivalue(current)))
    }
}

impl TryFrom<&mut CommandParser> for SetIfMore {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;

        Ok(Self {
            key,
            value: parser.ivalue(),
            sync: parser.sync(),
        })
    }
}
