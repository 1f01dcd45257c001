use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{for_each_member, CommandParser};
use crate::engine::Engine;
use crate::message::Message;
use crate::Error;

/// Every member of the hash at `key` with its value, flattened as `[subkey, value, ...]` in key
/// order.
#[derive(Debug, PartialEq)]
pub struct HAll {
    pub key: Bytes,
}

impl Executable for HAll {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let mut list = Vec::new();

        for_each_member(&**engine.store().lock(), &self.key, &mut |subkey, value| {
            list.push(Bytes::copy_from_slice(subkey));
            list.push(Bytes::copy_from_slice(value));
            true
        });

        Ok(Some(Message::with_list(list)))
    }
}

impl TryFrom<&mut CommandParser> for HAll {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;

        Ok(Self { key })
    }
}
