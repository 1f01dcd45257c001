use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::Pack;
use crate::Error;

/// Removes `key`.
///
/// `DEL` never replies and `DELR` replies whether the key existed. `C_DEL` with `sync` replies
/// `ivalue = 1` if the key existed and 0 otherwise.
#[derive(Debug, PartialEq)]
pub struct Del {
    pub code: Code,
    pub key: Bytes,
    pub sync: bool,
}

impl Executable for Del {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let existed = {
            let mut store = engine.store().lock();
            let existed = store.has(&self.key);
            if existed {
                store.del(&self.key);
            }
            existed
        };

        // Deletes replicate even when the key was already absent here.
        engine.replicate(self.key, None);

        let res = match self.code {
            Code::DelR => Some(Message::with_value(existed.pack())),
            Code::CDel if self.sync => Some(Message::with_ivalue(i64::from(existed))),
            _ => None,
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Del {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;

        Ok(Self {
            code: parser.code(),
            key,
            sync: parser.sync(),
        })
    }
}
