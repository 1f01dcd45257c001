use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{for_each_member, CommandParser};
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::Error;

/// One page of the member subkeys of the hash at `key`, in key order.
///
/// The value packs `(limit, offset)`: `offset` members are skipped, then at most `limit` are
/// returned. A malformed argument list or `limit <= 0` yields an empty page. The legacy `HKEYS`
/// code carries no arguments and always replies with an empty list.
#[derive(Debug, PartialEq)]
pub struct HKeys {
    pub key: Bytes,
    /// `(limit, offset)`
    pub page: Option<(i64, i64)>,
}

impl Executable for HKeys {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let Some((limit, offset)) = self.page.filter(|(limit, _)| *limit > 0) else {
            return Ok(Some(Message::with_list(vec![])));
        };

        let mut list = Vec::new();
        let mut skipped = 0;

        for_each_member(&**engine.store().lock(), &self.key, &mut |subkey, _| {
            if skipped < offset {
                skipped += 1;
                return true;
            }

            list.push(Bytes::copy_from_slice(subkey));
            (list.len() as i64) < limit
        });

        Ok(Some(Message::with_list(list)))
    }
}

impl TryFrom<&mut CommandParser> for HKeys {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;
        let page = match parser.code() {
            Code::HKeys => None,
            _ => parser.int_args().map(|[limit, offset]| (limit, offset)),
        };

        Ok(Self { key, page })
    }
}
