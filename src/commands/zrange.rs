use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{for_each_member, CommandParser};
use crate::engine::Engine;
use crate::message::Message;
use crate::pack::{bytes_to_int, int_to_bytes};
use crate::record::ZRecord;
use crate::Error;

/// Arguments packed in the value of a `ZRANGE` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZRangeArgs {
    pub limit: i64,
    pub offset: i64,
    pub min: i64,
    pub max: i64,
}

/// Members of the sorted set at `key` scored within `[min, max]`, highest score first, ties by
/// ascending key, paginated. Replies `[subkey, score, ...]`.
#[derive(Debug, PartialEq)]
pub struct ZRange {
    pub key: Bytes,
    pub args: Option<ZRangeArgs>,
}

impl Executable for ZRange {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let Some(args) = self
            .args
            .filter(|args| args.limit >= 1 && args.min <= args.max)
        else {
            return Ok(Some(Message::with_list(vec![])));
        };

        let mut records = Vec::new();

        for_each_member(&**engine.store().lock(), &self.key, &mut |subkey, value| {
            let score = bytes_to_int(value);
            if (args.min..=args.max).contains(&score) {
                records.push(ZRecord::new(Bytes::copy_from_slice(subkey), score));
            }
            true
        });

        records.sort();

        let offset = usize::try_from(args.offset).unwrap_or(0);
        let limit = usize::try_from(args.limit).unwrap_or(usize::MAX);

        let list = records
            .into_iter()
            .skip(offset)
            .take(limit)
            .flat_map(|record| [record.key, int_to_bytes(record.score)])
            .collect();

        Ok(Some(Message::with_list(list)))
    }
}

impl TryFrom<&mut CommandParser> for ZRange {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;
        let args = parser
            .int_args()
            .map(|[limit, offset, min, max]| ZRangeArgs {
                limit,
                offset,
                min,
                max,
            });

        Ok(Self { key, args })
    }
}
