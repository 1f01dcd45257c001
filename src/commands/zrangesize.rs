use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{for_each_member, CommandParser};
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::{bytes_to_int, int_to_bytes};
use crate::Error;

/// Counts the members of the sorted set at `key` scored within `[min, max]`.
#[derive(Debug, PartialEq)]
pub struct ZRangeSize {
    pub code: Code,
    pub key: Bytes,
    /// `(min, max)`
    pub bounds: Option<(i64, i64)>,
}

impl Executable for ZRangeSize {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let mut count = 0i64;

        if let Some((min, max)) = self.bounds.filter(|(min, max)| min <= max) {
            for_each_member(&**engine.store().lock(), &self.key, &mut |_, value| {
                if (min..=max).contains(&bytes_to_int(value)) {
                    count += 1;
                }
                true
            });
        }

        let res = match self.code {
            Code::ZRangeSize => Message::with_value(int_to_bytes(count)),
            _ => Message::with_ivalue(count),
        };

        Ok(Some(res))
    }
}

impl TryFrom<&mut CommandParser> for ZRangeSize {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.key()?;

        Ok(Self {
            code: parser.code(),
            key,
            bounds: parser.int_args().map(|[min, max]| (min, max)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::key::composite;
    use crate::pack::Pack;

    fn engine_with_scores() -> Engine {
        let engine = Engine::default();
        {
            let mut store = engine.store().lock();
            for i in 1..=9i64 {
                store.set(
                    composite(b"zset", Some(i.to_string().as_bytes())),
                    int_to_bytes(i * 11),
                );
            }
        }
        engine
    }

    fn zrange_size(code: Code, min: i64, max: i64) -> Option<Message> {
        let msg = Message::new(code)
            .key(composite(b"zset", None))
            .value((min, max).pack());

        Command::try_from(msg).unwrap().exec(&engine_with_scores()).unwrap()
    }

    #[test]
    fn counts_within_bounds() {
        assert_eq!(
            zrange_size(Code::CZRangeSize, 10, 60),
            Some(Message::with_ivalue(5))
        );
        assert_eq!(
            zrange_size(Code::CZRangeSize, 11, 11),
            Some(Message::with_ivalue(1))
        );
        assert_eq!(
            zrange_size(Code::ZRangeSize, 0, 100),
            Some(Message::with_value(int_to_bytes(9)))
        );
    }

    #[test]
    fn inverted_bounds() {
        assert_eq!(
            zrange_size(Code::CZRangeSize, 60, 10),
            Some(Message::with_ivalue(0))
        );
    }
}
