use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::{Code, Message};
use crate::pack::{bytes_to_int, int_to_bytes};
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitOp {
    And,
    AndNot,
    Or,
    Xor,
}

impl BitOp {
    pub fn apply(self, current: i64, operand: i64) -> i64 {
        match self {
            BitOp::And => current & operand,
            BitOp::AndNot => current & !operand,
            BitOp::Or => current | operand,
            BitOp::Xor => current ^ operand,
        }
    }
}

/// Combines the integer stored at `key` with an operand and stores the result.
///
/// The `C_BIT*` codes take the operand from `ivalue` and reply with the result when `sync` is set.
/// The legacy codes take it from the packed value and never reply.
#[derive(Debug, PartialEq)]
pub struct Bit {
    pub code: Code,
    pub key: Bytes,
    pub op: BitOp,
    pub operand: i64,
    pub sync: bool,
}

impl Executable for Bit {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        let value = {
            let mut store = engine.store().lock();
            let current = store.get(&self.key).map_or(0, |v| bytes_to_int(&v));
            let value = self.op.apply(current, self.operand);

            store.set(self.key.clone(), int_to_bytes(value));
            value
        };

        engine.replicate(self.key, Some(int_to_bytes(value)));

        let reply = self.code.honours_sync() && self.sync;
        Ok(reply.then(|| Message::with_ivalue(value)))
    }
}

impl TryFrom<&mut CommandParser> for Bit {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let code = parser.code();
        let op = match code {
            Code::BitAnd | Code::CBitAnd => BitOp::And,
            Code::CBitAndNot => BitOp::AndNot,
            Code::BitOr | Code::CBitOr => BitOp::Or,
            _ => BitOp::Xor,
        };
        let operand = if code.honours_sync() {
            parser.ivalue()
        } else {
            parser.int_value()
        };

        Ok(Self {
            code,
            key: parser.key()?,
            op,
            operand,
            sync: parser.sync(),
        })
    }
}
