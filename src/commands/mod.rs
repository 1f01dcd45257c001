pub mod bit;
pub mod decr;
pub mod del;
pub mod executable;
pub mod get;
pub mod hall;
pub mod has;
pub mod hkeys;
pub mod hkeysrand;
pub mod hkill;
pub mod hsize;
pub mod incr;
pub mod keytotal;
pub mod log;
pub mod nop;
pub mod set;
pub mod setifmore;
pub mod setnx;
pub mod zrange;
pub mod zrangesize;

use bytes::Bytes;
use std::mem;
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::engine::Engine;
use crate::key;
use crate::message::{Code, Message};
use crate::pack::{bytes_to_int, bytes_to_int_list};
use crate::store::Storage;
use crate::Error;

use bit::Bit;
use decr::Decr;
use del::Del;
use get::Get;
use hall::HAll;
use has::Has;
use hkeys::HKeys;
use hkeysrand::HKeysRand;
use hkill::HKill;
use hsize::HSize;
use incr::Incr;
use keytotal::KeyTotal;
use log::Log;
use nop::Nop;
use set::Set;
use setifmore::SetIfMore;
use setnx::SetNx;
use zrange::ZRange;
use zrangesize::ZRangeSize;

#[derive(Debug, PartialEq)]
pub enum Command {
    Bit(Bit),
    Decr(Decr),
    Del(Del),
    Get(Get),
    HAll(HAll),
    Has(Has),
    HKeys(HKeys),
    HKeysRand(HKeysRand),
    HKill(HKill),
    HSize(HSize),
    Incr(Incr),
    KeyTotal(KeyTotal),
    Set(Set),
    SetIfMore(SetIfMore),
    SetNx(SetNx),
    ZRange(ZRange),
    ZRangeSize(ZRangeSize),

    Log(Log),
    Nop(Nop),
}

impl Executable for Command {
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error> {
        match self {
            Command::Bit(cmd) => cmd.exec(engine),
            Command::Decr(cmd) => cmd.exec(engine),
            Command::Del(cmd) => cmd.exec(engine),
            Command::Get(cmd) => cmd.exec(engine),
            Command::HAll(cmd) => cmd.exec(engine),
            Command::Has(cmd) => cmd.exec(engine),
            Command::HKeys(cmd) => cmd.exec(engine),
            Command::HKeysRand(cmd) => cmd.exec(engine),
            Command::HKill(cmd) => cmd.exec(engine),
            Command::HSize(cmd) => cmd.exec(engine),
            Command::Incr(cmd) => cmd.exec(engine),
            Command::KeyTotal(cmd) => cmd.exec(engine),
            Command::Log(cmd) => cmd.exec(engine),
            Command::Nop(cmd) => cmd.exec(engine),
            Command::Set(cmd) => cmd.exec(engine),
            Command::SetIfMore(cmd) => cmd.exec(engine),
            Command::SetNx(cmd) => cmd.exec(engine),
            Command::ZRange(cmd) => cmd.exec(engine),
            Command::ZRangeSize(cmd) => cmd.exec(engine),
        }
    }
}

impl TryFrom<Message> for Command {
    type Error = Error;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        let code = Code::try_from(message.code)
            .map_err(|_| CommandError::UnknownCode(message.code))?;

        let parser = &mut CommandParser { code, message };

        match code {
            Code::Set | Code::SetR | Code::CSet => Set::try_from(parser).map(Command::Set),
            Code::SetNx | Code::CSetNx => SetNx::try_from(parser).map(Command::SetNx),
            Code::CSetIfMore => SetIfMore::try_from(parser).map(Command::SetIfMore),
            Code::Get | Code::CGet | Code::CGetInt => Get::try_from(parser).map(Command::Get),
            Code::Has | Code::CHas => Has::try_from(parser).map(Command::Has),
            Code::Del | Code::DelR | Code::CDel => Del::try_from(parser).map(Command::Del),
            Code::Inc | Code::Incr | Code::IncBy | Code::CInc => {
                Incr::try_from(parser).map(Command::Incr)
            }
            Code::Dec | Code::Decr | Code::DecBy | Code::CDec => {
                Decr::try_from(parser).map(Command::Decr)
            }
            Code::BitAnd
            | Code::BitOr
            | Code::BitXor
            | Code::CBitAnd
            | Code::CBitAndNot
            | Code::CBitOr
            | Code::CBitXor => Bit::try_from(parser).map(Command::Bit),
            Code::HAll | Code::CHAll => HAll::try_from(parser).map(Command::HAll),
            Code::HKeys | Code::HKeysLimit | Code::CHKeys => {
                HKeys::try_from(parser).map(Command::HKeys)
            }
            Code::HKeysRandom | Code::CHKeysRand => {
                HKeysRand::try_from(parser).map(Command::HKeysRand)
            }
            Code::HKeysTotal | Code::CHSize => HSize::try_from(parser).map(Command::HSize),
            Code::KeyTotal | Code::CKeyTotal => {
                KeyTotal::try_from(parser).map(Command::KeyTotal)
            }
            Code::HKill | Code::CHKill | Code::ZKill | Code::CZKill => {
                HKill::try_from(parser).map(Command::HKill)
            }
            Code::ZRange | Code::CZRange => ZRange::try_from(parser).map(Command::ZRange),
            Code::ZRangeSize | Code::CZRangeSize => {
                ZRangeSize::try_from(parser).map(Command::ZRangeSize)
            }
            Code::CNop => Nop::try_from(parser).map(Command::Nop),
            Code::Log => Log::try_from(parser).map(Command::Log),
            // Replies are never requests.
            Code::Resp => Err(CommandError::UnknownCode(Code::Resp as i32).into()),
        }
    }
}

/// Hands the fields of a decoded message to the command being built.
pub(crate) struct CommandParser {
    code: Code,
    message: Message,
}

impl CommandParser {
    pub(crate) fn code(&self) -> Code {
        self.code
    }

    pub(crate) fn sync(&self) -> bool {
        self.message.sync
    }

    pub(crate) fn ivalue(&self) -> i64 {
        self.message.ivalue
    }

    pub(crate) fn counter(&self) -> i32 {
        self.message.counter
    }

    /// Takes the composite key. Every keyed command needs a non-empty one.
    pub(crate) fn key(&mut self) -> Result<Bytes, CommandError> {
        let key = mem::take(&mut self.message.key);
        if key.is_empty() {
            return Err(CommandError::MissingKey { code: self.code });
        }

        Ok(key)
    }

    pub(crate) fn value(&mut self) -> Bytes {
        mem::take(&mut self.message.value)
    }

    /// The value decoded as a single integer; zero when it is too short.
    pub(crate) fn int_value(&self) -> i64 {
        bytes_to_int(&self.message.value)
    }

    pub(crate) fn has_int_value(&self) -> bool {
        self.message.value.len() >= 8
    }

    /// The value decoded as exactly `N` packed integers.
    pub(crate) fn int_args<const N: usize>(&self) -> Option<[i64; N]> {
        bytes_to_int_list(&self.message.value)?.try_into().ok()
    }
}

/// Visits the members of the hash whose composite prefix is `prefix`, in key order. `visit`
/// receives each member's subkey and value and returns whether to keep going.
pub(crate) fn for_each_member(
    storage: &dyn Storage,
    prefix: &[u8],
    visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
) {
    storage.for_each(prefix, true, &mut |key, value| match key::member(key, prefix) {
        Some(subkey) => visit(subkey, value),
        None => true,
    });
}

#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("protocol error; undecodable message: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("protocol error; unknown command code {0}")]
    UnknownCode(i32),
    #[error("protocol error; command {code:?} requires a key")]
    MissingKey { code: Code },
}
