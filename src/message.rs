//! The protocol envelope carried inside every frame.

use bytes::Bytes;
use prost::Message as _;
use strum_macros::{AsRefStr, EnumIter};

use crate::pack::bytes_to_int;

/// Operation codes.
///
/// The plain codes are the legacy family: they either never reply or always reply, regardless of
/// `sync`. The `C*` codes honour `sync` and only reply when the caller asked for it (reads always
/// reply).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration, EnumIter, AsRefStr,
)]
#[repr(i32)]
pub enum Code {
    Resp = 0,

    Set = 1,
    SetR = 2,
    SetNx = 3,
    Get = 4,
    Has = 5,
    Del = 6,
    DelR = 7,
    Inc = 8,
    Incr = 9,
    IncBy = 10,
    Dec = 11,
    Decr = 12,
    DecBy = 13,
    BitAnd = 14,
    BitOr = 15,
    BitXor = 16,
    HAll = 17,
    HKeys = 18,
    HKeysLimit = 19,
    HKeysRandom = 20,
    HKeysTotal = 21,
    HKill = 22,
    KeyTotal = 23,
    ZKill = 24,
    ZRange = 25,
    ZRangeSize = 26,
    Log = 27,

    CSet = 101,
    CGet = 102,
    CGetInt = 103,
    CHas = 104,
    CDel = 105,
    CInc = 106,
    CDec = 107,
    CBitAnd = 108,
    CBitAndNot = 109,
    CBitOr = 110,
    CBitXor = 111,
    CSetNx = 112,
    CSetIfMore = 113,
    CHAll = 114,
    CHKeys = 115,
    CHKeysRand = 116,
    CHKill = 117,
    CHSize = 118,
    CKeyTotal = 119,
    CZKill = 120,
    CZRange = 121,
    CZRangeSize = 122,
    CNop = 123,
}

impl Code {
    /// Whether this code belongs to the family that only replies when `sync` is set.
    pub fn honours_sync(self) -> bool {
        self as i32 > 100
    }

    /// Whether a node answers a request carrying this code and `sync` flag.
    pub fn expects_reply(self, sync: bool) -> bool {
        match self {
            Code::Resp
            | Code::Set
            | Code::Del
            | Code::Inc
            | Code::IncBy
            | Code::Dec
            | Code::DecBy
            | Code::BitAnd
            | Code::BitOr
            | Code::BitXor
            | Code::HKill
            | Code::ZKill
            | Code::Log => false,
            Code::CSet
            | Code::CDel
            | Code::CInc
            | Code::CDec
            | Code::CBitAnd
            | Code::CBitAndNot
            | Code::CBitOr
            | Code::CBitXor
            | Code::CSetNx
            | Code::CSetIfMore
            | Code::CHKill
            | Code::CZKill => sync,
            _ => true,
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(bytes = "bytes", tag = "2")]
    pub key: Bytes,
    #[prost(bytes = "bytes", tag = "3")]
    pub value: Bytes,
    #[prost(int64, tag = "4")]
    pub ivalue: i64,
    #[prost(int32, tag = "5")]
    pub counter: i32,
    #[prost(bool, tag = "6")]
    pub sync: bool,
    #[prost(bytes = "bytes", repeated, tag = "7")]
    pub list: Vec<Bytes>,
}

impl Message {
    pub fn new(code: Code) -> Message {
        Message {
            code: code as i32,
            ..Default::default()
        }
    }

    /// A reply carrying only an integer.
    pub fn with_ivalue(ivalue: i64) -> Message {
        Message {
            ivalue,
            ..Message::new(Code::Resp)
        }
    }

    /// A reply carrying only a value.
    pub fn with_value(value: impl Into<Bytes>) -> Message {
        Message {
            value: value.into(),
            ..Message::new(Code::Resp)
        }
    }

    /// A reply carrying only a list.
    pub fn with_list(list: Vec<Bytes>) -> Message {
        Message {
            list,
            ..Message::new(Code::Resp)
        }
    }

    pub fn key(mut self, key: Bytes) -> Message {
        self.key = key;
        self
    }

    pub fn value(mut self, value: Bytes) -> Message {
        self.value = value;
        self
    }

    pub fn ivalue(mut self, ivalue: i64) -> Message {
        self.ivalue = ivalue;
        self
    }

    pub fn counter(mut self, counter: i32) -> Message {
        self.counter = counter;
        self
    }

    pub fn sync(mut self, sync: bool) -> Message {
        self.sync = sync;
        self
    }

    /// The value, or `None` when it is empty.
    pub fn non_empty_value(&self) -> Option<Bytes> {
        Some(self.value.clone()).filter(|value| !value.is_empty())
    }

    /// The value decoded as an integer; zero when absent.
    pub fn value_as_int(&self) -> i64 {
        bytes_to_int(&self.value)
    }

    pub fn to_bytes(&self) -> Bytes {
        self.encode_to_vec().into()
    }

    pub fn from_bytes(bytes: Bytes) -> Result<Message, prost::DecodeError> {
        Message::decode(bytes)
    }
}
