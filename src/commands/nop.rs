use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::engine::Engine;
use crate::message::Message;
use crate::Error;

/// Liveness probe. Always replies with the single byte 1.
#[derive(Debug, PartialEq)]
pub struct Nop;

impl Executable for Nop {
    fn exec(self, _engine: &Engine) -> Result<Option<Message>, Error> {
        Ok(Some(Message::with_value(Bytes::from_static(&[1]))))
    }
}

impl TryFrom<&mut CommandParser> for Nop {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::message::Code;

    #[test]
    fn replies_one() {
        let cmd = Command::try_from(Message::new(Code::CNop)).unwrap();

        assert_eq!(cmd, Command::Nop(Nop));
        assert_eq!(
            cmd.exec(&Engine::default()).unwrap(),
            Some(Message::with_value(Bytes::from_static(&[1])))
        );
    }
}
