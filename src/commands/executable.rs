use crate::engine::Engine;
use crate::message::Message;
use crate::Error;

pub trait Executable {
    /// Runs the command. `Ok(None)` means the caller gets no reply.
    fn exec(self, engine: &Engine) -> Result<Option<Message>, Error>;
}
