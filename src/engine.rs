use bytes::Bytes;
use std::future::Future;

use crate::commands::executable::Executable;
use crate::commands::{Command, CommandError};
use crate::message::{Code, Message};
use crate::replication::Replicator;
use crate::server::Handler;
use crate::store::Store;
use crate::Error;

/// Node-side command dispatch: decodes a frame, runs the command against the local store and
/// encodes the reply, if any.
#[derive(Clone, Default)]
pub struct Engine {
    store: Store,
    replicator: Replicator,
}

impl Engine {
    pub fn new(store: Store, replicator: Replicator) -> Engine {
        Engine { store, replicator }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Queues a replication entry for `key`. `None` replicates a delete.
    pub(crate) fn replicate(&self, key: Bytes, value: Option<Bytes>) {
        self.replicator.log(key, value);
    }

    pub fn execute(&self, msg: Message) -> Result<Option<Message>, Error> {
        let cmd = Command::try_from(msg)?;

        Ok(cmd.exec(self)?.map(|mut reply| {
            reply.code = Code::Resp as i32;
            reply
        }))
    }

    pub fn execute_frame(&self, frame: Bytes) -> Result<Option<Bytes>, Error> {
        let msg = Message::from_bytes(frame).map_err(CommandError::Decode)?;

        Ok(self.execute(msg)?.map(|reply| reply.to_bytes()))
    }
}

impl Handler for Engine {
    fn handle(&self, frame: Bytes) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send {
        let res = self.execute_frame(frame);

        async move { res }
    }
}
