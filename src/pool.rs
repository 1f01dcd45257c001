use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error as ThisError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ConnectionConfig;
use crate::connection::Connection;

#[derive(Debug, ThisError, PartialEq)]
pub enum PoolError {
    #[error("connection pool is closed")]
    Closed,
    #[error("connection pool admitted a borrower but had no connection to lend")]
    Empty,
}

/// A fixed set of connections to one node, lent out one borrower at a time.
///
/// [`Pool::get`] waits until a connection is free. The borrowed connection goes back to the pool
/// when the returned guard is dropped.
pub struct Pool {
    addr: String,
    gate: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<Connection>>>,
}

impl Pool {
    pub fn new(addr: impl Into<String>, size: usize, config: ConnectionConfig) -> Pool {
        let addr = addr.into();
        let idle = (0..size)
            .map(|_| Connection::new(addr.clone(), config.clone()))
            .collect();

        Pool {
            addr,
            gate: Arc::new(Semaphore::new(size)),
            idle: Arc::new(Mutex::new(idle)),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Connections currently not lent out.
    pub fn available(&self) -> usize {
        self.gate.available_permits()
    }

    pub async fn get(&self) -> Result<PooledConnection, PoolError> {
        let permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let conn = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or(PoolError::Empty)?;

        Ok(PooledConnection {
            conn: Some(conn),
            idle: self.idle.clone(),
            _permit: permit,
        })
    }

    /// Stops lending. Borrowers waiting in [`Pool::get`] fail with [`PoolError::Closed`].
    pub fn close(&self) {
        self.gate.close();
    }
}

/// A connection borrowed from a [`Pool`].
pub struct PooledConnection {
    conn: Option<Connection>,
    idle: Arc<Mutex<Vec<Connection>>>,
    // Released after the connection is back in the pool.
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(conn);
        }
    }
}
