//! Single-permit write gate
//!
//! A backfill holds the permit for its whole run so event-driven drains
//! cannot interleave their commits with backfill writes; the event path
//! takes the permit per commit. Acquire and release must pair.

use async_std::channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};

pub struct WriteGate {
    permit_tx: Sender<()>,
    permit_rx: Receiver<()>,
}

impl WriteGate {
    pub fn new() -> Self {
        let (permit_tx, permit_rx) = bounded(1);
        // A fresh bounded(1) channel always has room for the single permit.
        let _ = permit_tx.try_send(());
        Self {
            permit_tx,
            permit_rx,
        }
    }

    /// Take the permit, parking until it is free.
    pub async fn acquire(&self) -> Result<()> {
        self.permit_rx
            .recv()
            .await
            .map_err(|_| Error::Internal("write gate closed".to_string()))?;
        Ok(())
    }

    /// Return the permit, waking one waiter.
    pub async fn release(&self) {
        let _ = self.permit_tx.send(()).await;
    }
}

impl Default for WriteGate {
    fn default() -> Self {
        Self::new()
    }
}
