//! Height futures
//!
//! A caller can ask to be told when the chain head first reaches a height.
//! Registration and resolution both happen under the chain lock, so a commit
//! that reaches the height is never missed.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use super::ChainError;
use crate::storage::StoredBlock;

/// Pending height notifications, keyed by height
#[derive(Debug, Default)]
pub(crate) struct HeightFutures {
    pending: BTreeMap<u64, Vec<oneshot::Sender<StoredBlock>>>,
}

impl HeightFutures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `height`, given the current chain head
    pub fn register(&mut self, height: u64, head: &StoredBlock) -> HeightFuture {
        if head.height >= height {
            return HeightFuture::resolved(head.clone());
        }

        let (tx, rx) = oneshot::channel();
        self.pending.entry(height).or_default().push(tx);
        HeightFuture::waiting(rx)
    }

    /// Complete every registration at or below the new head's height
    pub fn resolve(&mut self, head: &StoredBlock) {
        let waiting = self.pending.split_off(&(head.height + 1));
        let ready = std::mem::replace(&mut self.pending, waiting);

        for sender in ready.into_values().flatten() {
            // The receiver may already be gone.
            let _ = sender.send(head.clone());
        }

        tracing::debug!(height = head.height, waiting = self.len(), "resolved height futures");
    }

    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}

/// Completes with the block that made the chain head reach a height
///
/// Await it from async code, or use `blocking_get` from a plain thread.
/// Fails with `ChainError::Cancelled` if the chain is dropped first.
#[derive(Debug)]
pub struct HeightFuture {
    rx: Option<oneshot::Receiver<StoredBlock>>,
    resolved: Option<StoredBlock>,
}

impl HeightFuture {
    fn resolved(block: StoredBlock) -> Self {
        Self {
            rx: None,
            resolved: Some(block),
        }
    }

    fn waiting(rx: oneshot::Receiver<StoredBlock>) -> Self {
        Self {
            rx: Some(rx),
            resolved: None,
        }
    }

    /// Whether the height has been reached, without blocking
    pub fn is_done(&mut self) -> bool {
        if self.resolved.is_some() {
            return true;
        }

        let Some(rx) = self.rx.as_mut() else {
            return false;
        };

        match rx.try_recv() {
            Ok(block) => {
                self.resolved = Some(block);
                self.rx = None;
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
        }
    }

    /// The resolving block, if the height has been reached
    pub fn try_get(&mut self) -> Option<StoredBlock> {
        if self.is_done() {
            self.resolved.clone()
        } else {
            None
        }
    }

    /// Block the current thread until the height is reached
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_get(mut self) -> Result<StoredBlock, ChainError> {
        if let Some(block) = self.resolved.take() {
            return Ok(block);
        }

        match self.rx.take() {
            Some(rx) => rx.blocking_recv().map_err(|_| ChainError::Cancelled),
            None => Err(ChainError::Cancelled),
        }
    }
}

impl Future for HeightFuture {
    type Output = Result<StoredBlock, ChainError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(block) = this.resolved.take() {
            return Poll::Ready(Ok(block));
        }

        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(Err(ChainError::Cancelled));
        };

        match Pin::new(rx).poll(cx) {
            Poll::Ready(result) => {
                this.rx = None;
                Poll::Ready(result.map_err(|_| ChainError::Cancelled))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
