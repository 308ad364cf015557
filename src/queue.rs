//! Single-slot transport queue and the unbounded analysis port.
//!
//! The transport queue is the backpressure point between stages: a `put`
//! suspends until the previous item has been taken. The analysis port is a
//! non-blocking broadcast hop used for publication.

use tokio::sync::mpsc;

use crate::error::{CheckError, Result};
use crate::invariant_ppt::{assert_invariant, QUEUE_SINGLE_SLOT};

/// Depth of every transport queue.
pub const QUEUE_CAPACITY: usize = 1;

/// Create a connected transport queue.
pub fn transport_queue<T>() -> (QueuePut<T>, QueueGet<T>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (QueuePut { tx }, QueueGet { rx })
}

/// Why a non-blocking put handed the item back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryPut<T> {
    /// The slot is occupied.
    Full(T),
    /// The consumer half is gone.
    Closed(T),
}

impl<T> TryPut<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryPut::Full(item) | TryPut::Closed(item) => item,
        }
    }
}

/// Producer half. Dropping every clone closes the queue.
#[derive(Debug)]
pub struct QueuePut<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for QueuePut<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> QueuePut<T> {
    /// Hand one item over, suspending while the slot is occupied.
    pub async fn put(&self, item: T) -> Result<()> {
        assert_invariant(
            QUEUE_SINGLE_SLOT,
            self.tx.max_capacity() == QUEUE_CAPACITY,
            "transport queue must hold at most one item",
            Some("QueuePut::put"),
        );
        self.tx.send(item).await.map_err(|_| CheckError::QueueClosed)
    }

    pub fn try_put(&self, item: T) -> std::result::Result<(), TryPut<T>> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(item) => TryPut::Full(item),
            mpsc::error::TrySendError::Closed(item) => TryPut::Closed(item),
        })
    }

    /// True while an undelivered item holds the slot.
    pub fn is_occupied(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct QueueGet<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> QueueGet<T> {
    /// Take the next item, suspending while the slot is empty.
    ///
    /// `None` once every producer is gone and nothing is left.
    pub async fn get(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_get(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected analysis port / FIFO pair.
pub fn analysis_port<T>() -> (AnalysisPort<T>, AnalysisFifo<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AnalysisPort { tx }, AnalysisFifo { rx })
}

/// Write side of an analysis link. Never suspends.
#[derive(Debug)]
pub struct AnalysisPort<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for AnalysisPort<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> AnalysisPort<T> {
    /// Publish an item. Returns false when no subscriber is left.
    pub fn write(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }
}

/// Read side of an analysis link; yields items in write order.
#[derive(Debug)]
pub struct AnalysisFifo<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> AnalysisFifo<T> {
    pub async fn get(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_get(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_put_is_refused_until_get() {
        let (put, mut get) = transport_queue();
        put.put(1u64).await.unwrap();
        assert!(put.is_occupied());
        assert_eq!(put.try_put(2), Err(TryPut::Full(2)));
        assert_eq!(get.get().await, Some(1));
        assert!(!put.is_occupied());
        put.try_put(2).unwrap();
        assert_eq!(get.try_get(), Some(2));
    }

    #[tokio::test]
    async fn get_sees_close_after_drain() {
        let (put, mut get) = transport_queue();
        put.put(5u64).await.unwrap();
        drop(put);
        assert_eq!(get.get().await, Some(5));
        assert_eq!(get.get().await, None);
    }

    #[tokio::test]
    async fn put_fails_once_consumer_is_gone() {
        let (put, get) = transport_queue::<u64>();
        drop(get);
        assert!(put.is_closed());
        assert_eq!(put.put(1).await, Err(CheckError::QueueClosed));
        assert_eq!(put.try_put(1), Err(TryPut::Closed(1)));
    }

    #[tokio::test]
    async fn analysis_port_never_blocks() {
        let (port, mut fifo) = analysis_port();
        for v in 0..10u64 {
            assert!(port.write(v));
        }
        for v in 0..10u64 {
            assert_eq!(fifo.get().await, Some(v));
        }
        drop(fifo);
        assert!(!port.write(99));
    }

    #[test]
    fn try_put_into_inner() {
        assert_eq!(TryPut::Full(3).into_inner(), 3);
        assert_eq!(TryPut::Closed(4).into_inner(), 4);
    }
}
