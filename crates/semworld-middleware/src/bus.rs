//! Publish/subscribe channel for surface detections.
//!
//! Uses [`tokio::sync::broadcast`] so every subscriber sees every batch and
//! a slow subscriber never holds up the others; it is told how many batches
//! it missed instead.

use semworld_types::{SurfaceArray, WorldError};
use tokio::sync::broadcast;

/// Default channel capacity (batches buffered before slow subscribers start
/// losing the oldest ones).
pub const DEFAULT_CAPACITY: usize = 16;

/// Shared surface bus. Clone it cheaply – all clones share the same channel.
///
/// The channel closes once every clone has been dropped.
#[derive(Clone, Debug)]
pub struct SurfaceBus {
    sender: broadcast::Sender<SurfaceArray>,
}

impl SurfaceBus {
    /// Create a bus buffering up to `capacity` batches (at least one).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish one batch.
    ///
    /// Returns the number of subscribers that were handed the batch.
    ///
    /// # Errors
    ///
    /// [`WorldError::Channel`] when nobody is subscribed; the batch is dropped.
    pub fn publish(&self, surfaces: SurfaceArray) -> Result<usize, WorldError> {
        self.sender
            .send(surfaces)
            .map_err(|_| WorldError::Channel("no subscribers for surface updates".to_string()))
    }

    pub fn subscribe(&self) -> SurfaceReceiver {
        SurfaceReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SurfaceBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end of a [`SurfaceBus`].
#[derive(Debug)]
pub struct SurfaceReceiver {
    receiver: broadcast::Receiver<SurfaceArray>,
}

impl SurfaceReceiver {
    /// Wait for the next batch.
    ///
    /// Returns:
    /// * `Ok(batch)` – the next batch.
    /// * `Err(RecvError::Lagged(n))` – `n` batches were dropped because this
    ///   receiver fell behind.  Receiving again yields the oldest retained one.
    /// * `Err(RecvError::Closed)` – every bus handle is gone.
    pub async fn recv(&mut self) -> Result<SurfaceArray, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}
