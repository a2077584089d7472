//! [`SurfaceFeed`] – drains a [`SurfaceReceiver`] into a [`SemanticWorld`].
//!
//! A batch the world rejects is logged and skipped; the previous surface set
//! stays in place and the feed keeps going.  Falling behind on the bus is
//! logged too.  The loop ends when the bus closes.

use std::sync::Arc;

use semworld_scene::SemanticWorld;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::bus::SurfaceReceiver;

/// What a feed did before its bus closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub applied: usize,
    pub rejected: usize,
    /// Batches lost to lag on the bus.
    pub dropped: u64,
}

pub struct SurfaceFeed;

impl SurfaceFeed {
    /// Ingest every batch from `receiver` until the bus closes.
    #[instrument(skip_all, fields(fixed_frame = %world.fixed_frame()))]
    pub async fn run(mut receiver: SurfaceReceiver, world: Arc<SemanticWorld>) -> FeedStats {
        let mut stats = FeedStats::default();
        loop {
            match receiver.recv().await {
                Ok(batch) => match world.ingest(batch) {
                    Ok(generation) => {
                        stats.applied += 1;
                        debug!(%generation, "batch ingested");
                    }
                    Err(e) => {
                        stats.rejected += 1;
                        warn!(error = %e, "surface batch rejected; keeping previous set");
                    }
                },
                Err(RecvError::Lagged(n)) => {
                    stats.dropped += n;
                    warn!(lagged_by = n, "surface feed lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!(
            applied = stats.applied,
            rejected = stats.rejected,
            dropped = stats.dropped,
            "surface feed closed"
        );
        stats
    }

    /// Run the feed on its own tokio task.
    pub fn spawn(receiver: SurfaceReceiver, world: Arc<SemanticWorld>) -> JoinHandle<FeedStats> {
        tokio::spawn(Self::run(receiver, world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SurfaceBus;
    use semworld_perception::TfEngine;
    use semworld_types::{Header, Point2, Surface, SurfaceArray, Transform3D};

    fn batch(names: &[&str]) -> SurfaceArray {
        let surfaces = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Surface::new(
                    *name,
                    "world",
                    Transform3D::from_translation(i as f64 * 2.0, 0.0, 0.7),
                    vec![
                        Point2::new(0.0, 0.0),
                        Point2::new(1.0, 0.0),
                        Point2::new(1.0, 1.0),
                        Point2::new(0.0, 1.0),
                    ],
                )
            })
            .collect();
        SurfaceArray {
            header: Header::new("world"),
            surfaces,
        }
    }

    fn world() -> Arc<SemanticWorld> {
        Arc::new(SemanticWorld::new("world", Arc::new(TfEngine::new())))
    }

    #[tokio::test]
    async fn ingests_until_bus_closes() -> Result<(), Box<dyn std::error::Error>> {
        let bus = SurfaceBus::default();
        let world = world();
        let handle = SurfaceFeed::spawn(bus.subscribe(), world.clone());

        bus.publish(batch(&["a", "b"]))?;
        bus.publish(batch(&["c"]))?;
        drop(bus);

        let stats = handle.await?;
        assert_eq!(stats.applied, 2);
        assert_eq!(world.registry().len(), 1);
        assert!(world.registry().surface("c").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn rejected_batch_does_not_stop_the_feed() -> Result<(), Box<dyn std::error::Error>> {
        let bus = SurfaceBus::default();
        let world = world();
        let handle = SurfaceFeed::spawn(bus.subscribe(), world.clone());

        bus.publish(batch(&["a"]))?;
        bus.publish(batch(&["dup", "dup"]))?;
        let mut foreign = batch(&["x"]);
        foreign.surfaces[0].header.frame_id = "lidar".into();
        bus.publish(foreign)?;
        drop(bus);

        let stats = handle.await?;
        assert_eq!(stats, FeedStats { applied: 1, rejected: 2, dropped: 0 });
        assert!(world.registry().surface("a").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn lag_is_counted_and_survived() {
        let bus = SurfaceBus::new(1);
        let world = world();
        let receiver = bus.subscribe();
        for name in ["a", "b", "c"] {
            let _ = bus.publish(batch(&[name]));
        }
        drop(bus);

        let stats = SurfaceFeed::run(receiver, world.clone()).await;
        assert_eq!(stats, FeedStats { applied: 1, rejected: 0, dropped: 2 });
        assert!(world.registry().surface("c").is_some());
    }
}
