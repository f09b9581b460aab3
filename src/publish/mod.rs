//! Single-slot latest-frame channel
//!
//! The frame pipeline writes into one slot; every stream client reads from
//! it at its own pace. Publishing replaces the slot and never waits for a
//! reader, and readers that fall behind simply skip to the newest frame.
//!
//! ```text
//!                         ┌──────────────┐
//!   FramePublisher ──────►│ watch slot   │──► FrameSubscriber (client 1)
//!   (pipeline thread)     │ latest frame │──► FrameSubscriber (client 2)
//!                         └──────────────┘──► ...
//! ```

mod frame;

use bytes::Bytes;
use tokio::sync::watch;

pub use frame::PublishedFrame;

/// Create a connected publisher and feed
pub fn channel() -> (FramePublisher, FrameFeed) {
    let (tx, rx) = watch::channel(None);
    (
        FramePublisher {
            tx,
            next_sequence: 1,
        },
        FrameFeed { rx },
    )
}

/// Writing half, owned by the frame pipeline
///
/// Dropping it ends every subscription once the last frame is delivered.
#[derive(Debug)]
pub struct FramePublisher {
    tx: watch::Sender<Option<PublishedFrame>>,
    next_sequence: u64,
}

impl FramePublisher {
    /// Replace the slot with a new frame and return its sequence number
    pub fn publish(&mut self, jpeg: Bytes, size: (u32, u32), detections: usize) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.tx.send_replace(Some(PublishedFrame {
            sequence,
            jpeg,
            width: size.0,
            height: size.1,
            detections,
        }));

        sequence
    }

    /// Number of live subscribers (including feeds)
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Reading half, cloned into whatever needs to hand out subscriptions
#[derive(Debug, Clone)]
pub struct FrameFeed {
    rx: watch::Receiver<Option<PublishedFrame>>,
}

impl FrameFeed {
    /// Start a new subscription that begins with the current frame, if any
    pub fn subscribe(&self) -> FrameSubscriber {
        FrameSubscriber {
            rx: self.rx.clone(),
            last_sequence: 0,
        }
    }

    /// Copy of the newest frame without subscribing
    pub fn latest(&self) -> Option<PublishedFrame> {
        self.rx.borrow().clone()
    }

    /// True once the publisher has been dropped
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }
}

/// One client's view of the slot
#[derive(Debug)]
pub struct FrameSubscriber {
    rx: watch::Receiver<Option<PublishedFrame>>,
    last_sequence: u64,
}

impl FrameSubscriber {
    /// Wait for a frame newer than the last one returned
    ///
    /// Intermediate frames are skipped. Returns `None` once the publisher is
    /// gone and the final frame has been handed out.
    pub async fn next_frame(&mut self) -> Option<PublishedFrame> {
        loop {
            {
                let slot = self.rx.borrow_and_update();
                if let Some(frame) = slot.as_ref() {
                    if frame.sequence > self.last_sequence {
                        self.last_sequence = frame.sequence;
                        return Some(frame.clone());
                    }
                }
            }

            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Sequence of the last frame returned (0 before the first)
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn jpeg(n: u8) -> Bytes {
        Bytes::from(vec![0xFF, 0xD8, n, 0xFF, 0xD9])
    }

    #[test]
    fn test_publish_assigns_increasing_sequences() {
        let (mut publisher, feed) = channel();

        assert!(feed.latest().is_none());
        assert_eq!(publisher.publish(jpeg(1), (640, 480), 0), 1);
        assert_eq!(publisher.publish(jpeg(2), (640, 480), 2), 2);

        let latest = feed.latest().unwrap();
        assert_eq!(latest.sequence, 2);
        assert_eq!(latest.detections, 2);
        assert_eq!(latest.jpeg, jpeg(2));
    }

    #[tokio::test]
    async fn test_subscriber_gets_latest_only() {
        let (mut publisher, feed) = channel();
        let mut subscriber = feed.subscribe();

        publisher.publish(jpeg(1), (4, 4), 0);
        publisher.publish(jpeg(2), (4, 4), 0);
        publisher.publish(jpeg(3), (4, 4), 0);

        let frame = subscriber.next_frame().await.unwrap();
        assert_eq!(frame.sequence, 3);
        assert_eq!(subscriber.last_sequence(), 3);
    }

    #[tokio::test]
    async fn test_subscriber_sees_in_order_subset() {
        let (mut publisher, feed) = channel();
        let mut subscriber = feed.subscribe();

        let reader = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(frame) = subscriber.next_frame().await {
                seen.push(frame.sequence);
            }
            seen
        });

        for n in 1..=10u8 {
            publisher.publish(jpeg(n), (4, 4), 0);
            if n % 3 == 0 {
                tokio::task::yield_now().await;
            }
        }
        drop(publisher);

        let seen = reader.await.unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!(seen.iter().all(|s| (1..=10).contains(s)));
        assert_eq!(seen.last(), Some(&10));
    }

    #[tokio::test]
    async fn test_publish_does_not_wait_for_idle_subscribers() {
        let (mut publisher, feed) = channel();
        let _idle: Vec<_> = (0..8).map(|_| feed.subscribe()).collect();

        let started = Instant::now();
        for n in 0..10_000u32 {
            publisher.publish(jpeg((n % 256) as u8), (4, 4), 0);
        }

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(feed.latest().unwrap().sequence, 10_000);
    }

    #[tokio::test]
    async fn test_subscriber_ends_after_publisher_dropped() {
        let (mut publisher, feed) = channel();
        let mut subscriber = feed.subscribe();

        publisher.publish(jpeg(1), (4, 4), 0);
        drop(publisher);

        assert!(feed.is_closed());
        assert_eq!(subscriber.next_frame().await.unwrap().sequence, 1);
        assert!(subscriber.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_late_subscriber_starts_from_current_frame() {
        let (mut publisher, feed) = channel();
        publisher.publish(jpeg(1), (4, 4), 0);
        publisher.publish(jpeg(2), (4, 4), 0);

        let mut subscriber = feed.subscribe();
        assert_eq!(subscriber.next_frame().await.unwrap().sequence, 2);
        assert!(!feed.is_closed());
    }
}
