//! `multipart/x-mixed-replace` framing for MJPEG clients
//!
//! ```text
//!   Content-Type: multipart/x-mixed-replace; boundary=frame
//!
//!   --frame\r\n
//!   Content-Type: image/jpeg\r\n
//!   Content-Length: N\r\n
//!   \r\n
//!   <N bytes of JPEG>\r\n
//!   --frame\r\n
//!   ...
//!   --frame--\r\n
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;

use crate::publish::FrameSubscriber;
use crate::shutdown::ShutdownSignal;
use crate::stats::Stats;

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Response content type of the stream
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Sent once when a stream ends normally
pub const CLOSING_DELIMITER: &[u8] = b"--frame--\r\n";

/// One complete part: delimiter, part headers, JPEG, trailing CRLF
pub fn encode_part(jpeg: &[u8]) -> Bytes {
    let headers = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        jpeg.len()
    );

    let mut buf = BytesMut::with_capacity(headers.len() + jpeg.len() + 2);
    buf.put_slice(headers.as_bytes());
    buf.put_slice(jpeg);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// How a stream ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The frame pipeline stopped
    FeedClosed,
    /// The server is shutting down
    Shutdown,
}

/// Body of one stream response
///
/// Yields one `Bytes` per part until the feed ends or `shutdown` fires, then
/// the closing delimiter. The stream counts as active in `stats` from its
/// first poll until it is dropped, which also happens when the client goes
/// away mid-stream.
pub fn frame_parts(
    mut subscriber: FrameSubscriber,
    shutdown: ShutdownSignal,
    stats: Arc<Stats>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream! {
        let _streaming = stats.server.stream_opened();

        let end = loop {
            let frame = tokio::select! {
                _ = shutdown.wait() => break StreamEnd::Shutdown,
                frame = subscriber.next_frame() => frame,
            };

            let Some(frame) = frame else {
                break StreamEnd::FeedClosed;
            };

            let part = encode_part(&frame.jpeg);
            stats.server.record_frame_sent(part.len());
            yield Ok::<Bytes, Infallible>(part);
        };

        tracing::debug!(
            last_sequence = subscriber.last_sequence(),
            reason = ?end,
            "Stream ended"
        );
        yield Ok::<Bytes, Infallible>(Bytes::from_static(CLOSING_DELIMITER));
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;
    use crate::publish;

    fn collect_bytes(items: Vec<Result<Bytes, Infallible>>) -> Vec<Bytes> {
        items.into_iter().map(|item| item.unwrap()).collect()
    }

    #[test]
    fn test_encode_part() {
        let part = encode_part(&[0xFF, 0xD8, 0xFF, 0xD9]);

        let mut expected = b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n".to_vec();
        expected.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(part.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_content_type_names_boundary() {
        assert!(CONTENT_TYPE.ends_with(&format!("boundary={}", BOUNDARY)));
    }

    #[tokio::test]
    async fn test_parts_until_feed_closed() {
        let (mut publisher, feed) = publish::channel();
        let subscriber = feed.subscribe();
        let stats = Arc::new(Stats::new());

        let jpeg = Bytes::from_static(&[0xFF, 0xD8, 0x01, 0xFF, 0xD9]);
        publisher.publish(jpeg.clone(), (2, 2), 0);
        drop(publisher);

        let parts = frame_parts(subscriber, ShutdownSignal::new(), Arc::clone(&stats));
        let parts = collect_bytes(parts.collect().await);

        assert_eq!(parts, vec![encode_part(&jpeg), Bytes::from_static(CLOSING_DELIMITER)]);
        let snapshot = stats.server.snapshot();
        assert_eq!(snapshot.frames_sent, 1);
        assert_eq!(snapshot.active_streams, 0);
    }

    #[tokio::test]
    async fn test_parts_until_shutdown() {
        let (_publisher, feed) = publish::channel();
        let stats = Arc::new(Stats::new());
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let parts = frame_parts(feed.subscribe(), shutdown, Arc::clone(&stats));
        let parts = collect_bytes(parts.collect().await);

        assert_eq!(parts, vec![Bytes::from_static(CLOSING_DELIMITER)]);
        assert_eq!(stats.server.snapshot().frames_sent, 0);
    }

    #[tokio::test]
    async fn test_waits_for_next_frame() {
        let (mut publisher, feed) = publish::channel();
        let stats = Arc::new(Stats::new());
        let parts = frame_parts(feed.subscribe(), ShutdownSignal::new(), Arc::clone(&stats));
        let mut parts = Box::pin(parts);

        {
            let mut next = tokio_test::task::spawn(parts.next());
            assert_pending!(next.poll());
            assert_eq!(stats.server.snapshot().active_streams, 1);

            publisher.publish(Bytes::from_static(b"jpeg"), (2, 2), 0);
            assert!(next.is_woken());
            let part = assert_ready!(next.poll());
            assert_eq!(part.unwrap().unwrap(), encode_part(b"jpeg"));
        }

        // a client that goes away drops the body
        drop(parts);
        assert_eq!(stats.server.snapshot().active_streams, 0);
    }
}
