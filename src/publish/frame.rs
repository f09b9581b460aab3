//! Encoded frames handed from the pipeline to stream clients

use bytes::Bytes;

/// One encoded frame in the latest-frame slot
///
/// Cheap to clone: the JPEG payload is a reference-counted `Bytes`, so a
/// slow reader keeps its own handle and never observes a later frame.
#[derive(Debug, Clone)]
pub struct PublishedFrame {
    /// Strictly increasing per publish, starting at 1
    pub sequence: u64,
    /// Encoded JPEG
    pub jpeg: Bytes,
    /// Display width
    pub width: u32,
    /// Display height
    pub height: u32,
    /// Number of boxes drawn on this frame
    pub detections: usize,
}

impl PublishedFrame {
    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}
