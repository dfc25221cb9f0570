//! Seam between the lane geometry and the image-processing backend.

use crate::types::{Frame, RawSegment};
use crate::LaneDetectionResult;

/// Images produced on the way to the binary edge map. Each stage is its
/// own buffer.
#[derive(Debug, Clone)]
pub struct EdgeStages {
    pub gray: Frame,
    pub blurred: Frame,
    pub edges: Frame,
}

/// Classical edge / line-segment detection, split in two so that a region
/// mask can run between edge detection and the segment search.
pub trait SegmentExtractor: Send {
    /// Grayscale, smoothed and edge-detected versions of `frame`.
    fn edges(&mut self, frame: &Frame) -> LaneDetectionResult<EdgeStages>;

    /// Straight segments found in a binary edge map. Order is not
    /// significant and an empty result is valid.
    fn segments(&mut self, edge_map: &Frame) -> LaneDetectionResult<Vec<RawSegment>>;
}
