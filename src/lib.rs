//! Straight-line lane detection for live video.
//!
//! A frame goes through edge detection and a probabilistic Hough search,
//! the resulting segments are split into left/right candidates by slope
//! sign, each side is averaged into one `(slope, intercept)` line, and the
//! two lines are projected to on-screen endpoints for an overlay. The
//! intermediate images can be kept for a diagnostic view.

pub mod classifier;
pub mod config;
pub mod extractor;
pub mod mask;
#[cfg(feature = "opencv")]
pub mod opencv_extractor;
#[cfg(feature = "opencv")]
pub mod opencv_ops;
pub mod overlay;
pub mod pipeline;
pub mod projector;
pub mod recorder;
pub mod types;
pub mod worker;

pub use classifier::{LaneClassifier, LanePair};
pub use config::{Config, DetailLevel};
pub use extractor::{EdgeStages, SegmentExtractor};
pub use mask::{IdentityMask, PolygonMask, RegionMask};
pub use overlay::{ImageRenderer, LaneRenderer};
pub use pipeline::{FrameAnalysis, FrameState, LanePipeline};
pub use projector::EndpointProjector;
pub use recorder::{PipelineRecord, PipelineRecorder, PipelineStage};
pub use types::{Frame, LaneSide, LineModel, PixelFormat, ProjectedSegment, RawSegment};
pub use worker::{DeliveredFrame, FrameWorker, ResultSink};

/// Shared `Result` alias for fallible pipeline calls.
pub type LaneDetectionResult<T> = anyhow::Result<T>;
