//! Per-frame lane detection chain.
//!
//! extract -> mask -> segments -> classify/fit -> project, stopping early
//! according to [`DetailLevel`]. Every stage returns a fresh buffer, and the
//! recorder only ever receives clones of them, so turning recording off
//! cannot change the geometry that comes out the other end.

use tracing::{debug, trace};

use crate::classifier::{LaneClassifier, LanePair};
use crate::config::{Config, DetailLevel, Orientation};
use crate::extractor::SegmentExtractor;
use crate::mask::{self, RegionMask};
use crate::overlay::{ImageRenderer, LaneRenderer};
use crate::projector::EndpointProjector;
use crate::recorder::{
    PipelineRecord, PipelineRecorder, STAGE_CANNY, STAGE_GAUSSIAN_BLUR, STAGE_GRAYSCALE,
    STAGE_LANE_LINES, STAGE_REGION_MASKED,
};
use crate::types::{Frame, LineModel, ProjectedSegment, RawSegment};
use crate::LaneDetectionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    Extracting,
    Classifying,
    Projecting,
    Delivered,
}

/// Everything one frame produced.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub detail: DetailLevel,
    /// Size of the frame after orientation, i.e. the space all coordinates
    /// below live in.
    pub width: usize,
    pub height: usize,
    pub raw_segments: Vec<RawSegment>,
    /// `None` at [`DetailLevel::RawSegments`] or when either side was empty.
    pub lanes: Option<LanePair>,
    /// Zero or two segments at [`DetailLevel::Projected`], empty otherwise.
    pub projected: Vec<ProjectedSegment>,
    pub record: PipelineRecord,
}

impl FrameAnalysis {
    pub fn line_models(&self) -> Vec<LineModel> {
        self.lanes.map(|p| p.as_array().to_vec()).unwrap_or_default()
    }

    /// What the overlay should draw for this frame.
    ///
    /// Raw segments are drawn as-is at the lowest detail level; averaged
    /// models have no screen extent and draw nothing.
    pub fn overlay_segments(&self) -> Vec<ProjectedSegment> {
        match self.detail {
            DetailLevel::RawSegments => self
                .raw_segments
                .iter()
                .map(|s| ProjectedSegment {
                    near: (s.x1 as f32, s.y1 as f32),
                    far: (s.x2 as f32, s.y2 as f32),
                })
                .collect(),
            DetailLevel::Averaged => Vec::new(),
            DetailLevel::Projected => self.projected.clone(),
        }
    }
}

/// Quarter-turn used for [`Orientation::Rotate90Cw`].
pub type RotateFn = fn(&Frame) -> LaneDetectionResult<Frame>;

/// Runs frames through extraction, masking, fitting and projection, one
/// at a time.
pub struct LanePipeline {
    extractor: Box<dyn SegmentExtractor>,
    mask: Box<dyn RegionMask>,
    renderer: Box<dyn LaneRenderer>,
    rotate: RotateFn,
    classifier: LaneClassifier,
    projector: EndpointProjector,
    recorder: PipelineRecorder,
    orientation: Orientation,
    detail: DetailLevel,
    state: FrameState,
}

impl LanePipeline {
    pub fn new(config: &Config, extractor: Box<dyn SegmentExtractor>) -> Self {
        Self {
            extractor,
            mask: mask::from_config(&config.mask),
            renderer: Box::new(ImageRenderer),
            rotate: Frame::rotate_cw,
            classifier: LaneClassifier::new(config.classifier),
            projector: EndpointProjector::new(config.projector),
            recorder: PipelineRecorder::new(config.pipeline.record_stages),
            orientation: config.classifier.orientation,
            detail: config.pipeline.detail,
            state: FrameState::Idle,
        }
    }

    /// Replaces the region mask.
    pub fn with_mask(mut self, mask: Box<dyn RegionMask>) -> Self {
        self.mask = mask;
        self
    }

    /// Replaces the renderer of the "Lane Lines" stage image.
    pub fn with_renderer(mut self, renderer: Box<dyn LaneRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replaces the rotation applied to sideways frames.
    pub fn with_rotation(mut self, rotate: RotateFn) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn detail(&self) -> DetailLevel {
        self.detail
    }

    fn enter(&mut self, next: FrameState) {
        trace!(from = ?self.state, to = ?next, "frame state");
        self.state = next;
    }

    /// Runs one frame through the chain.
    ///
    /// Geometric dead ends (no segments, one-sided detection, flat lines)
    /// give an empty analysis; only extractor failures are errors. The
    /// pipeline returns to [`FrameState::Idle`] either way.
    pub fn analyze(&mut self, frame: &Frame) -> LaneDetectionResult<FrameAnalysis> {
        let result = self.run(frame);
        self.enter(FrameState::Idle);
        result
    }

    fn run(&mut self, frame: &Frame) -> LaneDetectionResult<FrameAnalysis> {
        self.recorder.reset();
        self.enter(FrameState::Extracting);

        let frame = match self.orientation {
            Orientation::Identity => frame.clone(),
            Orientation::Rotate90Cw => (self.rotate)(frame)?,
        };
        let (width, height) = (frame.width(), frame.height());

        let stages = self.extractor.edges(&frame)?;
        self.recorder.record(&stages.gray, STAGE_GRAYSCALE);
        self.recorder.record(&stages.blurred, STAGE_GAUSSIAN_BLUR);
        self.recorder.record(&stages.edges, STAGE_CANNY);

        let masked = self.mask.apply(&stages.edges)?;
        self.recorder.record(&masked, STAGE_REGION_MASKED);

        let raw_segments = self.extractor.segments(&masked)?;
        debug!(segments = raw_segments.len(), "extracted segments");

        let mut lanes = None;
        let mut projected = Vec::new();
        if self.detail != DetailLevel::RawSegments {
            self.enter(FrameState::Classifying);
            lanes = self.classifier.fit(&raw_segments);

            if self.detail == DetailLevel::Projected {
                self.enter(FrameState::Projecting);
                if let Some(pair) = lanes {
                    projected = self.projector.project_all(&pair.as_array(), height);
                    // a flat side leaves a lone segment, which is not a lane pair
                    if projected.len() != 2 {
                        projected.clear();
                    }
                }
            }
        }

        let mut analysis = FrameAnalysis {
            detail: self.detail,
            width,
            height,
            raw_segments,
            lanes,
            projected,
            record: Vec::new().into(),
        };

        if self.recorder.is_enabled() {
            let lane_lines = self
                .renderer
                .render(width, height, &analysis.overlay_segments())?;
            self.recorder.record(&lane_lines, STAGE_LANE_LINES);
            analysis.record = self.recorder.snapshot();
        }

        self.enter(FrameState::Delivered);
        debug!(
            lanes = analysis.lanes.is_some(),
            projected = analysis.projected.len(),
            "frame analysed"
        );
        Ok(analysis)
    }
}
