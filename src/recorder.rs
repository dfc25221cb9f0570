//! Labelled intermediate images of the most recent frame.

use std::sync::Arc;

use crate::types::Frame;

pub const STAGE_GRAYSCALE: &str = "Grayscale";
pub const STAGE_GAUSSIAN_BLUR: &str = "Gaussian Blur";
pub const STAGE_CANNY: &str = "Canny Edge Detection";
pub const STAGE_REGION_MASKED: &str = "Region Masked";
pub const STAGE_LANE_LINES: &str = "Lane Lines";

#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub image: Frame,
    pub label: String,
}

/// Ordered stages of one frame. Cheap to clone and safe to hand to another
/// thread: the record and the frames inside it are immutable.
pub type PipelineRecord = Arc<[PipelineStage]>;

/// Collects stage images while a frame is analysed.
///
/// Nothing in here feeds back into the lane geometry; a disabled recorder
/// simply drops everything it is given.
#[derive(Debug)]
pub struct PipelineRecorder {
    enabled: bool,
    stages: Vec<PipelineStage>,
}

impl PipelineRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stages: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Forgets the stages of the previous frame. Snapshots already taken
    /// keep their contents.
    pub fn reset(&mut self) {
        self.stages.clear();
    }

    /// Appends a stage.
    ///
    /// # Arguments
    /// * `image` - stage output; only the `Arc` is cloned
    /// * `label` - caption shown in the pipeline view
    pub fn record(&mut self, image: &Frame, label: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.stages.push(PipelineStage {
            image: image.clone(),
            label: label.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Immutable copy of the stages recorded since the last reset.
    pub fn snapshot(&self) -> PipelineRecord {
        self.stages.clone().into()
    }
}

impl Default for PipelineRecorder {
    fn default() -> Self {
        Self::new(true)
    }
}
