//! Slope-sign lane classification and per-side line fitting.

use tracing::trace;

use crate::config::{ClassifierConfig, FitStrategy, SideConvention};
use crate::types::{LaneSide, LineModel, RawSegment};

/// Left and right averaged boundaries of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanePair {
    pub left: LineModel,
    pub right: LineModel,
}

impl LanePair {
    pub fn as_array(&self) -> [LineModel; 2] {
        [self.left, self.right]
    }
}

/// Segments of one frame, split by lane side.
///
/// Each entry keeps the fitted model next to the segment length so that a
/// weighted reduction does not need the raw segment again.
#[derive(Debug, Clone, Default)]
pub struct SideBuckets {
    pub left: Vec<(LineModel, f64)>,
    pub right: Vec<(LineModel, f64)>,
    /// Vertical or non-finite segments that were skipped.
    pub skipped: usize,
}

impl SideBuckets {
    pub fn get(&self, side: LaneSide) -> &[(LineModel, f64)] {
        match side {
            LaneSide::Left => &self.left,
            LaneSide::Right => &self.right,
        }
    }
}

/// Splits segments into left and right lane candidates and fits one line
/// per side.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaneClassifier {
    config: ClassifierConfig,
}

impl LaneClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Side of a line by the sign of its slope. A zero slope counts as
    /// non-negative.
    pub fn side_of(&self, model: &LineModel) -> LaneSide {
        let negative = model.slope < 0.0;
        match (self.config.side_convention, negative) {
            (SideConvention::NegativeSlopeLeft, true) => LaneSide::Left,
            (SideConvention::NegativeSlopeLeft, false) => LaneSide::Right,
            (SideConvention::NegativeSlopeRight, true) => LaneSide::Right,
            (SideConvention::NegativeSlopeRight, false) => LaneSide::Left,
        }
    }

    /// Buckets segments by side.
    ///
    /// # Arguments
    /// * `segments` - extractor output, in any order
    ///
    /// # Returns
    /// Per-side models with their segment lengths. Vertical and non-finite
    /// segments are counted in [`SideBuckets::skipped`] and nothing else.
    pub fn classify(&self, segments: &[RawSegment]) -> SideBuckets {
        let mut buckets = SideBuckets::default();
        for segment in segments {
            let Some(model) = segment.line_model() else {
                buckets.skipped += 1;
                continue;
            };
            let entry = (model, segment.length());
            match self.side_of(&model) {
                LaneSide::Left => buckets.left.push(entry),
                LaneSide::Right => buckets.right.push(entry),
            }
        }
        trace!(
            left = buckets.left.len(),
            right = buckets.right.len(),
            skipped = buckets.skipped,
            "classified segments"
        );
        buckets
    }

    /// Reduces each side to one line model.
    ///
    /// Returns `None` when either side ends up empty: a one-sided detection
    /// is reported as no detection at all.
    pub fn fit(&self, segments: &[RawSegment]) -> Option<LanePair> {
        let buckets = self.classify(segments);
        let left = self.reduce(&buckets.left)?;
        let right = self.reduce(&buckets.right)?;
        Some(LanePair { left, right })
    }

    fn reduce(&self, members: &[(LineModel, f64)]) -> Option<LineModel> {
        let model = match self.config.fit_strategy {
            FitStrategy::Mean => average(members.iter().map(|(m, _)| (*m, 1.0))),
            FitStrategy::LengthWeighted => average(members.iter().copied()),
        }?;
        model.is_finite().then_some(model)
    }
}

/// Weighted mean of slope and intercept, taken independently.
fn average(members: impl Iterator<Item = (LineModel, f64)>) -> Option<LineModel> {
    let (mut slope, mut intercept, mut total) = (0.0, 0.0, 0.0);
    for (model, weight) in members {
        slope += model.slope * weight;
        intercept += model.intercept * weight;
        total += weight;
    }
    if total <= 0.0 {
        return None;
    }
    Some(LineModel::new(slope / total, intercept / total))
}
