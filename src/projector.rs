//! Turns fitted lane lines into on-screen endpoints.

use crate::config::ProjectorConfig;
use crate::types::{LineModel, ProjectedSegment};

/// Maps line models to drawable segments between the bottom row and a fixed
/// fraction of the frame height.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointProjector {
    config: ProjectorConfig,
}

impl EndpointProjector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self { config }
    }

    /// Inverts `y = slope * x + intercept` at the near and far rows.
    ///
    /// # Arguments
    /// * `line` - fitted lane boundary
    /// * `frame_height` - height of the analysed frame; the near row is
    ///   `frame_height` and the far row `far_ratio * frame_height`
    ///
    /// # Returns
    /// `None` for a flat line, which has no inverse, and for any model
    /// producing non-finite endpoints. The x coordinates are not clamped to
    /// the frame width.
    pub fn project(&self, line: &LineModel, frame_height: usize) -> Option<ProjectedSegment> {
        if line.slope == 0.0 || !line.is_finite() {
            return None;
        }
        let y_near = frame_height as f64;
        let y_far = y_near * self.config.far_ratio;
        let x_near = (y_near - line.intercept) / line.slope;
        let x_far = (y_far - line.intercept) / line.slope;

        let segment = ProjectedSegment {
            near: (x_near as f32, y_near as f32),
            far: (x_far as f32, y_far as f32),
        };
        let finite = [segment.near.0, segment.near.1, segment.far.0, segment.far.1]
            .iter()
            .all(|v| v.is_finite());
        finite.then_some(segment)
    }

    /// Projects every line, skipping those without an inverse.
    pub fn project_all(&self, lines: &[LineModel], frame_height: usize) -> Vec<ProjectedSegment> {
        lines
            .iter()
            .filter_map(|line| self.project(line, frame_height))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_slope_has_no_projection() {
        let projector = EndpointProjector::default();
        assert!(projector.project(&LineModel::new(0.0, 240.0), 400).is_none());
    }

    #[test]
    fn non_finite_model_has_no_projection() {
        let projector = EndpointProjector::default();
        assert!(projector.project(&LineModel::new(f64::NAN, 0.0), 400).is_none());
        assert!(projector.project(&LineModel::new(-1.0, f64::INFINITY), 400).is_none());
    }

    #[test]
    fn endpoints_overflowing_f32_are_dropped() {
        // 400 / 1e-40 is finite in f64 but not in f32
        let projector = EndpointProjector::default();
        assert!(projector.project(&LineModel::new(1e-40, 0.0), 400).is_none());
    }

    #[test]
    fn projects_between_bottom_row_and_three_fifths() {
        let projector = EndpointProjector::default();
        let segment = projector.project(&LineModel::new(-2.5, 650.0), 400).unwrap();
        assert_eq!(segment.near, (100.0, 400.0));
        assert!((segment.far.0 - 164.0).abs() < 1e-4);
        assert!((segment.far.1 - 240.0).abs() < 1e-4);
    }

    #[test]
    fn projection_is_deterministic() {
        let projector = EndpointProjector::default();
        let line = LineModel::new(0.37, -12.5);
        let first = projector.project(&line, 720);
        for _ in 0..10 {
            assert_eq!(projector.project(&line, 720), first);
        }
    }

    #[test]
    fn shallow_slopes_are_not_clamped() {
        let projector = EndpointProjector::default();
        let segment = projector.project(&LineModel::new(0.01, 0.0), 480).unwrap();
        assert!(segment.near.0 > 640.0 * 10.0);
    }

    #[test]
    fn project_all_drops_flat_lines() {
        let projector = EndpointProjector::default();
        let lines = [LineModel::new(-1.0, 500.0), LineModel::new(0.0, 3.0)];
        assert_eq!(projector.project_all(&lines, 400).len(), 1);
    }

    #[test]
    fn custom_far_ratio() {
        let projector = EndpointProjector::new(ProjectorConfig { far_ratio: 0.5 });
        let segment = projector.project(&LineModel::new(1.0, 0.0), 200).unwrap();
        assert_eq!(segment.far, (100.0, 100.0));
    }
}
