//! OpenCV versions of the mask, lane drawing and orientation steps, for
//! runs that already link OpenCV for extraction.

use opencv::{
    core::{self, Mat, Point, Scalar, Vector, CV_8UC1, CV_8UC3},
    imgproc,
    prelude::*,
};

use crate::config::MaskConfig;
use crate::mask::{IdentityMask, PolygonMask, RegionMask};
use crate::opencv_extractor::{frame_from_mat, mat_from_frame};
use crate::overlay::{self, LaneRenderer, LANE_COLOR, LANE_THICKNESS};
use crate::types::{Frame, ProjectedSegment};
use crate::LaneDetectionResult;

/// [`PolygonMask`] through `fill_poly` and `bitwise_and`.
#[derive(Debug, Clone)]
pub struct CvPolygonMask {
    polygon: PolygonMask,
}

impl CvPolygonMask {
    pub fn new(vertices: Vec<(f64, f64)>) -> Self {
        Self {
            polygon: PolygonMask::new(vertices),
        }
    }
}

impl RegionMask for CvPolygonMask {
    fn apply(&self, image: &Frame) -> LaneDetectionResult<Frame> {
        let Some(vertices) = self.polygon.pixel_vertices(image.width(), image.height()) else {
            return Ok(image.clone());
        };
        let img = mat_from_frame(image)?;

        // black single-channel stencil with the polygon filled white
        let mut stencil = Mat::zeros(img.rows(), img.cols(), CV_8UC1)?.to_mat()?;
        let ring: Vector<Point> = vertices.iter().map(|&(x, y)| Point::new(x, y)).collect();
        let mut contours: Vector<Vector<Point>> = Vector::new();
        contours.push(ring);
        imgproc::fill_poly(
            &mut stencil,
            &contours,
            Scalar::all(255.0),
            imgproc::LINE_8,
            0,
            Point::new(0, 0),
        )?;

        let mut masked = Mat::default();
        core::bitwise_and(&img, &img, &mut masked, &stencil)?;
        frame_from_mat(&masked)
    }
}

/// OpenCV counterpart of [`crate::mask::from_config`].
pub fn mask_from_config(config: &MaskConfig) -> Box<dyn RegionMask> {
    match &config.polygon {
        Some(vertices) => Box::new(CvPolygonMask::new(vertices.clone())),
        None => Box::new(IdentityMask),
    }
}

/// Draws lanes with `imgproc::line`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CvLaneRenderer;

impl LaneRenderer for CvLaneRenderer {
    fn render(
        &self,
        width: usize,
        height: usize,
        segments: &[ProjectedSegment],
    ) -> LaneDetectionResult<Frame> {
        let mut canvas = Mat::zeros(i32::try_from(height)?, i32::try_from(width)?, CV_8UC3)?
            .to_mat()?;
        let [r, g, b] = LANE_COLOR.map(f64::from);
        for segment in segments {
            // OpenCV works in fixed point; keep coordinates near the canvas
            let Some((x1, y1, x2, y2)) = overlay::visible_part(segment, width, height) else {
                continue;
            };
            imgproc::line(
                &mut canvas,
                Point::new(x1.round() as i32, y1.round() as i32),
                Point::new(x2.round() as i32, y2.round() as i32),
                Scalar::new(r, g, b, 0.0),
                LANE_THICKNESS as i32,
                imgproc::LINE_8,
                0,
            )?;
        }
        frame_from_mat(&canvas)
    }
}

/// Quarter turn clockwise with `core::rotate`.
pub fn rotate_cw(frame: &Frame) -> LaneDetectionResult<Frame> {
    let src = mat_from_frame(frame)?;
    let mut rotated = Mat::default();
    core::rotate(&src, &mut rotated, core::ROTATE_90_CLOCKWISE)?;
    frame_from_mat(&rotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::ImageRenderer;
    use crate::types::PixelFormat;

    #[test]
    fn rotation_matches_the_image_path() {
        let frame = Frame::new(3, 2, PixelFormat::Gray8, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let cv = rotate_cw(&frame).unwrap();
        let pure = frame.rotate_cw().unwrap();
        assert_eq!((cv.width(), cv.height()), (2, 3));
        assert_eq!(cv.data(), pure.data());
    }

    #[test]
    fn polygon_mask_keeps_the_inside_only() {
        let image = Frame::new(8, 8, PixelFormat::Gray8, vec![255; 64]).unwrap();
        let mask = CvPolygonMask::new(vec![(0.0, 0.5), (1.0, 0.5), (1.0, 1.0), (0.0, 1.0)]);
        let masked = mask.apply(&image).unwrap();
        assert_eq!(masked.format(), PixelFormat::Gray8);
        assert_eq!(masked.pixel(3, 1), &[0]);
        assert_eq!(masked.pixel(3, 6), &[255]);
        assert!(image.data().iter().all(|&v| v == 255));
    }

    #[test]
    fn renderer_agrees_with_the_image_path_on_the_line_axis() {
        let segments = [ProjectedSegment {
            near: (10.0, 99.0),
            far: (90.0, 20.0),
        }];
        let cv = CvLaneRenderer.render(100, 100, &segments).unwrap();
        let pure = ImageRenderer.render(100, 100, &segments).unwrap();
        assert_eq!(cv.format(), PixelFormat::Rgb8);
        assert_eq!(cv.pixel(50, 59), LANE_COLOR);
        assert_eq!(cv.pixel(50, 59), pure.pixel(50, 59));
        assert_eq!(cv.pixel(90, 90), &[0, 0, 0]);
    }
}
