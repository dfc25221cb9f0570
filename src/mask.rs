//! Region-of-interest masks applied to the edge map before the segment
//! search.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

use crate::config::MaskConfig;
use crate::types::Frame;
use crate::LaneDetectionResult;

/// Restricts an edge map to a region of interest.
pub trait RegionMask: Send {
    /// Copy of `image` with everything outside the region zeroed. The input
    /// is never modified.
    fn apply(&self, image: &Frame) -> LaneDetectionResult<Frame>;
}

/// Passes the image through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMask;

impl RegionMask for IdentityMask {
    fn apply(&self, image: &Frame) -> LaneDetectionResult<Frame> {
        Ok(image.clone())
    }
}

/// Keeps pixels inside a polygon and zeroes the rest: the polygon is filled
/// white into a black stencil which is then AND-ed with the image.
///
/// Vertices are fractions of the frame size so the same mask fits any
/// resolution.
#[derive(Debug, Clone)]
pub struct PolygonMask {
    vertices: Vec<(f64, f64)>,
}

impl PolygonMask {
    pub fn new(vertices: Vec<(f64, f64)>) -> Self {
        Self { vertices }
    }

    /// Vertices scaled to a `width` x `height` frame and rounded to pixels.
    ///
    /// # Returns
    /// `None` when fewer than three distinct vertices remain, in which case
    /// the mask is a passthrough.
    pub fn pixel_vertices(&self, width: usize, height: usize) -> Option<Vec<(i32, i32)>> {
        let mut points: Vec<(i32, i32)> = self
            .vertices
            .iter()
            .map(|&(fx, fy)| {
                (
                    (fx * width as f64).round() as i32,
                    (fy * height as f64).round() as i32,
                )
            })
            .collect();
        points.dedup();
        // an explicitly closed ring repeats its first vertex
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        (points.len() >= 3).then_some(points)
    }
}

impl RegionMask for PolygonMask {
    fn apply(&self, image: &Frame) -> LaneDetectionResult<Frame> {
        let Some(vertices) = self.pixel_vertices(image.width(), image.height()) else {
            return Ok(image.clone());
        };
        let polygon: Vec<Point<i32>> = vertices.iter().map(|&(x, y)| Point::new(x, y)).collect();
        let mut stencil = GrayImage::new(
            u32::try_from(image.width())?,
            u32::try_from(image.height())?,
        );
        draw_polygon_mut(&mut stencil, &polygon, Luma([255]));

        let channels = image.format().channels();
        let data: Vec<u8> = image
            .data()
            .chunks_exact(channels)
            .zip(stencil.pixels())
            .flat_map(|(px, keep)| px.iter().map(move |&v| v & keep.0[0]))
            .collect();
        Frame::new(image.width(), image.height(), image.format(), data)
    }
}

/// Builds the mask named by the configuration.
pub fn from_config(config: &MaskConfig) -> Box<dyn RegionMask> {
    match &config.polygon {
        Some(vertices) => Box::new(PolygonMask::new(vertices.clone())),
        None => Box::new(IdentityMask),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;

    fn white(w: usize, h: usize) -> Frame {
        Frame::new(w, h, PixelFormat::Gray8, vec![255; w * h]).unwrap()
    }

    #[test]
    fn identity_is_a_passthrough() {
        let image = white(8, 8);
        let masked = IdentityMask.apply(&image).unwrap();
        assert_eq!(masked.data(), image.data());
    }

    #[test]
    fn polygon_zeroes_outside_pixels() {
        // bottom half of the frame
        let mask = PolygonMask::new(vec![(0.0, 0.5), (1.0, 0.5), (1.0, 1.0), (0.0, 1.0)]);
        let masked = mask.apply(&white(4, 4)).unwrap();
        assert_eq!(masked.pixel(1, 0), &[0]);
        assert_eq!(masked.pixel(1, 1), &[0]);
        assert_eq!(masked.pixel(1, 2), &[255]);
        assert_eq!(masked.pixel(3, 3), &[255]);
    }

    #[test]
    fn colour_pixels_are_masked_on_every_channel() {
        let image = Frame::new(4, 4, PixelFormat::Rgb8, vec![200; 48]).unwrap();
        let mask = PolygonMask::new(vec![(0.0, 0.5), (1.0, 0.5), (1.0, 1.0), (0.0, 1.0)]);
        let masked = mask.apply(&image).unwrap();
        assert_eq!(masked.pixel(2, 0), &[0, 0, 0]);
        assert_eq!(masked.pixel(2, 3), &[200, 200, 200]);
    }

    #[test]
    fn masking_leaves_the_input_untouched() {
        let image = white(4, 4);
        let mask = PolygonMask::new(vec![(0.0, 0.0), (0.5, 0.0), (0.0, 0.5)]);
        let _ = mask.apply(&image).unwrap();
        assert!(image.data().iter().all(|&v| v == 255));
    }

    #[test]
    fn closed_ring_and_degenerate_polygons() {
        let closed = PolygonMask::new(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(closed.pixel_vertices(10, 10).map(|v| v.len()), Some(3));

        let line = PolygonMask::new(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert!(line.pixel_vertices(10, 10).is_none());
        let image = white(3, 3);
        assert_eq!(line.apply(&image).unwrap().data(), image.data());
    }

    #[test]
    fn config_without_polygon_is_identity() {
        let mask = from_config(&MaskConfig::default());
        let image = white(3, 3);
        assert_eq!(mask.apply(&image).unwrap().data(), image.data());
    }
}
