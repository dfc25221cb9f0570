//! Rasterises lane segments for the "Lane Lines" diagnostic image.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::types::{Frame, PixelFormat, ProjectedSegment};
use crate::LaneDetectionResult;

pub const LANE_COLOR: [u8; 3] = [255, 0, 0];
pub const LANE_THICKNESS: u32 = 10;

/// Draws lane segments onto a black RGB canvas of the analysed frame's size.
pub trait LaneRenderer: Send {
    fn render(
        &self,
        width: usize,
        height: usize,
        segments: &[ProjectedSegment],
    ) -> LaneDetectionResult<Frame>;
}

/// Pure-Rust renderer on `imageproc`. Each segment becomes a filled band
/// [`LANE_THICKNESS`] pixels wide with round caps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRenderer;

impl LaneRenderer for ImageRenderer {
    fn render(
        &self,
        width: usize,
        height: usize,
        segments: &[ProjectedSegment],
    ) -> LaneDetectionResult<Frame> {
        let mut canvas = RgbImage::new(u32::try_from(width)?, u32::try_from(height)?);
        let color = Rgb(LANE_COLOR);
        let radius = LANE_THICKNESS as f64 / 2.0;

        for segment in segments {
            let Some((x1, y1, x2, y2)) = visible_part(segment, width, height) else {
                continue;
            };
            let (dx, dy) = (x2 - x1, y2 - y1);
            let len = dx.hypot(dy);
            if len >= 1.0 {
                let (nx, ny) = (-dy / len * radius, dx / len * radius);
                let corner = |x: f64, y: f64| Point::new(x.round() as i32, y.round() as i32);
                let band = [
                    corner(x1 + nx, y1 + ny),
                    corner(x2 + nx, y2 + ny),
                    corner(x2 - nx, y2 - ny),
                    corner(x1 - nx, y1 - ny),
                ];
                draw_polygon_mut(&mut canvas, &band, color);
            }
            for (x, y) in [(x1, y1), (x2, y2)] {
                draw_filled_circle_mut(
                    &mut canvas,
                    (x.round() as i32, y.round() as i32),
                    radius as i32,
                    color,
                );
            }
        }
        Frame::from_image(canvas, PixelFormat::Rgb8)
    }
}

/// Part of `segment` inside the frame grown by the line thickness.
///
/// Projected endpoints are never clamped and can sit arbitrarily far off
/// screen; pixel rasterisers need integer coordinates near the canvas.
pub(crate) fn visible_part(
    segment: &ProjectedSegment,
    width: usize,
    height: usize,
) -> Option<(f64, f64, f64, f64)> {
    let pad = LANE_THICKNESS as f64;
    clip(
        (segment.near.0 as f64, segment.near.1 as f64),
        (segment.far.0 as f64, segment.far.1 as f64),
        (-pad, -pad, width as f64 + pad, height as f64 + pad),
    )
}

/// Liang-Barsky clip of a segment against `(x_min, y_min, x_max, y_max)`.
fn clip(
    (x1, y1): (f64, f64),
    (x2, y2): (f64, f64),
    (x_min, y_min, x_max, y_max): (f64, f64, f64, f64),
) -> Option<(f64, f64, f64, f64)> {
    let (dx, dy) = (x2 - x1, y2 - y1);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [
        (-dx, x1 - x_min),
        (dx, x_max - x1),
        (-dy, y1 - y_min),
        (dy, y_max - y1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((x1 + t0 * dx, y1 + t0 * dy, x1 + t1 * dx, y1 + t1 * dy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(frame: &Frame, x: usize, y: usize) -> bool {
        frame.pixel(x, y) == LANE_COLOR
    }

    fn segment(near: (f32, f32), far: (f32, f32)) -> ProjectedSegment {
        ProjectedSegment { near, far }
    }

    #[test]
    fn draws_along_the_segment() {
        let frame = ImageRenderer
            .render(100, 100, &[segment((10.0, 99.0), (90.0, 20.0))])
            .unwrap();
        assert_eq!(frame.format(), PixelFormat::Rgb8);
        assert!(lit(&frame, 50, 59));
        assert!(!lit(&frame, 90, 90));
    }

    #[test]
    fn band_is_about_as_wide_as_the_lane_thickness() {
        let frame = ImageRenderer
            .render(100, 100, &[segment((0.0, 50.0), (99.0, 50.0))])
            .unwrap();
        assert!(lit(&frame, 50, 46));
        assert!(lit(&frame, 50, 54));
        assert!(!lit(&frame, 50, 40));
        assert!(!lit(&frame, 50, 60));
    }

    #[test]
    fn off_screen_endpoints_are_clipped() {
        let frame = ImageRenderer
            .render(64, 100, &[segment((-1.0e7, 50.0), (1.0e7, 50.0))])
            .unwrap();
        assert!(lit(&frame, 0, 50));
        assert!(lit(&frame, 63, 50));
        assert!(!lit(&frame, 32, 10));
    }

    #[test]
    fn fully_outside_segment_draws_nothing() {
        let frame = ImageRenderer
            .render(32, 32, &[segment((-100.0, -100.0), (-50.0, -60.0))])
            .unwrap();
        assert!(frame.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn no_segments_gives_a_black_canvas() {
        let frame = ImageRenderer.render(8, 6, &[]).unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert!(frame.data().iter().all(|&v| v == 0));
    }
}
