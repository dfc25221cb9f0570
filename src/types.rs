//! Geometry and image types shared by every stage.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use image::{imageops, ImageBuffer, Luma, Pixel, Rgb, Rgba};
use serde::{Deserialize, Serialize};

/// One straight edge returned by the segment extractor, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl RawSegment {
    /// Segment from `(x1, y1)` to `(x2, y2)`. Endpoint order carries no
    /// meaning.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Euclidean length in pixels, used as the weight of a length-weighted
    /// fit.
    pub fn length(&self) -> f64 {
        (self.x2 - self.x1).hypot(self.y2 - self.y1)
    }

    /// Fits `y = slope * x + intercept` through both endpoints.
    ///
    /// Returns `None` for vertical segments (`x1 == x2`) and for any fit
    /// whose slope or intercept is not finite.
    pub fn line_model(&self) -> Option<LineModel> {
        let dx = self.x2 - self.x1;
        if dx == 0.0 {
            return None;
        }
        let slope = (self.y2 - self.y1) / dx;
        let intercept = self.y1 - slope * self.x1;
        let model = LineModel { slope, intercept };
        model.is_finite().then_some(model)
    }
}

/// `y = slope * x + intercept` in image coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LineModel {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.intercept.is_finite()
    }
}

/// Which lane boundary a segment belongs to, as seen from the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneSide {
    Left,
    Right,
}

/// Renderable form of a [`LineModel`]: a near point on the bottom row and a
/// far point higher up the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedSegment {
    pub near: (f32, f32),
    pub far: (f32, f32),
}

/// Byte layout of a [`Frame`]. Colour formats are RGB ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// Immutable, tightly packed pixel buffer.
///
/// The pixel data sits behind an `Arc`, so cloning a frame never copies
/// pixels and a stage image handed to the diagnostic path can never be
/// mutated by a later stage.
#[derive(Debug, Clone)]
pub struct Frame {
    width: usize,
    height: usize,
    format: PixelFormat,
    data: Arc<[u8]>,
}

fn byte_len(width: usize, height: usize, format: PixelFormat) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(format.channels()))
        .with_context(|| format!("{}x{} {:?} frame is too large", width, height, format))
}

impl Frame {
    /// Wraps `data` as a frame.
    ///
    /// # Arguments
    /// * `width`, `height` - size in pixels
    /// * `format` - layout of each pixel in `data`
    /// * `data` - row-major pixels without padding
    ///
    /// # Returns
    /// An error when the size overflows or `data` has the wrong length.
    pub fn new(width: usize, height: usize, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height, format)?;
        if data.len() != expected {
            bail!(
                "{}x{} {:?} frame needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            );
        }
        Ok(Self {
            width,
            height,
            format,
            data: data.into(),
        })
    }

    /// All-zero frame.
    pub fn blank(width: usize, height: usize, format: PixelFormat) -> Result<Self> {
        let len = byte_len(width, height, format)?;
        Self::new(width, height, format, vec![0u8; len])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Channel bytes of the pixel at column `x`, row `y`.
    ///
    /// Panics when the coordinates are outside the frame.
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let c = self.format.channels();
        let start = (y * self.width + x) * c;
        &self.data[start..start + c]
    }

    /// Borrowed `image` view of the pixels. `P` must match the frame format.
    pub(crate) fn view<P>(&self) -> Result<ImageBuffer<P, &[u8]>>
    where
        P: Pixel<Subpixel = u8>,
    {
        if usize::from(P::CHANNEL_COUNT) != self.format.channels() {
            bail!("{:?} frame viewed with the wrong pixel type", self.format);
        }
        let width = u32::try_from(self.width).context("frame too wide")?;
        let height = u32::try_from(self.height).context("frame too tall")?;
        ImageBuffer::from_raw(width, height, &self.data[..])
            .context("pixel buffer shorter than the frame")
    }

    pub(crate) fn from_image<P>(image: ImageBuffer<P, Vec<u8>>, format: PixelFormat) -> Result<Frame>
    where
        P: Pixel<Subpixel = u8>,
    {
        let (width, height) = (image.width() as usize, image.height() as usize);
        Frame::new(width, height, format, image.into_raw())
    }

    /// Single-channel intensity copy.
    pub fn to_gray(&self) -> Result<Frame> {
        let gray = match self.format {
            PixelFormat::Gray8 => return Ok(self.clone()),
            PixelFormat::Rgb8 => imageops::grayscale(&self.view::<Rgb<u8>>()?),
            PixelFormat::Rgba8 => imageops::grayscale(&self.view::<Rgba<u8>>()?),
        };
        Frame::from_image(gray, PixelFormat::Gray8)
    }

    /// Quarter turn clockwise. Width and height swap.
    pub fn rotate_cw(&self) -> Result<Frame> {
        match self.format {
            PixelFormat::Gray8 => {
                Frame::from_image(imageops::rotate90(&self.view::<Luma<u8>>()?), self.format)
            }
            PixelFormat::Rgb8 => {
                Frame::from_image(imageops::rotate90(&self.view::<Rgb<u8>>()?), self.format)
            }
            PixelFormat::Rgba8 => {
                Frame::from_image(imageops::rotate90(&self.view::<Rgba<u8>>()?), self.format)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_segment_has_no_line_model() {
        assert!(RawSegment::new(10.0, 0.0, 10.0, 50.0).line_model().is_none());
    }

    #[test]
    fn line_model_through_endpoints() {
        let model = RawSegment::new(100.0, 400.0, 140.0, 300.0)
            .line_model()
            .unwrap();
        assert!((model.slope + 2.5).abs() < 1e-9);
        assert!((model.intercept - 650.0).abs() < 1e-9);
    }

    #[test]
    fn frame_rejects_wrong_buffer_size() {
        assert!(Frame::new(4, 4, PixelFormat::Rgb8, vec![0; 47]).is_err());
        assert!(Frame::new(4, 4, PixelFormat::Rgb8, vec![0; 48]).is_ok());
    }

    #[test]
    fn oversized_dimensions_are_an_error() {
        assert!(Frame::new(usize::MAX, 2, PixelFormat::Gray8, Vec::new()).is_err());
        assert!(Frame::new(usize::MAX / 2, 1, PixelFormat::Rgb8, Vec::new()).is_err());
        assert!(Frame::blank(usize::MAX, usize::MAX, PixelFormat::Rgba8).is_err());
    }

    #[test]
    fn gray_conversion_keeps_white_and_darkens_red() {
        let frame = Frame::new(2, 1, PixelFormat::Rgba8, vec![255, 255, 255, 255, 255, 0, 0, 255])
            .unwrap();
        let gray = frame.to_gray().unwrap();
        assert_eq!(gray.format(), PixelFormat::Gray8);
        assert_eq!(gray.data()[0], 255);
        assert!(gray.data()[1] > 0 && gray.data()[1] < 128);
    }

    #[test]
    fn rotate_cw_moves_top_left_to_top_right() {
        // 3x2 gray frame:
        //  1 2 3
        //  4 5 6
        let frame = Frame::new(3, 2, PixelFormat::Gray8, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let rotated = frame.rotate_cw().unwrap();
        assert_eq!((rotated.width(), rotated.height()), (2, 3));
        //  4 1
        //  5 2
        //  6 3
        assert_eq!(rotated.data(), &[4, 1, 5, 2, 6, 3]);
    }

    #[test]
    fn rotate_cw_keeps_colour_channels_together() {
        let frame = Frame::new(2, 1, PixelFormat::Rgb8, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let rotated = frame.rotate_cw().unwrap();
        assert_eq!((rotated.width(), rotated.height()), (1, 2));
        assert_eq!(rotated.pixel(0, 0), &[1, 2, 3]);
        assert_eq!(rotated.pixel(0, 1), &[4, 5, 6]);
    }
}
