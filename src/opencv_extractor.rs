//! Canny + probabilistic Hough segment extraction on OpenCV.

use anyhow::{bail, Context};
use opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT;
use opencv::{
    core::{self, Mat, Size, Vec4i, Vector, CV_8U},
    imgproc,
    prelude::*,
};
use tracing::trace;

use crate::config::ExtractorConfig;
use crate::extractor::{EdgeStages, SegmentExtractor};
use crate::types::{Frame, PixelFormat, RawSegment};
use crate::LaneDetectionResult;

pub struct CannyHoughExtractor {
    config: ExtractorConfig,
}

impl CannyHoughExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Converts a colour image to a single intensity channel.
    fn gray_scale(&self, img: &Mat, format: PixelFormat) -> opencv::Result<Mat> {
        let code = match format {
            PixelFormat::Gray8 => return img.try_clone(),
            PixelFormat::Rgb8 => imgproc::COLOR_RGB2GRAY,
            PixelFormat::Rgba8 => imgproc::COLOR_RGBA2GRAY,
        };
        let mut gray = Mat::default();
        imgproc::cvt_color(img, &mut gray, code, 0, ALGO_HINT_DEFAULT)?;
        Ok(gray)
    }

    /// Gaussian blur to suppress noise before edge detection.
    fn noise_removal(&self, img: &Mat) -> opencv::Result<Mat> {
        let k = self.config.blur_kernel;
        let mut dst = Mat::default();
        imgproc::gaussian_blur(
            img,
            &mut dst,
            Size::new(k, k),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
            ALGO_HINT_DEFAULT,
        )?;
        Ok(dst)
    }

    /// Binary (0/255) Canny edge map.
    fn edge_detection(&self, img: &Mat) -> opencv::Result<Mat> {
        let mut edges = Mat::default();
        imgproc::canny(
            img,
            &mut edges,
            self.config.canny_low,
            self.config.canny_high,
            3,
            false,
        )?;
        Ok(edges)
    }
}

impl SegmentExtractor for CannyHoughExtractor {
    fn edges(&mut self, frame: &Frame) -> LaneDetectionResult<EdgeStages> {
        let img = mat_from_frame(frame)?;
        let gray = self.gray_scale(&img, frame.format())?;
        let blurred = self.noise_removal(&gray)?;
        let edges = self.edge_detection(&blurred)?;
        Ok(EdgeStages {
            gray: frame_from_mat(&gray)?,
            blurred: frame_from_mat(&blurred)?,
            edges: frame_from_mat(&edges)?,
        })
    }

    fn segments(&mut self, edge_map: &Frame) -> LaneDetectionResult<Vec<RawSegment>> {
        let img = mat_from_frame(edge_map)?;
        let mut lines: Vector<Vec4i> = Vector::new();
        imgproc::hough_lines_p(
            &img,
            &mut lines,
            self.config.hough_rho,
            self.config.hough_theta,
            self.config.hough_threshold,
            self.config.min_line_length,
            self.config.max_line_gap,
        )?;
        trace!(lines = lines.len(), "hough segments");
        Ok(lines
            .iter()
            .map(|l| RawSegment::new(l[0] as f64, l[1] as f64, l[2] as f64, l[3] as f64))
            .collect())
    }
}

/// Copies a frame into an owned 8-bit `Mat` with the same channel count.
pub fn mat_from_frame(frame: &Frame) -> LaneDetectionResult<Mat> {
    let channels = frame.format().channels() as i32;
    let flat = Mat::from_slice(frame.data())?;
    let shaped = flat.reshape(channels, frame.height() as i32)?;
    Ok(shaped.try_clone()?)
}

/// Copies an 8-bit, 1/3/4-channel `Mat` into a frame.
///
/// Channel order is taken as-is; convert BGR captures to RGB first.
pub fn frame_from_mat(mat: &Mat) -> LaneDetectionResult<Frame> {
    if mat.depth() != CV_8U {
        bail!("expected an 8-bit image, got depth {}", mat.depth());
    }
    let format = match mat.channels() {
        1 => PixelFormat::Gray8,
        3 => PixelFormat::Rgb8,
        4 => PixelFormat::Rgba8,
        n => bail!("unsupported channel count {}", n),
    };
    let owned;
    let continuous = if mat.is_continuous() {
        mat
    } else {
        owned = mat.try_clone()?;
        &owned
    };
    let data = continuous
        .data_bytes()
        .context("reading mat pixels")?
        .to_vec();
    Frame::new(mat.cols() as usize, mat.rows() as usize, format, data)
}
