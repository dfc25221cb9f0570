//! YAML configuration with a default for every field.

use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration, normally read from `config.yaml`.
///
/// Every section falls back to its defaults, so an empty file (or no file
/// at all, see [`Config::default`]) yields the stock pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extractor: ExtractorConfig,
    pub classifier: ClassifierConfig,
    pub projector: ProjectorConfig,
    pub mask: MaskConfig,
    pub pipeline: PipelineConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents).context("parsing config yaml")?;
        Ok(config)
    }
}

/// Fixed parameters of the edge / line-segment detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Gaussian kernel side, odd.
    pub blur_kernel: i32,
    pub canny_low: f64,
    pub canny_high: f64,
    /// Hough distance resolution in pixels.
    pub hough_rho: f64,
    /// Hough angle resolution in radians.
    pub hough_theta: f64,
    /// Minimum accumulator votes.
    pub hough_threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_rho: 2.0,
            hough_theta: PI / 180.0,
            hough_threshold: 100,
            min_line_length: 40.0,
            max_line_gap: 5.0,
        }
    }
}

/// How the incoming frame is turned before extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Identity,
    /// Transpose + horizontal flip, for sensors mounted sideways.
    Rotate90Cw,
}

/// Which slope sign maps to the left lane.
///
/// With image y growing downward and a forward-facing camera, the left lane
/// boundary leans with a negative slope. Mirrored or upside-down mounts
/// invert that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideConvention {
    #[default]
    NegativeSlopeLeft,
    NegativeSlopeRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStrategy {
    /// Arithmetic mean of slope and intercept.
    #[default]
    Mean,
    /// Mean weighted by segment length.
    LengthWeighted,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub orientation: Orientation,
    pub side_convention: SideConvention,
    pub fit_strategy: FitStrategy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Far endpoint row as a fraction of frame height, from the top.
    pub far_ratio: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self { far_ratio: 3.0 / 5.0 }
    }
}

/// Region-of-interest polygon, vertices as fractions of width and height.
/// No polygon means the masking stage passes the edge map through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub polygon: Option<Vec<(f64, f64)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    /// Unclassified extractor output.
    RawSegments,
    /// One averaged line model per side.
    Averaged,
    /// Averaged, projected to screen endpoints.
    #[default]
    Projected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detail: DetailLevel,
    pub record_stages: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detail: DetailLevel::Projected,
            record_stages: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera index ("0") or a video file path.
    pub source: String,
    pub width: i32,
    pub height: i32,
    pub visible: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: "0".to_string(),
            width: 1280,
            height: 720,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
