use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT;
use opencv::{
    core::{self, Mat, Point, Scalar, Size, Vector},
    highgui, imgproc,
    prelude::*,
    videoio,
};
use tracing::{info, trace, warn};
use tracing_subscriber::EnvFilter;

use lane_lines::config::Orientation;
use lane_lines::opencv_extractor::{frame_from_mat, mat_from_frame, CannyHoughExtractor};
use lane_lines::opencv_ops::{self, CvLaneRenderer};
use lane_lines::{Config, DeliveredFrame, FrameWorker, LanePipeline, PipelineRecord, PixelFormat};

const LANE_WINDOW: &str = "Lane View";
const PIPELINE_WINDOW: &str = "Pipeline";
const KEY_QUIT: i32 = 113; // 'q'
const KEY_PIPELINE: i32 = 112; // 'p'

#[derive(Parser)]
#[command(name = "lane_lines")]
#[command(about = "Detect straight lane lines in a camera or video stream")]
#[command(version)]
struct Cli {
    /// YAML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera index or video file, overriding `capture.source`.
    #[arg(long)]
    source: Option<String>,

    /// Run without windows.
    #[arg(long)]
    hidden: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(source) = cli.source {
        config.capture.source = source;
    }
    if cli.hidden {
        config.capture.visible = false;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("lane_lines={}", config.logging.level))),
        )
        .init();

    info!(
        source = %config.capture.source,
        detail = ?config.pipeline.detail,
        orientation = ?config.classifier.orientation,
        "starting lane detection"
    );

    let extractor = CannyHoughExtractor::new(config.extractor.clone());
    let pipeline = LanePipeline::new(&config, Box::new(extractor))
        .with_mask(opencv_ops::mask_from_config(&config.mask))
        .with_renderer(Box::new(CvLaneRenderer))
        .with_rotation(opencv_ops::rotate_cw);
    let worker = FrameWorker::spawn(pipeline)?;

    let result = run(&config, &worker);

    let stats = worker.stats();
    info!(
        submitted = stats.submitted(),
        processed = stats.processed(),
        dropped = stats.dropped(),
        failed = stats.failed(),
        "capture finished"
    );
    worker.shutdown();
    result
}

fn open_capture(source: &str) -> Result<videoio::VideoCapture> {
    let cap = match source.parse::<i32>() {
        Ok(index) => videoio::VideoCapture::new(index, videoio::CAP_ANY)?,
        Err(_) => videoio::VideoCapture::from_file(source, videoio::CAP_ANY)?,
    };
    if !cap.is_opened()? {
        bail!("failed to open capture source {}", source);
    }
    Ok(cap)
}

fn run(config: &Config, worker: &FrameWorker) -> Result<()> {
    let capture = &config.capture;
    let mut cap = open_capture(&capture.source)?;

    if capture.visible {
        highgui::named_window(LANE_WINDOW, highgui::WINDOW_AUTOSIZE)?;
    }
    let mut show_pipeline = false;
    let mut shown_seq = 0;

    loop {
        let start_time = Instant::now();
        let mut frame = Mat::default();
        match cap.read(&mut frame) {
            Ok(is_read) => {
                if !is_read || frame.empty() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read frame");
                break;
            }
        }

        let mut resized = Mat::default();
        imgproc::resize(
            &frame,
            &mut resized,
            Size::new(capture.width, capture.height),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0, ALGO_HINT_DEFAULT)?;
        worker.submit(frame_from_mat(&rgb)?);

        if !capture.visible {
            continue;
        }

        // segments are in the analysed frame's space, so show the frame the
        // same way up
        let display = match config.classifier.orientation {
            Orientation::Identity => resized,
            Orientation::Rotate90Cw => {
                let mut rotated = Mat::default();
                core::rotate(&resized, &mut rotated, core::ROTATE_90_CLOCKWISE)?;
                rotated
            }
        };

        // keep the previous result on screen until a newer one lands
        let latest = worker.latest();
        let lane_view = draw_lanes(&display, latest.as_deref())?;
        highgui::imshow(LANE_WINDOW, &lane_view)?;

        if show_pipeline {
            if let Some(delivered) = latest.as_deref() {
                if delivered.seq != shown_seq && !delivered.record.is_empty() {
                    highgui::imshow(PIPELINE_WINDOW, &stack_stages(&delivered.record)?)?;
                    shown_seq = delivered.seq;
                }
            }
        }

        match highgui::wait_key(1)? {
            KEY_QUIT => break,
            KEY_PIPELINE => {
                show_pipeline = !show_pipeline;
                if show_pipeline {
                    highgui::named_window(PIPELINE_WINDOW, highgui::WINDOW_AUTOSIZE)?;
                    shown_seq = 0;
                } else {
                    highgui::destroy_window(PIPELINE_WINDOW)?;
                }
            }
            _ => {}
        }

        let fps = 1.0 / start_time.elapsed().as_secs_f32();
        trace!(fps, "frame shown");
    }

    Ok(())
}

/// Draws the delivered segments in green over the captured frame.
fn draw_lanes(base_img: &Mat, delivered: Option<&DeliveredFrame>) -> Result<Mat> {
    let mut img = base_img.clone();
    let Some(delivered) = delivered else {
        return Ok(img);
    };
    for segment in &delivered.segments {
        imgproc::line(
            &mut img,
            Point::new(segment.near.0 as i32, segment.near.1 as i32),
            Point::new(segment.far.0 as i32, segment.far.1 as i32),
            Scalar::new(0.0, 255.0, 0.0, 255.0),
            8,
            imgproc::LINE_8,
            0,
        )?;
    }
    Ok(img)
}

/// Stacks labelled thumbnails of every recorded stage into one column.
fn stack_stages(record: &PipelineRecord) -> Result<Mat> {
    let mut tiles: Vector<Mat> = Vector::new();
    for stage in record.iter() {
        let src = mat_from_frame(&stage.image)?;
        let code = match stage.image.format() {
            PixelFormat::Gray8 => imgproc::COLOR_GRAY2BGR,
            PixelFormat::Rgb8 => imgproc::COLOR_RGB2BGR,
            PixelFormat::Rgba8 => imgproc::COLOR_RGBA2BGR,
        };
        let mut bgr = Mat::default();
        imgproc::cvt_color(&src, &mut bgr, code, 0, ALGO_HINT_DEFAULT)?;

        let mut thumb = Mat::default();
        imgproc::resize(&bgr, &mut thumb, Size::new(0, 0), 0.33, 0.33, imgproc::INTER_AREA)?;
        imgproc::put_text(
            &mut thumb,
            &stage.label,
            Point::new(10, 30),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.8,
            Scalar::new(255.0, 255.0, 255.0, 255.0),
            2,
            imgproc::LINE_8,
            false,
        )?;
        tiles.push(thumb);
    }
    let mut stacked = Mat::default();
    core::vconcat(&tiles, &mut stacked)?;
    Ok(stacked)
}
