#![allow(dead_code)]

use std::sync::mpsc::{Receiver, Sender};

use anyhow::bail;
use lane_lines::{EdgeStages, Frame, LaneDetectionResult, RawSegment, SegmentExtractor};

fn passthrough(frame: &Frame) -> LaneDetectionResult<EdgeStages> {
    let gray = frame.to_gray()?;
    Ok(EdgeStages {
        gray: gray.clone(),
        blurred: gray.clone(),
        edges: gray,
    })
}

/// Returns the same segments for every frame.
pub struct ScriptedExtractor {
    pub segments: Vec<RawSegment>,
}

impl SegmentExtractor for ScriptedExtractor {
    fn edges(&mut self, frame: &Frame) -> LaneDetectionResult<EdgeStages> {
        passthrough(frame)
    }

    fn segments(&mut self, _edge_map: &Frame) -> LaneDetectionResult<Vec<RawSegment>> {
        Ok(self.segments.clone())
    }
}

/// Reports the width of every frame it starts on, then blocks until the
/// test releases it. A frame one pixel wide fails extraction.
pub struct GatedExtractor {
    pub started: Sender<usize>,
    pub gate: Receiver<()>,
    pub segments: Vec<RawSegment>,
}

impl SegmentExtractor for GatedExtractor {
    fn edges(&mut self, frame: &Frame) -> LaneDetectionResult<EdgeStages> {
        let _ = self.started.send(frame.width());
        self.gate.recv()?;
        if frame.width() == 1 {
            bail!("sensor glitch");
        }
        passthrough(frame)
    }

    fn segments(&mut self, _edge_map: &Frame) -> LaneDetectionResult<Vec<RawSegment>> {
        Ok(self.segments.clone())
    }
}

pub fn lane_pair_segments() -> Vec<RawSegment> {
    vec![
        RawSegment::new(300.0, 400.0, 340.0, 300.0),
        RawSegment::new(60.0, 400.0, 20.0, 300.0),
    ]
}

/// Panics on the first frame, then behaves like [`ScriptedExtractor`].
pub struct PanicOnceExtractor {
    pub panicked: bool,
    pub segments: Vec<RawSegment>,
}

impl SegmentExtractor for PanicOnceExtractor {
    fn edges(&mut self, frame: &Frame) -> LaneDetectionResult<EdgeStages> {
        if !self.panicked {
            self.panicked = true;
            panic!("extractor bug");
        }
        passthrough(frame)
    }

    fn segments(&mut self, _edge_map: &Frame) -> LaneDetectionResult<Vec<RawSegment>> {
        Ok(self.segments.clone())
    }
}
