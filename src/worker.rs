//! Dedicated analysis thread with a keep-only-latest frame mailbox.
//!
//! The capture side calls [`FrameWorker::submit`] at its own cadence. A frame
//! still waiting when a newer one arrives is dropped unprocessed; a frame
//! already being analysed runs to completion. Results are handed to an
//! optional [`ResultSink`] and published into a single slot that display
//! code can read from any thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::pipeline::LanePipeline;
use crate::recorder::PipelineRecord;
use crate::types::{Frame, LineModel, ProjectedSegment};
use crate::LaneDetectionResult;

/// Receives each completed frame, in processing order, on the worker thread.
pub trait ResultSink: Send {
    /// Segments to draw; replaces whatever was drawn before.
    fn lanes_detected(&mut self, seq: u64, segments: &[ProjectedSegment]);

    /// Diagnostic stage images; replaces the previous list.
    fn pipeline_images(&mut self, seq: u64, record: &PipelineRecord);
}

/// The last result the worker delivered.
#[derive(Debug, Clone)]
pub struct DeliveredFrame {
    pub seq: u64,
    pub segments: Vec<ProjectedSegment>,
    pub lines: Vec<LineModel>,
    pub record: PipelineRecord,
}

impl DeliveredFrame {
    fn empty(seq: u64) -> Self {
        Self {
            seq,
            segments: Vec::new(),
            lines: Vec::new(),
            record: Vec::new().into(),
        }
    }
}

/// Frame counters, readable from any thread while the worker runs.
#[derive(Debug, Default)]
pub struct WorkerStats {
    submitted: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl WorkerStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Frames replaced in the mailbox before the worker reached them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames whose analysis returned an error or panicked.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct MailboxState {
    pending: Option<(u64, Frame)>,
    last_seq: u64,
    closed: bool,
}

#[derive(Default)]
struct Mailbox {
    state: Mutex<MailboxState>,
    ready: Condvar,
}

impl Mailbox {
    /// Blocks for the next frame; `None` once closed.
    fn take(&self) -> Option<(u64, Frame)> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(next) = state.pending.take() {
                return Some(next);
            }
            self.ready.wait(&mut state);
        }
    }
}

/// Owns the `lane-worker` thread and the mailbox feeding it.
///
/// Dropping the worker has the same effect as [`FrameWorker::shutdown`].
pub struct FrameWorker {
    mailbox: Arc<Mailbox>,
    latest: Arc<RwLock<Option<Arc<DeliveredFrame>>>>,
    stats: Arc<WorkerStats>,
    handle: Option<JoinHandle<()>>,
}

impl FrameWorker {
    /// Starts the worker; results are only published to [`FrameWorker::latest`].
    pub fn spawn(pipeline: LanePipeline) -> LaneDetectionResult<Self> {
        Self::start(pipeline, None)
    }

    /// Starts the worker and reports every delivered frame to `sink` as
    /// well.
    ///
    /// # Arguments
    /// * `pipeline` - analysis chain, moved onto the worker thread
    /// * `sink` - called on the worker thread after each frame is published
    pub fn spawn_with_sink(
        pipeline: LanePipeline,
        sink: impl ResultSink + 'static,
    ) -> LaneDetectionResult<Self> {
        Self::start(pipeline, Some(Box::new(sink)))
    }

    fn start(
        mut pipeline: LanePipeline,
        mut sink: Option<Box<dyn ResultSink>>,
    ) -> LaneDetectionResult<Self> {
        let mailbox = Arc::new(Mailbox::default());
        let latest = Arc::new(RwLock::new(None));
        let stats = Arc::new(WorkerStats::default());

        let handle = {
            let mailbox = Arc::clone(&mailbox);
            let latest = Arc::clone(&latest);
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("lane-worker".to_string())
                .spawn(move || {
                    while let Some((seq, frame)) = mailbox.take() {
                        // a panic is confined to its frame; analyze resets all
                        // per-frame state on entry
                        let outcome =
                            panic::catch_unwind(AssertUnwindSafe(|| pipeline.analyze(&frame)));
                        let delivered = match outcome {
                            Ok(Ok(analysis)) => DeliveredFrame {
                                seq,
                                segments: analysis.overlay_segments(),
                                lines: analysis.line_models(),
                                record: analysis.record,
                            },
                            Ok(Err(e)) => {
                                warn!(seq, error = %e, "frame analysis failed");
                                stats.failed.fetch_add(1, Ordering::Relaxed);
                                DeliveredFrame::empty(seq)
                            }
                            Err(_) => {
                                error!(seq, "frame analysis panicked");
                                stats.failed.fetch_add(1, Ordering::Relaxed);
                                DeliveredFrame::empty(seq)
                            }
                        };
                        // frame buffers are released here, before delivery
                        drop(frame);

                        let delivered = Arc::new(delivered);
                        *latest.write() = Some(Arc::clone(&delivered));
                        stats.processed.fetch_add(1, Ordering::Relaxed);
                        if let Some(sink) = sink.as_mut() {
                            sink.lanes_detected(seq, &delivered.segments);
                            sink.pipeline_images(seq, &delivered.record);
                        }
                    }
                    debug!("lane worker stopped");
                })
                .context("spawning lane worker thread")?
        };
        info!("lane worker started");

        Ok(Self {
            mailbox,
            latest,
            stats,
            handle: Some(handle),
        })
    }

    /// Queues `frame`, replacing any frame the worker has not started yet.
    ///
    /// # Returns
    /// The sequence number assigned to `frame`. Numbers start at 1 and
    /// increase with every call, dropped frames included.
    pub fn submit(&self, frame: Frame) -> u64 {
        let mut state = self.mailbox.state.lock();
        // numbered under the lock so the queued frame is always the newest
        state.last_seq += 1;
        let seq = state.last_seq;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        if let Some((stale, _)) = state.pending.replace((seq, frame)) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(stale, seq, "dropped unprocessed frame");
        }
        drop(state);
        self.mailbox.ready.notify_one();
        seq
    }

    /// Most recently delivered result, if any frame has completed.
    pub fn latest(&self) -> Option<Arc<DeliveredFrame>> {
        self.latest.read().clone()
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Stops accepting work, discards any queued frame and waits for the
    /// frame in flight to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        {
            let mut state = self.mailbox.state.lock();
            state.closed = true;
            if let Some((seq, _)) = state.pending.take() {
                debug!(seq, "discarding queued frame on shutdown");
            }
        }
        self.mailbox.ready.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("lane worker panicked");
            }
        }
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
