//! Background preview rendering.
//!
//! One worker thread per session. Jobs carry a generation number; submitting
//! a job makes every older generation stale. The worker collapses queued
//! bursts to the newest job, skips jobs that went stale while queued, and
//! drops results that went stale while rendering. The session checks the
//! generation once more before writing a result back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use image::DynamicImage;

use crate::adjustments::Adjustments;
use crate::crop::CropRotateState;
use crate::filter::AppliedFilter;
use crate::processing::ImageProcessor;

/// Everything a render needs, captured by value at submission time.
pub struct RenderJob {
    pub generation: u64,
    pub source: Arc<DynamicImage>,
    pub adjustments: Adjustments,
    pub filter: Option<AppliedFilter>,
    pub crop_rotate: CropRotateState,
}

pub struct RenderOutcome {
    pub generation: u64,
    pub result: anyhow::Result<DynamicImage>,
}

pub struct PreviewRenderer {
    latest: Arc<AtomicU64>,
    jobs: Option<mpsc::Sender<RenderJob>>,
    results: mpsc::Receiver<RenderOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl PreviewRenderer {
    pub fn spawn(processor: Arc<dyn ImageProcessor>) -> Self {
        let latest = Arc::new(AtomicU64::new(0));
        let (job_tx, job_rx) = mpsc::channel::<RenderJob>();
        let (result_tx, result_rx) = mpsc::channel();

        let worker_latest = Arc::clone(&latest);
        let worker = std::thread::Builder::new()
            .name("preview-render".into())
            .spawn(move || run_worker(processor, job_rx, result_tx, worker_latest));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to spawn preview worker");
                None
            }
        };

        Self {
            latest,
            jobs: Some(job_tx),
            results: result_rx,
            worker,
        }
    }

    /// Queue `job`, superseding every job with an older generation.
    /// Returns false when the worker is gone.
    pub fn submit(&self, job: RenderJob) -> bool {
        self.latest.store(job.generation, Ordering::Release);
        match &self.jobs {
            Some(tx) if self.worker.is_some() => tx.send(job).is_ok(),
            _ => false,
        }
    }

    /// Mark every generation up to and including `generation` as stale
    /// without queueing new work.
    pub fn invalidate(&self, generation: u64) {
        self.latest.store(generation, Ordering::Release);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest.load(Ordering::Acquire) == generation
    }

    pub fn try_recv(&self) -> Option<RenderOutcome> {
        self.results.try_recv().ok()
    }

    /// Block until the worker delivers a result. None when the worker is gone.
    pub fn recv(&self) -> Option<RenderOutcome> {
        self.worker.as_ref()?;
        self.results.recv().ok()
    }
}

impl Drop for PreviewRenderer {
    fn drop(&mut self) {
        self.jobs.take();
        // Invalidate so a render in flight is discarded; don't join a
        // processor call that may never return.
        self.latest.store(u64::MAX, Ordering::Release);
        self.worker.take();
    }
}

fn run_worker(
    processor: Arc<dyn ImageProcessor>,
    jobs: mpsc::Receiver<RenderJob>,
    results: mpsc::Sender<RenderOutcome>,
    latest: Arc<AtomicU64>,
) {
    while let Ok(mut job) = jobs.recv() {
        while let Ok(newer) = jobs.try_recv() {
            tracing::trace!(generation = job.generation, "Render superseded in queue");
            job = newer;
        }
        if latest.load(Ordering::Acquire) != job.generation {
            tracing::trace!(generation = job.generation, "Skipping stale render");
            continue;
        }

        let result = processor.process_image(
            &job.source,
            &job.adjustments,
            job.filter.as_ref(),
            Some(&job.crop_rotate),
        );

        if latest.load(Ordering::Acquire) != job.generation {
            tracing::trace!(generation = job.generation, "Discarding superseded render");
            continue;
        }
        let outcome = RenderOutcome {
            generation: job.generation,
            result,
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
    tracing::trace!("Preview worker exiting");
}
