use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nozzle_align_core::{BlobLocator, FrameSink, FrameSize, FrameSourceFactory, StablePosition};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::job::{DetectionJob, JobError, JobResponse, JobStatus};
use crate::stabilizer::{saturating_secs, PositionStabilizer, StabilizeParams};

/// Request/poll surface of a detection service.
pub trait JobService: Send + Sync {
    /// Start a detection and return its id without waiting for it.
    fn start_detection(&self) -> u64;

    /// Current record of a job; unknown ids yield a `NotFound` record.
    fn get_job(&self, id: u64) -> DetectionJob;

    /// Size of the frames positions are reported in.
    fn frame_size(&self) -> FrameSize;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobManagerParams {
    pub stabilize: StabilizeParams,
    /// Completed jobs older than this many seconds are dropped on the next
    /// `start_job`.
    pub retention_s: f64,
    /// Frame size reported in wire responses.
    pub frame_size: FrameSize,
}

impl Default for JobManagerParams {
    fn default() -> Self {
        Self {
            stabilize: StabilizeParams::default(),
            retention_s: 600.0,
            frame_size: FrameSize::default(),
        }
    }
}

impl JobManagerParams {
    pub fn retention(&self) -> Duration {
        saturating_secs(self.retention_s)
    }
}

struct JobEntry {
    job: DetectionJob,
    started: Instant,
    finished: Option<Instant>,
}

struct Shared {
    jobs: RwLock<HashMap<u64, JobEntry>>,
    next_id: AtomicU64,
    factory: Arc<dyn FrameSourceFactory>,
    locator: Arc<dyn BlobLocator>,
    sink: Option<Arc<dyn FrameSink>>,
    params: JobManagerParams,
}

impl Shared {
    /// Record the terminal state of a job. Later writes are ignored.
    fn finish(&self, id: u64, status: JobStatus, result: Option<StablePosition>, message: String) {
        let mut jobs = self.jobs.write();
        let Some(entry) = jobs.get_mut(&id) else {
            return;
        };
        if entry.job.status.is_terminal() {
            log::warn!("job {id} already finished, ignoring {status:?}");
            return;
        }
        let elapsed = entry.started.elapsed();
        entry.job.status = status;
        entry.job.result = result;
        entry.job.elapsed = Some(elapsed.as_secs_f64());
        entry.job.message = message;
        entry.finished = Some(Instant::now());
    }

    fn run(&self) -> Result<Option<StablePosition>, JobError> {
        let mut source = self.factory.open()?;
        let mut stabilizer =
            PositionStabilizer::new(self.locator.clone(), self.params.stabilize.clone());
        if let Some(sink) = &self.sink {
            stabilizer = stabilizer.with_sink(sink.clone());
        }
        Ok(stabilizer.stabilize(source.as_mut())?)
    }

    /// [`Shared::run`] with a panic in the camera or locator turned into an error.
    fn run_guarded(&self) -> Result<Option<StablePosition>, JobError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run()))
            .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(payload.as_ref()))))
    }

    fn evict_expired(&self) {
        let retention = self.params.retention();
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, e| match e.finished {
            Some(t) => t.elapsed() <= retention,
            None => true,
        });
        let dropped = before - jobs.len();
        if dropped > 0 {
            log::debug!("evicted {dropped} completed job(s)");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs each detection on its own worker thread and keeps the job table.
///
/// Every worker opens its own frame source from the factory, so a job has
/// exclusive use of the camera stream it reads.
#[derive(Clone)]
pub struct DetectionJobManager {
    shared: Arc<Shared>,
}

impl DetectionJobManager {
    pub fn new(
        factory: Arc<dyn FrameSourceFactory>,
        locator: Arc<dyn BlobLocator>,
        params: JobManagerParams,
    ) -> Self {
        Self::build(factory, locator, None, params)
    }

    /// Same as [`DetectionJobManager::new`], forwarding annotated frames to `sink`.
    pub fn with_sink(
        factory: Arc<dyn FrameSourceFactory>,
        locator: Arc<dyn BlobLocator>,
        sink: Arc<dyn FrameSink>,
        params: JobManagerParams,
    ) -> Self {
        Self::build(factory, locator, Some(sink), params)
    }

    fn build(
        factory: Arc<dyn FrameSourceFactory>,
        locator: Arc<dyn BlobLocator>,
        sink: Option<Arc<dyn FrameSink>>,
        params: JobManagerParams,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                jobs: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                factory,
                locator,
                sink,
                params,
            }),
        }
    }

    pub fn params(&self) -> &JobManagerParams {
        &self.shared.params
    }

    /// Register a job in `Accepted` state and start its worker.
    pub fn start_job(&self) -> u64 {
        self.shared.evict_expired();

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.jobs.write().insert(
            id,
            JobEntry {
                job: DetectionJob::accepted(id),
                started: Instant::now(),
                finished: None,
            },
        );

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name(format!("detect-{id}"))
            .spawn(move || {
                log::info!("detection job {id} started");
                match shared.run_guarded() {
                    Ok(Some(pos)) => {
                        log::info!("job {id}: nozzle at ({}, {})", pos.x, pos.y);
                        shared.finish(id, JobStatus::Ok, Some(pos), "OK".to_string());
                    }
                    Ok(None) => {
                        log::info!("job {id}: nozzle not found");
                        shared.finish(id, JobStatus::NotFound, None, "Nozzle not found".to_string());
                    }
                    Err(e) => {
                        log::warn!("job {id} failed: {e}");
                        shared.finish(id, JobStatus::Error, None, e.to_string());
                    }
                }
            });

        if let Err(e) = spawned {
            let err = JobError::Spawn(e);
            log::warn!("job {id}: {err}");
            self.shared.finish(id, JobStatus::Error, None, err.to_string());
        }
        id
    }

    /// Snapshot of a job, or a synthesized `NotFound` record for unknown ids.
    pub fn poll(&self, id: u64) -> DetectionJob {
        self.shared
            .jobs
            .read()
            .get(&id)
            .map(|e| e.job.clone())
            .unwrap_or_else(|| DetectionJob::unknown(id))
    }

    pub fn response(&self, id: u64) -> JobResponse {
        JobResponse::from_job(&self.poll(id), self.shared.params.frame_size)
    }

    /// Number of jobs currently held, running or completed.
    pub fn job_count(&self) -> usize {
        self.shared.jobs.read().len()
    }
}

impl JobService for DetectionJobManager {
    fn start_detection(&self) -> u64 {
        self.start_job()
    }

    fn get_job(&self, id: u64) -> DetectionJob {
        self.poll(id)
    }

    fn frame_size(&self) -> FrameSize {
        self.shared.params.frame_size
    }
}
