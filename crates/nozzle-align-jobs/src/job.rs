use std::time::SystemTime;

use nozzle_align_core::{FrameError, FrameSize, StablePosition};
use serde::{Deserialize, Serialize};

/// Message of the record synthesized for ids the manager does not know.
pub const UNKNOWN_JOB_MESSAGE: &str = "Request not found";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Still running; poll again.
    Accepted,
    /// A stable position was found.
    Ok,
    /// No stable position within the timeout, or unknown job id.
    NotFound,
    /// The job failed for a reason other than "no nozzle".
    Error,
}

impl JobStatus {
    /// HTTP-style status code used on the wire.
    pub fn code(self) -> u16 {
        match self {
            JobStatus::Accepted => 202,
            JobStatus::Ok => 200,
            JobStatus::NotFound => 404,
            JobStatus::Error => 500,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Accepted)
    }
}

/// Snapshot of one detection job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionJob {
    pub id: u64,
    pub status: JobStatus,
    pub result: Option<StablePosition>,
    pub created_at: SystemTime,
    /// Seconds from start to completion; `None` while running.
    pub elapsed: Option<f64>,
    pub message: String,
}

impl DetectionJob {
    pub(crate) fn accepted(id: u64) -> Self {
        Self {
            id,
            status: JobStatus::Accepted,
            result: None,
            created_at: SystemTime::now(),
            elapsed: None,
            message: "Detection in progress".to_string(),
        }
    }

    pub(crate) fn unknown(id: u64) -> Self {
        Self {
            id,
            status: JobStatus::NotFound,
            result: None,
            created_at: SystemTime::now(),
            elapsed: None,
            message: UNKNOWN_JOB_MESSAGE.to_string(),
        }
    }

    pub fn position(&self) -> Option<[f64; 2]> {
        self.result.map(|p| p.uv())
    }
}

/// Failure of a job worker.
#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("failed to spawn detection worker: {0}")]
    Spawn(std::io::Error),

    #[error("detection worker panicked: {0}")]
    Panicked(String),
}

/// Wire form of a polled job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    pub request_id: u64,
    pub statuscode: u16,
    pub position: Option<[f64; 2]>,
    pub runtime: Option<f64>,
    pub statusmessage: String,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl JobResponse {
    pub fn from_job(job: &DetectionJob, frame: FrameSize) -> Self {
        Self {
            request_id: job.id,
            statuscode: job.status.code(),
            position: job.position(),
            runtime: job.elapsed,
            statusmessage: job.message.clone(),
            frame_width: frame.width,
            frame_height: frame.height,
        }
    }
}
