use std::time::{Duration, Instant};

use nozzle_align_core::StablePosition;
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;
use crate::manager::JobService;
use crate::stabilizer::saturating_secs;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollParams {
    /// Pause between polls, in seconds.
    pub interval_s: f64,
    /// Overall wait limit, in seconds.
    pub timeout_s: f64,
}

impl Default for PollParams {
    fn default() -> Self {
        Self {
            interval_s: 0.2,
            timeout_s: 60.0,
        }
    }
}

impl PollParams {
    pub fn interval(&self) -> Duration {
        saturating_secs(self.interval_s)
    }

    pub fn timeout(&self) -> Duration {
        saturating_secs(self.timeout_s)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("nozzle not found: {0}")]
    NotFound(String),

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("job did not finish within {waited:.1}s")]
    Timeout { waited: f64 },
}

/// Poll `service` until job `id` leaves the `Accepted` state.
pub fn wait_for_job(
    service: &dyn JobService,
    id: u64,
    params: &PollParams,
) -> Result<StablePosition, PollError> {
    let started = Instant::now();
    let interval = params.interval();
    loop {
        let job = service.get_job(id);
        match job.status {
            JobStatus::Accepted => {}
            JobStatus::Ok => {
                return job.result.ok_or_else(|| {
                    PollError::Detection(format!("job {id} finished without a position"))
                });
            }
            JobStatus::NotFound => return Err(PollError::NotFound(job.message)),
            JobStatus::Error => return Err(PollError::Detection(job.message)),
        }

        let waited = started.elapsed();
        if waited >= params.timeout() {
            return Err(PollError::Timeout {
                waited: waited.as_secs_f64(),
            });
        }
        std::thread::sleep(interval);
    }
}

/// Start a detection and block until it resolves.
pub fn request_position(
    service: &dyn JobService,
    params: &PollParams,
) -> Result<StablePosition, PollError> {
    let id = service.start_detection();
    log::debug!("requested detection job {id}");
    wait_for_job(service, id, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::DetectionJob;
    use nozzle_align_core::FrameSize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports `Accepted` for the first `pending` polls, then `last`.
    struct Countdown {
        pending: usize,
        polls: AtomicUsize,
        last: DetectionJob,
    }

    impl JobService for Countdown {
        fn start_detection(&self) -> u64 {
            self.last.id
        }

        fn get_job(&self, id: u64) -> DetectionJob {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.pending {
                DetectionJob::accepted(id)
            } else {
                self.last.clone()
            }
        }

        fn frame_size(&self) -> FrameSize {
            FrameSize::default()
        }
    }

    fn fast() -> PollParams {
        PollParams {
            interval_s: 0.001,
            timeout_s: 1.0,
        }
    }

    fn finished(status: JobStatus, result: Option<StablePosition>, message: &str) -> DetectionJob {
        let mut job = DetectionJob::accepted(5);
        job.status = status;
        job.result = result;
        job.message = message.to_string();
        job
    }

    #[test]
    fn returns_position_after_pending_polls() {
        let pos = StablePosition {
            x: 300.0,
            y: 200.0,
            radius: 11.0,
            matches: 3,
        };
        let svc = Countdown {
            pending: 3,
            polls: AtomicUsize::new(0),
            last: finished(JobStatus::Ok, Some(pos), "OK"),
        };
        assert_eq!(request_position(&svc, &fast()).unwrap(), pos);
        assert_eq!(svc.polls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn maps_terminal_states_to_errors() {
        let svc = Countdown {
            pending: 0,
            polls: AtomicUsize::new(0),
            last: finished(JobStatus::NotFound, None, "Nozzle not found"),
        };
        assert_eq!(
            wait_for_job(&svc, 5, &fast()),
            Err(PollError::NotFound("Nozzle not found".into()))
        );

        let svc = Countdown {
            pending: 0,
            polls: AtomicUsize::new(0),
            last: finished(JobStatus::Ok, None, "OK"),
        };
        assert!(matches!(
            wait_for_job(&svc, 5, &fast()),
            Err(PollError::Detection(_))
        ));
    }

    #[test]
    fn gives_up_after_timeout() {
        let svc = Countdown {
            pending: usize::MAX,
            polls: AtomicUsize::new(0),
            last: finished(JobStatus::Ok, None, "OK"),
        };
        let params = PollParams {
            interval_s: 0.005,
            timeout_s: 0.03,
        };
        assert!(matches!(
            wait_for_job(&svc, 5, &params),
            Err(PollError::Timeout { .. })
        ));
    }
}
