use crate::{
    error::StorageError,
    warehouse::{client::WarehouseClient, native::JobHandle},
};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

fn default_delay_ms() -> u64 {
    1000
}

/// How often and for how long a load job is polled. The default polls every
/// second with no deadline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobPollPolicy {
    #[serde(default = "default_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for JobPollPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_delay_ms(),
            max_delay_ms: default_delay_ms(),
            deadline_ms: None,
        }
    }
}

impl JobPollPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, deadline: Option<Duration>) -> Self {
        Self {
            base_delay_ms: base_delay.as_millis() as u64,
            max_delay_ms: max_delay.max(base_delay).as_millis() as u64,
            deadline_ms: deadline.map(|d| d.as_millis() as u64),
        }
    }

    /// Backs off from one second up to thirty and gives up after `deadline`.
    pub fn bounded(deadline: Duration) -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), Some(deadline))
    }

    /// Polls back to back. Meant for in-memory clients.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, None)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub(crate) fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::from_millis(0);
        }

        let factor = 1u64 << attempt.min(6);
        let delay_ms = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms.max(self.base_delay_ms)))
    }
}

/// Polls `job` until it reaches a terminal state. Errors reported by the job
/// are joined into one [`StorageError::LoadJob`]. Only the status check is
/// repeated; the job itself is never resubmitted.
pub async fn wait_for_job(
    client: &dyn WarehouseClient,
    job: &JobHandle,
    policy: &JobPollPolicy,
) -> Result<(), StorageError> {
    let started = Instant::now();
    let deadline = policy.deadline();
    let mut attempt = 0;

    loop {
        let status = client.poll_job(job).await?;
        debug!("Polled load job {job}: {:?}", status.state);

        if status.is_done() {
            if status.errors.is_empty() {
                return Ok(());
            }

            warn!(
                "Load job {job} finished with {} error(s)",
                status.errors.len()
            );
            return Err(StorageError::LoadJob(status.errors.join("\n")));
        }

        let delay = policy.backoff_delay(attempt);
        if let Some(limit) = deadline
            && started.elapsed() + delay > limit
        {
            return Err(StorageError::LoadJobTimeout {
                job: job.clone(),
                elapsed: started.elapsed(),
            });
        }

        sleep(delay).await;
        attempt += 1;
    }
}
