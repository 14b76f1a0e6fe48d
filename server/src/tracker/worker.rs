//! Background progression of device actions

use super::{ActionJob, ActionOutcome, ActionTracker};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Carries out an action against a device
#[async_trait]
pub trait ActionExecutor: Send + Sync + 'static {
    /// Run the action to completion; an error marks the action FAILED
    async fn execute(&self, job: &ActionJob) -> Result<()>;

    /// Human-readable name for this executor
    fn name(&self) -> &'static str;
}

/// Executor that pretends to apply an action by waiting a fixed time
pub struct SimulatedExecutor {
    duration: Duration,
}

impl SimulatedExecutor {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl ActionExecutor for SimulatedExecutor {
    async fn execute(&self, job: &ActionJob) -> Result<()> {
        debug!(
            device_id = job.device_id,
            action_id = job.action_id,
            duration_ms = self.duration.as_millis() as u64,
            "Simulating action"
        );
        sleep(self.duration).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

/// Consumes jobs queued by the tracker and drives each to a terminal state
pub struct ActionWorker {
    tracker: Arc<ActionTracker>,
    executor: Arc<dyn ActionExecutor>,
    jobs: mpsc::UnboundedReceiver<ActionJob>,
    /// Time an action stays PENDING before it starts running
    start_delay: Duration,
    stop: Arc<Notify>,
}

impl ActionWorker {
    pub fn new(
        tracker: Arc<ActionTracker>,
        executor: Arc<dyn ActionExecutor>,
        jobs: mpsc::UnboundedReceiver<ActionJob>,
        start_delay: Duration,
    ) -> Self {
        Self {
            tracker,
            executor,
            jobs,
            start_delay,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Handle that stops [`ActionWorker::run`] when notified
    pub fn stop_handle(&self) -> Arc<Notify> {
        self.stop.clone()
    }

    /// Run until stopped; every job gets its own task
    ///
    /// On stop the job channel is closed, so further initiations are
    /// rejected, and jobs still queued are marked FAILED. Jobs already
    /// started run to completion.
    pub async fn run(mut self) {
        info!(executor = self.executor.name(), "Action worker started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.stop.notified() => None,
                job = self.jobs.recv() => job,
            };
            match next {
                Some(job) => self.spawn_job(job),
                None => break,
            }
        }

        self.jobs.close();
        let mut abandoned = 0usize;
        while let Some(job) = self.jobs.recv().await {
            abandoned += 1;
            let outcome = ActionOutcome::Failed("service shutting down".into());
            if let Err(e) = self.tracker.finish(&job, outcome).await {
                error!(device_id = job.device_id, action_id = job.action_id, "Cannot fail queued action: {}", e);
            }
        }

        info!(abandoned, "Action worker stopped");
    }

    fn spawn_job(&self, job: ActionJob) {
        let tracker = self.tracker.clone();
        let executor = self.executor.clone();
        let start_delay = self.start_delay;
        tokio::spawn(async move {
            run_job(tracker, executor, job, start_delay).await;
        });
    }
}

async fn run_job(
    tracker: Arc<ActionTracker>,
    executor: Arc<dyn ActionExecutor>,
    job: ActionJob,
    start_delay: Duration,
) {
    if !start_delay.is_zero() {
        sleep(start_delay).await;
    }

    if let Err(e) = tracker.mark_running(&job).await {
        error!(device_id = job.device_id, action_id = job.action_id, "Cannot start action: {}", e);
        return;
    }

    // Executor runs on its own task so a panic is contained and reported as a failure
    let exec_job = job.clone();
    let outcome = match tokio::spawn(async move { executor.execute(&exec_job).await }).await {
        Ok(Ok(())) => ActionOutcome::Succeeded,
        Ok(Err(e)) => {
            warn!(device_id = job.device_id, action_id = job.action_id, "Action failed: {:#}", e);
            ActionOutcome::Failed(format!("{:#}", e))
        }
        Err(e) => {
            error!(device_id = job.device_id, action_id = job.action_id, "Action executor aborted: {}", e);
            ActionOutcome::Failed("executor aborted".into())
        }
    };

    if let Err(e) = tracker.finish(&job, outcome).await {
        error!(device_id = job.device_id, action_id = job.action_id, "Cannot finish action: {}", e);
    }
}
