//! Wiring of registry, tracker, worker and dispatcher

use crate::config::ServerConfig;
use crate::registry::DeviceRegistry;
use crate::rpc::RequestDispatcher;
use crate::tracker::{ActionExecutor, ActionTracker, ActionWorker, SimulatedExecutor};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::warn;

/// A running fleet service; stops its action worker when dropped
pub struct FleetService {
    registry: Arc<DeviceRegistry>,
    tracker: Arc<ActionTracker>,
    dispatcher: Arc<RequestDispatcher>,
    stop_worker: Arc<Notify>,
    worker: Option<JoinHandle<()>>,
}

impl FleetService {
    /// Start the service with the simulated action executor
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: &ServerConfig) -> Self {
        let executor = Arc::new(SimulatedExecutor::new(config.action_duration()));
        Self::start_with_executor(config, executor)
    }

    pub fn start_with_executor(config: &ServerConfig, executor: Arc<dyn ActionExecutor>) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let (tracker, jobs) = ActionTracker::new(registry.clone());
        let tracker = Arc::new(tracker);

        let worker = ActionWorker::new(tracker.clone(), executor, jobs, config.action_start_delay());
        let stop_worker = worker.stop_handle();
        let worker = tokio::spawn(worker.run());

        let dispatcher = Arc::new(
            RequestDispatcher::new(registry.clone(), tracker.clone())
                .with_max_action_param_len(config.max_action_param_len),
        );

        Self {
            registry,
            tracker,
            dispatcher,
            stop_worker,
            worker: Some(worker),
        }
    }

    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.registry.clone()
    }

    pub fn tracker(&self) -> Arc<ActionTracker> {
        self.tracker.clone()
    }

    pub fn dispatcher(&self) -> Arc<RequestDispatcher> {
        self.dispatcher.clone()
    }

    /// Stop the action worker and wait for it to fail the actions still queued
    ///
    /// New actions are rejected afterwards; actions already running finish.
    pub async fn shutdown(&mut self) {
        self.stop_worker.notify_one();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("Action worker ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for FleetService {
    fn drop(&mut self) {
        // The worker drains its queue on its own once notified
        self.stop_worker.notify_one();
    }
}
