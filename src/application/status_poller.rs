use crate::application::scheduling_controller::{
    NowProvider, SchedulingState, apply_queue_report, apply_scheduler_report,
};
use crate::application::store::Store;
use crate::infrastructure::error::extract_error_message;
use crate::infrastructure::schedule_mapper::{normalize_queue_report, normalize_scheduler_report};
use crate::infrastructure::scheduling_client::SchedulingApi;
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Visible,
    Silent,
}

struct PollerTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct StatusPoller<A>
where
    A: SchedulingApi + 'static,
{
    api: Arc<A>,
    store: Arc<Store<SchedulingState>>,
    interval: Duration,
    now_provider: NowProvider,
    task: Option<PollerTask>,
}

impl<A> StatusPoller<A>
where
    A: SchedulingApi + 'static,
{
    pub fn new(api: Arc<A>, store: Arc<Store<SchedulingState>>, interval: Duration) -> Self {
        Self {
            api,
            store,
            interval: interval.max(Duration::from_millis(1)),
            now_provider: Arc::new(Utc::now),
            task: None,
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawns the polling task; the first poll runs immediately.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.api),
            Arc::clone(&self.store),
            Arc::clone(&self.now_provider),
            self.interval,
            stop_rx,
        ));
        self.task = Some(PollerTask { stop_tx, handle });
    }

    /// Signals the task, cancelling an in-flight poll, and waits for it to exit.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let _ = task.stop_tx.send(true);
        if let Err(err) = task.handle.await {
            if !err.is_cancelled() {
                warn!("status poller task ended abnormally: {err}");
            }
        }
    }

    pub async fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.start();
        } else {
            self.stop().await;
        }
    }

    pub async fn refresh(&self, mode: RefreshMode) -> bool {
        poll_once(self.api.as_ref(), &self.store, &self.now_provider, mode).await
    }
}

impl<A> Drop for StatusPoller<A>
where
    A: SchedulingApi + 'static,
{
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.stop_tx.send(true);
            task.handle.abort();
        }
    }
}

async fn poll_loop<A>(
    api: Arc<A>,
    store: Arc<Store<SchedulingState>>,
    now_provider: NowProvider,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) where
    A: SchedulingApi + 'static,
{
    info!("status poller started (every {} ms)", interval.as_millis());
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *stop_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                tokio::select! {
                    _ = poll_once(api.as_ref(), &store, &now_provider, RefreshMode::Silent) => {}
                    _ = stop_rx.changed() => break,
                }
            }
        }
    }

    info!("status poller stopped");
}

pub(crate) async fn poll_once<A>(
    api: &A,
    store: &Store<SchedulingState>,
    now_provider: &NowProvider,
    mode: RefreshMode,
) -> bool
where
    A: SchedulingApi + ?Sized,
{
    let visible = mode == RefreshMode::Visible;
    if visible {
        store.update(|state| state.telemetry.loading = true);
    }

    let (queue, scheduler) = tokio::join!(api.queue_status(), api.scheduler_status());
    let now = now_provider();

    let mut errors = Vec::new();
    let queue = match queue {
        Ok(data) => Some(normalize_queue_report(&data)),
        Err(err) => {
            errors.push(extract_error_message(&err, "Failed to load queue status"));
            None
        }
    };
    let scheduler = match scheduler {
        Ok(data) => Some(normalize_scheduler_report(&data)),
        Err(err) => {
            errors.push(extract_error_message(&err, "Failed to load scheduler status"));
            None
        }
    };
    for message in &errors {
        warn!("status poll failed: {message}");
    }
    let error = (!errors.is_empty()).then(|| errors.join("; "));

    let mut data_changed = false;
    store.update_if(|state| {
        if let Some(report) = queue {
            data_changed |= apply_queue_report(state, report, now);
        }
        if let Some(report) = scheduler {
            data_changed |= apply_scheduler_report(state, report, now);
        }
        let mut changed = data_changed;
        if state.telemetry.error != error {
            state.telemetry.error = error;
            changed = true;
        }
        if visible {
            state.telemetry.loading = false;
            changed = true;
        }
        changed
    });
    data_changed
}
