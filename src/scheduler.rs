//! Periodic state refresh for visible actions.

use crate::error::{DeckError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Something whose displayed state is kept in sync by polling
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    /// Whether a refresh can currently reach the device
    fn is_connected(&self) -> bool;

    /// Read device state and push it to the key
    async fn refresh(&self) -> Result<()>;

    /// Surface a failed refresh
    fn report_failure(&self, error: &DeckError);
}

/// A running refresh loop; aborted when dropped
#[derive(Debug)]
pub struct PollTask(JoinHandle<()>);

impl PollTask {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Per-action refresh scheduler
///
/// One loop task per action: refresh (when connected), wait `interval`
/// seconds after the refresh settled, repeat. An interval of zero or less
/// means a single refresh per start. Restarting replaces the running loop,
/// so refreshes started by the scheduler never overlap.
pub struct Poller {
    target: Arc<dyn PollTarget>,
    visible: bool,
    interval: i64,
    task: Option<PollTask>,
}

impl Poller {
    pub fn new(target: Arc<dyn PollTarget>) -> Self {
        Self {
            target,
            visible: true,
            interval: 0,
            task: None,
        }
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Change the interval; takes effect on the next [`Poller::start`]
    pub fn set_interval(&mut self, seconds: i64) {
        self.interval = seconds;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether a loop is still scheduled or refreshing
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// The action became visible
    pub fn appear(&mut self) {
        self.visible = true;
        self.start();
    }

    /// The action was hidden; stops the timer and any refresh in flight
    pub fn disappear(&mut self) {
        self.visible = false;
        self.task = None;
    }

    /// (Re)start the refresh loop; does nothing while hidden
    pub fn start(&mut self) {
        if !self.visible {
            return;
        }
        // abort the previous loop before spawning its replacement
        self.task = None;

        let target = self.target.clone();
        let interval = self.interval;
        self.task = Some(PollTask(tokio::spawn(poll_loop(target, interval))));
    }
}

async fn poll_loop(target: Arc<dyn PollTarget>, interval: i64) {
    loop {
        if target.is_connected() {
            if let Err(e) = target.refresh().await {
                target.report_failure(&e);
            }
        }
        if interval <= 0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(interval as u64)).await;
    }
}
