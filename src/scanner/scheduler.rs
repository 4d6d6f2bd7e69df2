// =============================================================================
// Scan Scheduler — Idle / Running lifecycle around the scan engine
// =============================================================================
//
// `start` spawns a single interval loop; calling it while running is a no-op.
// `stop` signals the loop through a watch channel.  The signal is observed
// only while waiting for the next tick, so a tick in progress always runs to
// completion.  Ticks never overlap, including across a quick stop/start.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::scanner::engine::{Scanner, TickReport};
use crate::types::ScannerState;

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct ScanScheduler {
    scanner: Arc<Scanner>,
    period: Duration,
    running: Mutex<Option<RunningLoop>>,
    tick_lock: tokio::sync::Mutex<()>,
    last_report: RwLock<Option<TickReport>>,
}

impl ScanScheduler {
    pub fn new(scanner: Arc<Scanner>, period: Duration) -> Self {
        Self {
            scanner,
            period,
            running: Mutex::new(None),
            tick_lock: tokio::sync::Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    pub fn scanner(&self) -> &Arc<Scanner> {
        &self.scanner
    }

    pub fn state(&self) -> ScannerState {
        match &*self.running.lock() {
            Some(task) if !task.handle.is_finished() => ScannerState::Running,
            _ => ScannerState::Idle,
        }
    }

    pub fn last_report(&self) -> Option<TickReport> {
        self.last_report.read().clone()
    }

    /// Start the periodic loop.  Returns `false` when already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.lock();
        if matches!(&*running, Some(task) if !task.handle.is_finished()) {
            debug!("scanner already running, start ignored");
            return false;
        }

        let (shutdown, rx) = watch::channel(false);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_loop(rx).await });
        *running = Some(RunningLoop { shutdown, handle });

        info!(period_secs = self.period.as_secs(), "scanner started");
        true
    }

    /// Request the loop to stop.  Returns `false` when already idle.
    pub fn stop(&self) -> bool {
        let Some(task) = self.running.lock().take() else {
            return false;
        };
        let _ = task.shutdown.send(true);
        info!("scanner stopping");
        true
    }

    /// Run exactly one tick at `now`, serialised with the periodic loop.
    pub async fn run_tick(&self, now: chrono::DateTime<Utc>) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let report = self.scanner.tick(now).await;
        *self.last_report.write() = Some(report.clone());
        report
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                // Err means the scheduler dropped the sender: also stop.
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            self.run_tick(Utc::now()).await;
        }
        info!("scanner loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::engine::tests::{harness, rebound_closes, t0, StubSource};
    use crate::signals::Alert;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn scheduler(period: Duration) -> (Arc<ScanScheduler>, UnboundedReceiver<Alert>) {
        let h = harness(StubSource::default().with("BTCUSDT", rebound_closes()), &["BTCUSDT"]);
        let sched = Arc::new(ScanScheduler::new(Arc::new(h.scanner), period));
        (sched, h.rx)
    }

    async fn wait_for_report(sched: &ScanScheduler) -> TickReport {
        for _ in 0..100 {
            if let Some(r) = sched.last_report() {
                return r;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no tick ran");
    }

    #[tokio::test]
    async fn starts_idle() {
        let (sched, _rx) = scheduler(Duration::from_secs(3600));
        assert_eq!(sched.state(), ScannerState::Idle);
        assert!(sched.last_report().is_none());
        assert!(!sched.stop());
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_returns_to_idle() {
        let (sched, mut rx) = scheduler(Duration::from_secs(3600));

        assert!(sched.start());
        assert!(!sched.start());
        assert_eq!(sched.state(), ScannerState::Running);

        // First interval tick fires immediately.
        let report = wait_for_report(&sched).await;
        assert_eq!(report.alerts_emitted, 1);
        assert!(rx.recv().await.is_some());

        assert!(sched.stop());
        assert_eq!(sched.state(), ScannerState::Idle);
        assert!(sched.start());
        assert_eq!(sched.state(), ScannerState::Running);
        sched.stop();
    }

    #[tokio::test]
    async fn manual_tick_records_report() {
        let (sched, _rx) = scheduler(Duration::from_secs(3600));
        let report = sched.run_tick(t0()).await;
        assert_eq!(report.at, Some(t0()));
        assert_eq!(sched.last_report().map(|r| r.alerts_emitted), Some(1));
        assert_eq!(sched.state(), ScannerState::Idle);
    }
}
