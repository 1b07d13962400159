//! Maintenance Worker
//!
//! Background thread that periodically reclaims space from the store file.
//!
//! ## Cycle
//! ```text
//!   wait(tick | shutdown) ──shutdown──▶ exit
//!          │
//!         tick
//!          ▼
//!   reclaim ─Compacted─▶ reclaim ─ ... ─NothingEligible─▶ wait
//!          └──────────── fault (logged) ────────────────▶ wait
//! ```
//!
//! Each tick drains every eligible segment instead of compacting once, since
//! reclaimable space accumulates between ticks under write-heavy workloads.
//! A pass in progress is never interrupted; shutdown only prevents the next.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use crossbeam::select;

use crate::error::Result;
use crate::storage::{Reclaim, StorageEngine};

const THREAD_NAME: &str = "kvshell-maintenance";

/// Outcome of one reclaim pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Compactions performed before the engine reported nothing eligible
    pub compactions: usize,

    /// Reclaimable bytes measured before each compaction, summed
    pub bytes: u64,

    /// Engine fault that ended the pass early, if any
    pub fault: Option<String>,
}

/// Totals over the worker's lifetime, returned when it is stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub passes: usize,
    pub compactions: usize,
    pub faults: usize,
}

impl MaintenanceReport {
    fn record(&mut self, pass: &PassReport) {
        self.passes += 1;
        self.compactions += pass.compactions;
        if pass.fault.is_some() {
            self.faults += 1;
        }
    }
}

/// Run one reclaim pass: compact until the engine reports nothing eligible
///
/// A genuine engine fault ends the pass and is logged; it is not mistaken for
/// "nothing eligible".
pub fn drain<E: StorageEngine + ?Sized>(engine: &E, discard_ratio: f64) -> PassReport {
    let mut report = PassReport::default();

    loop {
        match engine.reclaim(discard_ratio) {
            Ok(Reclaim::Compacted { bytes }) => {
                report.compactions += 1;
                report.bytes += bytes;
            }
            Ok(Reclaim::NothingEligible) => break,
            Err(e) => {
                tracing::warn!(error = %e, compactions = report.compactions, "reclaim pass failed");
                report.fault = Some(e.to_string());
                break;
            }
        }
    }

    if report.compactions > 0 {
        tracing::info!(
            compactions = report.compactions,
            bytes = report.bytes,
            "reclaim pass finished"
        );
    }
    report
}

/// Handle to the running maintenance thread
///
/// The shutdown signal is the sender half of a channel that is never sent
/// on: dropping it disconnects the worker's receiver.
pub struct MaintenanceWorker {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<MaintenanceReport>>,
}

impl MaintenanceWorker {
    /// Start the worker thread against `engine`
    pub fn spawn<E: StorageEngine>(
        engine: Arc<E>,
        interval: Duration,
        discard_ratio: f64,
    ) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(engine.as_ref(), interval, discard_ratio, shutdown_rx))?;

        tracing::debug!(?interval, discard_ratio, "maintenance worker started");

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Signal shutdown and wait for the thread to exit
    ///
    /// Waits for an in-flight pass to finish. Calling it again is a no-op
    /// that returns an empty report.
    pub fn stop(&mut self) -> std::result::Result<MaintenanceReport, String> {
        // Dropping the only sender is the signal; take() makes it single-fire
        drop(self.shutdown.take());

        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|panic| format!("worker thread panicked: {}", panic_message(&panic))),
            None => Ok(MaintenanceReport::default()),
        }
    }

    /// Whether the thread has not been joined yet
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop() {
                tracing::error!(error = %e, "maintenance worker failed during drop");
            }
        }
    }
}

fn run<E: StorageEngine>(
    engine: &E,
    interval: Duration,
    discard_ratio: f64,
    shutdown: Receiver<()>,
) -> MaintenanceReport {
    let ticker = channel::tick(interval);
    let mut report = MaintenanceReport::default();

    loop {
        let stopping = select! {
            recv(shutdown) -> _ => true,
            recv(ticker) -> _ => false,
        };

        // select! picks at random when both are ready; shutdown wins
        if stopping || matches!(shutdown.try_recv(), Err(TryRecvError::Disconnected)) {
            break;
        }

        let pass = drain(engine, discard_ratio);
        report.record(&pass);
    }

    tracing::debug!(
        passes = report.passes,
        compactions = report.compactions,
        faults = report.faults,
        "maintenance worker stopped"
    );
    report
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
