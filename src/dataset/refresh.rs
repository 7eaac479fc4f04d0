//! Background refresh task.
//!
//! One OS thread per handle. The thread sleeps on a stop channel with a
//! timeout equal to the refresh interval; a timeout means "check now", a
//! message or a disconnected channel means "exit". The thread only holds a
//! weak reference to the handle's state, so it also exits once the handle is
//! gone.

use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use super::{Inner, RefreshOutcome};
use crate::error::DatasetError;

pub(super) struct RefreshTask {
    stop_tx: Sender<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl RefreshTask {
    pub(super) fn spawn(inner: Weak<Inner>, interval: Duration) -> Result<Self, DatasetError> {
        let (stop_tx, stop_rx) = bounded(1);

        let thread_name = inner
            .upgrade()
            .map(|inner| format!("refresh:{}", inner.name))
            .unwrap_or_else(|| "refresh".to_string());

        let join_handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || refresh_loop(inner, interval, stop_rx))?;

        Ok(Self {
            stop_tx,
            join_handle: Some(join_handle),
        })
    }

    /// Signals the thread and waits for it to finish its current check.
    pub(super) fn stop(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.join_handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn refresh_loop(inner: Weak<Inner>, interval: Duration, stop_rx: Receiver<()>) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("refresh task stopped");
                return;
            }
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };

        // Errors are logged; the timer is re-armed either way.
        match inner.check_for_update() {
            Ok(RefreshOutcome::Reloaded) => {
                info!(name = %inner.name, sub_package = %inner.sub_package, "refreshed");
            }
            Ok(outcome) => {
                debug!(
                    name = %inner.name,
                    sub_package = %inner.sub_package,
                    ?outcome,
                    "no refresh needed"
                );
            }
            Err(err) => {
                warn!(
                    name = %inner.name,
                    sub_package = %inner.sub_package,
                    error = %err,
                    "refresh check failed"
                );
            }
        }
    }
}
