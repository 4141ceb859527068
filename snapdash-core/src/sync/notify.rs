//! Change notification sources.
//!
//! A notifier hands out [`Subscription`]s delivering [`RefreshRequested`]
//! events. Any event means "something changed, re-list everything". The
//! channel holds a single pending event; the sync controller folds events
//! that arrive during a refresh into one follow-up refresh.

use crate::SnapError;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequested;

/// Sending half handed to a notifier's background task
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<RefreshRequested>,
    cancel: CancellationToken,
}

impl EventSender {
    /// Queue a refresh. Returns false once the subscription is gone.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(RefreshRequested) {
            Ok(()) => true,
            // One is already pending; it covers this change too.
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

/// Owned handle on a notification stream. Dropping it releases the source.
#[derive(Debug)]
pub struct Subscription {
    source: &'static str,
    rx: mpsc::Receiver<RefreshRequested>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn channel(source: &'static str) -> (EventSender, Subscription) {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        (
            EventSender {
                tx,
                cancel: cancel.clone(),
            },
            Subscription { source, rx, cancel },
        )
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Next event, or `None` once the source has stopped
    pub async fn next(&mut self) -> Option<RefreshRequested> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        info!("Unsubscribed from {} notifications", self.source);
    }
}

pub trait ChangeNotifier: Send + Sync {
    fn subscribe(&self) -> crate::Result<Subscription>;
}

/// Watches the system bus for the snapshot manager's signals
#[derive(Debug, Clone)]
pub struct DbusMonitorNotifier {
    program: String,
    interface: String,
}

impl DbusMonitorNotifier {
    pub fn new(program: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            interface: interface.into(),
        }
    }

    fn match_rule(&self) -> String {
        format!("type='signal',interface='{}'", self.interface)
    }
}

/// Whether a `dbus-monitor` output line announces a signal on `interface`
fn is_signal_line(line: &str, interface: &str) -> bool {
    line.starts_with("signal ") && line.contains(&format!("interface={};", interface))
}

impl ChangeNotifier for DbusMonitorNotifier {
    fn subscribe(&self) -> crate::Result<Subscription> {
        let mut child = Command::new(&self.program)
            .args(["--system", &self.match_rule()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SnapError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SnapError::Notifier("dbus-monitor has no stdout".to_string()))?;

        let (sender, subscription) = Subscription::channel("dbus");
        let interface = self.interface.clone();

        tokio::spawn(async move {
            // Owned here so the monitor dies with the subscription.
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = sender.cancelled() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if is_signal_line(&line, &interface) {
                                debug!("Bus signal: {}", line);
                                if !sender.notify() {
                                    break;
                                }
                            }
                        }
                        Ok(None) => {
                            warn!("dbus-monitor exited, no further change notifications");
                            break;
                        }
                        Err(e) => {
                            warn!("Failed to read dbus-monitor output: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        info!("Subscribed to {} signals", self.interface);
        Ok(subscription)
    }
}

/// Emits a refresh on a fixed interval
#[derive(Debug, Clone)]
pub struct PollingNotifier {
    interval: Duration,
}

impl PollingNotifier {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl ChangeNotifier for PollingNotifier {
    fn subscribe(&self) -> crate::Result<Subscription> {
        let (sender, subscription) = Subscription::channel("poll");
        let period = self.interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; the initial listing covers it.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = sender.cancelled() => break,
                    _ = interval.tick() => {
                        if !sender.notify() {
                            break;
                        }
                    }
                }
            }
        });

        info!("Polling for snapshot changes every {}s", period.as_secs());
        Ok(subscription)
    }
}

/// Emits a refresh whenever [`ManualNotifier::trigger`] is called
#[derive(Debug, Default)]
pub struct ManualNotifier {
    senders: Mutex<Vec<EventSender>>,
}

impl ManualNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify every live subscriber. Returns how many were reached.
    pub fn trigger(&self) -> usize {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|s| !s.is_closed());
        senders.iter().filter(|s| s.notify()).count()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|s| !s.is_closed());
        senders.len()
    }
}

impl ChangeNotifier for ManualNotifier {
    fn subscribe(&self) -> crate::Result<Subscription> {
        let (sender, subscription) = Subscription::channel("manual");
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sender);
        Ok(subscription)
    }
}
