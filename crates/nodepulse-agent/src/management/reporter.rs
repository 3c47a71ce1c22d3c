// ============================================
// File: crates/nodepulse-agent/src/management/reporter.rs
// ============================================
//! # Status Events
//!
//! Structured events emitted on every lifecycle and heartbeat transition.
//!
//! Main Components:
//!   - NodePhase: Where a node is in its lifecycle
//!   - StatusEvent: One transition (node, phase, timestamp, detail, error)
//!   - StatusEventSender: Logs events and forwards them to a channel
//!   - StatusReporter: Consumes events and logs a periodic per-phase summary
//!
//! ⚠️ Important Note for Next Developer:
//!   - Sending never blocks; a full channel drops the event (it was logged)
//!   - Errors are rendered to strings here, never the bearer token
//!
//! Last Modified: v0.1.0 - Initial status events
// ============================================

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use nodepulse_common::time::Timestamp;
use nodepulse_common::types::NodeId;

/// Capacity of the status event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Lifecycle phase reported in a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodePhase {
    /// A lifecycle execution acquired the node.
    Processing,
    /// Register call in flight.
    Registering,
    /// Register call succeeded.
    Registered,
    /// Start-session call in flight.
    SessionStarting,
    /// Start-session call succeeded.
    SessionStarted,
    /// Ping call in flight.
    Pinging,
    /// Ping call succeeded.
    PingSucceeded,
    /// Ping call failed.
    PingFailed,
    /// Recurring heartbeat installed.
    Scheduled,
    /// Handshake failed, waiting before the next attempt.
    ErrorBackoff,
    /// Heartbeat gave up, node will run the full lifecycle again.
    Restarting,
    /// Another execution already owns the node.
    Skipped,
    /// Public IP resolved through the node's proxy.
    IpResolved,
    /// Public IP lookup failed.
    IpLookupFailed,
}

impl NodePhase {
    /// Returns `true` for phases that report a failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::PingFailed | Self::ErrorBackoff | Self::Restarting | Self::IpLookupFailed
        )
    }

    /// Returns the snake_case name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Registering => "registering",
            Self::Registered => "registered",
            Self::SessionStarting => "session_starting",
            Self::SessionStarted => "session_started",
            Self::Pinging => "pinging",
            Self::PingSucceeded => "ping_succeeded",
            Self::PingFailed => "ping_failed",
            Self::Scheduled => "scheduled",
            Self::ErrorBackoff => "error_backoff",
            Self::Restarting => "restarting",
            Self::Skipped => "skipped",
            Self::IpResolved => "ip_resolved",
            Self::IpLookupFailed => "ip_lookup_failed",
        }
    }
}

impl fmt::Display for NodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status transition of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub node_id: NodeId,
    pub phase: NodePhase,
    pub timestamp: Timestamp,
    pub detail: Option<String>,
    pub error: Option<String>,
}

impl StatusEvent {
    /// Creates an event stamped with the current time.
    pub fn new(node_id: NodeId, phase: NodePhase) -> Self {
        Self {
            node_id,
            phase,
            timestamp: Timestamp::now(),
            detail: None,
            error: None,
        }
    }

    /// Attaches a human-readable detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attaches the triggering error.
    #[must_use]
    pub fn with_error(mut self, error: &impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    fn log(&self) {
        let detail = self.detail.as_deref().unwrap_or("");
        match (&self.error, self.phase) {
            (Some(err), NodePhase::Restarting) => error!(
                node_id = %self.node_id,
                phase = %self.phase,
                timestamp = %self.timestamp,
                error = %err,
                "{}", detail
            ),
            (Some(err), _) => warn!(
                node_id = %self.node_id,
                phase = %self.phase,
                timestamp = %self.timestamp,
                error = %err,
                "{}", detail
            ),
            (None, NodePhase::Pinging | NodePhase::Skipped) => debug!(
                node_id = %self.node_id,
                phase = %self.phase,
                timestamp = %self.timestamp,
                "{}", detail
            ),
            (None, _) => info!(
                node_id = %self.node_id,
                phase = %self.phase,
                timestamp = %self.timestamp,
                "{}", detail
            ),
        }
    }
}

/// Cloneable emitter of status events.
///
/// Every event is logged through `tracing`; an enabled sender also
/// forwards it to a channel for the `StatusReporter` or a test.
#[derive(Clone, Debug)]
pub struct StatusEventSender {
    tx: Option<mpsc::Sender<StatusEvent>>,
}

impl StatusEventSender {
    /// Creates a sender that forwards to `tx`.
    pub fn new(tx: mpsc::Sender<StatusEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Creates a sender that only logs.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Creates an enabled sender and the matching receiver.
    pub fn channel() -> (Self, mpsc::Receiver<StatusEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }

    /// Logs and forwards an event.
    pub fn emit(&self, event: StatusEvent) {
        event.log();
        if let Some(ref tx) = self.tx {
            let _ = tx.try_send(event);
        }
    }

    /// Shorthand for an event without detail or error.
    pub fn phase(&self, node_id: &NodeId, phase: NodePhase) {
        self.emit(StatusEvent::new(node_id.clone(), phase));
    }
}

/// Consumes status events and keeps the latest phase of every node.
pub struct StatusReporter {
    event_rx: mpsc::Receiver<StatusEvent>,
    interval: Duration,
    latest: HashMap<NodeId, NodePhase>,
}

impl StatusReporter {
    /// Creates a reporter and the sender feeding it.
    ///
    /// # Arguments
    /// * `interval` - How often the per-phase summary is logged
    pub fn new(interval: Duration) -> (Self, StatusEventSender) {
        let (sender, event_rx) = StatusEventSender::channel();
        let reporter = Self {
            event_rx,
            interval,
            latest: HashMap::new(),
        };
        (reporter, sender)
    }

    /// Records one event.
    pub fn record(&mut self, event: &StatusEvent) {
        // Skips say nothing about the node's own progress.
        if event.phase != NodePhase::Skipped {
            self.latest.insert(event.node_id.clone(), event.phase);
        }
    }

    /// Counts nodes per latest phase.
    #[must_use]
    pub fn summary(&self) -> HashMap<NodePhase, usize> {
        let mut counts = HashMap::new();
        for phase in self.latest.values() {
            *counts.entry(*phase).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the latest phase seen for `node_id`.
    #[must_use]
    pub fn latest(&self, node_id: &NodeId) -> Option<NodePhase> {
        self.latest.get(node_id).copied()
    }

    /// Runs until shutdown or until every sender is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Status reporter started ({}s)", self.interval.as_secs());
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => { info!("Status reporter stopping"); break; }
                event = self.event_rx.recv() => match event {
                    Some(event) => self.record(&event),
                    None => break,
                },
                _ = ticker.tick() => {
                    let mut summary: Vec<String> = self
                        .summary()
                        .into_iter()
                        .map(|(phase, count)| format!("{phase}={count}"))
                        .collect();
                    summary.sort();
                    info!(nodes = self.latest.len(), "Node status: {}", summary.join(", "));
                }
            }
        }
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("interval", &self.interval)
            .field("nodes", &self.latest.len())
            .finish()
    }
}
