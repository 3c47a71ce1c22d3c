// ============================================
// File: crates/nodepulse-agent/src/services/lifecycle.rs
// ============================================
//! # Node Session Lifecycle
//!
//! ## Creation Reason
//! Drives one node through the handshake with the node service and hands
//! it to the heartbeat scheduler, retrying the whole handshake on failure.
//!
//! ## Main Functionality
//! - `NodeLifecycle::drive`: the gated entry point for every node cycle
//! - `LifecycleState`: explicit state of the running cycle
//! - `HandshakeError`: which step failed and why
//!
//! ## State Machine
//! ```text
//!            try_acquire ok
//!   ┌──────┐ ─────────────► ┌─────────────┐  ok  ┌─────────────────┐
//!   │ Idle │                │ Registering │ ───► │ SessionStarting │
//!   └──────┘ ◄─┐            └──────┬──────┘      └────────┬────────┘
//!      │       │                   │ err                  │ ok / err
//!      │ busy  │ restart_delay     ▼                      ▼
//!      ▼       │            ┌──────────────┐  err  ┌──────────┐
//!   (skip)     └─────────── │ ErrorBackoff │ ◄──── │ Pinging  │
//!                           └──────────────┘       └────┬─────┘
//!                                                       │ ok
//!                                                       ▼
//!                                                ┌───────────┐
//!                                                │ Scheduled │ (return)
//!                                                └───────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The retry is a loop, not recursion; a node can fail for weeks
//! - The guard is held through the backoff sleep and released after it,
//!   so duplicate dispatches during backoff are skipped
//! - The guard is released on drop too, so an aborted or panicking cycle
//!   never locks the node out
//! - The guard's lease goes to the heartbeat; it can only release this
//!   cycle's ownership, never a later one
//! - The retry delay is fixed; there is no jitter or attempt limit
//!
//! ## Last Modified
//! v0.1.0 - Initial lifecycle driver

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use nodepulse_common::types::NodeId;

use crate::error::ApiError;
use crate::management::{NodeApiClient, NodePhase, StatusEvent, StatusEventSender};

use super::heartbeat::HeartbeatScheduler;
use super::registry::{NodeLease, NodeRegistry};
use super::target::NodeTarget;

// ============================================
// LifecycleState
// ============================================

/// State of one lifecycle execution.
#[derive(Debug)]
pub enum LifecycleState {
    /// Waiting to acquire the node.
    Idle,
    /// Register call next.
    Registering,
    /// Start-session call next.
    SessionStarting,
    /// Immediate ping next.
    Pinging,
    /// Handshake done, heartbeat handed over.
    Scheduled,
    /// Handshake failed; sleeping before returning to `Idle`.
    ErrorBackoff(HandshakeError),
}

impl LifecycleState {
    /// Returns the state name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Registering => "registering",
            Self::SessionStarting => "session_starting",
            Self::Pinging => "pinging",
            Self::Scheduled => "scheduled",
            Self::ErrorBackoff(_) => "error_backoff",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handshake step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    /// `POST /nodes/{nodeId}`
    Register,
    /// `POST /nodes/{nodeId}/start-session`
    StartSession,
    /// `POST /nodes/{nodeId}/ping`
    Ping,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => f.write_str("register"),
            Self::StartSession => f.write_str("start session"),
            Self::Ping => f.write_str("ping"),
        }
    }
}

/// Failure of one handshake step.
#[derive(Error, Debug)]
#[error("{step} failed: {source}")]
pub struct HandshakeError {
    /// Step that failed.
    pub step: HandshakeStep,
    /// Underlying API error.
    #[source]
    pub source: ApiError,
}

impl HandshakeError {
    fn new(step: HandshakeStep, source: ApiError) -> Self {
        Self { step, source }
    }
}

/// How a call to `drive` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Another execution owned the node; nothing was done.
    Skipped,
    /// Handshake succeeded.
    Scheduled {
        /// Handshake attempts this call made, including the successful one.
        attempts: u32,
        /// `false` if a heartbeat was already live for the node.
        timer_installed: bool,
    },
}

// ============================================
// NodeGuard
// ============================================

/// Ownership of a node in the registry; released on drop.
struct NodeGuard<'a> {
    registry: &'a NodeRegistry,
    node_id: &'a NodeId,
    lease: NodeLease,
}

impl<'a> NodeGuard<'a> {
    fn acquire(registry: &'a NodeRegistry, node_id: &'a NodeId) -> Option<Self> {
        let lease = registry.try_acquire(node_id)?;
        Some(Self {
            registry,
            node_id,
            lease,
        })
    }
}

impl Drop for NodeGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(self.node_id, self.lease);
    }
}

// ============================================
// NodeLifecycle
// ============================================

/// Drives nodes through register → start-session → ping → scheduled.
pub struct NodeLifecycle {
    client: Arc<NodeApiClient>,
    registry: Arc<NodeRegistry>,
    scheduler: HeartbeatScheduler,
    events: StatusEventSender,
    restart_delay: Duration,
}

impl NodeLifecycle {
    /// Creates a lifecycle driver.
    ///
    /// # Arguments
    /// * `restart_delay` - Wait after a failed handshake before retrying
    pub fn new(
        client: Arc<NodeApiClient>,
        registry: Arc<NodeRegistry>,
        scheduler: HeartbeatScheduler,
        events: StatusEventSender,
        restart_delay: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            scheduler,
            events,
            restart_delay,
        }
    }

    /// Runs the lifecycle for `target` until its heartbeat is scheduled.
    ///
    /// Returns immediately with `Skipped` if another execution owns the
    /// node. Handshake failures are retried from `Idle` after the restart
    /// delay, without limit; API errors never escape this method.
    pub async fn drive(&self, target: NodeTarget) -> DriveOutcome {
        let node_id = &target.node_id;
        let mut guard: Option<NodeGuard<'_>> = None;
        let mut attempts = 0u32;
        let mut state = LifecycleState::Idle;

        loop {
            debug!(node_id = %node_id, state = %state, "Lifecycle transition");

            state = match state {
                LifecycleState::Idle => {
                    let Some(acquired) = NodeGuard::acquire(&self.registry, node_id) else {
                        self.events.emit(
                            StatusEvent::new(node_id.clone(), NodePhase::Skipped).with_detail(
                                format!("Node {node_id} is already being processed"),
                            ),
                        );
                        return DriveOutcome::Skipped;
                    };
                    guard = Some(acquired);
                    attempts = attempts.saturating_add(1);
                    self.events.emit(
                        StatusEvent::new(node_id.clone(), NodePhase::Processing).with_detail(
                            format!(
                                "Processing nodeId: {}, hardwareId: {}, IP: {} (attempt {})",
                                node_id,
                                target.hardware_id,
                                target.ip_display(),
                                attempts
                            ),
                        ),
                    );
                    LifecycleState::Registering
                }

                LifecycleState::Registering => {
                    self.events.phase(node_id, NodePhase::Registering);
                    match self.client.register(&target).await {
                        Ok(data) => {
                            self.events.emit(
                                StatusEvent::new(node_id.clone(), NodePhase::Registered)
                                    .with_detail(format!("Registration response: {data}")),
                            );
                            LifecycleState::SessionStarting
                        }
                        Err(e) => {
                            LifecycleState::ErrorBackoff(HandshakeError::new(HandshakeStep::Register, e))
                        }
                    }
                }

                LifecycleState::SessionStarting => {
                    self.events.phase(node_id, NodePhase::SessionStarting);
                    match self.client.start_session(&target).await {
                        Ok(data) => {
                            self.events.emit(
                                StatusEvent::new(node_id.clone(), NodePhase::SessionStarted)
                                    .with_detail(format!("Start session response: {data}")),
                            );
                            LifecycleState::Pinging
                        }
                        Err(e) => LifecycleState::ErrorBackoff(HandshakeError::new(
                            HandshakeStep::StartSession,
                            e,
                        )),
                    }
                }

                LifecycleState::Pinging => {
                    self.events.phase(node_id, NodePhase::Pinging);
                    match self.client.ping(&target).await {
                        Ok(response) => {
                            self.registry.record_ping_success(node_id);
                            self.events.emit(
                                StatusEvent::new(node_id.clone(), NodePhase::PingSucceeded)
                                    .with_detail(format!(
                                        "Ping response: {}, NodeID: {}, IP: {}",
                                        response.status_or_default(),
                                        node_id,
                                        target.ip_display()
                                    )),
                            );
                            LifecycleState::Scheduled
                        }
                        Err(e) => {
                            LifecycleState::ErrorBackoff(HandshakeError::new(HandshakeStep::Ping, e))
                        }
                    }
                }

                LifecycleState::Scheduled => {
                    let timer_installed = guard
                        .as_ref()
                        .is_some_and(|owned| self.scheduler.schedule(&target, owned.lease));
                    drop(guard.take());
                    return DriveOutcome::Scheduled {
                        attempts,
                        timer_installed,
                    };
                }

                LifecycleState::ErrorBackoff(error) => {
                    self.events.emit(
                        StatusEvent::new(node_id.clone(), NodePhase::ErrorBackoff)
                            .with_detail(format!(
                                "Error occurred for nodeId: {}, restarting process in {} seconds",
                                node_id,
                                self.restart_delay.as_secs()
                            ))
                            .with_error(&error),
                    );
                    tokio::time::sleep(self.restart_delay).await;
                    drop(guard.take());
                    LifecycleState::Idle
                }
            };
        }
    }

    /// Returns the registry this driver acquires nodes from.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Returns the handshake retry delay.
    #[must_use]
    pub fn restart_delay(&self) -> Duration {
        self.restart_delay
    }
}

impl fmt::Debug for NodeLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeLifecycle")
            .field("restart_delay", &self.restart_delay)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::{ApiConfig, StatusEvent};
    use crate::services::dispatch::{command_channel, CommandReceiver, DispatchCommand};
    use crate::services::heartbeat::HeartbeatSettings;
    use nodepulse_common::types::BearerToken;
    use nodepulse_transport::mock::MockTransport;
    use nodepulse_transport::traits::{HttpResponse, HttpTransport, Method};
    use tokio::sync::mpsc;

    struct Fixture {
        transport: Arc<MockTransport>,
        registry: Arc<NodeRegistry>,
        lifecycle: Arc<NodeLifecycle>,
        commands: CommandReceiver,
        events: mpsc::Receiver<StatusEvent>,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let client = Arc::new(NodeApiClient::new(
            ApiConfig::default(),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
        ));
        let registry = Arc::new(NodeRegistry::new());
        let (events_tx, events) = StatusEventSender::channel();
        let (commands_tx, commands) = command_channel();
        let scheduler = HeartbeatScheduler::new(
            Arc::clone(&client),
            Arc::clone(&registry),
            events_tx.clone(),
            commands_tx,
            HeartbeatSettings::default(),
        );
        let lifecycle = Arc::new(NodeLifecycle::new(
            client,
            Arc::clone(&registry),
            scheduler,
            events_tx,
            Duration::from_secs(240),
        ));
        Fixture {
            transport,
            registry,
            lifecycle,
            commands,
            events,
        }
    }

    fn target(id: &str) -> NodeTarget {
        NodeTarget {
            node_id: NodeId::new(id).unwrap(),
            hardware_id: format!("hw-{id}"),
            token: BearerToken::new("token-xyz1").unwrap(),
            proxy: None,
            ip_address: None,
        }
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse::new(200, body)
    }

    fn script_happy_path(transport: &MockTransport, id: &str) {
        transport.respond_always(Method::Post, &format!("/nodes/{id}"), ok(r#"{"pubKey":"x"}"#));
        transport.respond_always(Method::Post, "/start-session", ok(r#"{"sessionId":"s"}"#));
        transport.respond_always(Method::Post, "/ping", ok(r#"{"status":"ok"}"#));
    }

    fn drain_phases(events: &mut mpsc::Receiver<StatusEvent>) -> Vec<NodePhase> {
        let mut phases = Vec::new();
        while let Ok(event) = events.try_recv() {
            phases.push(event.phase);
        }
        phases
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_schedules_heartbeat() {
        let mut f = fixture();
        script_happy_path(&f.transport, "n1");

        let outcome = f.lifecycle.drive(target("n1")).await;
        assert_eq!(
            outcome,
            DriveOutcome::Scheduled {
                attempts: 1,
                timer_installed: true
            }
        );

        let node = NodeId::new("n1").unwrap();
        assert!(f.registry.has_timer(&node));
        assert!(!f.registry.is_active(&node));

        assert_eq!(
            drain_phases(&mut f.events),
            vec![
                NodePhase::Processing,
                NodePhase::Registering,
                NodePhase::Registered,
                NodePhase::SessionStarting,
                NodePhase::SessionStarted,
                NodePhase::Pinging,
                NodePhase::PingSucceeded,
                NodePhase::Scheduled,
            ]
        );

        // Calls are strictly ordered within the node.
        let urls: Vec<String> = f.transport.calls().into_iter().map(|c| c.url).collect();
        assert!(urls[0].ends_with("/nodes/n1"));
        assert!(urls[1].ends_with("/nodes/n1/start-session"));
        assert!(urls[2].ends_with("/nodes/n1/ping"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_skips_when_node_active() {
        let mut f = fixture();
        let node = NodeId::new("n1").unwrap();
        assert!(f.registry.try_acquire(&node).is_some());

        assert_eq!(f.lifecycle.drive(target("n1")).await, DriveOutcome::Skipped);
        assert!(f.transport.calls().is_empty());
        assert!(f.registry.is_active(&node));
        assert_eq!(drain_phases(&mut f.events), vec![NodePhase::Skipped]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_ping_failure_backs_off_then_retries() {
        let f = fixture();
        let node = NodeId::new("n1").unwrap();
        f.transport.respond_always(Method::Post, "/nodes/n1", ok("{}"));
        f.transport.respond_always(Method::Post, "/start-session", ok("{}"));
        f.transport.fail(Method::Post, "/ping", "connection reset by peer");
        f.transport.respond_always(Method::Post, "/ping", ok(r#"{"status":"ok"}"#));

        let lifecycle = Arc::clone(&f.lifecycle);
        let task = tokio::spawn(async move { lifecycle.drive(target("n1")).await });

        tokio::time::sleep(Duration::from_secs(239)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/nodes/n1"), 1);
        assert!(!f.registry.has_timer(&node));
        // Guard is held through the backoff.
        assert!(f.registry.is_active(&node));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/nodes/n1"), 2);

        let outcome = task.await.unwrap();
        assert_eq!(
            outcome,
            DriveOutcome::Scheduled {
                attempts: 2,
                timer_installed: true
            }
        );
        assert!(f.registry.has_timer(&node));
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_failure_never_installs_timer() {
        let mut f = fixture();
        let node = NodeId::new("n1").unwrap();
        f.transport
            .respond_always(Method::Post, "/nodes/n1", HttpResponse::new(500, "internal"));

        let lifecycle = Arc::clone(&f.lifecycle);
        let task = tokio::spawn(async move { lifecycle.drive(target("n1")).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/nodes/n1"), 1);
        assert_eq!(f.transport.calls_matching(Method::Post, "/start-session"), 0);

        let phases = drain_phases(&mut f.events);
        assert_eq!(phases.iter().filter(|p| **p == NodePhase::ErrorBackoff).count(), 1);

        // Exactly one retry per restart delay.
        tokio::time::sleep(Duration::from_secs(240)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/nodes/n1"), 2);
        tokio::time::sleep(Duration::from_secs(240)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/nodes/n1"), 3);

        assert!(!f.registry.has_timer(&node));
        assert!(f.transport.calls_matching(Method::Post, "/ping") == 0);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_session_failure_retries_from_register() {
        let f = fixture();
        f.transport.respond_always(Method::Post, "/nodes/n1", ok("{}"));
        f.transport.fail(Method::Post, "/start-session", "dns error");
        f.transport.respond_always(Method::Post, "/start-session", ok("{}"));
        f.transport.respond_always(Method::Post, "/ping", ok("{}"));

        let outcome = f.lifecycle.drive(target("n1")).await;
        assert!(matches!(outcome, DriveOutcome::Scheduled { attempts: 2, .. }));
        assert_eq!(f.transport.calls_matching(Method::Post, "/nodes/n1"), 2);
        assert_eq!(f.transport.calls_matching(Method::Post, "/start-session"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_handshake_keeps_single_timer() {
        let f = fixture();
        script_happy_path(&f.transport, "n1");

        let first = f.lifecycle.drive(target("n1")).await;
        let second = f.lifecycle.drive(target("n1")).await;

        assert!(matches!(first, DriveOutcome::Scheduled { timer_installed: true, .. }));
        assert!(matches!(second, DriveOutcome::Scheduled { timer_installed: false, .. }));
        assert_eq!(f.registry.timer_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_drive_skipped_during_backoff() {
        let f = fixture();
        f.transport.fail(Method::Post, "/nodes/n1", "connection refused");
        script_happy_path(&f.transport, "n1");

        let lifecycle = Arc::clone(&f.lifecycle);
        let first = tokio::spawn(async move { lifecycle.drive(target("n1")).await });
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(f.lifecycle.drive(target("n1")).await, DriveOutcome::Skipped);
        assert_eq!(f.transport.calls_matching(Method::Post, "/nodes/n1"), 1);

        let outcome = first.await.unwrap();
        assert!(matches!(outcome, DriveOutcome::Scheduled { attempts: 2, .. }));
        assert_eq!(f.registry.timer_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_drive_releases_guard() {
        let f = fixture();
        let node = NodeId::new("n1").unwrap();
        f.transport
            .respond_always(Method::Post, "/nodes/n1", HttpResponse::new(502, "bad gateway"));

        let lifecycle = Arc::clone(&f.lifecycle);
        let task = tokio::spawn(async move { lifecycle.drive(target("n1")).await });
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(f.registry.is_active(&node));

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!f.registry.is_active(&node));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_exhaustion_requests_restart() {
        let mut f = fixture();
        let node = NodeId::new("n2").unwrap();
        f.transport.respond_always(Method::Post, "/nodes/n2", ok("{}"));
        f.transport.respond_always(Method::Post, "/start-session", ok("{}"));
        f.transport.respond(Method::Post, "/ping", ok(r#"{"status":"ok"}"#));
        f.transport.fail_always(Method::Post, "/ping", "timeout");

        f.lifecycle.drive(target("n2")).await;
        assert!(f.registry.has_timer(&node));

        tokio::time::sleep(Duration::from_secs(361)).await;
        assert!(!f.registry.has_timer(&node));
        assert!(!f.registry.is_active(&node));

        let command = f.commands.try_recv().unwrap();
        assert!(matches!(
            command,
            DispatchCommand::RestartAfter { ref target, delay }
                if target.node_id == node && delay == Duration::from_secs(30)
        ));
        assert!(f.commands.try_recv().is_err());
    }

    #[test]
    fn test_handshake_error_display() {
        let err = HandshakeError::new(HandshakeStep::StartSession, ApiError::http_status(401, ""));
        assert_eq!(err.to_string(), "start session failed: HTTP error! status: 401");
        assert_eq!(LifecycleState::ErrorBackoff(err).name(), "error_backoff");
    }
}
