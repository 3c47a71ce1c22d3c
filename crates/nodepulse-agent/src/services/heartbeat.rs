// ============================================
// File: crates/nodepulse-agent/src/services/heartbeat.rs
// ============================================
//! # Heartbeat Scheduler
//!
//! ## Creation Reason
//! Keeps a node marked online once its handshake succeeded. Each node gets
//! its own task, detached from the lifecycle execution that installed it,
//! so pings continue after the handshake returns.
//!
//! ## Main Functionality
//! - `HeartbeatScheduler`: installs at most one heartbeat task per node
//! - `HeartbeatSettings`: interval, failure threshold, restart delay
//! - Per-tick error counting and escalation to a full restart
//! - Supervision: a panicking heartbeat clears its timer and asks the
//!   dispatcher for a rerun
//!
//! ## Tick Policy
//! ```text
//! every ping_interval:
//!     ping ok    → ping_errors = 0
//!     ping error → ping_errors += 1
//!                  ping_errors >= max_ping_errors:
//!                      cancel timer, release own lease,
//!                      RestartAfter(process_restart_delay) → dispatcher
//! panic              → clear dead timer, Rerun → dispatcher
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The first tick fires one interval after install; the handshake
//!   already sent the immediate ping
//! - The restart goes through the dispatcher channel, never a direct call
//!   into the lifecycle, so the registry guard is always checked
//! - On exhaustion the task cancels its own timer; nothing may `.await`
//!   after that point
//! - The heartbeat only holds the lease of the cycle that scheduled it;
//!   releasing it never frees a node another cycle has since acquired
//!
//! ## Last Modified
//! v0.1.0 - Initial heartbeat scheduler

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

use nodepulse_common::types::NodeId;

use crate::config::TimingConfig;
use crate::error::ApiError;
use crate::management::models::PingResponse;
use crate::management::{NodeApiClient, NodePhase, StatusEvent, StatusEventSender};

use super::dispatch::{panic_message, CommandSender, DispatchCommand};
use super::registry::{NodeLease, NodeRegistry, TimerHandle};
use super::target::NodeTarget;

// ============================================
// HeartbeatSettings
// ============================================

/// Timing policy of the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    /// Time between scheduled pings.
    pub interval: Duration,
    /// Consecutive failures that trigger a restart.
    pub max_errors: u32,
    /// Wait before the restarted lifecycle begins.
    pub restart_delay: Duration,
}

impl From<&TimingConfig> for HeartbeatSettings {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            interval: timing.ping_interval(),
            max_errors: timing.max_ping_errors,
            restart_delay: timing.process_restart_delay(),
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

/// Result of handling one scheduled ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Ping succeeded.
    Healthy,
    /// Ping failed; carries the consecutive failure count.
    Degraded(u32),
    /// Threshold reached; timer cancelled and restart requested.
    Exhausted,
}

// ============================================
// HeartbeatScheduler
// ============================================

/// Installs and owns the recurring ping of every scheduled node.
pub struct HeartbeatScheduler {
    client: Arc<NodeApiClient>,
    registry: Arc<NodeRegistry>,
    events: StatusEventSender,
    commands: CommandSender,
    settings: HeartbeatSettings,
}

impl HeartbeatScheduler {
    /// Creates a scheduler.
    ///
    /// # Arguments
    /// * `commands` - Dispatcher channel used to request restarts
    pub fn new(
        client: Arc<NodeApiClient>,
        registry: Arc<NodeRegistry>,
        events: StatusEventSender,
        commands: CommandSender,
        settings: HeartbeatSettings,
    ) -> Self {
        Self {
            client,
            registry,
            events,
            commands,
            settings,
        }
    }

    /// Starts the recurring ping for `target` unless one is already live.
    ///
    /// `lease` is the ownership of the cycle scheduling the heartbeat.
    /// Returns `true` if a new timer was installed.
    pub fn schedule(&self, target: &NodeTarget, lease: NodeLease) -> bool {
        let installed = self.registry.register_timer_with(&target.node_id, || {
            let task = tokio::spawn(self.heartbeat(target.clone(), lease).run());
            let timer = TimerHandle::new(task.abort_handle());
            tokio::spawn(supervise(
                task,
                target.node_id.clone(),
                Arc::clone(&self.registry),
                self.commands.clone(),
            ));
            timer
        });

        if installed {
            self.events.emit(
                StatusEvent::new(target.node_id.clone(), NodePhase::Scheduled).with_detail(format!(
                    "Heartbeat every {}s",
                    self.settings.interval.as_secs()
                )),
            );
        } else {
            debug!(node_id = %target.node_id, "Heartbeat already live, not installing another");
        }
        installed
    }

    /// Returns the scheduler's timing policy.
    #[must_use]
    pub fn settings(&self) -> HeartbeatSettings {
        self.settings
    }

    fn heartbeat(&self, target: NodeTarget, lease: NodeLease) -> NodeHeartbeat {
        NodeHeartbeat {
            target,
            lease,
            client: Arc::clone(&self.client),
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
            commands: self.commands.clone(),
            settings: self.settings,
        }
    }
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("settings", &self.settings)
            .field("timers", &self.registry.timer_count())
            .finish()
    }
}

// ============================================
// NodeHeartbeat
// ============================================

/// State owned by one node's heartbeat task.
struct NodeHeartbeat {
    target: NodeTarget,
    lease: NodeLease,
    client: Arc<NodeApiClient>,
    registry: Arc<NodeRegistry>,
    events: StatusEventSender,
    commands: CommandSender,
    settings: HeartbeatSettings,
}

impl NodeHeartbeat {
    async fn run(self) {
        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.events.phase(&self.target.node_id, NodePhase::Pinging);
            let result = self.client.ping(&self.target).await;
            if self.on_ping(result) == TickOutcome::Exhausted {
                break;
            }
        }
    }

    fn on_ping(&self, result: Result<PingResponse, ApiError>) -> TickOutcome {
        let node_id = &self.target.node_id;

        let error = match result {
            Ok(response) => {
                self.registry.record_ping_success(node_id);
                self.events.emit(
                    StatusEvent::new(node_id.clone(), NodePhase::PingSucceeded).with_detail(format!(
                        "Ping response: {}, NodeID: {}, IP: {}",
                        response.status_or_default(),
                        node_id,
                        self.target.ip_display()
                    )),
                );
                return TickOutcome::Healthy;
            }
            Err(e) => e,
        };

        let errors = self.registry.record_ping_failure(node_id);
        self.events.emit(
            StatusEvent::new(node_id.clone(), NodePhase::PingFailed)
                .with_detail(format!(
                    "Ping failed ({errors}/{} consecutive)",
                    self.settings.max_errors
                ))
                .with_error(&error),
        );
        if errors < self.settings.max_errors {
            return TickOutcome::Degraded(errors);
        }

        self.events.emit(
            StatusEvent::new(node_id.clone(), NodePhase::Restarting)
                .with_detail(format!(
                    "Ping failed {} times, restarting process in {}s",
                    errors,
                    self.settings.restart_delay.as_secs()
                ))
                .with_error(&error),
        );

        // This is our own timer; the abort is harmless as nothing awaits below.
        self.registry.cancel_and_clear_timer(node_id);
        self.registry.release(node_id, self.lease);

        let command = DispatchCommand::RestartAfter {
            target: self.target.clone(),
            delay: self.settings.restart_delay,
        };
        if self.commands.send(command).is_err() {
            warn!(node_id = %node_id, "Dispatcher stopped, restart dropped");
        }
        TickOutcome::Exhausted
    }
}

// ============================================
// Supervision
// ============================================

/// Waits for a heartbeat task and recovers from its panic.
///
/// A cancelled or completed task needs nothing: cancellation comes from
/// the registry and completion from exhaustion, which already requested
/// its restart.
async fn supervise(
    task: JoinHandle<()>,
    node_id: NodeId,
    registry: Arc<NodeRegistry>,
    commands: CommandSender,
) {
    let Err(e) = task.await else {
        return;
    };
    if !e.is_panic() {
        return;
    }

    let message = panic_message(e.into_panic().as_ref());
    error!(node_id = %node_id, "Heartbeat task panicked: {}", message);

    // A newer heartbeat may already be live; only the dead one is removed.
    registry.clear_finished_timer(&node_id);
    if commands.send(DispatchCommand::Rerun).is_err() {
        warn!(node_id = %node_id, "Dispatcher stopped, rerun dropped");
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::ApiConfig;
    use crate::services::dispatch::{command_channel, CommandReceiver};
    use nodepulse_common::types::BearerToken;
    use nodepulse_transport::mock::MockTransport;
    use nodepulse_transport::traits::{HttpResponse, HttpTransport, Method};

    struct Fixture {
        transport: Arc<MockTransport>,
        registry: Arc<NodeRegistry>,
        scheduler: HeartbeatScheduler,
        commands: CommandReceiver,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let client = Arc::new(NodeApiClient::new(
            ApiConfig::default(),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
        ));
        let registry = Arc::new(NodeRegistry::new());
        let (tx, commands) = command_channel();
        let scheduler = HeartbeatScheduler::new(
            client,
            Arc::clone(&registry),
            StatusEventSender::disabled(),
            tx,
            HeartbeatSettings::default(),
        );
        Fixture {
            transport,
            registry,
            scheduler,
            commands,
        }
    }

    fn target() -> NodeTarget {
        NodeTarget {
            node_id: NodeId::new("n2").unwrap(),
            hardware_id: "hw-n2".into(),
            token: BearerToken::new("token-n2n2").unwrap(),
            proxy: None,
            ip_address: None,
        }
    }

    fn ok() -> HttpResponse {
        HttpResponse::new(200, r#"{"status":"ok"}"#)
    }

    #[test]
    fn test_settings_from_timing() {
        let settings = HeartbeatSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(120));
        assert_eq!(settings.max_errors, 3);
        assert_eq!(settings.restart_delay, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_installs_single_timer() {
        let f = fixture();
        f.transport.respond_always(Method::Post, "/ping", ok());
        let lease = f.registry.try_acquire(&target().node_id).unwrap();

        assert!(f.scheduler.schedule(&target(), lease));
        assert!(!f.scheduler.schedule(&target(), lease));
        assert_eq!(f.registry.timer_count(), 1);

        // No immediate ping: the handshake already sent one.
        tokio::time::sleep(Duration::from_secs(119)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/ping"), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/ping"), 1);

        tokio::time::sleep(Duration::from_secs(240)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/ping"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_error_count() {
        let f = fixture();
        let node = target().node_id;
        f.transport.fail(Method::Post, "/ping", "connection reset");
        f.transport.fail(Method::Post, "/ping", "connection reset");
        f.transport.respond_always(Method::Post, "/ping", ok());

        let lease = f.registry.try_acquire(&node).unwrap();
        f.scheduler.schedule(&target(), lease);

        tokio::time::sleep(Duration::from_secs(241)).await;
        assert_eq!(f.registry.ping_errors(&node), 2);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(f.registry.ping_errors(&node), 0);
        assert!(f.registry.has_timer(&node));
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_cancel_timer_and_restart_once() {
        let mut f = fixture();
        let node = target().node_id;
        f.transport.fail_always(Method::Post, "/ping", "proxy tunnel refused");

        let lease = f.registry.try_acquire(&node).unwrap();
        f.scheduler.schedule(&target(), lease);
        assert!(f.registry.release(&node, lease));

        tokio::time::sleep(Duration::from_secs(241)).await;
        assert!(f.registry.has_timer(&node));
        assert!(f.commands.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!f.registry.has_timer(&node));
        assert!(!f.registry.is_active(&node));

        match f.commands.try_recv().unwrap() {
            DispatchCommand::RestartAfter { target, delay } => {
                assert_eq!(target.node_id, node);
                assert_eq!(delay, Duration::from_secs(30));
            }
            other => panic!("unexpected command {other:?}"),
        }

        // The heartbeat task is gone: no further pings, no second restart.
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(f.transport.calls_matching(Method::Post, "/ping"), 3);
        assert!(f.commands.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_status_counts_as_failure() {
        let f = fixture();
        let node = target().node_id;
        f.transport
            .respond_always(Method::Post, "/ping", HttpResponse::new(503, "unavailable"));

        let lease = f.registry.try_acquire(&node).unwrap();
        f.scheduler.schedule(&target(), lease);
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(f.registry.ping_errors(&node), 1);
    }

    #[tokio::test]
    async fn test_on_ping_outcomes() {
        let f = fixture();
        let node = target().node_id;
        let lease = f.registry.try_acquire(&node).unwrap();
        let heartbeat = f.scheduler.heartbeat(target(), lease);

        let failure = || Err(ApiError::http_status(500, "boom"));
        assert_eq!(heartbeat.on_ping(failure()), TickOutcome::Degraded(1));
        assert_eq!(heartbeat.on_ping(failure()), TickOutcome::Degraded(2));
        assert_eq!(heartbeat.on_ping(Ok(PingResponse::default())), TickOutcome::Healthy);
        assert_eq!(f.registry.ping_errors(&node), 0);

        assert_eq!(heartbeat.on_ping(failure()), TickOutcome::Degraded(1));
        assert_eq!(heartbeat.on_ping(failure()), TickOutcome::Degraded(2));
        assert_eq!(heartbeat.on_ping(failure()), TickOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_newer_owner_active() {
        let mut f = fixture();
        let node = target().node_id;

        let scheduled = f.registry.try_acquire(&node).unwrap();
        let heartbeat = f.scheduler.heartbeat(target(), scheduled);
        assert!(f.registry.release(&node, scheduled));

        // A restarted cycle is mid-handshake when the old heartbeat gives up.
        let in_flight = f.registry.try_acquire(&node).unwrap();

        let failure = || Err(ApiError::http_status(500, "boom"));
        for _ in 0..2 {
            heartbeat.on_ping(failure());
        }
        assert_eq!(heartbeat.on_ping(failure()), TickOutcome::Exhausted);
        assert!(matches!(
            f.commands.try_recv(),
            Ok(DispatchCommand::RestartAfter { .. })
        ));

        assert!(f.registry.is_active(&node));
        assert!(f.registry.try_acquire(&node).is_none());
        assert!(f.registry.release(&node, in_flight));
    }

    #[tokio::test]
    async fn test_supervise_recovers_panicked_heartbeat() {
        let mut f = fixture();
        let node = target().node_id;

        let task: JoinHandle<()> = tokio::spawn(async { panic!("ping handler crashed") });
        let abort = task.abort_handle();
        assert!(f.registry.register_timer_with(&node, || TimerHandle::new(abort)));

        supervise(task, node.clone(), Arc::clone(&f.registry), f.scheduler.commands.clone())
            .await;

        assert!(!f.registry.has_timer(&node));
        assert!(f.registry.register_timer_with(&node, || {
            TimerHandle::new(tokio::spawn(std::future::pending::<()>()).abort_handle())
        }));
        assert!(matches!(f.commands.try_recv(), Ok(DispatchCommand::Rerun)));
        assert!(f.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_supervise_ignores_cancelled_heartbeat() {
        let mut f = fixture();
        let node = target().node_id;

        let task: JoinHandle<()> = tokio::spawn(std::future::pending());
        task.abort();
        supervise(task, node, Arc::clone(&f.registry), f.scheduler.commands.clone()).await;

        assert!(f.commands.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_heartbeat_is_supervised() {
        let mut f = fixture();
        let node = target().node_id;
        f.transport.fail_always(Method::Post, "/ping", "timeout");

        let lease = f.registry.try_acquire(&node).unwrap();
        assert!(f.scheduler.schedule(&target(), lease));

        // Exhaustion ends the task normally; the supervisor stays quiet.
        tokio::time::sleep(Duration::from_secs(361)).await;
        assert!(matches!(
            f.commands.try_recv(),
            Ok(DispatchCommand::RestartAfter { .. })
        ));
        assert!(f.commands.try_recv().is_err());
    }
}
