// ============================================
// File: crates/nodepulse-agent/src/agent.rs
// ============================================
//! # Agent Orchestrator
//!
//! ## Creation Reason
//! Wires configuration, the API client and the node services together and
//! runs the dispatcher that every node cycle goes through.
//!
//! ## Main Functionality
//! - `Agent`: component wiring and run loop
//! - Startup fan-out (`run_all`) over all accounts and nodes
//! - Supervision: a panicking node task triggers a full re-dispatch
//! - Graceful shutdown: aborts node tasks and cancels all timers
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Agent                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  fan-out (per node)          heartbeat tasks                │
//! │  resolve IP ──┐              RestartAfter ──┐               │
//! │               ▼                             ▼               │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                 Dispatcher loop                      │   │
//! │  │  Process      → spawn NodeLifecycle::drive           │   │
//! │  │  RestartAfter → sleep, then Process                  │   │
//! │  │  Rerun        → fan-out again                        │   │
//! │  │  task panic   → Rerun                                │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                                                             │
//! │  ┌──────────────┐ ┌──────────────┐ ┌───────────────────┐   │
//! │  │ NodeRegistry │ │ NodeLifecycle│ │ StatusReporter    │   │
//! │  └──────────────┘ └──────────────┘ └───────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Fan-out never waits for a handshake; each node gets its own task
//! - A rerun keeps the registry, so live timers survive it
//! - Heartbeat tasks are not in the JoinSet; the registry owns them and
//!   their own supervisor sends `Rerun` when one panics
//! - At most one IP lookup runs per node; a rerun skips nodes whose
//!   lookup is still retrying
//! - Use tokio::select! for concurrent operations
//!
//! ## Last Modified
//! v0.1.0 - Initial agent implementation

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use nodepulse_common::types::NodeId;
use nodepulse_transport::traits::HttpTransport;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::management::{
    NodeApiClient, NodePhase, StatusEvent, StatusEventSender, StatusReporter,
};
use crate::services::dispatch::panic_message;
use crate::services::{
    command_channel, targets_from_config, CommandReceiver, CommandSender, DispatchCommand,
    HeartbeatScheduler, HeartbeatSettings, NodeLifecycle, NodeRegistry, NodeTarget,
};

// ============================================
// Agent
// ============================================

/// Multi-account keep-alive agent.
///
/// # Lifecycle
/// 1. Create with `Agent::new(config, transport)`
/// 2. Start with `agent.run().await`
/// 3. Shutdown via Ctrl+C or the handle from `shutdown_handle()`
pub struct Agent {
    targets: Vec<NodeTarget>,
    use_proxy: bool,
    retry_delay: Duration,
    registry: Arc<NodeRegistry>,
    client: Arc<NodeApiClient>,
    lifecycle: Arc<NodeLifecycle>,
    events: StatusEventSender,
    reporter: StatusReporter,
    commands_tx: CommandSender,
    commands_rx: CommandReceiver,
    shutdown_tx: broadcast::Sender<()>,
}

impl Agent {
    /// Creates an agent over `transport`.
    ///
    /// Proxy mode follows `config.proxy.enabled`.
    pub fn new(config: &AgentConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let use_proxy = config.proxy.enabled;
        let (reporter, events) = StatusReporter::new(config.timing.ping_interval());
        let registry = Arc::new(NodeRegistry::new());
        let client = Arc::new(NodeApiClient::new(config.api.clone(), transport));
        let (commands_tx, commands_rx) = command_channel();

        let scheduler = HeartbeatScheduler::new(
            Arc::clone(&client),
            Arc::clone(&registry),
            events.clone(),
            commands_tx.clone(),
            HeartbeatSettings::from(&config.timing),
        );
        let lifecycle = Arc::new(NodeLifecycle::new(
            Arc::clone(&client),
            Arc::clone(&registry),
            scheduler,
            events.clone(),
            config.timing.restart_delay(),
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            targets: targets_from_config(config, use_proxy),
            use_proxy,
            retry_delay: config.timing.restart_delay(),
            registry,
            client,
            lifecycle,
            events,
            reporter,
            commands_tx,
            commands_rx,
            shutdown_tx,
        }
    }

    /// Returns the node registry (shared with the running agent).
    #[must_use]
    pub fn registry(&self) -> Arc<NodeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns a sender into the dispatcher.
    #[must_use]
    pub fn command_sender(&self) -> CommandSender {
        self.commands_tx.clone()
    }

    /// Returns a handle that stops the agent when sent to.
    #[must_use]
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Number of nodes the agent dispatches.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.targets.len()
    }

    /// Runs the agent until Ctrl+C or a programmatic shutdown.
    ///
    /// # Errors
    /// Returns error if no node is configured.
    pub async fn run(self) -> Result<()> {
        let shutdown_tx = self.shutdown_tx.clone();
        let signal_task = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    let _ = shutdown_tx.send(());
                }
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        });

        let result = self.run_until_shutdown().await;
        signal_task.abort();
        result
    }

    /// Runs the agent until the shutdown handle fires.
    ///
    /// # Errors
    /// Returns error if no node is configured.
    pub async fn run_until_shutdown(self) -> Result<()> {
        info!("Starting nodepulse agent v{}", env!("CARGO_PKG_VERSION"));

        if self.targets.is_empty() {
            return Err(AgentError::startup_failed("no nodes configured"));
        }

        let Self {
            targets,
            use_proxy,
            retry_delay,
            registry,
            client,
            lifecycle,
            events,
            reporter,
            commands_tx,
            mut commands_rx,
            shutdown_tx,
        } = self;

        let mut shutdown_rx = shutdown_tx.subscribe();
        let reporter_task = tokio::spawn(reporter.run(shutdown_tx.subscribe()));

        let mut dispatcher = Dispatcher {
            targets,
            use_proxy,
            retry_delay,
            registry: Arc::clone(&registry),
            client,
            lifecycle,
            events,
            commands: commands_tx,
            tasks: JoinSet::new(),
        };

        dispatcher.run_all(true);
        info!(
            nodes = dispatcher.targets.len(),
            proxy = use_proxy,
            "Agent started successfully"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Dispatcher received shutdown signal");
                    break;
                }
                Some(command) = commands_rx.recv() => dispatcher.handle(command),
                Some(joined) = dispatcher.tasks.join_next() => dispatcher.on_task_exit(joined),
            }
        }

        info!("Shutting down agent...");
        dispatcher.tasks.abort_all();
        while dispatcher.tasks.join_next().await.is_some() {}

        let cancelled = registry.cancel_all_timers();
        if let Err(e) = reporter_task.await {
            warn!("Status reporter failed: {}", e);
        }

        info!(timers = cancelled, "Agent shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("nodes", &self.targets.len())
            .field("use_proxy", &self.use_proxy)
            .field("registry", &self.registry)
            .finish()
    }
}

// ============================================
// Dispatcher
// ============================================

/// Single entry point for node work; owns the supervised task set.
struct Dispatcher {
    targets: Vec<NodeTarget>,
    use_proxy: bool,
    retry_delay: Duration,
    registry: Arc<NodeRegistry>,
    client: Arc<NodeApiClient>,
    lifecycle: Arc<NodeLifecycle>,
    events: StatusEventSender,
    commands: CommandSender,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    fn handle(&mut self, command: DispatchCommand) {
        match command {
            DispatchCommand::Process(target) => {
                let lifecycle = Arc::clone(&self.lifecycle);
                self.tasks.spawn(async move {
                    let outcome = lifecycle.drive(target).await;
                    debug!(?outcome, "Lifecycle finished");
                });
            }
            DispatchCommand::RestartAfter { target, delay } => {
                let commands = self.commands.clone();
                self.tasks.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = commands.send(DispatchCommand::Process(target));
                });
            }
            DispatchCommand::Rerun => self.run_all(false),
        }
    }

    /// Starts one resolve-and-dispatch task per node, in config order.
    ///
    /// A non-initial run only re-handshakes idle nodes; active ones and
    /// live timers are left alone by the registry.
    fn run_all(&mut self, initial: bool) {
        if initial {
            info!(nodes = self.targets.len(), "Dispatching all nodes");
        } else {
            warn!(nodes = self.targets.len(), "Re-running node dispatch");
        }

        for target in &self.targets {
            let resolver = IpResolver {
                client: Arc::clone(&self.client),
                registry: Arc::clone(&self.registry),
                events: self.events.clone(),
                retry_delay: self.retry_delay,
            };
            let use_proxy = self.use_proxy;
            let target = target.clone();
            let commands = self.commands.clone();

            self.tasks.spawn(async move {
                let resolved = if use_proxy {
                    resolver.resolve(target).await
                } else {
                    Some(target)
                };
                if let Some(target) = resolved {
                    let _ = commands.send(DispatchCommand::Process(target));
                }
            });
        }
    }

    fn on_task_exit(&mut self, joined: std::result::Result<(), JoinError>) {
        match joined {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic().as_ref());
                error!("Uncaught panic in node task: {}", message);
                let _ = self.commands.send(DispatchCommand::Rerun);
            }
            Err(_) => debug!("Node task cancelled"),
        }
    }
}

/// Resolves a node's public IP through its proxy.
struct IpResolver {
    client: Arc<NodeApiClient>,
    registry: Arc<NodeRegistry>,
    events: StatusEventSender,
    retry_delay: Duration,
}

impl IpResolver {
    /// Returns `target` with its IP filled in, retrying until the lookup
    /// succeeds. A previously resolved IP is reused.
    ///
    /// Returns `None` if another lookup for the node is still running;
    /// that one dispatches the node when it succeeds.
    async fn resolve(&self, target: NodeTarget) -> Option<NodeTarget> {
        let node_id = target.node_id.clone();
        if let Some(ip) = self.registry.ip_address(&node_id) {
            return Some(target.with_ip(Some(ip)));
        }

        let Some(_lookup) = IpLookup::begin(&self.registry, &node_id) else {
            debug!(node_id = %node_id, "IP lookup already in flight, skipping node");
            return None;
        };
        // The previous lookup may have finished since the cache check.
        if let Some(ip) = self.registry.ip_address(&node_id) {
            return Some(target.with_ip(Some(ip)));
        }

        loop {
            match self.client.fetch_ip(target.proxy.as_deref()).await {
                Ok(ip) => {
                    self.registry.set_ip_address(&node_id, Some(ip.clone()));
                    self.events.emit(
                        StatusEvent::new(node_id.clone(), NodePhase::IpResolved)
                            .with_detail(format!("IP fetched: {ip}")),
                    );
                    return Some(target.with_ip(Some(ip)));
                }
                Err(e) => {
                    self.events.emit(
                        StatusEvent::new(node_id.clone(), NodePhase::IpLookupFailed)
                            .with_detail(format!(
                                "Failed to fetch IP address, retrying in {}s",
                                self.retry_delay.as_secs()
                            ))
                            .with_error(&e),
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

/// In-flight IP lookup mark of one node; cleared on drop.
struct IpLookup<'a> {
    registry: &'a NodeRegistry,
    node_id: &'a NodeId,
}

impl<'a> IpLookup<'a> {
    fn begin(registry: &'a NodeRegistry, node_id: &'a NodeId) -> Option<Self> {
        registry
            .begin_ip_lookup(node_id)
            .then_some(Self { registry, node_id })
    }
}

impl Drop for IpLookup<'_> {
    fn drop(&mut self) {
        self.registry.end_ip_lookup(self.node_id);
    }
}

// ============================================
// Tests
// ============================================
