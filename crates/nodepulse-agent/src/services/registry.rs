// ============================================
// File: crates/nodepulse-agent/src/services/registry.rs
// ============================================
//! # Node Registry
//!
//! ## Creation Reason
//! Single owner of per-node runtime state. The lifecycle driver and the
//! heartbeat scheduler both run concurrently for the same node; routing
//! every state change through one synchronized map keeps a restart from
//! racing an in-flight heartbeat.
//!
//! ## Main Functionality
//! - `NodeRegistry`: guard (`try_acquire` / `release`), timer ownership,
//!   ping error counters, IP lookups and the resolved IP of each node
//! - `NodeLease`: proof of ownership returned by `try_acquire`
//! - `TimerHandle`: cancellable handle of a node's heartbeat task
//!
//! ## Invariants
//! ```text
//! active == true        ⇒ exactly one lease holder owns the node
//! release(lease)        clears `active` only for the current generation
//! live timer            ⇔ registered and its task not finished
//! ping_errors           = consecutive failed pings since the last success
//! ip_lookup == true     ⇒ one resolver is fetching the node's IP
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - State is stored in a DashMap; every check-and-set happens under the
//!   entry's shard lock, so never `.await` while holding an entry
//! - Entries are never removed; the node list is static for the process
//! - `cancel_and_clear_timer` may be called from the timer's own task
//! - A lease outlives the acquire it came from; a stale lease releases
//!   nothing, so late cleanup never frees a node a newer cycle owns
//!
//! ## Last Modified
//! v0.1.0 - Initial node registry

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use nodepulse_common::types::NodeId;

// ============================================
// TimerHandle
// ============================================

/// Handle of a live heartbeat task.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    /// Wraps the abort handle of a spawned task.
    #[must_use]
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort }
    }

    /// Stops the task at its next suspension point.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Returns `true` once the task has completed or been aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

// ============================================
// NodeLease
// ============================================

/// Ownership token of one lifecycle execution.
///
/// Only the lease returned by the most recent successful `try_acquire`
/// can release the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLease {
    generation: u64,
}

impl NodeLease {
    /// Acquire counter value this lease was issued at.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

// ============================================
// NodeState
// ============================================

/// Runtime state of one node.
#[derive(Debug, Default)]
struct NodeState {
    active: bool,
    generation: u64,
    ping_errors: u32,
    ip_address: Option<String>,
    ip_lookup: bool,
    timer: Option<TimerHandle>,
}

impl NodeState {
    fn has_live_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }
}

// ============================================
// NodeRegistry
// ============================================

/// Concurrency guard and runtime state store for all nodes.
///
/// # Thread Safety
/// All methods take `&self` and are safe to call from any task.
///
/// # Example
/// ```
/// use nodepulse_agent::services::NodeRegistry;
/// use nodepulse_common::NodeId;
///
/// let registry = NodeRegistry::new();
/// let id = NodeId::new("node-1").unwrap();
///
/// let lease = registry.try_acquire(&id).unwrap();
/// assert!(registry.try_acquire(&id).is_none());
/// assert!(registry.release(&id, lease));
/// assert!(registry.try_acquire(&id).is_some());
/// ```
#[derive(Default)]
pub struct NodeRegistry {
    nodes: DashMap<NodeId, NodeState>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================
    // Guard
    // ========================================

    /// Marks the node active unless it already is.
    ///
    /// Returns `None` when another execution owns the node; the caller
    /// must then back off without side effects. A successful acquire
    /// starts a fresh cycle, so the ping error counter is reset.
    pub fn try_acquire(&self, node_id: &NodeId) -> Option<NodeLease> {
        let mut state = self.nodes.entry(node_id.clone()).or_default();
        if state.active {
            return None;
        }
        state.active = true;
        state.generation = state.generation.wrapping_add(1);
        state.ping_errors = 0;
        Some(NodeLease {
            generation: state.generation,
        })
    }

    /// Marks the node inactive if `lease` is the current owner's.
    ///
    /// Returns `true` if the node was released. Releasing twice, or with
    /// a lease from an earlier acquire, is a no-op.
    pub fn release(&self, node_id: &NodeId, lease: NodeLease) -> bool {
        let Some(mut state) = self.nodes.get_mut(node_id) else {
            return false;
        };
        if !state.active || state.generation != lease.generation {
            debug!(
                node_id = %node_id,
                lease = lease.generation,
                current = state.generation,
                "Ignoring release from stale lease"
            );
            return false;
        }
        state.active = false;
        true
    }

    /// Returns `true` while a lifecycle execution owns the node.
    #[must_use]
    pub fn is_active(&self, node_id: &NodeId) -> bool {
        self.nodes.get(node_id).is_some_and(|s| s.active)
    }

    // ========================================
    // Timers
    // ========================================

    /// Installs the timer built by `spawn` only if the node has no live one.
    ///
    /// The check and the insert happen under one lock, so two overlapping
    /// handshakes cannot both install a timer. A registered timer whose
    /// task already died (panicked) counts as absent. `spawn` must not block.
    ///
    /// Returns `true` if a timer was installed.
    pub fn register_timer_with<F>(&self, node_id: &NodeId, spawn: F) -> bool
    where
        F: FnOnce() -> TimerHandle,
    {
        let mut state = self.nodes.entry(node_id.clone()).or_default();
        if state.has_live_timer() {
            return false;
        }
        if state.timer.is_some() {
            warn!(node_id = %node_id, "Replacing dead heartbeat timer");
        }
        state.timer = Some(spawn());
        true
    }

    /// Returns `true` if the node has a registered timer whose task is
    /// still running.
    #[must_use]
    pub fn has_timer(&self, node_id: &NodeId) -> bool {
        self.nodes.get(node_id).is_some_and(|s| s.has_live_timer())
    }

    /// Forgets the node's timer if its task has already finished.
    ///
    /// Returns `true` if a dead timer was removed. A live timer is left
    /// untouched.
    pub fn clear_finished_timer(&self, node_id: &NodeId) -> bool {
        let Some(mut state) = self.nodes.get_mut(node_id) else {
            return false;
        };
        if state.timer.as_ref().is_some_and(TimerHandle::is_finished) {
            state.timer = None;
            return true;
        }
        false
    }

    /// Cancels and forgets the node's timer. No-op if there is none.
    ///
    /// Returns `true` if a timer was removed.
    pub fn cancel_and_clear_timer(&self, node_id: &NodeId) -> bool {
        let removed = self
            .nodes
            .get_mut(node_id)
            .and_then(|mut state| state.timer.take());

        match removed {
            Some(timer) => {
                timer.cancel();
                debug!(node_id = %node_id, "Heartbeat timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every registered timer. Used on shutdown.
    pub fn cancel_all_timers(&self) -> usize {
        let mut cancelled = 0;
        for mut entry in self.nodes.iter_mut() {
            if let Some(timer) = entry.timer.take() {
                timer.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    // ========================================
    // Ping Errors
    // ========================================

    /// Resets the node's consecutive ping error counter.
    pub fn record_ping_success(&self, node_id: &NodeId) {
        self.nodes.entry(node_id.clone()).or_default().ping_errors = 0;
    }

    /// Increments the node's ping error counter and returns the new value.
    pub fn record_ping_failure(&self, node_id: &NodeId) -> u32 {
        let mut state = self.nodes.entry(node_id.clone()).or_default();
        state.ping_errors = state.ping_errors.saturating_add(1);
        state.ping_errors
    }

    /// Returns the node's consecutive ping error count.
    #[must_use]
    pub fn ping_errors(&self, node_id: &NodeId) -> u32 {
        self.nodes.get(node_id).map_or(0, |s| s.ping_errors)
    }

    // ========================================
    // IP Address
    // ========================================

    /// Marks an IP lookup in flight for the node.
    ///
    /// Returns `false` if one is already running; the caller must not
    /// start another.
    pub fn begin_ip_lookup(&self, node_id: &NodeId) -> bool {
        let mut state = self.nodes.entry(node_id.clone()).or_default();
        if state.ip_lookup {
            return false;
        }
        state.ip_lookup = true;
        true
    }

    /// Clears the node's in-flight IP lookup mark.
    pub fn end_ip_lookup(&self, node_id: &NodeId) {
        if let Some(mut state) = self.nodes.get_mut(node_id) {
            state.ip_lookup = false;
        }
    }

    /// Remembers the public IP resolved for the node.
    pub fn set_ip_address(&self, node_id: &NodeId, ip: Option<String>) {
        self.nodes.entry(node_id.clone()).or_default().ip_address = ip;
    }

    /// Returns the public IP resolved for the node, if any.
    #[must_use]
    pub fn ip_address(&self, node_id: &NodeId) -> Option<String> {
        self.nodes.get(node_id).and_then(|s| s.ip_address.clone())
    }

    // ========================================
    // Stats
    // ========================================

    /// Number of nodes currently owned by a lifecycle execution.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.nodes.iter().filter(|s| s.active).count()
    }

    /// Number of live heartbeat timers.
    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.nodes.iter().filter(|s| s.has_live_timer()).count()
    }

    /// Number of nodes seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.len())
            .field("active", &self.active_count())
            .field("timers", &self.timer_count())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
