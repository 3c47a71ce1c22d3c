// ============================================
// File: crates/nodepulse-agent/src/services/dispatch.rs
// ============================================
//! # Dispatch Commands
//!
//! Messages sent to the agent's dispatcher. Every path that wants a node
//! processed (startup fan-out, heartbeat restart, panic recovery) goes
//! through this channel, and the dispatcher always ends in
//! `NodeLifecycle::drive`, which checks the registry guard first.
// ============================================

use std::any::Any;
use std::time::Duration;

use tokio::sync::mpsc;

use super::target::NodeTarget;

/// Sending half of the dispatcher channel.
pub type CommandSender = mpsc::UnboundedSender<DispatchCommand>;

/// Receiving half of the dispatcher channel.
pub type CommandReceiver = mpsc::UnboundedReceiver<DispatchCommand>;

/// Work item for the dispatcher.
#[derive(Debug, Clone)]
pub enum DispatchCommand {
    /// Run the lifecycle for the node now.
    Process(NodeTarget),
    /// Run the lifecycle for the node after `delay`.
    RestartAfter {
        /// Node to restart.
        target: NodeTarget,
        /// Wait before the lifecycle is entered again.
        delay: Duration,
    },
    /// Re-run the startup fan-out over every configured node.
    Rerun,
}

/// Creates the dispatcher channel.
#[must_use]
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
