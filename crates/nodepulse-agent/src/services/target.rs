// ============================================
// File: crates/nodepulse-agent/src/services/target.rs
// ============================================
//! # Node Target
//!
//! Everything one API call needs to know about a node: its identity,
//! the account token, the proxy route and the resolved public IP.
//!
//! ⚠️ Important Note for Next Developer:
//!   - `proxy` is only set when proxy mode is enabled for the run
//!   - `ip_address` stays `None` outside proxy mode (sent as JSON null)
// ============================================

use nodepulse_common::types::{BearerToken, NodeId};

use crate::config::{AccountConfig, AgentConfig, NodeConfig};

/// A configured node paired with its account credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTarget {
    /// Node identifier.
    pub node_id: NodeId,
    /// Hardware fingerprint sent on registration.
    pub hardware_id: String,
    /// Bearer credential of the owning account.
    pub token: BearerToken,
    /// Proxy route, when proxy mode is on.
    pub proxy: Option<String>,
    /// Public IP resolved through the proxy, when proxy mode is on.
    pub ip_address: Option<String>,
}

impl NodeTarget {
    /// Builds a target from an account and one of its nodes.
    ///
    /// The node's proxy is dropped unless `use_proxy` is set.
    #[must_use]
    pub fn new(account: &AccountConfig, node: &NodeConfig, use_proxy: bool) -> Self {
        Self {
            node_id: node.node_id.clone(),
            hardware_id: node.hardware_id.clone(),
            token: account.token.clone(),
            proxy: if use_proxy { node.proxy.clone() } else { None },
            ip_address: None,
        }
    }

    /// Returns a copy carrying the resolved IP.
    #[must_use]
    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    /// Returns the IP for display ("-" when unknown).
    #[must_use]
    pub fn ip_display(&self) -> &str {
        self.ip_address.as_deref().unwrap_or("-")
    }
}

/// Expands every account/node pair of `config`, in configuration order.
#[must_use]
pub fn targets_from_config(config: &AgentConfig, use_proxy: bool) -> Vec<NodeTarget> {
    config
        .accounts
        .iter()
        .flat_map(|account| {
            account
                .nodes
                .iter()
                .map(move |node| NodeTarget::new(account, node, use_proxy))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [[accounts]]
        token = "token-one-1111"
        [[accounts.nodes]]
        node_id = "a1"
        hardware_id = "hw-a1"
        proxy = "http://10.0.0.1:8080"
        [[accounts.nodes]]
        node_id = "a2"
        hardware_id = "hw-a2"

        [[accounts]]
        token = "token-two-2222"
        [[accounts.nodes]]
        node_id = "b1"
        hardware_id = "hw-b1"
    "#;

    #[test]
    fn test_targets_keep_order_and_token() {
        let config = AgentConfig::from_str(CONFIG).unwrap();
        let targets = targets_from_config(&config, false);

        let ids: Vec<&str> = targets.iter().map(|t| t.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1"]);
        assert_eq!(targets[1].token.masked(), "****1111");
        assert_eq!(targets[2].token.masked(), "****2222");
    }

    #[test]
    fn test_proxy_only_in_proxy_mode() {
        let config = AgentConfig::from_str(CONFIG).unwrap();

        let direct = targets_from_config(&config, false);
        assert!(direct.iter().all(|t| t.proxy.is_none()));

        let proxied = targets_from_config(&config, true);
        assert_eq!(proxied[0].proxy.as_deref(), Some("http://10.0.0.1:8080"));
    }

    #[test]
    fn test_with_ip() {
        let config = AgentConfig::from_str(CONFIG).unwrap();
        let target = targets_from_config(&config, false).remove(0);
        assert_eq!(target.ip_display(), "-");

        let target = target.with_ip(Some("1.2.3.4".into()));
        assert_eq!(target.ip_display(), "1.2.3.4");
    }
}
