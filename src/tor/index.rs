//! Exit address lookup table.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use super::types::TorNode;

/// Maps exit addresses to the node that owns them.
///
/// Built once per refresh and never mutated afterwards, so a shared
/// `Arc<TorIndex>` can be read from any number of tasks. Addresses are keyed
/// in canonical form: an IPv4-mapped IPv6 address matches its IPv4 exit.
#[derive(Debug, Default)]
pub struct TorIndex {
    entries: HashMap<IpAddr, Arc<TorNode>>,
    inserted: usize,
}

impl TorIndex {
    /// Indexes every address of every node; on duplicate addresses the later node wins.
    pub fn build<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = TorNode>,
    {
        let mut index = TorIndex::default();
        for node in nodes {
            let node = Arc::new(node);
            for address in &node.addresses {
                index.entries.insert(address.ip.to_canonical(), Arc::clone(&node));
                index.inserted += 1;
            }
        }
        index
    }

    /// Returns the identity of the node exiting from `ip`.
    pub fn lookup(&self, ip: IpAddr) -> Option<&str> {
        self.entries
            .get(&ip.to_canonical())
            .map(|node| node.node_id.as_str())
    }

    /// Returns the full node record exiting from `ip`.
    pub fn node(&self, ip: IpAddr) -> Option<&TorNode> {
        self.entries.get(&ip.to_canonical()).map(Arc::as_ref)
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.entries.contains_key(&ip.to_canonical())
    }

    /// Number of address entries inserted, duplicates included.
    pub fn count(&self) -> usize {
        self.inserted
    }

    /// Number of distinct addresses that resolve to a node.
    pub fn distinct_addresses(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for TorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TorIndex with {} entries", self.count())
    }
}
