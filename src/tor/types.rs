//! Tor exit node data structures.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single relay from the exit list.
///
/// Produced only by the parser, which guarantees `addresses` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorNode {
    pub node_id: String,
    pub published: DateTime<Utc>,
    pub last_status: DateTime<Utc>,
    pub addresses: Vec<ExitAddress>,
}

/// An exit address and the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitAddress {
    pub ip: IpAddr,
    pub observed_at: DateTime<Utc>,
}

impl fmt::Display for TorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TorNode {} with {} IPs",
            self.node_id,
            self.addresses.len()
        )
    }
}
