//! Tor exit list parser.
//!
//! The exit list (https://check.torproject.org/exit-addresses) is a sequence of
//! records, each made of an `ExitNode` line, a `Published` line, a `LastStatus`
//! line and one or more `ExitAddress` lines:
//!
//! ```text
//! ExitNode 0011BD2485AD45D984EC4159C88FC066E5E3300E
//! Published 2017-05-06 08:47:38
//! LastStatus 2017-05-06 10:02:47
//! ExitAddress 162.247.74.201 2017-05-06 10:09:56
//! ```
//!
//! A record has no terminator: it ends when the next `ExitNode` line or the end
//! of input is reached. The parser is strict about record structure and lenient
//! about timestamps, which fall back to the Unix epoch when unparseable.

use std::io::BufRead;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::types::{ExitAddress, TorNode};
use crate::error_handling::TorParseError;

const EXIT_NODE: &str = "ExitNode";
const PUBLISHED: &str = "Published";
const LAST_STATUS: &str = "LastStatus";
const EXIT_ADDRESS: &str = "ExitAddress";

/// Timestamp layout used throughout the exit list, always UTC.
const TOR_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Position of the parser inside the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitingNode,
    AwaitingPublished,
    AwaitingUpdated,
    AwaitingAddress,
}

impl ParserState {
    fn expected(self) -> &'static str {
        match self {
            ParserState::AwaitingNode => EXIT_NODE,
            ParserState::AwaitingPublished => PUBLISHED,
            ParserState::AwaitingUpdated => LAST_STATUS,
            ParserState::AwaitingAddress => "ExitAddress or ExitNode",
        }
    }
}

/// Push-style state machine over exit list lines.
///
/// Feed lines in order with [`feed_line`](Self::feed_line); a completed node is
/// returned when the following `ExitNode` line arrives. Call
/// [`finish`](Self::finish) at end of input to collect the trailing node. After
/// an error the parser should be discarded.
#[derive(Debug)]
pub struct TorRecordParser {
    state: ParserState,
    line: usize,
    node_id: String,
    published: DateTime<Utc>,
    last_status: DateTime<Utc>,
    addresses: Vec<ExitAddress>,
}

impl TorRecordParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingNode,
            line: 0,
            node_id: String::new(),
            published: DateTime::default(),
            last_status: DateTime::default(),
            addresses: Vec::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Consumes one line, returning the previous node when this line starts a new one.
    pub fn feed_line(&mut self, raw: &str) -> Result<Option<TorNode>, TorParseError> {
        self.line += 1;
        let line = raw.trim_end();
        let (keyword, rest) = split_keyword(line);

        match (self.state, keyword) {
            (ParserState::AwaitingNode, EXIT_NODE) => {
                self.start_node(line, rest)?;
                Ok(None)
            }
            (ParserState::AwaitingPublished, PUBLISHED) => {
                self.published = parse_tor_time(rest);
                self.state = ParserState::AwaitingUpdated;
                Ok(None)
            }
            (ParserState::AwaitingUpdated, LAST_STATUS) => {
                self.last_status = parse_tor_time(rest);
                self.state = ParserState::AwaitingAddress;
                Ok(None)
            }
            (ParserState::AwaitingAddress, EXIT_ADDRESS) => {
                let address = self.parse_address(rest)?;
                self.addresses.push(address);
                Ok(None)
            }
            (ParserState::AwaitingAddress, EXIT_NODE) if !self.addresses.is_empty() => {
                let complete = self.take_node();
                self.state = ParserState::AwaitingNode;
                self.start_node(line, rest)?;
                Ok(Some(complete))
            }
            (state, _) => Err(self.unexpected(state, line)),
        }
    }

    /// Ends the input, returning the pending node.
    ///
    /// Only valid while awaiting addresses: the pending node has at least one
    /// address by then. Ending anywhere else means a truncated record.
    pub fn finish(mut self) -> Result<TorNode, TorParseError> {
        match self.state {
            ParserState::AwaitingAddress if !self.addresses.is_empty() => Ok(self.take_node()),
            ParserState::AwaitingAddress => Err(TorParseError::IncompleteRecord {
                expected: EXIT_ADDRESS,
            }),
            state => Err(TorParseError::IncompleteRecord {
                expected: state.expected(),
            }),
        }
    }

    fn start_node(&mut self, line: &str, id: &str) -> Result<(), TorParseError> {
        if id.is_empty() {
            return Err(self.unexpected(ParserState::AwaitingNode, line));
        }
        self.node_id = id.to_string();
        self.published = DateTime::default();
        self.last_status = DateTime::default();
        self.addresses = Vec::new();
        self.state = ParserState::AwaitingPublished;
        Ok(())
    }

    fn parse_address(&self, rest: &str) -> Result<ExitAddress, TorParseError> {
        let (ip, observed) = split_keyword(rest);
        let ip: IpAddr = ip.parse().map_err(|_| TorParseError::InvalidAddress {
            line: self.line,
            found: rest.to_string(),
        })?;
        Ok(ExitAddress {
            ip,
            observed_at: parse_tor_time(observed),
        })
    }

    fn take_node(&mut self) -> TorNode {
        TorNode {
            node_id: std::mem::take(&mut self.node_id),
            published: self.published,
            last_status: self.last_status,
            addresses: std::mem::take(&mut self.addresses),
        }
    }

    fn unexpected(&self, state: ParserState, line: &str) -> TorParseError {
        let expected = match state {
            ParserState::AwaitingAddress if self.addresses.is_empty() => EXIT_ADDRESS,
            state => state.expected(),
        };
        TorParseError::UnexpectedLine {
            line: self.line,
            expected,
            found: line.to_string(),
        }
    }
}

impl Default for TorRecordParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a complete exit list from a synchronous reader.
pub fn parse_exit_list<R: BufRead>(reader: R) -> Result<Vec<TorNode>, TorParseError> {
    let mut parser = TorRecordParser::new();
    let mut nodes = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| TorParseError::Io(e.to_string()))?;
        if let Some(node) = parser.feed_line(&line)? {
            nodes.push(node);
        }
    }
    nodes.push(parser.finish()?);
    Ok(nodes)
}

/// Parses an exit list from an in-memory string.
pub fn parse_exit_list_str(text: &str) -> Result<Vec<TorNode>, TorParseError> {
    parse_exit_list(text.as_bytes())
}

/// Parses an exit list line by line as it streams in.
pub async fn parse_exit_stream<R>(reader: R) -> Result<Vec<TorNode>, TorParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut parser = TorRecordParser::new();
    let mut nodes = Vec::new();
    let mut lines = reader.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| TorParseError::Io(e.to_string()))?
    {
        if let Some(node) = parser.feed_line(&line)? {
            nodes.push(node);
        }
    }
    nodes.push(parser.finish()?);
    Ok(nodes)
}

/// Splits `"Keyword rest of line"` at the first whitespace.
fn split_keyword(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    }
}

/// Parses `YYYY-MM-DD HH:MM:SS`, degrading to the Unix epoch.
fn parse_tor_time(value: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(value.trim(), TOR_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}
