//! Tor exit node list handling.
//!
//! This module parses the published exit address list into [`TorNode`] records
//! and indexes them by address for membership checks.

mod index;
mod parser;
mod types;

// Re-export public API
pub use index::TorIndex;
pub use parser::{
    parse_exit_list, parse_exit_list_str, parse_exit_stream, ParserState, TorRecordParser,
};
pub use types::{ExitAddress, TorNode};
