//! Service runtime plumbing.
//!
//! This module starts and stops the background tasks that make up a running
//! service.

mod lifecycle;

pub(crate) use lifecycle::Lifecycle;
