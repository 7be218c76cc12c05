//! Execution relay for the DevSpace backend.
//!
//! Forwards file contents to a single external execution worker over a
//! persistent WebSocket link and tracks each request until it reaches a
//! terminal state. The pieces, leaves first:
//!
//! - [`client`] / [`reconnect`] -- dialing the worker with exponential backoff.
//! - [`connection`] -- the one live link, its supervisor and the send path.
//! - [`processor`] -- the receive loop feeding inbound frames to the correlator.
//! - [`correlator`] -- the result table keyed by correlation id.
//! - [`dispatch`] -- the FIFO queue that serializes sends and enforces deadlines.
//! - [`manager`] -- the facade wiring everything together at startup.

pub mod client;
pub mod connection;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod execution;
pub mod manager;
pub mod messages;
pub mod processor;
pub mod reconnect;
