//! # lyskom-client
//!
//! Multiplexed asynchronous client engine for LysKOM Protocol A.
//!
//! This crate provides:
//! - [`Connection`]: the per-server engine owning the socket, the request
//!   counter, the outstanding-call table and the receive dispatcher
//! - [`Call`]: a typed one-shot completion handle per issued request
//! - [`KomClient`]: one async operation per supported protocol message
//! - The process-wide server registry ([`get_server`]) that shares one
//!   engine and its name-resolution caches between logical clients
//!
//! Many calls can be outstanding at once over a single connection; responses
//! correlate back to their call by request ID, in whatever order the server
//! produces them.

pub mod call;
pub mod client;
pub mod connection;
pub mod error;
pub mod registry;

pub use call::Call;
pub use client::KomClient;
pub use connection::Connection;
pub use error::ClientError;
pub use registry::{get_server, shutdown_server, KomServer};
