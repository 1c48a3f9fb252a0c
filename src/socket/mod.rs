//! Unix socket server module.
//!
//! Handles the per-verb Unix socket endpoints and connection management.

mod channel;
mod connection;
mod listener;

pub use channel::CommandChannel;
pub use connection::handle_connection;
pub use listener::{ConnectionMetrics, EndpointListener};
