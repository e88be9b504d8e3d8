//! Peer Transport Module
//!
//! Point-to-point messaging between DSM processes over TCP.
//!
//! ## Core Concepts
//! - **One exchange per connection**: connect, send one record, optionally read one reply, close.
//! - **Fixed-size records**: `protocol` defines the record layout and its codec.
//! - **Bounded blocking**: `client::PeerTransport` applies connect and I/O timeouts and
//!   reports a silent peer the same way as a refused connection.

pub mod client;
pub mod protocol;

#[cfg(test)]
mod tests;
