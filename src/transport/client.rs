use super::protocol::{Message, receive_message, write_message};
use crate::cluster::types::{ProcessDescriptor, ProcessDirectory, SystemConfig};
use crate::error::{DsmError, Result};

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Outbound side of the peer protocol.
///
/// Each exchange opens a fresh connection, sends one record, optionally reads
/// one reply and closes. Every blocking step is bounded by a timeout, and a
/// timeout is reported as `PeerUnavailable` exactly like a refused connection.
pub struct PeerTransport {
    local: usize,
    directory: Arc<ProcessDirectory>,
    block_size: usize,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl PeerTransport {
    pub fn new(local: usize, directory: Arc<ProcessDirectory>, config: &SystemConfig) -> Self {
        Self {
            local,
            directory,
            block_size: config.block_size,
            connect_timeout: config.connect_timeout,
            io_timeout: config.io_timeout,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn target(&self, target: usize) -> Result<&ProcessDescriptor> {
        if target == self.local {
            return Err(self.invalid_target(target));
        }
        self.directory
            .get(target)
            .ok_or_else(|| self.invalid_target(target))
    }

    fn invalid_target(&self, target: usize) -> DsmError {
        DsmError::InvalidTarget {
            target,
            local: self.local,
            num_processes: self.directory.len(),
        }
    }

    fn unavailable(peer: &ProcessDescriptor, reason: impl Into<String>) -> DsmError {
        DsmError::PeerUnavailable {
            target: peer.id,
            addr: peer.addr(),
            reason: reason.into(),
        }
    }

    async fn connect(&self, peer: &ProcessDescriptor) -> Result<TcpStream> {
        let addr = peer.addr();
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr.as_str())).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(process = self.local, "set_nodelay failed for {}: {}", addr, e);
                }
                Ok(stream)
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(Self::unavailable(peer, "connection refused"))
            }
            Ok(Err(e)) => Err(DsmError::Transport(format!(
                "connect to process {} ({}) failed: {}",
                peer.id, addr, e
            ))),
            Err(_) => Err(Self::unavailable(
                peer,
                format!("connect timed out after {:?}", self.connect_timeout),
            )),
        }
    }

    /// Opens a connection to `target` and sends `msg` on it.
    ///
    /// The open stream is returned so the caller may read a reply.
    pub async fn send_message(&self, target: usize, msg: &Message) -> Result<TcpStream> {
        let peer = self.target(target)?;
        let mut stream = self.connect(peer).await?;

        match tokio::time::timeout(
            self.io_timeout,
            write_message(&mut stream, msg, self.block_size),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Self::unavailable(
                    peer,
                    format!("send timed out after {:?}", self.io_timeout),
                ));
            }
        }

        tracing::debug!(process = self.local, "Sent {} to process {}", msg, target);
        Ok(stream)
    }

    /// Fire-and-forget delivery: send, half-close, do not wait for a reply.
    pub async fn notify(&self, target: usize, msg: &Message) -> Result<()> {
        let mut stream = self.send_message(target, msg).await?;
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(process = self.local, "shutdown after {} failed: {}", msg, e);
        }
        Ok(())
    }

    /// Synchronous round trip: send `msg`, wait for exactly one reply.
    pub async fn request(&self, target: usize, msg: &Message) -> Result<Message> {
        let mut stream = self.send_message(target, msg).await?;

        match tokio::time::timeout(
            self.io_timeout,
            receive_message(&mut stream, self.block_size),
        )
        .await
        {
            Ok(reply) => {
                let reply = reply?;
                tracing::debug!(process = self.local, "Received {} from process {}", reply, target);
                Ok(reply)
            }
            Err(_) => {
                let peer = self.target(target)?;
                Err(Self::unavailable(
                    peer,
                    format!("reply timed out after {:?}", self.io_timeout),
                ))
            }
        }
    }
}
