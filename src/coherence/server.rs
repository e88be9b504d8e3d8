use super::engine::CoherenceEngine;
use crate::error::DsmError;
use crate::transport::protocol::{Message, decode, decode_header, read_record, write_message};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle of the block server: entered once at initialization, left once at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Listening,
}

/// Handle to a running accept loop.
///
/// Dropping the handle also stops the loop: the shutdown channel closes and the
/// listener is released, but nothing waits for the task to finish.
pub struct ServerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the loop, which drops the listener to unblock `accept`, then joins it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Block server task ended abnormally: {}", e);
        }
    }
}

/// Accepts peer connections and answers each with the engine.
pub struct BlockServer {
    engine: Arc<CoherenceEngine>,
    listener: TcpListener,
    shutdown: watch::Receiver<bool>,
}

impl BlockServer {
    pub fn spawn(
        engine: Arc<CoherenceEngine>,
        listener: TcpListener,
    ) -> std::io::Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = Self {
            engine,
            listener,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(server.run());

        Ok(ServerHandle {
            shutdown: shutdown_tx,
            task,
            local_addr,
        })
    }

    async fn run(mut self) {
        let local_id = self.engine.local_id();
        tracing::info!(
            process = local_id,
            "Block server listening on {:?}",
            self.listener.local_addr()
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => {
                    break;
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(process = local_id, "Accepted connection from {}", peer);
                        let engine = self.engine.clone();
                        tokio::spawn(async move {
                            handle_connection(engine, stream, peer).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!(process = local_id, "Failed to accept connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        drop(self.listener);
        tracing::info!(process = local_id, "Block server stopped");
    }
}

/// Serves exactly one request on `stream`, then closes it.
async fn handle_connection(engine: Arc<CoherenceEngine>, mut stream: TcpStream, peer: SocketAddr) {
    let local_id = engine.local_id();
    let block_size = engine.config().block_size;
    let io_timeout = engine.config().io_timeout;

    let received = tokio::time::timeout(io_timeout, read_record(&mut stream, block_size)).await;
    let record = match received {
        Ok(Ok(record)) => record,
        Ok(Err(DsmError::PeerClosed)) => {
            tracing::debug!(process = local_id, "Client {} disconnected", peer);
            return;
        }
        Ok(Err(e)) => {
            tracing::warn!(process = local_id, "Failed to receive message from {}: {}", peer, e);
            return;
        }
        Err(_) => {
            tracing::warn!(process = local_id, "Timed out waiting for message from {}", peer);
            return;
        }
    };

    let reply = match decode(&record, block_size) {
        Ok(msg) => {
            tracing::debug!(process = local_id, "Received {} from {}", msg, peer);
            engine.handle_message(msg).await
        }
        Err(e) => {
            tracing::warn!(process = local_id, "Malformed message from {}: {}", peer, e);
            let block_id = decode_header(&record)
                .ok()
                .and_then(|header| u32::try_from(header.block_id).ok())
                .unwrap_or(0);
            Message::ProtocolError { block_id }
        }
    };

    // Invalidation senders close without reading the ack, so a failed reply is routine.
    match tokio::time::timeout(io_timeout, write_message(&mut stream, &reply, block_size)).await {
        Ok(Ok(())) => {
            tracing::debug!(process = local_id, "Replied {} to {}", reply, peer);
        }
        Ok(Err(e)) => {
            tracing::debug!(process = local_id, "Reply {} to {} not delivered: {}", reply, peer, e);
        }
        Err(_) => {
            tracing::debug!(process = local_id, "Reply {} to {} timed out", reply, peer);
        }
    }
}
