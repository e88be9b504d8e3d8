use crate::error::{DsmError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BLOCK_SIZE: usize = 4096;
pub const DEFAULT_BLOCK_COUNT: u32 = 1024;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Static parameters shared by every process of a deployment.
///
/// All processes must agree on `block_size` and `block_count`: the wire record
/// size and the ownership map are both derived from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemConfig {
    /// Size of one block in bytes (T).
    pub block_size: usize,
    /// Number of blocks in the address space (K).
    pub block_count: u32,
    /// Upper bound on establishing a peer connection.
    pub connect_timeout: Duration,
    /// Upper bound on each send or receive of a single message.
    pub io_timeout: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

impl SystemConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_block_count(mut self, block_count: u32) -> Self {
        self.block_count = block_count;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Total size of the shared address space (K x T).
    pub fn capacity(&self) -> u64 {
        self.block_count as u64 * self.block_size as u64
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size > i32::MAX as usize {
            return Err(DsmError::InvalidConfig(format!(
                "block size must be in 1..={}, got {}",
                i32::MAX,
                self.block_size
            )));
        }
        if self.block_count == 0 || self.block_count > i32::MAX as u32 {
            return Err(DsmError::InvalidConfig(format!(
                "block count must be in 1..={}, got {}",
                i32::MAX,
                self.block_count
            )));
        }
        if self.connect_timeout.is_zero() || self.io_timeout.is_zero() {
            return Err(DsmError::InvalidConfig(
                "timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// One participant of the deployment, known to every process a priori.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessDescriptor {
    pub id: usize,
    pub host: String,
    pub port: u16,
}

impl ProcessDescriptor {
    pub fn new(id: usize, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// The fixed table of all processes, indexed by process id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessDirectory {
    processes: Vec<ProcessDescriptor>,
}

impl ProcessDirectory {
    /// Builds a directory; entries must carry ids `0..N` in order.
    pub fn new(processes: Vec<ProcessDescriptor>) -> Result<Self> {
        if processes.is_empty() {
            return Err(DsmError::InvalidConfig(
                "process directory is empty".to_string(),
            ));
        }
        for (idx, process) in processes.iter().enumerate() {
            if process.id != idx {
                return Err(DsmError::InvalidConfig(format!(
                    "directory entry {} has id {}, expected {}",
                    idx, process.id, idx
                )));
            }
        }
        Ok(Self { processes })
    }

    /// `n` processes on 127.0.0.1 using consecutive ports from `base_port`.
    pub fn localhost(n: usize, base_port: u16) -> Result<Self> {
        let processes = (0..n)
            .map(|id| {
                let port = u16::try_from(id)
                    .ok()
                    .and_then(|offset| base_port.checked_add(offset))
                    .ok_or_else(|| {
                        DsmError::InvalidConfig(format!(
                            "port range {}+{} overflows",
                            base_port, id
                        ))
                    })?;
                Ok(ProcessDescriptor::new(id, "127.0.0.1", port))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(processes)
    }

    pub fn from_socket_addrs(addrs: &[SocketAddr]) -> Result<Self> {
        let processes = addrs
            .iter()
            .enumerate()
            .map(|(id, addr)| ProcessDescriptor::new(id, addr.ip().to_string(), addr.port()))
            .collect();
        Self::new(processes)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&ProcessDescriptor> {
        self.processes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessDescriptor> {
        self.processes.iter()
    }
}
