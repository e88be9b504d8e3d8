//! Peer Wire Protocol
//!
//! Every message travels as one fixed-size record so the receiver can always
//! read to completion without negotiating a length:
//!
//! ```text
//! +-----------+--------------+-------------------+---------------------------+
//! | tag: i32  | block_id:i32 | payload_len: i32  | payload: block_size bytes |
//! +-----------+--------------+-------------------+---------------------------+
//! ```
//!
//! Integers are big-endian. Only `ResponseBlock` carries a payload in memory;
//! on the wire every other message still pads the payload field with zeros so
//! the record size stays `HEADER_LEN + block_size` for the whole deployment.

use crate::error::{DsmError, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the encoded `FrameHeader`: three 32-bit integers.
pub const HEADER_LEN: usize = 12;

pub const TAG_REQUEST_BLOCK: i32 = 1;
pub const TAG_RESPONSE_BLOCK: i32 = 2;
pub const TAG_INVALIDATE_BLOCK: i32 = 3;
pub const TAG_ACK_INVALIDATE: i32 = 4;
pub const TAG_PROTOCOL_ERROR: i32 = 5;

pub fn record_len(block_size: usize) -> usize {
    HEADER_LEN + block_size
}

/// Messages exchanged between processes.
///
/// - `RequestBlock` / `ResponseBlock`: fetch of a full block from its owner.
/// - `InvalidateBlock` / `AckInvalidate`: write-invalidate notification and its reply.
/// - `ProtocolError`: reply to a request the server could not honour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    RequestBlock { block_id: u32 },
    ResponseBlock { block_id: u32, payload: Vec<u8> },
    InvalidateBlock { block_id: u32 },
    AckInvalidate { block_id: u32 },
    ProtocolError { block_id: u32 },
}

impl Message {
    pub fn tag(&self) -> i32 {
        match self {
            Message::RequestBlock { .. } => TAG_REQUEST_BLOCK,
            Message::ResponseBlock { .. } => TAG_RESPONSE_BLOCK,
            Message::InvalidateBlock { .. } => TAG_INVALIDATE_BLOCK,
            Message::AckInvalidate { .. } => TAG_ACK_INVALIDATE,
            Message::ProtocolError { .. } => TAG_PROTOCOL_ERROR,
        }
    }

    pub fn block_id(&self) -> u32 {
        match self {
            Message::RequestBlock { block_id }
            | Message::ResponseBlock { block_id, .. }
            | Message::InvalidateBlock { block_id }
            | Message::AckInvalidate { block_id }
            | Message::ProtocolError { block_id } => *block_id,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            Message::ResponseBlock { payload, .. } => payload,
            _ => &[],
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Message::RequestBlock { .. } => "RequestBlock",
            Message::ResponseBlock { .. } => "ResponseBlock",
            Message::InvalidateBlock { .. } => "InvalidateBlock",
            Message::AckInvalidate { .. } => "AckInvalidate",
            Message::ProtocolError { .. } => "ProtocolError",
        };
        write!(f, "{}(block {})", name, self.block_id())
    }
}

/// Fixed header preceding the payload field of every record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: i32,
    pub block_id: i32,
    pub payload_len: i32,
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
}

pub fn encode(msg: &Message, block_size: usize) -> Result<Vec<u8>> {
    let payload = msg.payload();
    if payload.len() > block_size {
        return Err(DsmError::Protocol(format!(
            "payload of {} bytes exceeds block size {}",
            payload.len(),
            block_size
        )));
    }
    let block_id = i32::try_from(msg.block_id()).map_err(|_| {
        DsmError::Protocol(format!("block id {} does not fit the wire", msg.block_id()))
    })?;

    let header = FrameHeader {
        tag: msg.tag(),
        block_id,
        payload_len: payload.len() as i32,
    };
    let mut record = wire_options()
        .serialize(&header)
        .map_err(|e| DsmError::Protocol(format!("failed to encode header: {}", e)))?;
    debug_assert_eq!(record.len(), HEADER_LEN);

    record.extend_from_slice(payload);
    record.resize(record_len(block_size), 0);
    Ok(record)
}

pub fn decode_header(record: &[u8]) -> Result<FrameHeader> {
    let bytes = record
        .get(..HEADER_LEN)
        .ok_or_else(|| DsmError::Protocol(format!("record shorter than {} bytes", HEADER_LEN)))?;
    wire_options()
        .deserialize(bytes)
        .map_err(|e| DsmError::Protocol(format!("failed to decode header: {}", e)))
}

pub fn decode(record: &[u8], block_size: usize) -> Result<Message> {
    if record.len() != record_len(block_size) {
        return Err(DsmError::Protocol(format!(
            "record is {} bytes, expected {}",
            record.len(),
            record_len(block_size)
        )));
    }

    let header = decode_header(record)?;
    let block_id = u32::try_from(header.block_id)
        .map_err(|_| DsmError::Protocol(format!("negative block id {}", header.block_id)))?;
    let payload_len = usize::try_from(header.payload_len)
        .ok()
        .filter(|&len| len <= block_size)
        .ok_or_else(|| {
            DsmError::Protocol(format!(
                "payload length {} outside 0..={}",
                header.payload_len, block_size
            ))
        })?;

    let msg = match header.tag {
        TAG_REQUEST_BLOCK => Message::RequestBlock { block_id },
        TAG_RESPONSE_BLOCK => Message::ResponseBlock {
            block_id,
            payload: record[HEADER_LEN..HEADER_LEN + payload_len].to_vec(),
        },
        TAG_INVALIDATE_BLOCK => Message::InvalidateBlock { block_id },
        TAG_ACK_INVALIDATE => Message::AckInvalidate { block_id },
        TAG_PROTOCOL_ERROR => Message::ProtocolError { block_id },
        other => {
            return Err(DsmError::Protocol(format!("unknown message tag {}", other)));
        }
    };
    Ok(msg)
}

/// Reads exactly one record.
///
/// A stream that ends before the first byte is a graceful close (`PeerClosed`);
/// one that ends mid-record is a `Transport` fault.
pub async fn read_record<R>(reader: &mut R, block_size: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut record = vec![0u8; record_len(block_size)];
    let mut filled = 0;

    while filled < record.len() {
        let n = reader
            .read(&mut record[filled..])
            .await
            .map_err(|e| DsmError::Transport(format!("receive failed: {}", e)))?;
        if n == 0 {
            if filled == 0 {
                return Err(DsmError::PeerClosed);
            }
            return Err(DsmError::Transport(format!(
                "short read: {} of {} bytes",
                filled,
                record.len()
            )));
        }
        filled += n;
    }

    Ok(record)
}

pub async fn receive_message<R>(reader: &mut R, block_size: usize) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let record = read_record(reader, block_size).await?;
    decode(&record, block_size)
}

pub async fn write_message<W>(writer: &mut W, msg: &Message, block_size: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let record = encode(msg, block_size)?;
    writer
        .write_all(&record)
        .await
        .map_err(|e| DsmError::Transport(format!("send of {} failed: {}", msg, e)))?;
    writer
        .flush()
        .await
        .map_err(|e| DsmError::Transport(format!("flush of {} failed: {}", msg, e)))?;
    Ok(())
}
