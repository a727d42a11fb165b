//! Broker wire payloads.
//!
//! These are the protocol payloads exchanged between brokers. Byte-level
//! framing and encoding live in the transport layer below this crate;
//! sessions exchange typed payloads over channels.

use lattice_types::{Block, BlockHash, BrokerInfo, CliqueId};

/// A protocol payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Session opener; anything else before it is spam.
    Hello {
        clique_id: CliqueId,
        broker_info: BrokerInfo,
    },
    /// Liveness probe. The nonce is never zero.
    Ping { nonce: u64, timestamp: u64 },
    /// Liveness answer echoing the ping nonce.
    Pong { nonce: u64 },
    /// Locators per chain, newest first, for inter-clique sync.
    SyncRequest { locators: Vec<Vec<BlockHash>> },
    /// Per-chain hashes extending past the requester's locators.
    SyncResponse { inventories: Vec<Vec<BlockHash>> },
    /// Pull blocks by hash.
    GetBlocks { hashes: Vec<BlockHash> },
    /// Blocks answering a pull.
    SendBlocks { blocks: Vec<Block> },
}

impl Payload {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Hello { .. } => "hello",
            Payload::Ping { .. } => "ping",
            Payload::Pong { .. } => "pong",
            Payload::SyncRequest { .. } => "sync-request",
            Payload::SyncResponse { .. } => "sync-response",
            Payload::GetBlocks { .. } => "get-blocks",
            Payload::SendBlocks { .. } => "send-blocks",
        }
    }
}
