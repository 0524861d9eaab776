//! Wire messages exchanged with clients.
//!
//! Every frame is one JSON object tagged by `type`:
//! `{"type":"MINE_BLOCK","userId":"alice"}`.

use crate::blockchain::Block;
use crate::clock;
use crate::error::ChainError;
use crate::session::UserSummary;
use crate::transaction::{serialize_amount, Transaction, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reply sent for undecodable frames when replies are enabled.
pub const MALFORMED_MESSAGE: &str = "Malformed message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    Join {
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            with = "clock::lenient_option"
        )]
        timestamp: Option<DateTime<Utc>>,
    },
    NewTransaction {
        transaction: Transaction,
    },
    MineBlock {
        #[serde(rename = "userId")]
        user_id: UserId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    BlockchainUpdate {
        data: Vec<Block>,
    },
    PendingTransactions {
        data: Vec<Transaction>,
    },
    NewTransaction {
        transaction: Transaction,
    },
    BalanceUpdate {
        #[serde(serialize_with = "serialize_amount")]
        balance: f64,
    },
    UserList {
        data: Vec<UserSummary>,
    },
    Error {
        message: String,
    },
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, ChainError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "JOIN",
            ClientMessage::NewTransaction { .. } => "NEW_TRANSACTION",
            ClientMessage::MineBlock { .. } => "MINE_BLOCK",
        }
    }
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, ChainError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::BlockchainUpdate { .. } => "BLOCKCHAIN_UPDATE",
            ServerMessage::PendingTransactions { .. } => "PENDING_TRANSACTIONS",
            ServerMessage::NewTransaction { .. } => "NEW_TRANSACTION",
            ServerMessage::BalanceUpdate { .. } => "BALANCE_UPDATE",
            ServerMessage::UserList { .. } => "USER_LIST",
            ServerMessage::Error { .. } => "ERROR",
        }
    }
}
