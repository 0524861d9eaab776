//! Session registry: which live connection currently speaks for a user.
//!
//! At most one connection is kept per user; a later join for the same user
//! overwrites the handle (the old connection is not closed here). Entries
//! are kept in join order so the user list is stable.

use crate::clock;
use crate::transaction::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport-assigned handle for one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        ConnectionId(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: UserId,
    pub connected_at: DateTime<Utc>,
    pub connection: ConnectionId,
}

/// Entry of the `USER_LIST` broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    #[serde(with = "clock::millis")]
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub is_new: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user` on `connection`. A returning user keeps the original
    /// `connected_at`; only the connection handle changes.
    pub fn join_or_reconnect(
        &mut self,
        user: &str,
        connection: ConnectionId,
        connected_at: DateTime<Utc>,
    ) -> JoinOutcome {
        if let Some(existing) = self.sessions.iter_mut().find(|s| s.id == user) {
            existing.connection = connection;
            return JoinOutcome { is_new: false };
        }

        self.sessions.push(Session {
            id: user.to_string(),
            connected_at,
            connection,
        });
        JoinOutcome { is_new: true }
    }

    pub fn connection_for(&self, user: &str) -> Option<ConnectionId> {
        self.sessions
            .iter()
            .find(|s| s.id == user)
            .map(|s| s.connection)
    }

    pub fn current_connections(&self) -> Vec<(UserId, ConnectionId)> {
        self.sessions
            .iter()
            .map(|s| (s.id.clone(), s.connection))
            .collect()
    }

    pub fn users(&self) -> Vec<UserSummary> {
        self.sessions
            .iter()
            .map(|s| UserSummary {
                id: s.id.clone(),
                connected_at: s.connected_at,
            })
            .collect()
    }

    /// Remove every session whose current connection is `connection`. A
    /// user that has already reconnected elsewhere is left alone.
    pub fn depart(&mut self, connection: ConnectionId) -> Vec<UserId> {
        let mut departed = Vec::new();
        self.sessions.retain(|s| {
            if s.connection == connection {
                departed.push(s.id.clone());
                false
            } else {
                true
            }
        });
        departed
    }

    pub fn get(&self, user: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == user)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
