//! The ledger hub.
//!
//! One `Hub` owns the chain, the pending pool and the session registry.
//! Transport tasks never touch that state directly: they send `HubCommand`s
//! to the task running [`Hub::spawn`], which applies them one at a time and
//! fans the resulting updates out to per-connection outboxes.
//!
//! Sealing is split in two. A `MINE_BLOCK` request proposes a candidate
//! synchronously; the proof-of-work search then runs on the blocking pool
//! and its result comes back to the hub as another event, where it is
//! committed. Other sessions keep being served meanwhile, and at most one
//! seal is in flight.

use crate::blockchain::{BalanceOracle, Block, Blockchain};
use crate::clock;
use crate::config::Config;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner;
use crate::protocol::{ClientMessage, ServerMessage, MALFORMED_MESSAGE};
use crate::session::{ConnectionId, SessionRegistry};
use crate::transaction::{Transaction, UserId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Messages are shared between every outbox they are broadcast to.
pub type Outbound = Arc<ServerMessage>;
pub type Outbox = mpsc::UnboundedSender<Outbound>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HubSettings {
    pub difficulty: usize,
    pub initial_allowance: f64,
    pub remove_on_disconnect: bool,
    pub reply_to_malformed: bool,
}

impl From<&Config> for HubSettings {
    fn from(config: &Config) -> Self {
        Self {
            difficulty: config.ledger.difficulty,
            initial_allowance: config.ledger.initial_allowance,
            remove_on_disconnect: config.session.remove_on_disconnect,
            reply_to_malformed: config.protocol.reply_to_malformed,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

#[derive(Debug)]
pub enum HubCommand {
    Connect {
        connection: ConnectionId,
        outbox: Outbox,
    },
    Inbound {
        connection: ConnectionId,
        message: ClientMessage,
    },
    Malformed {
        connection: ConnectionId,
        reason: String,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Status {
        reply: oneshot::Sender<HubStatus>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HubStatus {
    pub chain_length: usize,
    pub pending_transactions: usize,
    pub sessions: usize,
    pub live_connections: usize,
    pub sealing: bool,
}

struct SealTicket {
    requester: ConnectionId,
    mined_by: UserId,
    started: Instant,
}

pub struct Hub {
    chain: Blockchain,
    pool: Mempool,
    sessions: SessionRegistry,
    oracle: BalanceOracle,
    connections: BTreeMap<ConnectionId, Outbox>,
    sealing: Option<SealTicket>,
    settings: HubSettings,
}

impl Hub {
    pub fn new(settings: HubSettings) -> Self {
        Hub {
            chain: Blockchain::new(settings.difficulty),
            pool: Mempool::new(),
            sessions: SessionRegistry::new(),
            oracle: BalanceOracle::new(settings.initial_allowance),
            connections: BTreeMap::new(),
            sealing: None,
            settings,
        }
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn pool(&self) -> &Mempool {
        &self.pool
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn is_sealing(&self) -> bool {
        self.sealing.is_some()
    }

    pub fn balance_of(&self, user: &str) -> f64 {
        self.oracle.balance_of(user, &self.chain, &self.pool)
    }

    pub fn status(&self) -> HubStatus {
        HubStatus {
            chain_length: self.chain.len(),
            pending_transactions: self.pool.len(),
            sessions: self.sessions.len(),
            live_connections: self.connections.len(),
            sealing: self.is_sealing(),
        }
    }

    pub fn connect(&mut self, connection: ConnectionId, outbox: Outbox) {
        info!(connection = %connection, "client connected");
        self.connections.insert(connection, outbox);
    }

    /// Forget a closed connection. Its sessions stay registered unless
    /// `remove_on_disconnect` is set.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
        info!(connection = %connection, "client disconnected");

        if !self.settings.remove_on_disconnect {
            return;
        }

        let departed = self.sessions.depart(connection);
        if !departed.is_empty() {
            for user in &departed {
                info!(user = %user, connection = %connection, "user departed");
            }
            self.broadcast_user_list();
        }
    }

    /// Apply one inbound message. When it starts a seal, the unsealed
    /// candidate is returned; the caller mines it and hands the result to
    /// [`Hub::finish_seal`].
    pub fn handle_message(&mut self, connection: ConnectionId, message: ClientMessage) -> Option<Block> {
        debug!(connection = %connection, kind = message.kind(), "inbound message");
        match message {
            ClientMessage::Join { user_id, timestamp } => {
                self.on_join(connection, &user_id, timestamp.unwrap_or_else(clock::now));
                None
            }
            ClientMessage::NewTransaction { transaction } => {
                self.on_transaction(transaction);
                None
            }
            ClientMessage::MineBlock { user_id } => self.on_mine_request(connection, &user_id),
        }
    }

    /// Like [`Hub::handle_message`], but a seal is mined on the calling
    /// thread and committed before returning.
    pub fn handle_message_inline(&mut self, connection: ConnectionId, message: ClientMessage) {
        if let Some(candidate) = self.handle_message(connection, message) {
            let sealed = miner::mine_block(candidate, self.chain.difficulty());
            self.finish_seal(sealed);
        }
    }

    pub fn handle_malformed(&mut self, connection: ConnectionId, reason: &str) {
        warn!(connection = %connection, reason = %reason, "ignoring malformed message");
        if self.settings.reply_to_malformed {
            self.send_to(connection, ServerMessage::error(MALFORMED_MESSAGE));
        }
    }

    /// Commit the outcome of the seal in flight and publish it.
    pub fn finish_seal(&mut self, result: Result<Block, ChainError>) {
        let Some(ticket) = self.sealing.take() else {
            warn!("seal result arrived with no seal in flight; discarding");
            return;
        };

        let committed = result.and_then(|block| {
            self.chain
                .commit(block, &mut self.pool)
                .map(|b| (b.index, b.hash.clone(), b.transactions.len()))
        });

        match committed {
            Ok((index, hash, transactions)) => {
                info!(
                    index,
                    hash = %hash,
                    transactions,
                    miner = %ticket.mined_by,
                    elapsed_ms = ticket.started.elapsed().as_millis() as u64,
                    "block sealed"
                );
                self.broadcast(self.chain_message());
                self.broadcast(self.pending_message());
                for (user, _) in self.sessions.current_connections() {
                    self.send_balance(&user);
                }
            }
            Err(e) => {
                error!(error = %e, miner = %ticket.mined_by, "failed to seal block");
                self.send_to(ticket.requester, ServerMessage::error(e.to_string()));
            }
        }
    }

    fn on_join(&mut self, connection: ConnectionId, user: &str, connected_at: DateTime<Utc>) {
        let outcome = self.sessions.join_or_reconnect(user, connection, connected_at);
        if outcome.is_new {
            info!(user = %user, connection = %connection, "user joined");
        } else {
            info!(user = %user, connection = %connection, "user reconnected");
        }

        self.send_to(connection, self.chain_message());
        self.send_to(connection, self.pending_message());
        self.send_to(
            connection,
            ServerMessage::BalanceUpdate {
                balance: self.balance_of(user),
            },
        );
        self.broadcast_user_list();
    }

    fn on_transaction(&mut self, transaction: Transaction) {
        info!(
            sender = %transaction.sender,
            recipient = %transaction.recipient,
            amount = transaction.amount,
            "new transaction"
        );
        self.pool.add(transaction.clone());

        self.broadcast(ServerMessage::NewTransaction {
            transaction: transaction.clone(),
        });
        self.broadcast(self.pending_message());
        self.send_balance(&transaction.sender);
        if transaction.recipient != transaction.sender {
            self.send_balance(&transaction.recipient);
        }
    }

    fn on_mine_request(&mut self, connection: ConnectionId, user: &str) -> Option<Block> {
        if self.pool.is_empty() {
            debug!(user = %user, "mine requested with an empty pool");
            self.send_to(connection, ServerMessage::error(ChainError::EmptyPool.to_string()));
            return None;
        }

        if self.sealing.is_some() {
            debug!(user = %user, "mine requested while a seal is in flight");
            self.send_to(connection, ServerMessage::error(ChainError::SealInFlight.to_string()));
            return None;
        }

        match self.chain.propose(&self.pool, user) {
            Ok(candidate) => {
                info!(
                    index = candidate.index,
                    transactions = candidate.transactions.len(),
                    miner = %user,
                    "sealing block"
                );
                self.sealing = Some(SealTicket {
                    requester: connection,
                    mined_by: user.to_string(),
                    started: Instant::now(),
                });
                Some(candidate)
            }
            Err(e) => {
                warn!(error = %e, user = %user, "could not propose block");
                self.send_to(connection, ServerMessage::error(e.to_string()));
                None
            }
        }
    }

    fn chain_message(&self) -> ServerMessage {
        ServerMessage::BlockchainUpdate {
            data: self.chain.blocks().to_vec(),
        }
    }

    fn pending_message(&self) -> ServerMessage {
        ServerMessage::PendingTransactions {
            data: self.pool.snapshot(),
        }
    }

    fn broadcast_user_list(&self) {
        self.broadcast(ServerMessage::UserList {
            data: self.sessions.users(),
        });
    }

    /// Targeted balance for `user`, only if their registered connection is
    /// still live.
    fn send_balance(&self, user: &str) {
        if let Some(connection) = self.sessions.connection_for(user) {
            self.send_to(
                connection,
                ServerMessage::BalanceUpdate {
                    balance: self.balance_of(user),
                },
            );
        }
    }

    fn send_to(&self, connection: ConnectionId, message: ServerMessage) {
        match self.connections.get(&connection) {
            Some(outbox) => {
                if outbox.send(Arc::new(message)).is_err() {
                    debug!(connection = %connection, "outbox closed; dropping message");
                }
            }
            None => debug!(connection = %connection, kind = message.kind(), "connection not live; dropping message"),
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        let message = Arc::new(message);
        for (connection, outbox) in &self.connections {
            if outbox.send(Arc::clone(&message)).is_err() {
                debug!(connection = %connection, "outbox closed; dropping broadcast");
            }
        }
    }

    /// Run the hub on its own task and return the handle transports use to
    /// reach it. The task ends once every handle is dropped.
    pub fn spawn(self) -> (HubHandle, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (HubHandle { commands }, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>) {
        let (sealed_tx, mut sealed_rx) = mpsc::channel::<Result<Block, ChainError>>(1);

        loop {
            tokio::select! {
                Some(result) = sealed_rx.recv() => self.finish_seal(result),
                command = commands.recv() => match command {
                    Some(command) => self.dispatch(command, &sealed_tx),
                    None => break,
                },
            }
        }

        info!(chain_length = self.chain.len(), "ledger hub stopped");
    }

    fn dispatch(&mut self, command: HubCommand, sealed: &mpsc::Sender<Result<Block, ChainError>>) {
        match command {
            HubCommand::Connect { connection, outbox } => self.connect(connection, outbox),
            HubCommand::Inbound { connection, message } => {
                if let Some(candidate) = self.handle_message(connection, message) {
                    spawn_seal(candidate, self.chain.difficulty(), sealed.clone());
                }
            }
            HubCommand::Malformed { connection, reason } => self.handle_malformed(connection, &reason),
            HubCommand::Disconnect { connection } => self.disconnect(connection),
            HubCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }
}

fn spawn_seal(candidate: Block, difficulty: usize, done: mpsc::Sender<Result<Block, ChainError>>) {
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || miner::mine_block(candidate, difficulty))
            .await
            .unwrap_or_else(|e| Err(ChainError::SealWorkerFailed(e.to_string())));

        if done.send(result).await.is_err() {
            warn!("ledger hub stopped before the seal completed");
        }
    });
}

/// Cloneable sender side of a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    pub fn send(&self, command: HubCommand) -> Result<(), ChainError> {
        self.commands.send(command).map_err(|_| ChainError::HubUnavailable)
    }

    pub fn connect(&self, connection: ConnectionId, outbox: Outbox) -> Result<(), ChainError> {
        self.send(HubCommand::Connect { connection, outbox })
    }

    pub fn inbound(&self, connection: ConnectionId, message: ClientMessage) -> Result<(), ChainError> {
        self.send(HubCommand::Inbound { connection, message })
    }

    pub fn malformed(&self, connection: ConnectionId, reason: impl Into<String>) -> Result<(), ChainError> {
        self.send(HubCommand::Malformed {
            connection,
            reason: reason.into(),
        })
    }

    pub fn disconnect(&self, connection: ConnectionId) -> Result<(), ChainError> {
        self.send(HubCommand::Disconnect { connection })
    }

    pub async fn status(&self) -> Result<HubStatus, ChainError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Status { reply })?;
        rx.await.map_err(|_| ChainError::HubUnavailable)
    }
}
