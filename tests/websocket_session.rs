//! WebSocket round trips against a server bound to an ephemeral port

use futures_util::{SinkExt, StreamExt};
use ledgerline::config::Config;
use ledgerline::node::Node;
use ledgerline::protocol::{ClientMessage, ServerMessage};
use ledgerline::transaction::Transaction;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(10);

async fn start_server(config: Config) -> SocketAddr {
    let mut config = config;
    config.network.host = "127.0.0.1".to_string();
    config.network.port = 0;

    let bound = Node::new(config).bind().await.expect("bind failed");
    let (addr, _hub, _task) = bound.spawn();
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}", addr))
        .await
        .expect("websocket connect failed");
    socket
}

async fn send(socket: &mut Socket, message: ClientMessage) {
    socket
        .send(Message::Text(message.encode().unwrap()))
        .await
        .expect("send failed");
}

async fn next(socket: &mut Socket) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("timed out waiting for the server")
            .expect("connection closed")
            .expect("read failed");
        if let Message::Text(text) = frame {
            return ServerMessage::decode(&text).expect("undecodable server message");
        }
    }
}

/// Read until `pick` returns something, skipping other messages.
async fn next_matching<T>(socket: &mut Socket, pick: impl Fn(&ServerMessage) -> Option<T>) -> T {
    loop {
        let message = next(socket).await;
        if let Some(found) = pick(&message) {
            return found;
        }
    }
}

fn balance(message: &ServerMessage) -> Option<f64> {
    match message {
        ServerMessage::BalanceUpdate { balance } => Some(*balance),
        _ => None,
    }
}

async fn join(socket: &mut Socket, user: &str) {
    send(
        socket,
        ClientMessage::Join {
            user_id: user.to_string(),
            timestamp: None,
        },
    )
    .await;
}

#[tokio::test]
async fn test_join_receives_state_in_order() {
    let addr = start_server(Config::default()).await;
    let mut alice = connect(addr).await;

    join(&mut alice, "alice").await;

    match next(&mut alice).await {
        ServerMessage::BlockchainUpdate { data } => {
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].hash, "0");
            assert_eq!(data[0].mined_by, "system");
        }
        other => panic!("expected chain first, got {:?}", other),
    }
    assert_eq!(next(&mut alice).await, ServerMessage::PendingTransactions { data: vec![] });
    assert_eq!(next(&mut alice).await, ServerMessage::BalanceUpdate { balance: 100.0 });
    match next(&mut alice).await {
        ServerMessage::UserList { data } => {
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].id, "alice");
        }
        other => panic!("expected user list, got {:?}", other),
    }
}

#[tokio::test]
async fn test_alice_and_bob_over_websocket() {
    let addr = start_server(Config::default()).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    join(&mut alice, "alice").await;
    assert_eq!(next_matching(&mut alice, balance).await, 100.0);
    join(&mut bob, "bob").await;
    assert_eq!(next_matching(&mut bob, balance).await, 100.0);

    send(
        &mut alice,
        ClientMessage::NewTransaction {
            transaction: Transaction::new("alice", "bob", 40.0),
        },
    )
    .await;
    assert_eq!(next_matching(&mut alice, balance).await, 60.0);
    let echoed = next_matching(&mut bob, |m| match m {
        ServerMessage::NewTransaction { transaction } => Some(transaction.clone()),
        _ => None,
    })
    .await;
    assert_eq!(echoed, Transaction::new("alice", "bob", 40.0));
    assert_eq!(next_matching(&mut bob, balance).await, 100.0);

    send(
        &mut alice,
        ClientMessage::MineBlock {
            user_id: "alice".to_string(),
        },
    )
    .await;

    let chain = next_matching(&mut bob, |m| match m {
        ServerMessage::BlockchainUpdate { data } if data.len() == 2 => Some(data.clone()),
        _ => None,
    })
    .await;
    assert_eq!(chain[1].mined_by, "alice");
    assert_eq!(chain[1].transactions, vec![Transaction::new("alice", "bob", 40.0)]);
    assert!(chain[1].hash.starts_with("00"));
    assert_eq!(chain[1].hash, chain[1].calculate_hash().unwrap());

    assert_eq!(next_matching(&mut bob, balance).await, 140.0);
    assert_eq!(next_matching(&mut alice, balance).await, 60.0);
}

#[tokio::test]
async fn test_mine_with_empty_pool_returns_error() {
    let addr = start_server(Config::default()).await;
    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;
    next_matching(&mut alice, |m| matches!(m, ServerMessage::UserList { .. }).then_some(())).await;

    send(
        &mut alice,
        ClientMessage::MineBlock {
            user_id: "alice".to_string(),
        },
    )
    .await;

    assert_eq!(
        next(&mut alice).await,
        ServerMessage::Error {
            message: "No pending transactions to mine".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_frame_does_not_end_session() {
    let mut config = Config::default();
    config.protocol.reply_to_malformed = true;
    let addr = start_server(config).await;
    let mut alice = connect(addr).await;

    alice
        .send(Message::Text("{\"type\":\"TELEPORT\"}".to_string()))
        .await
        .unwrap();
    assert_eq!(
        next(&mut alice).await,
        ServerMessage::Error {
            message: "Malformed message".to_string()
        }
    );

    join(&mut alice, "alice").await;
    assert_eq!(next_matching(&mut alice, balance).await, 100.0);
}

#[tokio::test]
async fn test_binary_frames_are_read_as_text() {
    let addr = start_server(Config::default()).await;
    let mut alice = connect(addr).await;

    let join = ClientMessage::Join {
        user_id: "alice".to_string(),
        timestamp: None,
    };
    alice
        .send(Message::Binary(join.encode().unwrap().into_bytes()))
        .await
        .unwrap();

    assert_eq!(next_matching(&mut alice, balance).await, 100.0);
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let addr = start_server(Config::default()).await;
    let mut alice = connect(addr).await;

    alice.send(Message::Ping(vec![7, 1, 7])).await.unwrap();

    loop {
        let frame = tokio::time::timeout(WAIT, alice.next())
            .await
            .expect("timed out waiting for pong")
            .expect("connection closed")
            .expect("read failed");
        if let Message::Pong(payload) = frame {
            assert_eq!(payload, vec![7, 1, 7]);
            break;
        }
    }

    // The session keeps working afterwards.
    join(&mut alice, "alice").await;
    assert_eq!(next_matching(&mut alice, balance).await, 100.0);
}
