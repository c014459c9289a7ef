// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! Integration tests: boards exchanging moves through an in-process relay.
//!
//! These tests validate:
//! - A move from one board reaches every other board exactly once
//! - The sending board never hears its own move
//! - Moves from one board arrive in the order they were sent
//! - A board that left does not disturb the ones still connected
//! - Payloads the relay cannot read still pass through unchanged

use std::sync::Arc;
use std::time::Duration;

use boardcast::client::{ClientError, ClientEvent, RelayClient};
use boardcast_proto::square::Square;
use boardcast_relay::relay::{self, RelayState};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

/// Start a relay on an OS-assigned port and return its URL and state.
async fn start_relay() -> (String, Arc<RelayState>) {
    let state = Arc::new(RelayState::new());
    let (addr, _handle) = relay::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (format!("ws://{addr}/"), state)
}

/// Wait until the relay has registered exactly `n` boards.
///
/// The client's handshake can finish before the relay runs its upgrade
/// callback, so tests sync on the hub before sending.
async fn wait_for_boards(state: &RelayState, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while state.hub.len() != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {n} boards, relay has {}", state.hub.len()));
}

async fn next(client: &RelayClient) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(2), client.next_event())
        .await
        .expect("timed out waiting for event")
        .unwrap()
}

async fn assert_quiet(client: &RelayClient) {
    let got = tokio::time::timeout(Duration::from_millis(150), client.next_event()).await;
    assert!(got.is_err(), "unexpected event: {got:?}");
}

fn sq(s: &str) -> Square {
    s.parse().unwrap()
}

#[tokio::test]
async fn move_reaches_every_other_board_once() {
    let (url, state) = start_relay().await;
    let a = RelayClient::connect(&url).await.unwrap();
    let b = RelayClient::connect(&url).await.unwrap();
    let c = RelayClient::connect(&url).await.unwrap();
    wait_for_boards(&state, 3).await;

    a.send_move(sq("e2"), sq("e4")).await.unwrap();

    let expected = ClientEvent::Move {
        from: sq("e2"),
        to: sq("e4"),
    };
    assert_eq!(next(&b).await, expected);
    assert_eq!(next(&c).await, expected);
    assert_quiet(&a).await;
    assert_quiet(&b).await;
    assert_quiet(&c).await;
}

#[tokio::test]
async fn plain_text_passes_through() {
    let (url, state) = start_relay().await;
    let a = RelayClient::connect(&url).await.unwrap();
    let b = RelayClient::connect(&url).await.unwrap();
    wait_for_boards(&state, 2).await;

    a.send_raw("hello").await.unwrap();
    assert_eq!(next(&b).await, ClientEvent::Other("hello".to_string()));
}

#[tokio::test]
async fn moves_keep_sender_order() {
    let (url, state) = start_relay().await;
    let a = RelayClient::connect(&url).await.unwrap();
    let b = RelayClient::connect(&url).await.unwrap();
    wait_for_boards(&state, 2).await;

    let moves = [("e2", "e4"), ("g1", "f3"), ("f1", "c4")];
    for (from, to) in moves {
        a.send_move(sq(from), sq(to)).await.unwrap();
    }
    for (from, to) in moves {
        assert_eq!(
            next(&b).await,
            ClientEvent::Move {
                from: sq(from),
                to: sq(to),
            }
        );
    }
}

#[tokio::test]
async fn both_boards_can_reply() {
    let (url, state) = start_relay().await;
    let white = RelayClient::connect(&url).await.unwrap();
    let black = RelayClient::connect(&url).await.unwrap();
    wait_for_boards(&state, 2).await;

    white.send_move(sq("d2"), sq("d4")).await.unwrap();
    assert!(matches!(next(&black).await, ClientEvent::Move { .. }));

    black.send_move(sq("d7"), sq("d5")).await.unwrap();
    assert_eq!(
        next(&white).await,
        ClientEvent::Move {
            from: sq("d7"),
            to: sq("d5"),
        }
    );
}

#[tokio::test]
async fn departed_board_is_skipped_silently() {
    let (url, state) = start_relay().await;
    let a = RelayClient::connect(&url).await.unwrap();
    let b = RelayClient::connect(&url).await.unwrap();
    wait_for_boards(&state, 2).await;

    b.close().await.unwrap();
    drop(b);
    wait_for_boards(&state, 1).await;

    a.send_raw("ping").await.unwrap();
    assert_quiet(&a).await;
    assert!(a.is_connected());
    assert_eq!(state.hub.len(), 1);
}

#[tokio::test]
async fn late_joiner_only_sees_later_moves() {
    let (url, state) = start_relay().await;
    let a = RelayClient::connect(&url).await.unwrap();
    let b = RelayClient::connect(&url).await.unwrap();
    wait_for_boards(&state, 2).await;

    a.send_move(sq("e2"), sq("e4")).await.unwrap();
    assert!(matches!(next(&b).await, ClientEvent::Move { .. }));

    let c = RelayClient::connect(&url).await.unwrap();
    wait_for_boards(&state, 3).await;
    // Nothing is stored for boards that were not connected.
    assert_quiet(&c).await;

    a.send_move(sq("e7"), sq("e5")).await.unwrap();
    assert_eq!(
        next(&c).await,
        ClientEvent::Move {
            from: sq("e7"),
            to: sq("e5"),
        }
    );
}

#[tokio::test]
async fn browser_frames_decode_as_moves() {
    let (url, state) = start_relay().await;
    let (mut browser, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let board = RelayClient::connect(&url).await.unwrap();
    wait_for_boards(&state, 2).await;

    let json = r#"{"type":"MOVE","from":{"x":6,"y":7},"to":{"x":5,"y":5}}"#;
    browser
        .send(tungstenite::Message::Text(json.into()))
        .await
        .unwrap();
    assert_eq!(
        next(&board).await,
        ClientEvent::Move {
            from: sq("g8"),
            to: sq("f6"),
        }
    );

    // And the other way round: the browser sees the exact JSON shape.
    board.send_move(sq("b1"), sq("c3")).await.unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(2), browser.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(value["type"], "MOVE");
    assert_eq!(value["from"]["x"], 1);
    assert_eq!(value["to"]["y"], 2);
}

#[tokio::test]
async fn send_after_relay_closed_fails() {
    let state = Arc::new(RelayState::new());
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let (addr, _handle) = relay::start_server_with_shutdown("127.0.0.1:0", Arc::clone(&state), async move {
        let _ = stop_rx.await;
    })
    .await
    .unwrap();
    let a = RelayClient::connect(&format!("ws://{addr}/")).await.unwrap();
    wait_for_boards(&state, 1).await;

    stop_tx.send(()).unwrap();
    let ended = tokio::time::timeout(Duration::from_secs(2), a.next_event())
        .await
        .unwrap();
    assert!(matches!(ended, Err(ClientError::ConnectionClosed)));

    let result = a.send_move(sq("a2"), sq("a3")).await;
    assert!(matches!(result, Err(ClientError::ConnectionClosed)));
}
