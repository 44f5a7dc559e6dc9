use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relay::{build_router, AppState, HubConfig, HubHandle, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(hub_config: HubConfig) -> SocketAddr {
    start_server_with_hub(hub_config).await.0
}

async fn start_server_with_hub(hub_config: HubConfig) -> (SocketAddr, HubHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::with_hub_config(ServerConfig::default(), hub_config);
    let hub = state.hub.clone();
    let router = build_router(state);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, hub)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    client
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection ended")
            .expect("websocket error");
        match frame {
            Message::Text(text) => return text,
            Message::Binary(bytes) => return String::from_utf8(bytes).unwrap(),
            _ => continue,
        }
    }
}

/// Next frame that is not a membership notice
async fn next_chat(client: &mut Client) -> String {
    loop {
        let text = next_text(client).await;
        if text != "Peer Connected" && text != "Peer Disconnected" {
            return text;
        }
    }
}

#[tokio::test]
async fn peers_receive_each_others_messages() {
    let addr = start_server(HubConfig::default()).await;

    let mut alice = connect(addr).await;
    assert_eq!(next_text(&mut alice).await, "Peer Connected");

    let mut bob = connect(addr).await;
    assert_eq!(next_text(&mut bob).await, "Peer Connected");
    assert_eq!(next_text(&mut alice).await, "Peer Connected");

    alice.send(Message::Text("hello".into())).await.unwrap();

    assert_eq!(next_chat(&mut bob).await, "hello");
    // Echo to the sender is on by default
    assert_eq!(next_chat(&mut alice).await, "hello");
}

#[tokio::test]
async fn sender_not_echoed_when_disabled() {
    let addr = start_server(HubConfig {
        echo_to_sender: false,
        ..HubConfig::default()
    })
    .await;

    let mut alice = connect(addr).await;
    assert_eq!(next_text(&mut alice).await, "Peer Connected");
    let mut bob = connect(addr).await;
    assert_eq!(next_text(&mut bob).await, "Peer Connected");

    alice.send(Message::Text("from alice".into())).await.unwrap();
    bob.send(Message::Text("from bob".into())).await.unwrap();

    assert_eq!(next_chat(&mut bob).await, "from alice");
    assert_eq!(next_chat(&mut alice).await, "from bob");
}

#[tokio::test]
async fn binary_frames_are_relayed() {
    let addr = start_server(HubConfig::default()).await;

    let mut alice = connect(addr).await;
    assert_eq!(next_text(&mut alice).await, "Peer Connected");
    let mut bob = connect(addr).await;
    assert_eq!(next_text(&mut bob).await, "Peer Connected");

    alice.send(Message::Binary(vec![0xff, 0x00, 0x01])).await.unwrap();

    let frame = loop {
        let frame = timeout(WAIT, bob.next()).await.unwrap().unwrap().unwrap();
        if let Message::Binary(bytes) = frame {
            break bytes;
        }
    };
    assert_eq!(frame, vec![0xff, 0x00, 0x01]);
}

#[tokio::test]
async fn departure_is_announced() {
    let addr = start_server(HubConfig::default()).await;

    let mut alice = connect(addr).await;
    assert_eq!(next_text(&mut alice).await, "Peer Connected");
    let mut bob = connect(addr).await;
    assert_eq!(next_text(&mut bob).await, "Peer Connected");
    assert_eq!(next_text(&mut alice).await, "Peer Connected");

    bob.close(None).await.unwrap();

    assert_eq!(next_text(&mut alice).await, "Peer Disconnected");
}

#[tokio::test]
async fn many_messages_arrive_in_order() {
    let addr = start_server(HubConfig::default()).await;

    let mut alice = connect(addr).await;
    assert_eq!(next_text(&mut alice).await, "Peer Connected");
    let mut bob = connect(addr).await;
    assert_eq!(next_text(&mut bob).await, "Peer Connected");

    for i in 0..100 {
        alice.send(Message::Text(format!("msg-{}", i))).await.unwrap();
    }
    for i in 0..100 {
        assert_eq!(next_chat(&mut bob).await, format!("msg-{}", i));
    }
}

#[tokio::test]
async fn stalled_reader_is_evicted_and_disconnected() {
    let (addr, hub) = start_server_with_hub(HubConfig {
        outbound_capacity: 4,
        echo_to_sender: false,
        ..HubConfig::default()
    })
    .await;

    let mut alice = connect(addr).await;
    assert_eq!(next_text(&mut alice).await, "Peer Connected");
    let mut bob = connect(addr).await;
    assert_eq!(next_text(&mut bob).await, "Peer Connected");
    // Never read from here on, until the server gives up on it
    let mut stalled = connect(addr).await;
    timeout(WAIT, async {
        while hub.member_count().await.unwrap() != 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // Lockstep with bob so only the stalled peer can fall behind
    let frame = vec![0xab_u8; 256 * 1024];
    let mut evicted = false;
    for _ in 0..400 {
        alice.send(Message::Binary(frame.clone())).await.unwrap();
        loop {
            let next = timeout(WAIT, bob.next()).await.unwrap().unwrap().unwrap();
            if let Message::Binary(bytes) = next {
                assert_eq!(bytes.len(), frame.len());
                break;
            }
        }
        if hub.member_count().await.unwrap() == 2 {
            evicted = true;
            break;
        }
    }
    assert!(evicted, "stalled peer was never evicted");

    // Buffered frames drain, then the socket ends
    timeout(Duration::from_secs(15), async {
        loop {
            match stalled.next().await {
                None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("stalled peer's connection was never closed");

    alice.send(Message::Text("still here".into())).await.unwrap();
    assert_eq!(next_chat(&mut bob).await, "still here");
}
