//! Clusters of real servers talking over loopback TCP.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use paxoskv::peer::Remote;
use paxoskv::{Client, Config, Error, Handle, Node, Request};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

async fn start(count: usize) -> Vec<Handle> {
    let mut listeners = Vec::new();
    for _ in 0..count {
        listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
    }
    let addrs = listeners.iter()
        .map(|listener| listener.local_addr().unwrap().to_string())
        .collect::<Vec<_>>();

    let mut handles = Vec::new();
    for (id, listener) in listeners.into_iter().enumerate() {
        let peers = addrs.iter()
            .enumerate()
            .filter(|(peer, _)| *peer != id)
            .map(|(_, addr)| addr.clone())
            .collect();
        let config = Config::new(id, 0, peers)
            .with_timeout(Duration::from_millis(500))
            .with_attempts(3)
            .with_backoff(Duration::from_millis(10))
            .with_connect_retry(3, Duration::from_millis(50));
        handles.push(config.run_on(listener).await.unwrap());
    }
    handles
}

async fn client(handle: &Handle) -> Client {
    Client::connect(handle.local_addr().to_string(), CLIENT_TIMEOUT).await.unwrap()
}

/// Gives an aborted server time to drop its sockets.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn replicates_over_tcp() {
    let handles = start(3).await;
    let clients = vec![client(&handles[0]).await, client(&handles[1]).await, client(&handles[2]).await];

    assert!(clients[0].put("x", "1").await.unwrap());
    for client in &clients {
        assert_eq!(client.get("x").await.unwrap(), Some("1".to_string()));
    }

    assert!(clients[2].delete("x").await.unwrap());
    for client in &clients {
        assert_eq!(client.get("x").await.unwrap(), None);
    }

    // Delete of an absent key is still a decided write
    assert!(clients[1].delete("x").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tolerates_one_stopped_node() {
    let mut handles = start(3).await;
    let first = client(&handles[0]).await;
    assert!(first.put("x", "1").await.unwrap());

    let stopped: Arc<Node> = handles[2].node().clone();
    handles.pop().unwrap().shutdown();
    settle().await;

    assert!(first.put("x", "2").await.unwrap());
    assert_eq!(first.get("x").await.unwrap(), Some("2".to_string()));
    assert_eq!(handles[1].node().get("x"), Some("2".to_string()));
    assert_eq!(stopped.get("x"), Some("1".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn majority_down_fails_writes() {
    let mut handles = start(3).await;
    let first = client(&handles[0]).await;
    assert!(first.put("x", "1").await.unwrap());

    handles.pop().unwrap().shutdown();
    handles.pop().unwrap().shutdown();
    settle().await;

    assert!(!first.put("x", "2").await.unwrap());
    assert_eq!(first.get("x").await.unwrap(), Some("1".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejects_bad_requests() {
    let handles = start(1).await;
    let first = client(&handles[0]).await;

    assert!(matches!(first.put("a:b", "1").await, Err(Error::Remote(_))));

    let remote = Remote::new(handles[0].local_addr().to_string(), CLIENT_TIMEOUT);
    let malformed = Request::Learn { operation: "PUT:x".to_string() };
    assert!(matches!(remote.call(malformed).await, Err(Error::Remote(_))));
    assert!(handles[0].node().store().is_empty());
}

#[tokio::test]
async fn unreachable_node_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let result = Client::connect(addr, Duration::from_millis(500)).await;
    assert!(matches!(result, Err(Error::Unreachable(_)) | Err(Error::Timeout(_))));
}
