//! # Summary
//!
//! This module accepts TCP connections from clients and peers alike and
//! serves their requests against a `Node`.
//!
//! Requests on one connection are handled concurrently, since a Put may sit
//! in a consensus round for a while; replies are tagged with the request's
//! envelope ID and funneled back through a single writer per connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time;

use crate::error::Result;
use crate::internal;
use crate::message::{Envelope, Request, Response};
use crate::node::Node;
use crate::socket;

/// Pause after a failed accept, e.g. while out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: TcpListener,
    node: Arc<Node>,
}

impl Server {
    pub fn new(listener: TcpListener, node: Arc<Node>) -> Self {
        Server { listener, node }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is dropped. Dropping the returned
    /// future also drops every connection it accepted. Failed accepts are
    /// logged and skipped.
    pub async fn serve(self) -> Result<()> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                | Ok((stream, addr)) => {
                    if let Err(error) = stream.set_nodelay(true) {
                        debug!("could not set nodelay for {}: {}", addr, error);
                    }
                    debug!("node {} accepted connection from {}", self.node.id(), addr);
                    connections.spawn(serve_connection(stream, addr, self.node.clone()));
                }
                | Err(error) => {
                    warn!("node {} failed to accept connection: {}", self.node.id(), error);
                    time::sleep(ACCEPT_BACKOFF).await;
                }
                },
                // Reap finished connections so the set does not grow forever
                Some(_) = connections.join_next(), if !connections.is_empty() => (),
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, addr: SocketAddr, node: Arc<Node>) {
    let (mut socket_rx, socket_tx) = socket::split::<Envelope<Response>, Envelope<Request>>(stream);
    let (rx, tx) = internal::new::<Envelope<Response>>();

    let writer = tokio::spawn(
        rx.inspect(|envelope| trace!("sending {:?}", envelope))
            .map(Ok::<_, std::io::Error>)
            .forward(socket_tx)
    );

    let mut requests = JoinSet::new();
    while let Some(incoming) = socket_rx.next().await {
        let Envelope { id, body } = match incoming {
        | Ok(envelope) => envelope,
        | Err(error) => {
            debug!("read from {} failed: {}", addr, error);
            break
        }
        };
        trace!("received {:?} from {}", body, addr);
        let node = node.clone();
        let tx = tx.clone();
        requests.spawn(async move {
            let body = node.handle(body).await;
            tx.try_send(Envelope { id, body });
        });
        while requests.try_join_next().is_some() {}
    }

    // Let in-flight requests reply before the writer shuts down
    while requests.join_next().await.is_some() {}
    drop(tx);
    writer.await.ok();
    debug!("node {} closed connection from {}", node.id(), addr);
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::client::Client;
    use crate::config::Config;

    #[tokio::test]
    async fn keeps_serving_after_broken_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let node = Arc::new(Node::new(&Config::new(0, 0, vec![])));
        let server = Server::new(listener, node.clone());
        let addr = server.local_addr().unwrap();
        let serving = tokio::spawn(server.serve());

        // Hang up immediately, and send a frame that is not an envelope
        for _ in 0..8 {
            drop(TcpStream::connect(addr).await.unwrap());
        }
        let mut garbage = TcpStream::connect(addr).await.unwrap();
        garbage.write_all(&[0, 0, 0, 3, 0xff, 0xff, 0xff]).await.unwrap();
        drop(garbage);

        let client = Client::connect(addr.to_string(), Duration::from_secs(5)).await.unwrap();
        assert!(client.put("k", "v").await.unwrap());
        assert_eq!(client.get("k").await.unwrap(), Some("v".to_string()));
        assert!(!serving.is_finished());
        serving.abort();
    }
}
