//! # Summary
//!
//! This module defines `Remote`, a request/response connection to another
//! node over TCP, and its `Link` implementation.
//!
//! Each open connection is served by a single task which forwards queued
//! requests to the socket and routes replies back to their callers by
//! envelope ID. A caller that gives up (timeout) simply forgets its ID, so a
//! late reply is dropped instead of being handed to the next request. When
//! the socket closes, every pending caller sees the peer as unreachable and
//! the next call dials again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use futures::future::{BoxFuture, FutureExt};
use hashbrown::HashMap as Map;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::time;

use crate::acceptor::Vote;
use crate::error::{Error, Result};
use crate::internal;
use crate::link::Link;
use crate::message::{Envelope, Request, Response};
use crate::operation::Operation;
use crate::proposal::ProposalNumber;
use crate::socket;

/// Callers waiting on a reply, by envelope ID.
type Pending = Arc<Mutex<Map<u64, oneshot::Sender<Response>>>>;

/// Live connection: the outgoing queue and the reply routing table.
struct Connection {
    tx: internal::Tx<Envelope<Request>>,
    pending: Pending,
}

/// Request/response connection to a node at `address`.
pub struct Remote {
    /// Peer address, `host:port`
    address: String,

    /// Bound on dialing and on waiting for each reply
    timeout: Duration,

    /// Next envelope ID
    next: AtomicU64,

    /// Current connection, if any; locked across dials so only one runs at a time
    connection: AsyncMutex<Option<Connection>>,
}

impl Remote {
    /// Creates an unconnected handle. Nothing is dialed until `connect` or the first call.
    pub fn new<A: Into<String>>(address: A, timeout: Duration) -> Self {
        Remote {
            address: address.into(),
            timeout,
            next: AtomicU64::new(0),
            connection: AsyncMutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Dials the peer unless a live connection already exists.
    pub async fn connect(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        if connection.as_ref().map_or(false, |live| !live.tx.is_closed()) {
            return Ok(())
        }
        let stream = match time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
        | Ok(Ok(stream)) => stream,
        | Ok(Err(error)) => {
            debug!("could not connect to {}: {}", self.address, error);
            return Err(Error::Unreachable(self.address.clone()))
        }
        | Err(_) => return Err(Error::Timeout(self.address.clone())),
        };
        stream.set_nodelay(true)?;
        info!("connected to {}", self.address);
        *connection = Some(Self::spawn(self.address.clone(), stream));
        Ok(())
    }

    /// Dials with bounded retry, sleeping `delay` between failures.
    pub async fn connect_with_retry(&self, attempts: usize, delay: Duration) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.connect().await {
            | Ok(()) => return Ok(()),
            | Err(error) if attempt >= attempts => {
                warn!("could not connect to {} after {} attempts", self.address, attempts);
                return Err(error)
            }
            | Err(error) => {
                warn!("failed to connect to {} ({}), {} attempts left", self.address, error, attempts - attempt);
                attempt += 1;
                time::sleep(delay).await;
            }
            }
        }
    }

    /// Starts the task that owns `stream`.
    fn spawn(address: String, stream: TcpStream) -> Connection {
        let (socket_rx, socket_tx) = socket::split::<Envelope<Request>, Envelope<Response>>(stream);
        let (rx, tx) = internal::new::<Envelope<Request>>();
        let pending: Pending = Arc::default();
        let routes = pending.clone();

        tokio::spawn(async move {
            let outgoing = rx
                .inspect(|envelope| trace!("sending {:?}", envelope))
                .map(Ok::<_, std::io::Error>)
                .forward(socket_tx);

            let incoming = socket_rx
                .try_for_each(|envelope| {
                    trace!("received {:?}", envelope);
                    // Caller may have timed out and forgotten this ID
                    if let Some(caller) = routes.lock().remove(&envelope.id) {
                        caller.send(envelope.body).ok();
                    }
                    futures::future::ready(Ok(()))
                });

            tokio::select! {
                result = outgoing => if let Err(error) = result {
                    debug!("write to {} failed: {}", address, error);
                },
                result = incoming => if let Err(error) = result {
                    debug!("read from {} failed: {}", address, error);
                },
            }

            // Dropping the senders wakes every waiting caller
            routes.lock().clear();
            info!("disconnected from {}", address);
        });

        Connection { tx, pending }
    }

    /// Sends `request` and waits up to the timeout for its reply.
    pub async fn call(&self, request: Request) -> Result<Response> {
        self.connect().await?;
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        let pending = {
            let connection = self.connection.lock().await;
            let connection = connection
                .as_ref()
                .ok_or_else(|| Error::Unreachable(self.address.clone()))?;
            connection.pending.lock().insert(id, reply_tx);
            if !connection.tx.try_send(Envelope { id, body: request }) {
                connection.pending.lock().remove(&id);
                return Err(Error::Unreachable(self.address.clone()))
            }
            connection.pending.clone()
        };

        match time::timeout(self.timeout, reply_rx).await {
        | Ok(Ok(Response::Failed(reason))) => Err(Error::Remote(reason)),
        | Ok(Ok(response)) => Ok(response),
        | Ok(Err(_)) => Err(Error::Unreachable(self.address.clone())),
        | Err(_) => {
            pending.lock().remove(&id);
            Err(Error::Timeout(self.address.clone()))
        }
        }
    }

    async fn vote(&self, request: Request) -> Result<Vote> {
        match self.call(request).await? {
        | Response::Vote(vote) => Ok(vote),
        | other => Err(unexpected(other)),
        }
    }
}

pub(crate) fn unexpected(response: Response) -> Error {
    Error::Remote(format!("unexpected response {:?}", response))
}

impl Link for Remote {
    fn name(&self) -> &str {
        &self.address
    }

    fn prepare(&self, number: ProposalNumber, operation: &Operation) -> BoxFuture<'_, Result<Vote>> {
        let request = Request::Prepare { number, operation: operation.to_string() };
        self.vote(request).boxed()
    }

    fn accept(&self, number: ProposalNumber, operation: &Operation) -> BoxFuture<'_, Result<Vote>> {
        let request = Request::Accept { number, operation: operation.to_string() };
        self.vote(request).boxed()
    }

    fn learn(&self, operation: &Operation) -> BoxFuture<'_, Result<()>> {
        let request = Request::Learn { operation: operation.to_string() };
        async move {
            match self.call(request).await? {
            | Response::Learned => Ok(()),
            | other => Err(unexpected(other)),
            }
        }
        .boxed()
    }
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("Remote")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}
