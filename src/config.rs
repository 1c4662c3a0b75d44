use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::link::Link;
use crate::node::Node;
use crate::peer::Remote;
use crate::proposal::MAX_NODES;
use crate::server::Server;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_ATTEMPTS: usize = 5;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(50);
const DEFAULT_CONNECT_ATTEMPTS: usize = 5;
const DEFAULT_CONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct Config {
    /// Unique node ID
    pub(crate) id: usize,

    /// Port for incoming client and peer requests
    pub(crate) port: u16,

    /// Peer addresses, `host:port`, excluding this node
    pub(crate) peers: Vec<String>,

    /// Timeout for a single request to a peer
    pub(crate) timeout: Duration,

    /// Consensus rounds per write before giving up
    pub(crate) attempts: usize,

    /// Base delay between failed rounds
    pub(crate) backoff: Duration,

    /// Dial attempts per peer at startup
    pub(crate) connect_attempts: usize,

    /// Delay between dial attempts at startup
    pub(crate) connect_delay: Duration,

    /// Probability of dropping any single acceptor vote
    pub(crate) failure_rate: f64,
}

impl Config {
    pub fn new(id: usize, port: u16, peers: Vec<String>) -> Self {
        Config {
            id,
            port,
            peers,
            timeout: DEFAULT_TIMEOUT,
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_delay: DEFAULT_CONNECT_DELAY,
            failure_rate: 0.0,
        }
    }

    /// Reads `NODE_ID`, `PORT`, `REPLICAS` and optionally `FAILURE_RATE`.
    pub fn from_env() -> Result<Self> {
        let id = var::<usize>("NODE_ID")?.ok_or_else(|| missing("NODE_ID"))?;
        let port = var::<u16>("PORT")?.ok_or_else(|| missing("PORT"))?;
        let peers = std::env::var("REPLICAS")
            .map(|replicas| parse_peers(&replicas))
            .unwrap_or_default();
        let failure_rate = var::<f64>("FAILURE_RATE")?.unwrap_or(0.0);
        Ok(Config::new(id, port, peers).with_failure_rate(failure_rate))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_connect_retry(mut self, attempts: usize, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.connect_delay = delay;
        self
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Longest a single put or delete can take before the node answers:
    /// every attempt waits out prepare, accept and learn, with up to twice
    /// the base backoff between attempts. Clients should wait longer.
    pub fn write_budget(&self) -> Duration {
        let attempts = self.attempts as u32;
        self.timeout * 3 * attempts + self.backoff * 2 * attempts.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id as u64 >= MAX_NODES {
            return Err(Error::Config(format!("node id {} must be below {}", self.id, MAX_NODES)))
        }
        if self.attempts == 0 {
            return Err(Error::Config("attempts must be positive".to_string()))
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(Error::Config(format!("failure rate {} outside [0, 1]", self.failure_rate)))
        }
        if let Some(peer) = self.peers.iter().find(|peer| peer.rsplit_once(':').is_none()) {
            return Err(Error::Config(format!("peer {:?} is not host:port", peer)))
        }
        Ok(())
    }

    /// Binds `0.0.0.0:port` and starts the node.
    pub async fn run(self) -> Result<Handle> {
        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;
        self.run_on(listener).await
    }

    /// Starts the node on an already bound listener, then dials every peer
    /// in the background with bounded retry. Peers that stay down remain
    /// registered and are dialed again on demand.
    pub async fn run_on(self, listener: TcpListener) -> Result<Handle> {
        self.validate()?;
        let node = Arc::new(Node::new(&self));
        let remotes = self.peers.iter()
            .map(|peer| Arc::new(Remote::new(peer.as_str(), self.timeout)))
            .collect::<Vec<_>>();
        for remote in &remotes {
            node.connect(remote.clone() as Arc<dyn Link>);
        }

        let server = Server::new(listener, node.clone());
        let addr = server.local_addr()?;
        info!("node {} listening on {} with peers {:?}", self.id, addr, self.peers);
        let server = tokio::spawn(server.serve());

        for remote in remotes {
            let (attempts, delay) = (self.connect_attempts, self.connect_delay);
            tokio::spawn(async move {
                remote.connect_with_retry(attempts, delay).await.ok();
            });
        }

        Ok(Handle { node, addr, server })
    }
}

/// Running node and its listener task.
#[derive(Debug)]
pub struct Handle {
    node: Arc<Node>,
    addr: SocketAddr,
    server: JoinHandle<Result<()>>,
}

impl Handle {
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops listening and drops every open connection.
    pub fn shutdown(self) {
        info!("node {} shutting down", self.node.id());
        self.server.abort();
    }

    /// Runs until the server task stops.
    pub async fn wait(self) -> Result<()> {
        match self.server.await {
        | Ok(result) => result,
        | Err(error) => Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, error))),
        }
    }
}

/// Splits a comma-separated `host:port` list, ignoring blanks.
pub fn parse_peers(peers: &str) -> Vec<String> {
    peers.split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(String::from)
        .collect()
}

fn var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
    | Ok(value) => value.trim()
        .parse()
        .map(Some)
        .map_err(|_| Error::Config(format!("{}={:?} is not valid", name, value))),
    | Err(_) => Ok(None),
    }
}

fn missing(name: &str) -> Error {
    Error::Config(format!("{} is not set", name))
}
