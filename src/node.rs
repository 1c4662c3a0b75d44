//! # Summary
//!
//! This module defines `Node`, one replica of the store. A node plays every
//! role at once: it serves reads from its local store, proposes its clients'
//! writes, votes on everyone's proposals, and applies what it learns.
//!
//! Peers are registered as `Link`s. The cluster size used for quorum is the
//! number of registered links plus this node, whether or not the peers are
//! currently reachable.
//!
//! Learns are applied in arrival order. Each decided operation reaches every
//! reachable node, but nothing orders two decided writes to the same key, so
//! replicas agree on the set of operations applied, not on their order.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::acceptor::{Acceptor, FaultPolicy, Reliable, Unreliable, Vote};
use crate::config::Config;
use crate::error::Result;
use crate::link::Link;
use crate::message::{Request, Response};
use crate::operation::Operation;
use crate::proposal::ProposalNumber;
use crate::proposer::Proposer;
use crate::state::Store;

pub struct Node {
    /// Unique node ID
    id: usize,

    /// Local replica of the key-value map
    store: Store,

    /// Promise and accept memory
    acceptor: Acceptor,

    /// Drives rounds for this node's writes
    proposer: Proposer,

    /// Registered peer links
    peers: RwLock<Vec<Arc<dyn Link>>>,
}

impl Node {
    /// Creates a node with no peers. Votes are dropped at random if
    /// `config.failure_rate` is positive.
    pub fn new(config: &Config) -> Self {
        let faults: Box<dyn FaultPolicy> = if config.failure_rate > 0.0 {
            Box::new(Unreliable::new(config.failure_rate))
        } else {
            Box::new(Reliable)
        };
        Self::with_faults(config, faults)
    }

    pub fn with_faults(config: &Config, faults: Box<dyn FaultPolicy>) -> Self {
        Node {
            id: config.id,
            store: Store::new(),
            acceptor: Acceptor::with_faults(config.id, faults),
            proposer: Proposer::new(config.id, config.attempts, config.backoff, config.timeout),
            peers: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn acceptor(&self) -> &Acceptor {
        &self.acceptor
    }

    /// Registers a peer.
    pub fn connect(&self, link: Arc<dyn Link>) {
        info!("node {} registered peer {}", self.id, link.name());
        self.peers.write().push(link);
    }

    /// Members counted for quorum, including this node.
    pub fn cluster_size(&self) -> usize {
        self.peers.read().len() + 1
    }

    /// Local read; bypasses consensus.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    /// Returns `Ok(false)` if no round was decided within the attempt budget.
    pub async fn put(&self, key: &str, value: &str) -> Result<bool> {
        let operation = Operation::put(key, value)?;
        Ok(self.propose(operation).await)
    }

    /// Returns `Ok(false)` if no round was decided within the attempt budget.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let operation = Operation::delete(key)?;
        Ok(self.propose(operation).await)
    }

    async fn propose(&self, operation: Operation) -> bool {
        // Never hold the lock across rounds
        let peers = self.peers.read().clone();
        self.proposer
            .propose(&operation, &self.acceptor, &self.store, &peers)
            .await
    }

    /// Votes on a peer's Prepare.
    pub fn prepare(&self, number: ProposalNumber, operation: &str) -> Result<bool> {
        let operation = operation.parse::<Operation>()?;
        Ok(self.acceptor.prepare(number, &operation))
    }

    /// Votes on a peer's Accept.
    pub fn accept(&self, number: ProposalNumber, operation: &str) -> Result<bool> {
        let operation = operation.parse::<Operation>()?;
        Ok(self.acceptor.accept(number, &operation))
    }

    /// Pairs a vote with the current promise, for the proposer's catch-up.
    pub fn vote(&self, granted: bool) -> Vote {
        Vote { granted, promised: self.acceptor.promised() }
    }

    /// Applies a decided operation from a peer. Malformed operations are
    /// rejected before touching the store.
    pub fn learn(&self, operation: &str) -> Result<()> {
        let operation = operation.parse::<Operation>()?;
        debug!("node {} learned {}", self.id, operation);
        self.store.apply(&operation);
        Ok(())
    }

    /// Serves one request arriving over the wire.
    pub async fn handle(&self, request: Request) -> Response {
        let result = match request {
        | Request::Get { key } => Ok(Response::Value(self.get(&key))),
        | Request::Put { key, value } => self.put(&key, &value).await.map(Response::Done),
        | Request::Delete { key } => self.delete(&key).await.map(Response::Done),
        | Request::Prepare { number, operation } => self.prepare(number, &operation)
            .map(|granted| Response::Vote(self.vote(granted))),
        | Request::Accept { number, operation } => self.accept(number, &operation)
            .map(|granted| Response::Vote(self.vote(granted))),
        | Request::Learn { operation } => self.learn(&operation).map(|_| Response::Learned),
        };
        result.unwrap_or_else(|error| {
            warn!("node {} failed request: {}", self.id, error);
            Response::Failed(error.to_string())
        })
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("Node")
            .field("id", &self.id)
            .field("cluster_size", &self.cluster_size())
            .finish()
    }
}
