//! # Summary
//!
//! This module defines `Link`, a proposer's handle on a single peer
//! acceptor. A link only carries Prepare, Accept and Learn; how the request
//! reaches the peer is up to the implementation.
//!
//! `peer::Remote` implements it over TCP. `MemoryLink` below calls straight
//! into another in-process `Node`, still passing operations through their
//! string encoding, and can be switched off to simulate an unreachable peer.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{self, BoxFuture, FutureExt};

use crate::acceptor::Vote;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::operation::Operation;
use crate::proposal::ProposalNumber;

/// Connection from a proposer to one peer acceptor. Votes come back with
/// the peer's current promise, granted or not.
pub trait Link: Send + Sync {
    /// Human-readable peer name, used in logs and errors.
    fn name(&self) -> &str;

    fn prepare(&self, number: ProposalNumber, operation: &Operation) -> BoxFuture<'_, Result<Vote>>;

    fn accept(&self, number: ProposalNumber, operation: &Operation) -> BoxFuture<'_, Result<Vote>>;

    fn learn(&self, operation: &Operation) -> BoxFuture<'_, Result<()>>;
}

/// In-process link to another node.
#[derive(Debug)]
pub struct MemoryLink {
    name: String,
    node: Weak<Node>,
    reachable: AtomicBool,
}

impl MemoryLink {
    pub fn new(node: &Arc<Node>) -> Arc<Self> {
        Arc::new(MemoryLink {
            name: format!("node-{}", node.id()),
            node: Arc::downgrade(node),
            reachable: AtomicBool::new(true),
        })
    }

    /// Simulates the peer going down or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn node(&self) -> Result<Arc<Node>> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(Error::Unreachable(self.name.clone()))
        }
        self.node
            .upgrade()
            .ok_or_else(|| Error::Unreachable(self.name.clone()))
    }
}

impl Link for MemoryLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, number: ProposalNumber, operation: &Operation) -> BoxFuture<'_, Result<Vote>> {
        let encoded = operation.to_string();
        trace!("sending prepare {} {} to {}", number, encoded, self.name);
        let vote = self.node().and_then(|node| {
            node.prepare(number, &encoded).map(|granted| node.vote(granted))
        });
        future::ready(vote).boxed()
    }

    fn accept(&self, number: ProposalNumber, operation: &Operation) -> BoxFuture<'_, Result<Vote>> {
        let encoded = operation.to_string();
        trace!("sending accept {} {} to {}", number, encoded, self.name);
        let vote = self.node().and_then(|node| {
            node.accept(number, &encoded).map(|granted| node.vote(granted))
        });
        future::ready(vote).boxed()
    }

    fn learn(&self, operation: &Operation) -> BoxFuture<'_, Result<()>> {
        let encoded = operation.to_string();
        trace!("sending learn {} to {}", encoded, self.name);
        future::ready(self.node().and_then(|node| node.learn(&encoded))).boxed()
    }
}
