//! # Summary
//!
//! This module drives a single consensus attempt for one operation:
//! Prepare, then Accept, then Learn.
//!
//! Each voting phase fans the request out to every peer at once, each call
//! bounded by the RPC timeout, and only tallies once every call has either
//! answered or timed out. The proposer votes through its own acceptor and
//! counts towards the total. A phase passes when a strict majority of the
//! whole cluster grants; an unreachable or slow peer is a non-grant, never a
//! round failure on its own. A failed phase reports the highest promise any
//! voter holds, so the next attempt can start above it.
//!
//! Rounds for different operations are independent and there is no log
//! ordering them. Two rounds decided close together for the same key may be
//! learned in different orders on different nodes, which then disagree on
//! that key until a later write to it.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tokio::time;

use crate::acceptor::{Acceptor, Phase, Vote};
use crate::link::Link;
use crate::operation::Operation;
use crate::proposal::ProposalNumber;
use crate::state::Store;

/// Result of one attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Both phases reached quorum and the operation was learned
    Decided,

    /// The given phase fell short of quorum; nothing was applied.
    /// Carries the highest promise reported by any voter.
    Failed(Phase, ProposalNumber),
}

/// Votes collected in one phase.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Tally {
    grants: usize,
    promised: ProposalNumber,
}

impl Tally {
    fn add(&mut self, vote: Vote) {
        if vote.granted {
            self.grants += 1;
        }
        self.promised = std::cmp::max(self.promised, vote.promised);
    }
}

/// Strict majority of `size` members.
pub fn quorum(size: usize) -> usize {
    size / 2 + 1
}

/// One attempt at deciding `operation` under proposal `number`.
pub struct Round<'a> {
    number: ProposalNumber,
    operation: &'a Operation,
    acceptor: &'a Acceptor,
    store: &'a Store,
    peers: &'a [Arc<dyn Link>],
    timeout: Duration,
}

impl<'a> Round<'a> {
    pub fn new(
        number: ProposalNumber,
        operation: &'a Operation,
        acceptor: &'a Acceptor,
        store: &'a Store,
        peers: &'a [Arc<dyn Link>],
        timeout: Duration,
    ) -> Self {
        Round {
            number,
            operation,
            acceptor,
            store,
            peers,
            timeout,
        }
    }

    /// Members voting in this round, including the proposer.
    fn size(&self) -> usize {
        self.peers.len() + 1
    }

    pub async fn run(self) -> Outcome {
        let quorum = quorum(self.size());

        let promises = self.vote(Phase::Prepare).await;
        if promises.grants < quorum {
            debug!("{} for {} failed prepare with {}/{} promises", self.number, self.operation, promises.grants, self.size());
            return Outcome::Failed(Phase::Prepare, promises.promised)
        }
        debug!("{} for {} prepared with {}/{} promises", self.number, self.operation, promises.grants, self.size());

        let accepts = self.vote(Phase::Accept).await;
        if accepts.grants < quorum {
            debug!("{} for {} failed accept with {}/{} accepts", self.number, self.operation, accepts.grants, self.size());
            return Outcome::Failed(Phase::Accept, accepts.promised)
        }
        debug!("{} for {} accepted with {}/{} accepts", self.number, self.operation, accepts.grants, self.size());

        self.learn().await;
        info!("{} decided {}", self.number, self.operation);
        Outcome::Decided
    }

    /// Collects one phase's votes from self and every peer.
    async fn vote(&self, phase: Phase) -> Tally {
        let granted = match phase {
        | Phase::Prepare => self.acceptor.prepare(self.number, self.operation),
        | Phase::Accept => self.acceptor.accept(self.number, self.operation),
        };
        let local = Vote { granted, promised: self.acceptor.promised() };

        let remote = self.peers.iter().map(|peer| {
            let request = match phase {
            | Phase::Prepare => peer.prepare(self.number, self.operation),
            | Phase::Accept => peer.accept(self.number, self.operation),
            };
            async move {
                match time::timeout(self.timeout, request).await {
                | Ok(Ok(vote)) => Some(vote),
                | Ok(Err(error)) => {
                    debug!("{:?} from {} counted as rejection: {}", phase, peer.name(), error);
                    None
                }
                | Err(_) => {
                    warn!("{:?} to {} timed out after {:?}", phase, peer.name(), self.timeout);
                    None
                }
                }
            }
        });

        let remote = future::join_all(remote).await;
        let mut tally = Tally::default();
        for vote in std::iter::once(local).chain(remote.into_iter().flatten()) {
            tally.add(vote);
        }
        tally
    }

    /// Applies locally and tells every peer, without waiting for acknowledgement
    /// beyond the RPC timeout.
    async fn learn(&self) {
        self.store.apply(self.operation);
        let learns = self.peers.iter().map(|peer| {
            let request = peer.learn(self.operation);
            async move {
                match time::timeout(self.timeout, request).await {
                | Ok(Ok(())) => (),
                | Ok(Err(error)) => debug!("learn to {} failed: {}", peer.name(), error),
                | Err(_) => debug!("learn to {} timed out", peer.name()),
                }
            }
        });
        future::join_all(learns).await;
    }
}
