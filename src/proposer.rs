//! # Summary
//!
//! This module wraps `Round` in a bounded retry loop. Every attempt draws a
//! fresh proposal number, first catching the counter up to whatever the
//! local acceptor has already promised. A failed attempt also catches up to
//! the highest promise its voters reported, so a node that missed rounds
//! while unreachable needs one rejection, not one per missed round, before
//! its numbers are current again. Failed attempts are separated by a
//! randomly jittered backoff so duelling proposers drift apart.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time;

use crate::acceptor::Acceptor;
use crate::link::Link;
use crate::operation::Operation;
use crate::proposal::Numbering;
use crate::round::{Outcome, Round};
use crate::state::Store;

#[derive(Debug)]
pub struct Proposer {
    /// Proposal number source for this node
    numbering: Numbering,

    /// Maximum number of rounds per operation
    attempts: usize,

    /// Base delay between failed rounds
    backoff: Duration,

    /// Per-RPC window inside a round
    timeout: Duration,
}

impl Proposer {
    pub fn new(id: usize, attempts: usize, backoff: Duration, timeout: Duration) -> Self {
        Proposer {
            numbering: Numbering::new(id),
            attempts,
            backoff,
            timeout,
        }
    }

    /// Runs rounds until one is decided or the attempt budget is spent.
    /// Returns whether `operation` was decided; nothing is applied otherwise.
    pub async fn propose(
        &self,
        operation: &Operation,
        acceptor: &Acceptor,
        store: &Store,
        peers: &[Arc<dyn Link>],
    ) -> bool {
        for attempt in 1..=self.attempts {
            self.numbering.observe(acceptor.promised());
            let number = self.numbering.next();
            debug!("attempt {}/{} for {} with {}", attempt, self.attempts, operation, number);

            let round = Round::new(number, operation, acceptor, store, peers, self.timeout);
            match round.run().await {
            | Outcome::Decided => return true,
            | Outcome::Failed(phase, promised) => {
                debug!("attempt {} for {} failed in {:?}, highest promise {}", attempt, operation, phase, promised);
                self.numbering.observe(promised);
            }
            }

            if attempt < self.attempts {
                time::sleep(jittered(self.backoff)).await;
            }
        }
        warn!("giving up on {} after {} attempts", operation, self.attempts);
        false
    }
}

/// Somewhere in `[base, 2 * base)`.
fn jittered(base: Duration) -> Duration {
    base.mul_f64(1.0 + rand::thread_rng().gen::<f64>())
}
