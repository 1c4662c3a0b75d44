//! # Summary
//!
//! This module defines the `Acceptor`, which acts as each node's Paxos
//! memory: the highest proposal it has promised, the highest it has
//! accepted, and the operation that came with the latter.
//!
//! All transitions on one node run under a single lock, so interleaved
//! Prepare and Accept requests from competing proposers cannot break the
//! promise rule. Simulated unreliability lives in a separate `FaultPolicy`
//! that is consulted before the lock is taken and never touches the record.

use std::fmt;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use serde_derive::{Deserialize, Serialize};

use crate::operation::Operation;
use crate::proposal::ProposalNumber;

/// Voting phase, reported to the fault policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Accept,
}

/// An acceptor's answer to Prepare or Accept. A rejection carries the
/// promise that beat the proposal, so the proposer can jump past it.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub granted: bool,

    /// Acceptor's highest promise after handling the request
    pub promised: ProposalNumber,
}

/// Decides whether an acceptor drops a vote regardless of the promise rule.
pub trait FaultPolicy: Send + Sync + fmt::Debug {
    fn drop_vote(&self, phase: Phase) -> bool;
}

/// Never drops a vote.
#[derive(Copy, Clone, Debug, Default)]
pub struct Reliable;

impl FaultPolicy for Reliable {
    fn drop_vote(&self, _: Phase) -> bool {
        false
    }
}

/// Drops each vote independently with probability `rate`.
#[derive(Debug)]
pub struct Unreliable {
    rate: f64,
    rng: Mutex<StdRng>,
}

impl Unreliable {
    pub fn new(rate: f64) -> Self {
        Self::with_rng(rate, StdRng::from_entropy())
    }

    /// Reproducible variant for tests.
    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self::with_rng(rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rate: f64, rng: StdRng) -> Self {
        Unreliable {
            rate: rate.max(0.0).min(1.0),
            rng: Mutex::new(rng),
        }
    }
}

impl FaultPolicy for Unreliable {
    fn drop_vote(&self, _: Phase) -> bool {
        self.rng.lock().gen_bool(self.rate)
    }
}

/// Acceptor memory. `accepted <= promised` always holds, and `value` is
/// present exactly when some Accept has been granted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    /// Highest proposal promised
    pub promised: ProposalNumber,

    /// Highest proposal accepted
    pub accepted: ProposalNumber,

    /// Operation accepted along with `accepted`
    pub value: Option<Operation>,
}

impl Record {
    /// Promise rule: grant only numbers strictly above the current promise.
    fn prepare(&mut self, number: ProposalNumber) -> bool {
        if number > self.promised {
            self.promised = number;
            true
        } else {
            false
        }
    }

    /// Accept rule: `>=` so that the number this node just promised is admitted.
    fn accept(&mut self, number: ProposalNumber, operation: &Operation) -> bool {
        if number >= self.promised {
            self.promised = number;
            self.accepted = number;
            self.value = Some(operation.clone());
            true
        } else {
            false
        }
    }
}

/// Lock-guarded acceptor for a single node.
#[derive(Debug)]
pub struct Acceptor {
    /// Unique ID of acceptor
    id: usize,

    /// Promise and accept state
    record: Mutex<Record>,

    /// Simulated vote loss
    faults: Box<dyn FaultPolicy>,
}

impl Acceptor {
    pub fn new(id: usize) -> Self {
        Self::with_faults(id, Box::new(Reliable))
    }

    pub fn with_faults(id: usize, faults: Box<dyn FaultPolicy>) -> Self {
        Acceptor {
            id,
            record: Mutex::new(Record::default()),
            faults,
        }
    }

    pub fn prepare(&self, number: ProposalNumber, operation: &Operation) -> bool {
        if self.faults.drop_vote(Phase::Prepare) {
            debug!("acceptor {} dropped prepare {} for {}", self.id, number, operation);
            return false
        }
        let mut record = self.record.lock();
        let granted = record.prepare(number);
        if granted {
            debug!("acceptor {} promised {} for {}", self.id, number, operation);
        } else {
            debug!("acceptor {} rejected stale prepare {} (promised {})", self.id, number, record.promised);
        }
        granted
    }

    pub fn accept(&self, number: ProposalNumber, operation: &Operation) -> bool {
        if self.faults.drop_vote(Phase::Accept) {
            debug!("acceptor {} dropped accept {} for {}", self.id, number, operation);
            return false
        }
        let mut record = self.record.lock();
        let granted = record.accept(number, operation);
        if granted {
            debug!("acceptor {} accepted {} for {}", self.id, number, operation);
        } else {
            debug!("acceptor {} rejected stale accept {} (promised {})", self.id, number, record.promised);
        }
        granted
    }

    pub fn promised(&self) -> ProposalNumber {
        self.record.lock().promised
    }

    pub fn record(&self) -> Record {
        self.record.lock().clone()
    }
}
