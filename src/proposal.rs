//! # Summary
//!
//! This module defines proposal numbers and their per-node generator.
//!
//! A proposal number is `counter * MAX_NODES + id`. Since every node has a
//! distinct `id < MAX_NODES`, two nodes can never issue the same number, and
//! bumping the local counter always yields a number greater than anything
//! this node has issued before.

use std::fmt;

use parking_lot::Mutex;
use serde_derive::{Deserialize, Serialize};

/// Upper bound (exclusive) on node identifiers.
pub const MAX_NODES: u64 = 1024;

/// Totally ordered, cluster-wide unique proposal identifier.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalNumber(pub u64);

impl ProposalNumber {
    /// The node that issued this number.
    pub fn node(self) -> usize {
        (self.0 % MAX_NODES) as usize
    }

    /// The issuing node's counter value.
    pub fn counter(self) -> u64 {
        self.0 / MAX_NODES
    }
}

impl fmt::Display for ProposalNumber {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.counter(), self.node())
    }
}

/// Per-node proposal number generator.
#[derive(Debug)]
pub struct Numbering {
    id: u64,
    counter: Mutex<u64>,
}

impl Numbering {
    /// Callers are responsible for `id < MAX_NODES`; see `Config::validate`.
    pub fn new(id: usize) -> Self {
        Numbering {
            id: id as u64,
            counter: Mutex::new(0),
        }
    }

    /// Issues a number strictly greater than every number previously issued
    /// or observed by this node.
    pub fn next(&self) -> ProposalNumber {
        let mut counter = self.counter.lock();
        *counter += 1;
        ProposalNumber(*counter * MAX_NODES + self.id)
    }

    /// Advances the counter so that the next issued number exceeds `seen`.
    pub fn observe(&self, seen: ProposalNumber) {
        let mut counter = self.counter.lock();
        *counter = std::cmp::max(*counter, seen.counter());
    }
}
