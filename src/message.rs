use serde_derive::{Deserialize, Serialize};

use crate::acceptor::Vote;
use crate::proposal::ProposalNumber;

/// Remote-callable surface of a node. Operations travel in their
/// string encoding and are decoded by the receiving node.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Get { key: String },
    Put { key: String, value: String },
    Delete { key: String },
    Prepare { number: ProposalNumber, operation: String },
    Accept { number: ProposalNumber, operation: String },
    Learn { operation: String },
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Reply to `Get`
    Value(Option<String>),

    /// Reply to `Put` and `Delete`: whether consensus was reached
    Done(bool),

    /// Reply to `Prepare` and `Accept`
    Vote(Vote),

    /// Reply to `Learn`
    Learned,

    /// Request could not be decoded or served
    Failed(String),
}

/// Request or response tagged with the ID used to pair them up.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope<T> {
    pub id: u64,
    pub body: T,
}
