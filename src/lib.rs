#[macro_use] extern crate derivative;
#[macro_use] extern crate log;

mod config;
mod error;
mod internal;
mod message;
mod socket;

pub mod acceptor;
pub mod client;
pub mod link;
pub mod logging;
pub mod node;
pub mod operation;
pub mod peer;
pub mod proposal;
pub mod proposer;
pub mod round;
pub mod server;
pub mod state;

pub use crate::client::Client;
pub use crate::config::{Config, Handle, parse_peers};
pub use crate::error::{Error, Result};
pub use crate::message::{Request, Response};
pub use crate::node::Node;
pub use crate::operation::Operation;
