//! # Summary
//!
//! This module defines a client for a single node. Reads are served by
//! whichever node the client is connected to; writes succeed only if that
//! node manages to get them decided by the cluster.

use std::time::Duration;

use crate::error::Result;
use crate::message::{Request, Response};
use crate::peer::{unexpected, Remote};

/// Request timeout that outlasts a write on a node running default settings.
/// See `Config::write_budget`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

pub struct Client(Remote);

impl Client {
    /// Connects to the node at `address`. `timeout` bounds each request,
    /// so it should leave room for the node's own retries.
    pub async fn connect<A: Into<String>>(address: A, timeout: Duration) -> Result<Self> {
        let remote = Remote::new(address, timeout);
        remote.connect().await?;
        Ok(Client(remote))
    }

    pub fn address(&self) -> &str {
        self.0.address()
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.0.call(Request::Get { key: key.to_string() }).await? {
        | Response::Value(value) => Ok(value),
        | other => Err(unexpected(other)),
        }
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<bool> {
        let request = Request::Put { key: key.to_string(), value: value.to_string() };
        self.done(request).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.done(Request::Delete { key: key.to_string() }).await
    }

    async fn done(&self, request: Request) -> Result<bool> {
        match self.0.call(request).await? {
        | Response::Done(done) => Ok(done),
        | other => Err(unexpected(other)),
        }
    }
}
